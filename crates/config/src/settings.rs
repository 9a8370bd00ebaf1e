//! Core settings structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for settings operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading settings file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read settings file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse settings: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// External tool locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsConfig {
    /// Path to the ffmpeg binary
    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: PathBuf,
    /// Path to the ffprobe binary
    #[serde(default = "default_ffprobe_bin")]
    pub ffprobe_bin: PathBuf,
}

fn default_ffmpeg_bin() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_bin() -> PathBuf {
    PathBuf::from("ffprobe")
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: default_ffmpeg_bin(),
            ffprobe_bin: default_ffprobe_bin(),
        }
    }
}

/// Media probing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeConfig {
    /// Hard timeout for a single ffprobe invocation, in seconds (default 5)
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_probe_timeout_secs() -> u64 {
    5
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_probe_timeout_secs(),
        }
    }
}

/// Telemetry sampling configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryConfig {
    /// Interval between hardware samples, in milliseconds (default 1000)
    #[serde(default = "default_telemetry_interval_millis")]
    pub interval_millis: u64,
}

fn default_telemetry_interval_millis() -> u64 {
    1000
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            interval_millis: default_telemetry_interval_millis(),
        }
    }
}

/// Encode supervision configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncodeConfig {
    /// Grace window between the graceful stop request and force-kill,
    /// in milliseconds (default 3000)
    #[serde(default = "default_cancel_grace_millis")]
    pub cancel_grace_millis: u64,
    /// Stop the batch after the first failed job instead of continuing
    /// (default false)
    #[serde(default)]
    pub halt_on_failure: bool,
}

fn default_cancel_grace_millis() -> u64 {
    3000
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            cancel_grace_millis: default_cancel_grace_millis(),
            halt_on_failure: false,
        }
    }
}

/// Main settings structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub encode: EncodeConfig,
}

impl Settings {
    /// Load settings from a TOML file
    ///
    /// Parses the file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse settings from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        Ok(settings)
    }

    /// Apply environment variable overrides to the settings
    ///
    /// Overrides the following values if environment variables are set:
    /// - TRANSCODEQ_FFMPEG_BIN -> tools.ffmpeg_bin
    /// - TRANSCODEQ_FFPROBE_BIN -> tools.ffprobe_bin
    /// - TRANSCODEQ_PROBE_TIMEOUT_SECS -> probe.timeout_secs
    /// - TRANSCODEQ_TELEMETRY_INTERVAL_MILLIS -> telemetry.interval_millis
    /// - TRANSCODEQ_CANCEL_GRACE_MILLIS -> encode.cancel_grace_millis
    /// - TRANSCODEQ_HALT_ON_FAILURE -> encode.halt_on_failure
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("TRANSCODEQ_FFMPEG_BIN") {
            if !val.is_empty() {
                self.tools.ffmpeg_bin = PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var("TRANSCODEQ_FFPROBE_BIN") {
            if !val.is_empty() {
                self.tools.ffprobe_bin = PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var("TRANSCODEQ_PROBE_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                self.probe.timeout_secs = secs;
            }
        }

        if let Ok(val) = env::var("TRANSCODEQ_TELEMETRY_INTERVAL_MILLIS") {
            if let Ok(millis) = val.parse::<u64>() {
                self.telemetry.interval_millis = millis;
            }
        }

        if let Ok(val) = env::var("TRANSCODEQ_CANCEL_GRACE_MILLIS") {
            if let Ok(millis) = val.parse::<u64>() {
                self.encode.cancel_grace_millis = millis;
            }
        }

        if let Ok(val) = env::var("TRANSCODEQ_HALT_ON_FAILURE") {
            // Accept "true", "1", "yes" as true; "false", "0", "no" as false
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" => self.encode.halt_on_failure = true,
                "false" | "0" | "no" => self.encode.halt_on_failure = false,
                _ => {} // Invalid value, keep existing
            }
        }
    }

    /// Load settings from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut settings = Self::load_from_file(path)?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Load settings from file if it exists, otherwise start from defaults;
    /// environment overrides apply in both cases.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut settings = if path.as_ref().exists() {
            Self::load_from_file(path)?
        } else {
            Self::default()
        };
        settings.apply_env_overrides();
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;

    // Mutex to ensure env var tests don't interfere with each other
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to clear all settings-related env vars
    fn clear_env_vars() {
        env::remove_var("TRANSCODEQ_FFMPEG_BIN");
        env::remove_var("TRANSCODEQ_FFPROBE_BIN");
        env::remove_var("TRANSCODEQ_PROBE_TIMEOUT_SECS");
        env::remove_var("TRANSCODEQ_TELEMETRY_INTERVAL_MILLIS");
        env::remove_var("TRANSCODEQ_CANCEL_GRACE_MILLIS");
        env::remove_var("TRANSCODEQ_HALT_ON_FAILURE");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_settings_parse_all_sections(
            ffmpeg in "[a-z/]{1,30}",
            ffprobe in "[a-z/]{1,30}",
            timeout in 1u64..120,
            interval in 100u64..10_000,
            grace in 0u64..60_000,
            halt in proptest::bool::ANY,
        ) {
            let toml_str = format!(
                r#"
[tools]
ffmpeg_bin = "{}"
ffprobe_bin = "{}"

[probe]
timeout_secs = {}

[telemetry]
interval_millis = {}

[encode]
cancel_grace_millis = {}
halt_on_failure = {}
"#,
                ffmpeg, ffprobe, timeout, interval, grace, halt
            );

            let settings = Settings::parse_toml(&toml_str).expect("Valid TOML should parse");

            prop_assert_eq!(settings.tools.ffmpeg_bin, PathBuf::from(ffmpeg));
            prop_assert_eq!(settings.tools.ffprobe_bin, PathBuf::from(ffprobe));
            prop_assert_eq!(settings.probe.timeout_secs, timeout);
            prop_assert_eq!(settings.telemetry.interval_millis, interval);
            prop_assert_eq!(settings.encode.cancel_grace_millis, grace);
            prop_assert_eq!(settings.encode.halt_on_failure, halt);
        }

        #[test]
        fn prop_env_overrides_probe_timeout(
            initial in 1u64..60,
            override_secs in 1u64..120,
        ) {
            let _guard = ENV_MUTEX.lock().unwrap();
            clear_env_vars();

            let toml_str = format!("[probe]\ntimeout_secs = {}\n", initial);
            let mut settings = Settings::parse_toml(&toml_str).expect("Valid TOML");

            env::set_var("TRANSCODEQ_PROBE_TIMEOUT_SECS", override_secs.to_string());
            settings.apply_env_overrides();
            clear_env_vars();

            prop_assert_eq!(settings.probe.timeout_secs, override_secs);
        }

        #[test]
        fn prop_env_overrides_telemetry_interval(
            initial in 100u64..5_000,
            override_millis in 100u64..10_000,
        ) {
            let _guard = ENV_MUTEX.lock().unwrap();
            clear_env_vars();

            let toml_str = format!("[telemetry]\ninterval_millis = {}\n", initial);
            let mut settings = Settings::parse_toml(&toml_str).expect("Valid TOML");

            env::set_var("TRANSCODEQ_TELEMETRY_INTERVAL_MILLIS", override_millis.to_string());
            settings.apply_env_overrides();
            clear_env_vars();

            prop_assert_eq!(settings.telemetry.interval_millis, override_millis);
        }

        #[test]
        fn prop_env_overrides_halt_on_failure(
            initial in proptest::bool::ANY,
            override_halt in proptest::bool::ANY,
        ) {
            let _guard = ENV_MUTEX.lock().unwrap();
            clear_env_vars();

            let toml_str = format!("[encode]\nhalt_on_failure = {}\n", initial);
            let mut settings = Settings::parse_toml(&toml_str).expect("Valid TOML");

            env::set_var("TRANSCODEQ_HALT_ON_FAILURE", override_halt.to_string());
            settings.apply_env_overrides();
            clear_env_vars();

            prop_assert_eq!(settings.encode.halt_on_failure, override_halt);
        }
    }

    #[test]
    fn test_env_overrides_tool_paths() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        let mut settings = Settings::default();

        env::set_var("TRANSCODEQ_FFMPEG_BIN", "/opt/ffmpeg/bin/ffmpeg");
        env::set_var("TRANSCODEQ_FFPROBE_BIN", "/opt/ffmpeg/bin/ffprobe");
        settings.apply_env_overrides();
        clear_env_vars();

        assert_eq!(settings.tools.ffmpeg_bin, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(settings.tools.ffprobe_bin, PathBuf::from("/opt/ffmpeg/bin/ffprobe"));
    }

    // Test that missing sections use defaults
    #[test]
    fn test_empty_settings_use_defaults() {
        let settings = Settings::parse_toml("").expect("Empty TOML should parse");

        assert_eq!(settings.tools.ffmpeg_bin, PathBuf::from("ffmpeg"));
        assert_eq!(settings.tools.ffprobe_bin, PathBuf::from("ffprobe"));
        assert_eq!(settings.probe.timeout_secs, 5);
        assert_eq!(settings.telemetry.interval_millis, 1000);
        assert_eq!(settings.encode.cancel_grace_millis, 3000);
        assert!(!settings.encode.halt_on_failure);
    }

    // Test partial settings with some sections missing
    #[test]
    fn test_partial_settings_use_defaults_for_missing() {
        let toml_str = r#"
[probe]
timeout_secs = 10
"#;
        let settings = Settings::parse_toml(toml_str).expect("Partial TOML should parse");

        assert_eq!(settings.probe.timeout_secs, 10);
        assert_eq!(settings.tools.ffmpeg_bin, PathBuf::from("ffmpeg")); // default
        assert_eq!(settings.telemetry.interval_millis, 1000); // default
        assert_eq!(settings.encode.cancel_grace_millis, 3000); // default
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        let settings = Settings::load_or_default("/nonexistent/transcodeq.toml")
            .expect("Missing file should fall back to defaults");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_or_default_existing_file() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("transcodeq.toml");
        fs::write(&path, "[encode]\nhalt_on_failure = true\n").unwrap();

        let settings = Settings::load_or_default(&path).expect("Should load existing file");
        assert!(settings.encode.halt_on_failure);
    }
}
