//! Operator-facing encode option tables and the per-run configuration.
//!
//! The tables below are the catalog the front end presents in its combo
//! boxes; `RunConfig` is the immutable snapshot of one selection from each,
//! captured at the moment a run starts. Changing the selection afterwards
//! only affects the next run.

use serde::{Deserialize, Serialize};

/// Target output resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn label(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Parse a `WIDTHxHEIGHT` label, e.g. `1920x1080`.
    pub fn parse(label: &str) -> Option<Self> {
        let (w, h) = label.split_once('x')?;
        let width = w.trim().parse().ok()?;
        let height = h.trim().parse().ok()?;
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self { width, height })
    }
}

/// Resolutions offered by the front end, highest first.
pub const RESOLUTIONS: &[Resolution] = &[
    Resolution { width: 3840, height: 2160 },
    Resolution { width: 2560, height: 1440 },
    Resolution { width: 1920, height: 1080 },
    Resolution { width: 1280, height: 720 },
];

/// Scaling filter mode applied when resizing to the target resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShaderMode {
    Bilinear,
    Bicubic,
    Lanczos,
    Spline,
}

impl ShaderMode {
    pub fn name(&self) -> &'static str {
        match self {
            ShaderMode::Bilinear => "bilinear",
            ShaderMode::Bicubic => "bicubic",
            ShaderMode::Lanczos => "lanczos",
            ShaderMode::Spline => "spline",
        }
    }

    /// The ffmpeg scale-filter flags value for this mode.
    pub fn scale_flags(&self) -> &'static str {
        self.name()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        SHADER_MODES
            .iter()
            .find(|m| m.name().eq_ignore_ascii_case(name))
            .copied()
    }
}

pub const SHADER_MODES: &[ShaderMode] = &[
    ShaderMode::Bilinear,
    ShaderMode::Bicubic,
    ShaderMode::Lanczos,
    ShaderMode::Spline,
];

/// Compression tier mapping to encoder quality/speed flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionPreset {
    pub name: &'static str,
    /// Constant-quality value handed to the encoder (`-crf` / `-cq`).
    pub crf: u8,
    /// Encoder speed preset (`-preset`).
    pub encoder_preset: &'static str,
}

/// Compression tiers offered by the front end, best quality first.
pub const COMPRESSION_PRESETS: &[CompressionPreset] = &[
    CompressionPreset { name: "quality", crf: 18, encoder_preset: "slow" },
    CompressionPreset { name: "balanced", crf: 23, encoder_preset: "medium" },
    CompressionPreset { name: "fast", crf: 28, encoder_preset: "fast" },
];

pub fn compression_by_name(name: &str) -> Option<&'static CompressionPreset> {
    COMPRESSION_PRESETS
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
}

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Mp4,
    Mkv,
    Avi,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Mkv => "mkv",
            OutputFormat::Avi => "avi",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        OUTPUT_FORMATS
            .iter()
            .find(|f| f.extension().eq_ignore_ascii_case(name))
            .copied()
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

pub const OUTPUT_FORMATS: &[OutputFormat] =
    &[OutputFormat::Mp4, OutputFormat::Mkv, OutputFormat::Avi];

/// Hardware-acceleration backend for the active run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareAccel {
    /// CUDA-accelerated decode; GPU telemetry (including temperature) applies.
    Cuda,
    /// Software decode; GPU telemetry fields stay empty.
    Software,
}

/// Immutable snapshot of operator-selected options for one processing run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub resolution: Resolution,
    pub shader_mode: ShaderMode,
    pub compression: CompressionPreset,
    pub output_format: OutputFormat,
    /// Disable hardware-accelerated decoding.
    pub disable_hwaccel: bool,
    /// Disable hardware-accelerated encoding (fall back to libx264).
    pub disable_hw_encoding: bool,
    /// Verbose encoder output for troubleshooting.
    pub debug: bool,
}

impl RunConfig {
    /// Backend the run decodes with; decides whether GPU telemetry applies.
    pub fn hwaccel(&self) -> HardwareAccel {
        if self.disable_hwaccel {
            HardwareAccel::Software
        } else {
            HardwareAccel::Cuda
        }
    }

    /// Video encoder selected for the run.
    pub fn video_encoder(&self) -> &'static str {
        if self.disable_hw_encoding {
            "libx264"
        } else {
            "h264_nvenc"
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution { width: 1920, height: 1080 },
            shader_mode: ShaderMode::Lanczos,
            compression: COMPRESSION_PRESETS[1],
            output_format: OutputFormat::Mkv,
            disable_hwaccel: false,
            disable_hw_encoding: false,
            debug: false,
        }
    }
}
