//! Media prober: validates candidate files and extracts their metadata.
//!
//! A candidate path is first checked against the supported-extension list
//! (cheap pre-filter, no subprocess), then stat'ed for its size, then probed
//! with ffprobe under a hard timeout. A failed probe never constructs a
//! partial job and is safe to retry.

use crate::queue::{Job, JobStatus};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use transcodeq_config::Settings;

/// Input extensions accepted by the queue (case-insensitive matching).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv"];

/// Error type for probe operations.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Extension is not in the supported set; no probe was attempted.
    #[error("invalid input file format (supported: mp4, avi, mkv): {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Reading file metadata failed.
    #[error("reading file stats failed: {0}")]
    Stat(std::io::Error),

    /// ffprobe did not finish within the configured timeout.
    #[error("ffprobe timed out after {0} seconds")]
    Timeout(u64),

    /// ffprobe could not be executed or exited with an error.
    #[error("ffprobe failed: {0}")]
    Tool(String),

    /// ffprobe output could not be interpreted.
    #[error("failed to parse ffprobe output: {0}")]
    Parse(String),
}

/// Top-level ffprobe JSON output.
#[derive(Debug, Clone, Deserialize)]
struct FfprobeData {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: FfprobeFormat,
}

#[derive(Debug, Clone, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Check whether a path carries a supported media extension.
pub fn is_supported_media(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext_lower = ext.to_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext_lower.as_str())
        })
        .unwrap_or(false)
}

/// Display name for a job, derived from the file name.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Parse an ffprobe `format.duration` value ("123.456000") into milliseconds.
pub fn parse_duration_millis(duration: &str) -> Option<u64> {
    let secs: f64 = duration.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some((secs * 1000.0) as u64)
}

/// Probe a candidate file and construct its queue job.
///
/// The probe invokes `ffprobe -v error -print_format json -show_streams
/// -show_format` and is bounded by `settings.probe.timeout_secs`. On expiry
/// the subprocess is killed and a `Timeout` error is returned.
pub async fn probe_file(settings: &Settings, path: &Path) -> Result<Job, ProbeError> {
    if !is_supported_media(path) {
        return Err(ProbeError::UnsupportedFormat(path.to_path_buf()));
    }

    let metadata = tokio::fs::metadata(path).await.map_err(ProbeError::Stat)?;
    let size_bytes = metadata.len();

    let mut cmd = Command::new(&settings.tools.ffprobe_bin);
    cmd.arg("-v")
        .arg("error")
        .arg("-print_format")
        .arg("json")
        .arg("-show_streams")
        .arg("-show_format")
        .arg(path)
        .kill_on_drop(true);

    log::debug!("probing {}", path.display());

    let timeout_secs = settings.probe.timeout_secs;
    let output = match timeout(Duration::from_secs(timeout_secs), cmd.output()).await {
        Ok(result) => result.map_err(|e| ProbeError::Tool(e.to_string()))?,
        Err(_) => return Err(ProbeError::Timeout(timeout_secs)),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProbeError::Tool(stderr.trim().to_string()));
    }

    let json = String::from_utf8_lossy(&output.stdout);
    build_job(path, size_bytes, &json)
}

/// Build a job from raw ffprobe JSON. Pure; split out for testing.
fn build_job(path: &Path, size_bytes: u64, json: &str) -> Result<Job, ProbeError> {
    let data: FfprobeData =
        serde_json::from_str(json).map_err(|e| ProbeError::Parse(e.to_string()))?;

    let video = data
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| ProbeError::Parse("no video stream found".to_string()))?;

    let length_millis = data
        .format
        .duration
        .as_deref()
        .and_then(parse_duration_millis)
        .ok_or_else(|| ProbeError::Parse("missing or invalid duration".to_string()))?;

    Ok(Job {
        name: display_name(path),
        path: path.to_path_buf(),
        length_millis,
        size_bytes,
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        status: JobStatus::NotStarted,
    })
}
