//! Published progress state for polled presentation reads.
//!
//! The orchestrator is the only writer; the presentation layer reads whole
//! snapshots behind the shared lock, so it always observes a complete update
//! and never a torn intermediate.

use crate::telemetry::TelemetrySample;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Live progress figures for the current run, plus the last telemetry sample.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProgressSnapshot {
    /// Fractional completion of the active job, clamped to [0, 1].
    pub fraction: f32,
    /// Overall queue label, `"<done> / <total>"`.
    pub label: String,
    /// Encoded media time of the active job, `HH:MM:SS`.
    pub elapsed: String,
    /// Encode speed of the active job, e.g. `1.25x`.
    pub speed: String,
    /// Path of the job currently being encoded, if any.
    pub active: Option<PathBuf>,
    /// Most recent hardware reading.
    pub telemetry: TelemetrySample,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            fraction: 0.0,
            label: "0 / 0".to_string(),
            elapsed: String::new(),
            speed: String::new(),
            active: None,
            telemetry: TelemetrySample::default(),
        }
    }
}

/// Shared progress state for concurrent access across components.
pub type SharedProgress = Arc<RwLock<ProgressSnapshot>>;

/// Creates a new SharedProgress instance with default values.
pub fn new_shared_progress() -> SharedProgress {
    Arc::new(RwLock::new(ProgressSnapshot::default()))
}
