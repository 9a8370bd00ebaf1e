//! Job registry for the transcode queue.
//!
//! Holds the ordered set of queued jobs keyed by input path. Insertion order
//! drives both the processing order and the display order. The registry has
//! no locking of its own; the orchestrator serializes all access.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Status of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting in the queue.
    NotStarted,
    /// Job is currently being encoded.
    Processing,
    /// Job finished successfully.
    Done,
    /// Job failed with an encoder error.
    Error,
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::NotStarted => write!(f, "not_started"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Done => write!(f, "done"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

/// One queued unit of work: a probed media file awaiting transcoding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    /// Display name, derived from the file name.
    pub name: String,
    /// Input path; unique key across the registry.
    pub path: PathBuf,
    /// Media duration in milliseconds.
    pub length_millis: u64,
    /// Input file size in bytes.
    pub size_bytes: u64,
    /// Video width in pixels.
    pub width: u32,
    /// Video height in pixels.
    pub height: u32,
    /// Current status.
    pub status: JobStatus,
}

impl Job {
    /// Formatted source resolution, e.g. `1920x1080`.
    pub fn resolution_label(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Result of an `add` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Job was appended at the tail of the queue.
    Added,
    /// A job with the same path is already queued; nothing changed.
    Duplicate,
}

/// Error type for `remove` operations.
#[derive(Debug, Error)]
pub enum RemoveError {
    /// The job is currently being processed and cannot be removed.
    #[error("job is currently processing: {}", .0.display())]
    InFlight(PathBuf),

    /// No job is queued for the given path.
    #[error("no job queued for path: {}", .0.display())]
    NotFound(PathBuf),
}

/// Ordered collection of jobs, FIFO by insertion.
#[derive(Debug, Default)]
pub struct Registry {
    jobs: Vec<Job>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a job at the tail unless its path is already present.
    ///
    /// A duplicate path is a soft condition, not an error: the registry is
    /// left untouched and `Duplicate` is returned for the caller to report.
    pub fn add(&mut self, job: Job) -> AddOutcome {
        if self.jobs.iter().any(|j| j.path == job.path) {
            return AddOutcome::Duplicate;
        }
        self.jobs.push(job);
        AddOutcome::Added
    }

    /// Remove the job for `path` and return it.
    ///
    /// Removal of the in-flight job is rejected with `InFlight` and leaves
    /// the registry unchanged.
    pub fn remove(&mut self, path: &Path) -> Result<Job, RemoveError> {
        let index = self
            .jobs
            .iter()
            .position(|j| j.path == path)
            .ok_or_else(|| RemoveError::NotFound(path.to_path_buf()))?;

        if self.jobs[index].status == JobStatus::Processing {
            return Err(RemoveError::InFlight(path.to_path_buf()));
        }

        Ok(self.jobs.remove(index))
    }

    /// First job still waiting to be processed, in insertion order.
    ///
    /// The returned job is left unmodified; the orchestrator transitions it
    /// to `Processing` atomically with its dequeue intent.
    pub fn next_pending(&self) -> Option<&Job> {
        self.jobs.iter().find(|j| j.status == JobStatus::NotStarted)
    }

    /// Set the status of the job for `path`. Idempotent; no-op if absent.
    pub fn set_status(&mut self, path: &Path, status: JobStatus) {
        if let Some(job) = self.jobs.iter_mut().find(|j| j.path == path) {
            job.status = status;
        }
    }

    /// Look up a job by path.
    pub fn get(&self, path: &Path) -> Option<&Job> {
        self.jobs.iter().find(|j| j.path == path)
    }

    /// All jobs in insertion order.
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Number of jobs that completed successfully.
    pub fn finished_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| j.status == JobStatus::Done)
            .count()
    }

    /// Whether any job is still waiting to run.
    pub fn has_pending(&self) -> bool {
        self.jobs.iter().any(|j| j.status == JobStatus::NotStarted)
    }
}
