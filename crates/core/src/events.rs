//! Queue events relayed to the presentation layer.
//!
//! Every ingestion outcome, status transition, and run boundary is published
//! as a typed event over an unbounded channel. Sends never block and a gone
//! consumer is ignored, so the orchestrator fires and continues.

use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Log-style event describing one queue or run transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    /// A probed file was appended to the queue.
    FileAdded { path: PathBuf },
    /// A candidate was rejected by the extension pre-filter.
    UnsupportedFormat { path: PathBuf },
    /// A candidate's path is already queued; ignored.
    DuplicatePath { path: PathBuf },
    /// Probing a candidate failed; no job was created.
    ProbeFailed { path: PathBuf, reason: String },
    /// A job was dequeued and its encode started.
    JobStarted { path: PathBuf },
    /// A job's encode finished successfully.
    JobCompleted { path: PathBuf },
    /// A job's encode failed; the job is marked errored.
    JobFailed { path: PathBuf, reason: String },
    /// The in-flight job was cancelled and returned to the queue.
    JobCancelled { path: PathBuf },
    /// A queued job was removed on request.
    JobRemoved { path: PathBuf },
    /// A removal request was rejected.
    RemoveRejected { path: PathBuf, reason: String },
    /// The run ended: the queue drained, the batch halted, or the
    /// cancellation completed. The orchestrator is idle again.
    ProcessingFinished,
}

impl std::fmt::Display for QueueEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueEvent::FileAdded { path } => write!(f, "Added file {}", path.display()),
            QueueEvent::UnsupportedFormat { path } => write!(
                f,
                "Invalid input file format (supported: mp4, avi, mkv), path: {}",
                path.display()
            ),
            QueueEvent::DuplicatePath { path } => write!(
                f,
                "File is already added to queue, ignoring it: {}",
                path.display()
            ),
            QueueEvent::ProbeFailed { path, reason } => {
                write!(f, "Probe failed for {}: {}", path.display(), reason)
            }
            QueueEvent::JobStarted { path } => write!(f, "Processing {}", path.display()),
            QueueEvent::JobCompleted { path } => write!(f, "Finished {}", path.display()),
            QueueEvent::JobFailed { path, reason } => {
                write!(f, "Encoding failed for {}: {}", path.display(), reason)
            }
            QueueEvent::JobCancelled { path } => {
                write!(f, "Cancelled {}, returned to queue", path.display())
            }
            QueueEvent::JobRemoved { path } => {
                write!(f, "Removed {} from queue", path.display())
            }
            QueueEvent::RemoveRejected { path, reason } => {
                write!(f, "Cannot remove {}: {}", path.display(), reason)
            }
            QueueEvent::ProcessingFinished => write!(f, "Processing finished"),
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<QueueEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<QueueEvent>;

/// Create the event channel connecting the core to its presentation consumer.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
