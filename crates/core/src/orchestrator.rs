//! Processing orchestrator: the run/idle state machine and drain loop.
//!
//! The orchestrator owns the job registry and the run-scoped session. One
//! background task drives the drain loop and is the sole writer of job
//! statuses and progress figures; presentation-facing reads go through
//! published snapshots. A single external control flips start and cancel
//! depending on the current state.

use crate::encode::progress::{format_millis, format_speed, ProgressSample};
use crate::encode::runner::{Encoder, Outcome};
use crate::events::{EventSender, QueueEvent};
use crate::presets::{HardwareAccel, RunConfig};
use crate::probe;
use crate::queue::{AddOutcome, Job, JobStatus, Registry};
use crate::status::{new_shared_progress, ProgressSnapshot, SharedProgress};
use crate::telemetry::{Sampler, TelemetrySample};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use transcodeq_config::Settings;
use uuid::Uuid;

/// Run state of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No run is active.
    Idle,
    /// The drain loop is processing the queue.
    Running,
    /// A cancel request was issued; the in-flight runner is winding down.
    Cancelling,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Running => write!(f, "running"),
            RunState::Cancelling => write!(f, "cancelling"),
        }
    }
}

/// Run-scoped state: one session exists per active run.
#[derive(Debug, Clone)]
struct Session {
    id: Uuid,
    cancel: CancellationToken,
}

/// Owner of the queue, the state machine, and the telemetry sampler.
#[derive(Clone)]
pub struct Orchestrator {
    settings: Settings,
    encoder: Arc<dyn Encoder>,
    registry: Arc<RwLock<Registry>>,
    state: Arc<RwLock<RunState>>,
    session: Arc<RwLock<Option<Session>>>,
    progress: SharedProgress,
    sampler: Arc<Sampler>,
    telemetry_tx: mpsc::UnboundedSender<TelemetrySample>,
    events: EventSender,
}

/// Fractional completion of a job, clamped to [0, 1].
fn job_fraction(elapsed_millis: u64, length_millis: u64) -> f32 {
    if length_millis == 0 {
        return 0.0;
    }
    (elapsed_millis as f32 / length_millis as f32).clamp(0.0, 1.0)
}

impl Orchestrator {
    /// Build an orchestrator around the given encoder.
    ///
    /// Spawns the telemetry relay task, so this must run inside a tokio
    /// runtime.
    pub fn new(settings: Settings, encoder: Arc<dyn Encoder>, events: EventSender) -> Self {
        let progress = new_shared_progress();
        let (telemetry_tx, mut telemetry_rx) = mpsc::unbounded_channel::<TelemetrySample>();

        // Each published sample overwrites the previous one in the snapshot
        let relay_progress = progress.clone();
        tokio::spawn(async move {
            while let Some(sample) = telemetry_rx.recv().await {
                relay_progress.write().await.telemetry = sample;
            }
        });

        Self {
            settings,
            encoder,
            registry: Arc::new(RwLock::new(Registry::new())),
            state: Arc::new(RwLock::new(RunState::Idle)),
            session: Arc::new(RwLock::new(None)),
            progress,
            sampler: Arc::new(Sampler::new()),
            telemetry_tx,
            events,
        }
    }

    /// Validate, dedup, probe, and queue candidate paths.
    ///
    /// Every path gets exactly one outcome event: added, rejected-format,
    /// duplicate, or probe-error. Returns the number of jobs added.
    pub async fn ingest(&self, paths: &[PathBuf]) -> usize {
        let mut added = 0;

        for path in paths {
            if !probe::is_supported_media(path) {
                self.emit(QueueEvent::UnsupportedFormat { path: path.clone() });
                continue;
            }

            if self.registry.read().await.get(path).is_some() {
                self.emit(QueueEvent::DuplicatePath { path: path.clone() });
                continue;
            }

            match probe::probe_file(&self.settings, path).await {
                Ok(job) => match self.registry.write().await.add(job) {
                    AddOutcome::Added => {
                        added += 1;
                        self.emit(QueueEvent::FileAdded { path: path.clone() });
                    }
                    AddOutcome::Duplicate => {
                        self.emit(QueueEvent::DuplicatePath { path: path.clone() });
                    }
                },
                Err(e) => {
                    self.emit(QueueEvent::ProbeFailed {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if added > 0 {
            self.refresh_label().await;
        }
        added
    }

    /// Flip start/cancel depending on the current state.
    ///
    /// Idle with pending jobs: captures `config`, opens a session, starts
    /// the telemetry sampler, and spawns the drain loop. Running: raises the
    /// session's cancel signal. Cancelling: ignored. Idle with an empty
    /// queue: ignored.
    pub async fn toggle_processing(&self, config: RunConfig) {
        {
            let mut state = self.state.write().await;
            match *state {
                RunState::Running => {
                    *state = RunState::Cancelling;
                    drop(state);
                    if let Some(session) = self.session.read().await.as_ref() {
                        log::info!("cancel requested for session {}", session.id);
                        session.cancel.cancel();
                    }
                    return;
                }
                RunState::Cancelling => {
                    log::debug!("cancellation already in progress, ignoring request");
                    return;
                }
                RunState::Idle => {
                    if !self.registry.read().await.has_pending() {
                        log::info!("start requested with no pending jobs, ignoring");
                        return;
                    }
                    *state = RunState::Running;
                }
            }
        }

        let session = Session {
            id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
        };
        let cancel = session.cancel.clone();
        log::info!("starting session {}", session.id);
        *self.session.write().await = Some(session);

        let interval = Duration::from_millis(self.settings.telemetry.interval_millis);
        let gpu_backend = config.hwaccel() == HardwareAccel::Cuda;
        self.sampler
            .start(interval, gpu_backend, self.telemetry_tx.clone())
            .await;

        let this = self.clone();
        tokio::spawn(async move { this.drain_loop(config, cancel).await });
    }

    /// Remove a queued job. The in-flight job is rejected, not removed.
    pub async fn remove_job(&self, path: &Path) {
        let result = self.registry.write().await.remove(path);
        match result {
            Ok(job) => {
                self.emit(QueueEvent::JobRemoved { path: job.path });
                self.refresh_label().await;
            }
            Err(e) => {
                self.emit(QueueEvent::RemoveRejected {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Current run state.
    pub async fn state(&self) -> RunState {
        *self.state.read().await
    }

    /// Copy of the queue in insertion order.
    pub async fn queue_snapshot(&self) -> Vec<Job> {
        self.registry.read().await.jobs().to_vec()
    }

    /// Copy of the current progress figures.
    pub async fn progress_snapshot(&self) -> ProgressSnapshot {
        self.progress.read().await.clone()
    }

    /// Handle to the published progress state for polling consumers.
    pub fn shared_progress(&self) -> SharedProgress {
        self.progress.clone()
    }

    /// The drain loop: dequeue, run, record, repeat.
    async fn drain_loop(self, config: RunConfig, cancel: CancellationToken) {
        loop {
            // A cancel request halts the loop before the next dequeue, even
            // when the previous job completed normally
            if cancel.is_cancelled() {
                break;
            }

            let job = {
                let mut registry = self.registry.write().await;
                match registry.next_pending().cloned() {
                    Some(job) => {
                        registry.set_status(&job.path, JobStatus::Processing);
                        job
                    }
                    None => break,
                }
            };

            self.emit(QueueEvent::JobStarted { path: job.path.clone() });
            self.begin_job(&job).await;

            let (progress_tx, progress_rx) = mpsc::unbounded_channel();
            let relay = self.spawn_progress_relay(job.length_millis, progress_rx);
            let outcome = self
                .encoder
                .run(&job, &config, progress_tx, cancel.clone())
                .await;
            let _ = relay.await;

            match outcome {
                Outcome::Success => {
                    self.registry
                        .write()
                        .await
                        .set_status(&job.path, JobStatus::Done);
                    self.emit(QueueEvent::JobCompleted { path: job.path.clone() });
                    self.refresh_label().await;
                }
                Outcome::Failed(reason) => {
                    self.registry
                        .write()
                        .await
                        .set_status(&job.path, JobStatus::Error);
                    self.emit(QueueEvent::JobFailed {
                        path: job.path.clone(),
                        reason,
                    });
                    self.refresh_label().await;
                    if self.settings.encode.halt_on_failure {
                        log::warn!("halting batch after failed job");
                        break;
                    }
                }
                Outcome::Cancelled => {
                    // Re-queued at its original position, not marked failed
                    self.registry
                        .write()
                        .await
                        .set_status(&job.path, JobStatus::NotStarted);
                    self.emit(QueueEvent::JobCancelled { path: job.path.clone() });
                    break;
                }
            }
        }

        self.sampler.stop().await;
        *self.session.write().await = None;
        {
            let mut snapshot = self.progress.write().await;
            snapshot.active = None;
            snapshot.fraction = 0.0;
            snapshot.elapsed = String::new();
            snapshot.speed = String::new();
        }
        *self.state.write().await = RunState::Idle;
        self.emit(QueueEvent::ProcessingFinished);
    }

    /// Reset the progress figures for a newly dequeued job.
    async fn begin_job(&self, job: &Job) {
        let label = self.current_label().await;
        let mut snapshot = self.progress.write().await;
        snapshot.fraction = 0.0;
        snapshot.label = label;
        snapshot.elapsed = "00:00:00".to_string();
        snapshot.speed = String::new();
        snapshot.active = Some(job.path.clone());
    }

    /// Consume one job's progress samples into the published snapshot.
    ///
    /// The fraction is derived from elapsed media time over the probed
    /// length, clamped to [0, 1] and kept monotone for the duration of the
    /// run.
    fn spawn_progress_relay(
        &self,
        length_millis: u64,
        mut rx: mpsc::UnboundedReceiver<ProgressSample>,
    ) -> JoinHandle<()> {
        let progress = self.progress.clone();
        tokio::spawn(async move {
            let mut best = 0.0f32;
            while let Some(sample) = rx.recv().await {
                best = best.max(job_fraction(sample.elapsed_millis, length_millis));
                let mut snapshot = progress.write().await;
                snapshot.fraction = best;
                snapshot.elapsed = format_millis(sample.elapsed_millis);
                snapshot.speed = format_speed(sample.speed);
            }
        })
    }

    async fn current_label(&self) -> String {
        let registry = self.registry.read().await;
        format!("{} / {}", registry.finished_count(), registry.len())
    }

    async fn refresh_label(&self) {
        let label = self.current_label().await;
        self.progress.write().await.label = label;
    }

    /// Relay an event to the log and the presentation channel without
    /// blocking; a gone consumer is ignored.
    fn emit(&self, event: QueueEvent) {
        log::info!("{}", event);
        let _ = self.events.send(event);
    }
}
