//! Encode runner: supervision of one external encoder process.
//!
//! The runner owns the subprocess for a single job: it spawns the encoder,
//! streams its output line-by-line, relays parsed progress samples, and maps
//! the process's end to a terminal outcome. Cancellation is cooperative with
//! escalation: a graceful quit request first, a kill once the grace window
//! expires.

use crate::encode::command::build_ffmpeg_args;
use crate::encode::progress::{parse_progress_line, ProgressSample};
use crate::presets::RunConfig;
use crate::queue::Job;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use transcodeq_config::Settings;

/// Number of trailing output lines kept as the failure reason.
const FAILURE_TAIL_LINES: usize = 8;

/// Terminal result of one encode run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Encoder exited cleanly.
    Success,
    /// Encoder exited with an error; carries the trailing output.
    Failed(String),
    /// The run was cancelled before the encoder finished.
    Cancelled,
}

/// One external encode invocation.
///
/// The orchestrator guarantees at most one runner is active system-wide;
/// implementations do not guard against concurrent runs themselves.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Run one encode to completion, cancellation, or failure.
    ///
    /// At most one `ProgressSample` is sent per parsed output line. The
    /// sender is dropped when the run ends.
    async fn run(
        &self,
        job: &Job,
        config: &RunConfig,
        progress: mpsc::UnboundedSender<ProgressSample>,
        cancel: CancellationToken,
    ) -> Outcome;
}

/// Encoder backed by an ffmpeg subprocess.
pub struct FfmpegEncoder {
    settings: Settings,
}

impl FfmpegEncoder {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn run(
        &self,
        job: &Job,
        config: &RunConfig,
        progress: mpsc::UnboundedSender<ProgressSample>,
        cancel: CancellationToken,
    ) -> Outcome {
        let args = build_ffmpeg_args(config, job);
        log::info!("starting encode of {}", job.name);
        log::debug!("encoder arguments: {}", args.join(" "));

        let grace = Duration::from_millis(self.settings.encode.cancel_grace_millis);
        supervise(&self.settings.tools.ffmpeg_bin, &args, grace, progress, cancel).await
    }
}

/// Spawn a process and supervise it to a terminal outcome.
///
/// Progress text is expected on stderr (where ffmpeg writes its stats).
/// Lines that do not parse as progress go to the log sink and into the
/// bounded failure tail; they are never treated as errors themselves.
async fn supervise(
    program: &Path,
    args: &[String],
    grace: Duration,
    progress: mpsc::UnboundedSender<ProgressSample>,
    cancel: CancellationToken,
) -> Outcome {
    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            return Outcome::Failed(format!(
                "failed to start encoder {}: {}",
                program.display(),
                e
            ))
        }
    };

    let Some(stderr) = child.stderr.take() else {
        let _ = child.kill().await;
        return Outcome::Failed("failed to capture encoder output".to_string());
    };
    let mut stdin = child.stdin.take();

    let mut lines = BufReader::new(stderr).lines();
    let mut tail: VecDeque<String> = VecDeque::with_capacity(FAILURE_TAIL_LINES);
    let mut cancelled = false;

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some(sample) = parse_progress_line(&line) {
                        let _ = progress.send(sample);
                    } else if !line.trim().is_empty() {
                        log::debug!(target: "encoder", "{}", line);
                        if tail.len() == FAILURE_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                }
                // Stream closed: the process is exiting
                Ok(None) => break,
                Err(e) => {
                    log::warn!("error reading encoder output: {}", e);
                    break;
                }
            },
            _ = cancel.cancelled() => {
                cancelled = true;
                break;
            }
        }
    }

    if cancelled {
        // Graceful quit request on stdin, then escalate to kill
        if let Some(mut stdin) = stdin.take() {
            let _ = stdin.write_all(b"q\n").await;
            let _ = stdin.shutdown().await;
        }
        if timeout(grace, child.wait()).await.is_err() {
            log::warn!("encoder ignored quit request, killing process");
            let _ = child.kill().await;
        }
        return Outcome::Cancelled;
    }

    let status = match child.wait().await {
        Ok(status) => status,
        Err(e) => return Outcome::Failed(format!("failed to reap encoder: {}", e)),
    };

    if status.success() {
        Outcome::Success
    } else {
        let reason = if tail.is_empty() {
            format!("encoder exited with {}", status)
        } else {
            tail.into_iter().collect::<Vec<_>>().join("\n")
        };
        Outcome::Failed(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Instant;

    async fn run_script(
        script: &str,
        grace: Duration,
        cancel: CancellationToken,
    ) -> (Outcome, Vec<ProgressSample>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let args = vec!["-c".to_string(), script.to_string()];
        let outcome = supervise(&PathBuf::from("sh"), &args, grace, tx, cancel).await;

        let mut samples = Vec::new();
        while let Ok(sample) = rx.try_recv() {
            samples.push(sample);
        }
        (outcome, samples)
    }

    #[tokio::test]
    async fn test_success_with_progress_lines() {
        let script = "echo 'frame= 10 fps= 5 q=20.0 size= 100KiB time=00:00:05.00 bitrate=1.0kbits/s speed=1.25x' >&2; \
                      echo 'frame= 20 fps= 5 q=20.0 size= 200KiB time=00:00:08.00 bitrate=1.0kbits/s speed=1.30x' >&2";
        let (outcome, samples) =
            run_script(script, Duration::from_millis(500), CancellationToken::new()).await;

        assert_eq!(outcome, Outcome::Success);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].elapsed_millis, 5_000);
        assert_eq!(samples[1].elapsed_millis, 8_000);
    }

    #[tokio::test]
    async fn test_failure_carries_trailing_output() {
        let script = "echo 'this line is not progress' >&2; \
                      echo 'codec not found' >&2; \
                      exit 3";
        let (outcome, samples) =
            run_script(script, Duration::from_millis(500), CancellationToken::new()).await;

        match outcome {
            Outcome::Failed(reason) => {
                assert!(reason.contains("codec not found"), "reason: {}", reason);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(samples.is_empty());
    }

    #[tokio::test]
    async fn test_unparsable_lines_do_not_fail_a_clean_exit() {
        let script = "echo 'Press [q] to stop, [?] for help' >&2";
        let (outcome, samples) =
            run_script(script, Duration::from_millis(500), CancellationToken::new()).await;

        assert_eq!(outcome, Outcome::Success);
        assert!(samples.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_terminates_with_escalation() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        // sleep ignores the graceful quit, so the kill path must fire
        let start = Instant::now();
        let (outcome, _) = run_script("sleep 30", Duration::from_millis(200), cancel).await;

        assert_eq!(outcome, Outcome::Cancelled);
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "cancellation took {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_failure() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let outcome = supervise(
            &PathBuf::from("/nonexistent/encoder-binary"),
            &[],
            Duration::from_millis(100),
            tx,
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(outcome, Outcome::Failed(_)));
    }
}
