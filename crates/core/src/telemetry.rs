//! Hardware telemetry sampling.
//!
//! While enabled, the sampler reads GPU counters (via an `nvidia-smi` query)
//! and host CPU/memory usage (via sysinfo) on a fixed interval and publishes
//! each reading. A failed hardware query publishes an empty sample rather
//! than stopping the loop. The sampler's lifecycle is independent of any
//! job: it can be started and stopped repeatedly, and `stop` is idempotent.

use serde::Serialize;
use tokio::process::Command;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

/// One reading of hardware utilization.
///
/// GPU fields are absent when the active backend is not GPU-based or the
/// query failed. Each published sample supersedes the previous one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetrySample {
    pub gpu_usage_percent: Option<f32>,
    pub vram_used_mib: Option<u64>,
    pub vram_total_mib: Option<u64>,
    pub gpu_temperature_c: Option<f32>,
    pub cpu_usage_percent: f32,
    pub mem_usage_percent: f32,
}

/// Raw GPU counters parsed from one `nvidia-smi` query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuReading {
    pub usage_percent: f32,
    pub vram_used_mib: u64,
    pub vram_total_mib: u64,
    pub temperature_c: f32,
}

/// Parse the CSV row produced by
/// `nvidia-smi --query-gpu=utilization.gpu,memory.used,memory.total,temperature.gpu
/// --format=csv,noheader,nounits`.
pub fn parse_gpu_query(stdout: &str) -> Option<GpuReading> {
    let line = stdout.lines().next()?;
    let mut fields = line.split(',').map(str::trim);

    Some(GpuReading {
        usage_percent: fields.next()?.parse().ok()?,
        vram_used_mib: fields.next()?.parse().ok()?,
        vram_total_mib: fields.next()?.parse().ok()?,
        temperature_c: fields.next()?.parse().ok()?,
    })
}

/// Query GPU counters. Returns `None` when nvidia-smi is unavailable or its
/// output does not parse.
async fn query_gpu() -> Option<GpuReading> {
    let output = Command::new("nvidia-smi")
        .args([
            "--query-gpu=utilization.gpu,memory.used,memory.total,temperature.gpu",
            "--format=csv,noheader,nounits",
        ])
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    parse_gpu_query(&String::from_utf8_lossy(&output.stdout))
}

/// Host CPU and memory usage percentages via sysinfo.
fn collect_host_metrics() -> (f32, f32) {
    use sysinfo::System;

    let mut sys = System::new();
    sys.refresh_cpu_usage();
    sys.refresh_memory();

    let cpu_usage = sys.global_cpu_usage();
    let total_memory = sys.total_memory();
    let used_memory = sys.used_memory();
    let mem_usage = if total_memory > 0 {
        (used_memory as f64 / total_memory as f64 * 100.0) as f32
    } else {
        0.0
    };

    (cpu_usage, mem_usage)
}

/// Take one full sample. GPU fields are only populated for a GPU-backed run.
async fn collect_sample(gpu_backend: bool) -> TelemetrySample {
    let (cpu_usage_percent, mem_usage_percent) = collect_host_metrics();

    let gpu = if gpu_backend { query_gpu().await } else { None };

    TelemetrySample {
        gpu_usage_percent: gpu.map(|g| g.usage_percent),
        vram_used_mib: gpu.map(|g| g.vram_used_mib),
        vram_total_mib: gpu.map(|g| g.vram_total_mib),
        gpu_temperature_c: gpu.map(|g| g.temperature_c),
        cpu_usage_percent,
        mem_usage_percent,
    }
}

struct RunningSampler {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Interval-driven telemetry sampler with an independent lifecycle.
#[derive(Default)]
pub struct Sampler {
    inner: Mutex<Option<RunningSampler>>,
}

impl Sampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start sampling on the given interval, publishing each reading.
    ///
    /// A no-op when the sampler is already running. `gpu_backend` decides
    /// whether the GPU counters are queried at all.
    pub async fn start(
        &self,
        interval: Duration,
        gpu_backend: bool,
        publish: mpsc::UnboundedSender<TelemetrySample>,
    ) {
        let mut guard = self.inner.lock().await;
        if guard.is_some() {
            return;
        }

        let token = CancellationToken::new();
        let loop_token = token.clone();
        let handle = tokio::spawn(async move {
            loop {
                let sample = collect_sample(gpu_backend).await;
                if publish.send(sample).is_err() {
                    break;
                }
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = sleep(interval) => {}
                }
            }
        });

        *guard = Some(RunningSampler { token, handle });
    }

    /// Stop sampling. Idempotent; a later `start` begins a fresh loop.
    pub async fn stop(&self) {
        let running = self.inner.lock().await.take();
        if let Some(running) = running {
            running.token.cancel();
            let _ = running.handle.await;
        }
    }

    /// Whether a sampling loop is currently active.
    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.is_some()
    }
}
