//! CLI entry point for transcodeq
//!
//! Parses command line arguments, queues the given media files, and drives
//! one processing run to completion. Ctrl-C cancels the active run.

use clap::Parser;
use humansize::{format_size, DECIMAL};
use std::path::PathBuf;
use std::process::ExitCode;
use transcodeq::{
    compression_by_name, event_channel, is_supported_media, FfmpegEncoder, JobStatus, Orchestrator,
    OutputFormat, QueueEvent, Resolution, RunConfig, RunState, Settings, ShaderMode,
};

/// transcodeq - batch media transcoder driving an external ffmpeg process
#[derive(Parser, Debug)]
#[command(name = "transcodeq")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the settings file (transcodeq.toml)
    #[arg(short, long, default_value = "transcodeq.toml")]
    config: PathBuf,

    /// Media files or directories to queue
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Target resolution, e.g. 1920x1080
    #[arg(long, default_value = "1920x1080")]
    resolution: String,

    /// Scaling filter mode (bilinear, bicubic, lanczos, spline)
    #[arg(long, default_value = "lanczos")]
    shaders: String,

    /// Compression preset (quality, balanced, fast)
    #[arg(long, default_value = "balanced")]
    compression: String,

    /// Output container format (mp4, mkv, avi)
    #[arg(long, default_value = "mkv")]
    format: String,

    /// Disable hardware-accelerated decoding
    #[arg(long)]
    no_hwaccel: bool,

    /// Disable hardware-accelerated encoding and fall back to libx264
    #[arg(long)]
    no_hw_encoding: bool,

    /// Verbose encoder output, useful for troubleshooting
    #[arg(long)]
    debug: bool,
}

/// Resolve the run configuration from command line selections.
fn build_run_config(args: &Args) -> Result<RunConfig, String> {
    let resolution = Resolution::parse(&args.resolution)
        .ok_or_else(|| format!("invalid resolution: {}", args.resolution))?;
    let shader_mode = ShaderMode::from_name(&args.shaders)
        .ok_or_else(|| format!("unknown shaders mode: {}", args.shaders))?;
    let compression = *compression_by_name(&args.compression)
        .ok_or_else(|| format!("unknown compression preset: {}", args.compression))?;
    let output_format = OutputFormat::from_name(&args.format)
        .ok_or_else(|| format!("unknown output format: {}", args.format))?;

    Ok(RunConfig {
        resolution,
        shader_mode,
        compression,
        output_format,
        disable_hwaccel: args.no_hwaccel,
        disable_hw_encoding: args.no_hw_encoding,
        debug: args.debug,
    })
}

/// Expand input arguments: directories are walked for supported media files,
/// plain paths pass through for the core to validate.
fn expand_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    for input in inputs {
        if input.is_dir() {
            for entry in walkdir::WalkDir::new(input)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if entry.file_type().is_file() && is_supported_media(entry.path()) {
                    paths.push(entry.path().to_path_buf());
                }
            }
        } else {
            paths.push(input.clone());
        }
    }

    paths
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let settings = match Settings::load_or_default(&args.config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let run_config = match build_run_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let (events_tx, mut events_rx) = event_channel();
    let encoder = std::sync::Arc::new(FfmpegEncoder::new(settings.clone()));
    let orchestrator = Orchestrator::new(settings, encoder, events_tx);

    let paths = expand_inputs(&args.inputs);
    let added = orchestrator.ingest(&paths).await;
    if added == 0 {
        eprintln!("No supported media files queued");
        return ExitCode::FAILURE;
    }

    println!("Queued {} file(s):", added);
    for job in orchestrator.queue_snapshot().await {
        println!(
            "  {}  {}  {}  {}",
            job.name,
            transcodeq::format_millis(job.length_millis),
            format_size(job.size_bytes, DECIMAL),
            job.resolution_label()
        );
    }

    orchestrator.toggle_processing(run_config.clone()).await;

    let mut progress_ticker = tokio::time::interval(std::time::Duration::from_secs(2));
    progress_ticker.tick().await; // the first tick fires immediately

    loop {
        tokio::select! {
            event = events_rx.recv() => match event {
                Some(event) => {
                    println!("{}", event);
                    if event == QueueEvent::ProcessingFinished {
                        break;
                    }
                }
                None => break,
            },
            _ = progress_ticker.tick() => {
                if orchestrator.state().await == RunState::Running {
                    let snapshot = orchestrator.progress_snapshot().await;
                    let mut line = format!(
                        "[{}] {:3.0}%  time {}  speed {}",
                        snapshot.label,
                        snapshot.fraction * 100.0,
                        snapshot.elapsed,
                        snapshot.speed
                    );
                    if let Some(gpu) = snapshot.telemetry.gpu_usage_percent {
                        line.push_str(&format!("  gpu {:.0}%", gpu));
                    }
                    if let (Some(used), Some(total)) = (
                        snapshot.telemetry.vram_used_mib,
                        snapshot.telemetry.vram_total_mib,
                    ) {
                        line.push_str(&format!("  vram {}/{} MiB", used, total));
                    }
                    if let Some(temp) = snapshot.telemetry.gpu_temperature_c {
                        line.push_str(&format!("  temp {:.0}C", temp));
                    }
                    println!("{}", line);
                }
            },
            _ = tokio::signal::ctrl_c() => {
                println!("Cancel requested...");
                orchestrator.toggle_processing(run_config.clone()).await;
            }
        }
    }

    let jobs = orchestrator.queue_snapshot().await;
    let done = jobs.iter().filter(|j| j.status == JobStatus::Done).count();
    let failed = jobs.iter().filter(|j| j.status == JobStatus::Error).count();
    println!("{} done, {} failed, {} queued", done, failed, jobs.len() - done - failed);

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
