//! transcodeq
//!
//! Core library for the batch transcode queue: owns the ordered job
//! registry, drives one external encode process at a time, parses its
//! streaming progress output, samples hardware telemetry during runs, and
//! publishes events and snapshots to the presentation layer.

pub mod encode;
pub mod events;
pub mod orchestrator;
pub mod presets;
pub mod probe;
pub mod queue;
pub mod status;
pub mod telemetry;

pub use transcodeq_config as config;
pub use transcodeq_config::Settings;

pub use encode::{
    build_ffmpeg_args, format_millis, format_speed, output_path, parse_progress_line, Encoder,
    FfmpegEncoder, Outcome, ProgressSample,
};
pub use events::{event_channel, EventReceiver, EventSender, QueueEvent};
pub use orchestrator::{Orchestrator, RunState};
pub use presets::{
    compression_by_name, CompressionPreset, HardwareAccel, OutputFormat, Resolution, RunConfig,
    ShaderMode, COMPRESSION_PRESETS, OUTPUT_FORMATS, RESOLUTIONS, SHADER_MODES,
};
pub use probe::{is_supported_media, probe_file, ProbeError, SUPPORTED_EXTENSIONS};
pub use queue::{AddOutcome, Job, JobStatus, Registry, RemoveError};
pub use status::{new_shared_progress, ProgressSnapshot, SharedProgress};
pub use telemetry::{parse_gpu_query, GpuReading, Sampler, TelemetrySample};
