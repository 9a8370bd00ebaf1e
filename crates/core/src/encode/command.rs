//! ffmpeg invocation building.
//!
//! Maps one run configuration and one probed job onto the concrete argument
//! list handed to the encoder process.

use crate::presets::{OutputFormat, RunConfig};
use crate::queue::Job;
use std::path::PathBuf;

/// Output path for a job: sibling of the input, tagged with the target
/// resolution and carrying the selected container extension.
pub fn output_path(config: &RunConfig, job: &Job) -> PathBuf {
    let stem = job
        .path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    job.path.with_file_name(format!(
        "{}_{}.{}",
        stem,
        config.resolution.label(),
        config.output_format.extension()
    ))
}

/// Build the full ffmpeg argument list for one encode.
///
/// The shape is: global flags, optional decode acceleration, input, scale
/// filter, video encoder with quality/speed flags, audio copy, output path.
pub fn build_ffmpeg_args(config: &RunConfig, job: &Job) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();

    args.push("-hide_banner".to_string());
    args.push("-loglevel".to_string());
    args.push(if config.debug { "verbose" } else { "error" }.to_string());
    // Keep stats lines flowing even at the quiet loglevel
    args.push("-stats".to_string());
    args.push("-y".to_string());

    if !config.disable_hwaccel {
        args.push("-hwaccel".to_string());
        args.push("cuda".to_string());
    }

    args.push("-i".to_string());
    args.push(job.path.to_string_lossy().to_string());

    args.push("-vf".to_string());
    args.push(format!(
        "scale={}:{}:flags={}",
        config.resolution.width,
        config.resolution.height,
        config.shader_mode.scale_flags()
    ));

    args.push("-c:v".to_string());
    args.push(config.video_encoder().to_string());

    // NVENC takes constant quality via -cq, x264 via -crf
    if config.disable_hw_encoding {
        args.push("-crf".to_string());
    } else {
        args.push("-cq".to_string());
    }
    args.push(config.compression.crf.to_string());

    args.push("-preset".to_string());
    args.push(config.compression.encoder_preset.to_string());

    args.push("-c:a".to_string());
    args.push("copy".to_string());

    if config.output_format == OutputFormat::Mp4 {
        args.push("-movflags".to_string());
        args.push("+faststart".to_string());
    }

    args.push(output_path(config, job).to_string_lossy().to_string());

    args
}
