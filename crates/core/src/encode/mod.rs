//! Encoding modules for transcodeq

pub mod command;
pub mod progress;
pub mod runner;

pub use command::{build_ffmpeg_args, output_path};
pub use progress::{format_millis, format_speed, parse_progress_line, ProgressSample};
pub use runner::{Encoder, FfmpegEncoder, Outcome};
