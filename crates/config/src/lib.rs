//! Configuration module for transcodeq
//!
//! Handles loading settings from TOML files and environment variable overrides.

pub mod settings;

pub use settings::*;
