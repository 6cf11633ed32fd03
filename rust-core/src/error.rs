//! Error types.
//!
//! The recorder's runtime path is infallible; these cover configuration
//! loading and construction only.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors raised while building a recorder.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}
