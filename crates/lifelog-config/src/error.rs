use std::io;

use thiserror::Error;

/// Failures while reading or writing the settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed config: {0}")]
    Serde(String),
}
