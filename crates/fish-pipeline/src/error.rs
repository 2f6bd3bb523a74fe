//! Error types for pipeline assembly and the CLI

use crate::config::ConfigError;
use fish_events::BusError;
use thiserror::Error;

/// Pipeline error types.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An event could not be published
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Log subscriber could not be installed
    #[error("Logging setup failed: {0}")]
    Logging(String),

    /// Terminal I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
