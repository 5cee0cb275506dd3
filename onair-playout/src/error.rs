//! Error types for onair-playout
//!
//! Defines service-specific error types using thiserror for clear error propagation.
//! None of these escape the service loops: the supervisor and the decoder bridge
//! turn them into state transitions and log events.

use thiserror::Error;

/// Main error type for onair-playout
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// External process could not be spawned
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Delivering a signal to a managed process failed
    #[error("Signal delivery failed: {0}")]
    Signal(String),

    /// Named pipe could not be created or is not a FIFO
    #[error("Named pipe error at {path}: {reason}")]
    Pipe { path: String, reason: String },

    /// Operation not allowed in the current supervisor state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from shared OnAir code (config loading, bus encoding)
    #[error(transparent)]
    Common(#[from] onair_common::Error),
}

/// Convenience Result type using onair-playout Error
pub type Result<T> = std::result::Result<T, Error>;
