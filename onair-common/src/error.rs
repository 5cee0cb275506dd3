//! Common error types for OnAir

use thiserror::Error;

/// Common result type for OnAir operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across OnAir services
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON encoding/decoding of bus payloads
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
