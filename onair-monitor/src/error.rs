//! Error types for onair-monitor

use std::time::Duration;
use thiserror::Error;

/// Service-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid poller or service configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(String),

    /// onair-common error (config file loading)
    #[error(transparent)]
    Common(#[from] onair_common::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a single stats poll failed
///
/// Every variant counts as one consecutive failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    /// Connection refused, DNS failure, reset, ...
    #[error("Transport error: {0}")]
    Transport(String),

    /// No complete response within the fetch timeout
    #[error("Timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Non-2xx response
    #[error("HTTP status {0}")]
    Status(u16),

    /// Body is not an Icecast stats document
    #[error("Malformed stats payload: {0}")]
    Malformed(String),
}
