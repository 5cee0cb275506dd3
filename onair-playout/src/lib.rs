//! # OnAir Playout Library (onair-playout)
//!
//! Keeps the broadcast encoder alive and feeds it decoded tracks.
//!
//! - [`supervisor`]: restarts the external encoder with jittered exponential
//!   backoff until a restart ceiling, then reports `degraded`
//! - [`playout`]: single-flight track queue and the decoder bridge writing
//!   into the named pipe the encoder reads
//! - [`api`]: `/health` and `/queue` status routes

pub mod api;
pub mod config;
pub mod error;
pub mod playout;
pub mod supervisor;

pub use error::{Error, Result};
