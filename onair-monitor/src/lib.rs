//! # OnAir Monitor Library (onair-monitor)
//!
//! Polls the streaming server's listener statistics, republishes them as
//! `listener-metrics`, and raises `system-health-alert` after a run of
//! consecutive failures.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod poller;
pub mod stats;

pub use error::{Error, PollError, Result};
pub use poller::{HealthPoller, PollOutcome, PollerConfig, PollingState};
