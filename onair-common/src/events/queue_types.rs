//! Enqueue and alert type definitions
//!
//! Supporting enums carried inside bus payloads.

use serde::{Deserialize, Serialize};

/// Why a track was enqueued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueReason {
    /// Picked by the scheduler/policy loop
    Automatic,
    /// Requested by a listener or operator
    Manual,
    /// Policy had no candidate and fell back to a filler track
    Fallback,
}

impl std::fmt::Display for EnqueueReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnqueueReason::Automatic => write!(f, "automatic"),
            EnqueueReason::Manual => write!(f, "manual"),
            EnqueueReason::Fallback => write!(f, "fallback"),
        }
    }
}

/// Severity carried by a `system-health-alert`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Degraded,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::Degraded => write!(f, "degraded"),
        }
    }
}
