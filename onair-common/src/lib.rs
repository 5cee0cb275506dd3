//! # OnAir Common Library
//!
//! Shared code for all OnAir broadcast services including:
//! - Event envelope and payload types (`OnAirEvent`)
//! - The in-process `EventBus` and its SSE bridge
//! - Configuration file loading and environment overrides
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
pub use events::{EventBus, EventEnvelope, OnAirEvent, Topic};
