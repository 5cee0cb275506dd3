//! Shared type definitions for event data
//!
//! Common structs used across multiple event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A track waiting for (or undergoing) playout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Track UUID
    pub track_id: Uuid,
    /// Display title
    pub title: String,
    /// Display artist
    pub artist: String,
    /// Source location handed to the decoder (path or URL)
    pub source: String,
    /// Tempo hint in beats per minute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo_bpm: Option<f32>,
    /// Musical key hint, e.g. "8A" or "C#m"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Energy hint in 0.0..=1.0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<f32>,
}

impl QueueItem {
    /// Item with identity and source only; hints left empty
    pub fn new(
        track_id: Uuid,
        title: impl Into<String>,
        artist: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            track_id,
            title: title.into(),
            artist: artist.into(),
            source: source.into(),
            tempo_bpm: None,
            key: None,
            energy: None,
        }
    }
}

/// Listener statistics for one mount point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamStats {
    /// Mount path, e.g. "/live"
    pub mount: String,
    /// Current listener count
    pub listeners: u64,
    /// Peak listener count since the stream started
    pub peak: u64,
    /// Canonical public listen URL
    pub listen_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Stream start time as reported by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
}

/// Normalized listener snapshot published on `listener-metrics`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerSnapshot {
    /// Sum of listeners across all streams
    pub total_listeners: u64,
    /// Number of active streams
    pub stream_count: usize,
    /// Per-stream records
    pub streams: Vec<StreamStats>,
    /// When the poll completed
    pub polled_at: DateTime<Utc>,
}

impl ListenerSnapshot {
    /// Aggregate per-stream records into a snapshot stamped `polled_at`
    pub fn from_streams(streams: Vec<StreamStats>, polled_at: DateTime<Utc>) -> Self {
        Self {
            total_listeners: streams.iter().map(|s| s.listeners).sum(),
            stream_count: streams.len(),
            streams,
            polled_at,
        }
    }
}
