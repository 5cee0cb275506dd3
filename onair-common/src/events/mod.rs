//! Event types for the OnAir event system
//!
//! Provides shared event definitions and the EventBus for all OnAir services.
//!
//! Every message on the bus is an [`EventEnvelope`]:
//!
//! ```text
//! { "id": "...", "timestamp": "...", "source": "onair-playout",
//!   "topic": "now-playing", "payload": { ... } }
//! ```

// Sub-modules (supporting types)
mod queue_types;
mod shared_types;

pub use queue_types::{AlertStatus, EnqueueReason};
pub use shared_types::{ListenerSnapshot, QueueItem, StreamStats};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Bus topic names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    EnqueueTrack,
    NowPlaying,
    ListenerMetrics,
    SystemHealthAlert,
}

impl Topic {
    /// Wire name of the topic
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::EnqueueTrack => "enqueue-track",
            Topic::NowPlaying => "now-playing",
            Topic::ListenerMetrics => "listener-metrics",
            Topic::SystemHealthAlert => "system-health-alert",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OnAir event payloads, one variant per topic
///
/// Serialized adjacently tagged so the topic name and payload sit side by side
/// in the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "payload", rename_all = "kebab-case")]
pub enum OnAirEvent {
    /// Request to append a track to the playout queue
    ///
    /// Consumed by: playout enqueue listener
    EnqueueTrack {
        /// Track to play
        track: QueueItem,
        /// Why it was picked
        reason: EnqueueReason,
    },

    /// A decode is about to start
    ///
    /// Published by: decoder bridge, immediately before launching the decoder
    NowPlaying {
        track_id: Uuid,
        title: String,
        artist: String,
        /// When the decode was started
        started_at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tempo_bpm: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
    },

    /// Normalized listener statistics from the streaming endpoint
    ///
    /// Published by: health poller, on every successful poll
    ListenerMetrics(ListenerSnapshot),

    /// Streaming endpoint unreachable for too long
    ///
    /// Published by: health poller, on every poll while over the failure threshold
    SystemHealthAlert {
        status: AlertStatus,
        consecutive_failures: u32,
        threshold: u32,
        target_url: String,
        message: String,
        detected_at: DateTime<Utc>,
    },
}

impl OnAirEvent {
    /// Topic this event is published on
    pub fn topic(&self) -> Topic {
        match self {
            OnAirEvent::EnqueueTrack { .. } => Topic::EnqueueTrack,
            OnAirEvent::NowPlaying { .. } => Topic::NowPlaying,
            OnAirEvent::ListenerMetrics(_) => Topic::ListenerMetrics,
            OnAirEvent::SystemHealthAlert { .. } => Topic::SystemHealthAlert,
        }
    }

    /// Build a `now-playing` event for a track starting now
    pub fn now_playing(track: &QueueItem, started_at: DateTime<Utc>) -> Self {
        OnAirEvent::NowPlaying {
            track_id: track.track_id,
            title: track.title.clone(),
            artist: track.artist.clone(),
            started_at,
            tempo_bpm: track.tempo_bpm,
            key: track.key.clone(),
        }
    }
}

/// Bus message: event plus routing metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique message id
    pub id: Uuid,
    /// When the message was published
    pub timestamp: DateTime<Utc>,
    /// Publishing service, e.g. "onair-monitor"
    pub source: String,
    /// Topic + payload
    #[serde(flatten)]
    pub event: OnAirEvent,
}

impl EventEnvelope {
    /// Wrap `event` in a fresh envelope stamped now
    pub fn new(source: impl Into<String>, event: OnAirEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            event,
        }
    }

    pub fn topic(&self) -> Topic {
        self.event.topic()
    }

    /// Encode for an external transport
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from an external transport
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for application-wide events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// Delivery is at-most-once: a subscriber that lags past `capacity` loses
/// the oldest messages and is told how many it skipped.
///
/// # Examples
///
/// ```
/// use onair_common::events::{EventBus, EventEnvelope, OnAirEvent, QueueItem, EnqueueReason};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// let track = QueueItem::new(uuid::Uuid::new_v4(), "Intro", "House Band", "/music/intro.flac");
/// event_bus.emit_lossy(EventEnvelope::new(
///     "scheduler",
///     OnAirEvent::EnqueueTrack { track, reason: EnqueueReason::Automatic },
/// ));
///
/// let received = rx.try_recv().unwrap();
/// assert_eq!(received.topic().as_str(), "enqueue-track");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    ///
    ///   Recommended values:
    ///   - Services: 1000
    ///   - Testing: 10-100
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        envelope: EventEnvelope,
    ) -> Result<usize, broadcast::error::SendError<EventEnvelope>> {
        self.tx.send(envelope)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, envelope: EventEnvelope) {
        let _ = self.tx.send(envelope);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Publishing handle that stamps every envelope with `source`
    pub fn publisher(&self, source: impl Into<String>) -> EventPublisher {
        EventPublisher {
            bus: self.clone(),
            source: source.into(),
        }
    }
}

/// Per-service publishing handle
///
/// Wraps events in an [`EventEnvelope`] carrying the service name. Publishing
/// never fails: with no subscribers the event is dropped and logged at trace.
#[derive(Clone)]
pub struct EventPublisher {
    bus: EventBus,
    source: String,
}

impl EventPublisher {
    /// Publish `event`; returns the envelope id
    pub fn publish(&self, event: OnAirEvent) -> Uuid {
        let envelope = EventEnvelope::new(self.source.clone(), event);
        let id = envelope.id;
        let topic = envelope.topic();
        if self.bus.emit(envelope).is_err() {
            tracing::trace!(topic = %topic, "No subscribers for event");
        }
        id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}
