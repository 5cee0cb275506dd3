//! Server-Sent Events bridge for the event bus
//!
//! Each service exposes its bus on `GET /events`. Every envelope becomes one
//! SSE frame: `event:` carries the topic, `id:` the envelope id and `data:`
//! the envelope JSON, so `EventEnvelope::from_json` decodes it on the far side.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::events::{EventBus, EventEnvelope};

/// Keep-alive comment interval for idle streams
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Encode one envelope as an SSE frame
pub fn envelope_event(envelope: &EventEnvelope) -> crate::Result<Event> {
    Ok(Event::default()
        .event(envelope.topic().as_str())
        .id(envelope.id.to_string())
        .data(envelope.to_json()?))
}

/// Stream every envelope published on `bus` from now on
///
/// A client that falls behind by more than the bus capacity skips the
/// missed envelopes and keeps streaming.
pub fn bus_event_stream(
    bus: &EventBus,
    service_name: &'static str,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!(service = service_name, "New SSE client connected");

    let stream = BroadcastStream::new(bus.subscribe()).filter_map(move |result| async move {
        match result {
            Ok(envelope) => match envelope_event(&envelope) {
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    warn!(service = service_name, error = %e, "Failed to encode envelope");
                    None
                }
            },
            Err(e) => {
                warn!(service = service_name, error = %e, "SSE client lagged");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}
