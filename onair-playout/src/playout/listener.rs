//! Bus subscriber feeding `enqueue-track` requests into the playout queue

use std::sync::Arc;

use onair_common::events::OnAirEvent;
use onair_common::EventBus;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::queue::PlayoutQueue;

/// Subscribe to `bus` and enqueue every `enqueue-track` payload
///
/// The subscription is taken before this returns, so events published after
/// the call are never missed. A lagging receiver logs how many events were
/// skipped and keeps going.
pub fn spawn_enqueue_listener(
    bus: &EventBus,
    queue: Arc<PlayoutQueue>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe();

    tokio::spawn(async move {
        loop {
            let envelope = tokio::select! {
                _ = cancel.cancelled() => break,
                received = rx.recv() => match received {
                    Ok(envelope) => envelope,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Enqueue listener lagged, events lost");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            };

            if let OnAirEvent::EnqueueTrack { track, reason } = envelope.event {
                let track_id = track.track_id;
                let position = queue.enqueue(track);
                tracing::info!(
                    track_id = %track_id,
                    reason = %reason,
                    source = %envelope.source,
                    position,
                    "Track enqueued"
                );
            }
        }
        tracing::debug!("Enqueue listener stopped");
    })
}
