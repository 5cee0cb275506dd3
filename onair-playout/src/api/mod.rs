//! HTTP status surface for the playout service
//!
//! - `GET /health`: encoder supervisor snapshot plus build info; 200 when the
//!   encoder is ready, 503 otherwise
//! - `GET /queue`: pending tracks and whether one is in flight
//! - `GET /events`: SSE stream of every envelope on the bus
//! - `POST /events`: envelope ingress; the JSON body is emitted on the bus

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        Json,
    },
    routing::get,
    Router,
};
use futures::stream::Stream;
use onair_common::events::{EventBus, EventEnvelope, QueueItem, Topic};
use onair_common::sse::bus_event_stream;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::playout::PlayoutQueue;
use crate::supervisor::{HealthSnapshot, ProcessSupervisor};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub supervisor: ProcessSupervisor,
    pub queue: Arc<PlayoutQueue>,
    pub bus: EventBus,
}

/// Build identification stamped by build.rs
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub built_at: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            git_hash: env!("ONAIR_GIT_HASH"),
            built_at: env!("ONAIR_BUILT_AT"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub module: &'static str,
    pub build: BuildInfo,
    pub encoder: HealthSnapshot,
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub playing: bool,
    pub length: usize,
    pub pending: Vec<QueueItem>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub id: Uuid,
    pub topic: Topic,
    /// Bus subscribers that received the envelope
    pub delivered: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/queue", get(get_queue))
        .route("/events", get(event_stream).post(ingest_event))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let encoder = state.supervisor.health();
    let status = if encoder.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            module: "onair-playout",
            build: BuildInfo::current(),
            encoder,
        }),
    )
}

async fn get_queue(State(state): State<AppState>) -> Json<QueueResponse> {
    let pending = state.queue.snapshot();
    Json(QueueResponse {
        playing: state.queue.is_playing(),
        length: pending.len(),
        pending,
    })
}

async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    bus_event_stream(&state.bus, "onair-playout")
}

/// POST /events
///
/// Body is a full envelope as produced by `EventEnvelope::to_json`. Answers
/// 202 once emitted, 400 when the body is not a valid envelope.
async fn ingest_event(
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, Json<IngestResponse>), (StatusCode, Json<ErrorResponse>)> {
    let envelope = EventEnvelope::from_json(&body).map_err(|e| {
        warn!(error = %e, "Rejected inbound envelope");
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })?;

    let id = envelope.id;
    let topic = envelope.topic();
    let delivered = state.bus.emit(envelope).unwrap_or(0);
    debug!(%id, %topic, delivered, source = "http", "Inbound envelope emitted");

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            id,
            topic,
            delivered,
        }),
    ))
}
