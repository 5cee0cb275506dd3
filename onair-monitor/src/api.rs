//! HTTP surface for the monitor service
//!
//! `/health` answers 200 while the poller is below its failure threshold and
//! 503 once it is alerting. `/events` streams `listener-metrics` and
//! `system-health-alert` envelopes as SSE.

use std::convert::Infallible;

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
use onair_common::sse::bus_event_stream;
use onair_common::EventBus;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::poller::{HealthPoller, PollingState};

#[derive(Clone)]
pub struct AppState {
    pub poller: HealthPoller,
    pub bus: EventBus,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub module: &'static str,
    pub version: &'static str,
    pub git_hash: &'static str,
    pub target_url: String,
    pub polling: PollingState,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/events", get(event_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let polling = state.poller.state();
    let status = if polling.alerting() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (
        status,
        Json(HealthResponse {
            module: "onair-monitor",
            version: env!("CARGO_PKG_VERSION"),
            git_hash: env!("ONAIR_GIT_HASH"),
            target_url: state.poller.config().stats_url.clone(),
            polling,
        }),
    )
}

async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    bus_event_stream(&state.bus, "onair-monitor")
}
