//! Monitor service (onair-monitor) - Main entry point
//!
//! Polls the streaming server for listener statistics and raises health
//! alerts when it stops answering.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use onair_common::config::{resolve_config_path, CONFIG_ENV_VAR};
use onair_common::EventBus;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use onair_monitor::api::{self, AppState};
use onair_monitor::config::MonitorConfig;
use onair_monitor::HealthPoller;

/// Command-line arguments for onair-monitor
#[derive(Parser, Debug)]
#[command(name = "onair-monitor")]
#[command(about = "Listener statistics poller for OnAir")]
#[command(version)]
struct Args {
    /// Config file (TOML, `[monitor]` table)
    #[arg(short, long, env = "ONAIR_CONFIG")]
    config: Option<PathBuf>,

    /// Port for the status endpoint
    #[arg(short, long, default_value = "5751", env = "ONAIR_MONITOR_PORT")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "onair_monitor=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let config = MonitorConfig::load(config_path.as_deref()).context("Invalid configuration")?;

    info!(
        port = args.port,
        git_hash = env!("ONAIR_GIT_HASH"),
        profile = env!("ONAIR_BUILD_PROFILE"),
        target = %config.stats_url(),
        "Starting OnAir monitor"
    );

    let bus = EventBus::new(config.bus_capacity);
    let tap = spawn_bus_tap(&bus);

    let poller = HealthPoller::new(config.poller_config()?, bus.publisher("onair-monitor"))
        .context("Failed to create poller")?;
    poller.start();

    let app = api::build_router(AppState {
        poller: poller.clone(),
        bus: bus.clone(),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    poller.shutdown().await;
    tap.abort();
    info!("Shutdown complete");
    Ok(())
}

/// Log every envelope leaving this service as wire JSON
fn spawn_bus_tap(bus: &EventBus) -> tokio::task::JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => match envelope.to_json() {
                    Ok(json) => debug!(topic = %envelope.topic(), %json, "Published"),
                    Err(e) => warn!(error = %e, "Failed to encode envelope"),
                },
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Bus tap lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
