//! Playout service (onair-playout) - Main entry point
//!
//! Supervises the broadcast encoder and feeds it decoded tracks through a
//! named pipe. Tracks arrive as `enqueue-track` events, posted to `/events`
//! by the scheduler; published events stream out of `GET /events`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use onair_common::config::{resolve_config_path, CONFIG_ENV_VAR};
use onair_common::EventBus;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use onair_playout::api::{self, AppState};
use onair_playout::config::PlayoutConfig;
use onair_playout::playout::{
    ensure_fifo, spawn_enqueue_listener, CommandDecoder, DecoderBridge, PlayoutQueue,
};
use onair_playout::supervisor::ProcessSupervisor;

/// Command-line arguments for onair-playout
#[derive(Parser, Debug)]
#[command(name = "onair-playout")]
#[command(about = "Encoder supervisor and playout queue for OnAir")]
#[command(version)]
struct Args {
    /// Config file (TOML, `[playout]` table)
    #[arg(short, long, env = "ONAIR_CONFIG")]
    config: Option<PathBuf>,

    /// Port for the status endpoints
    #[arg(short, long, default_value = "5750", env = "ONAIR_PLAYOUT_PORT")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "onair_playout=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let config = PlayoutConfig::load(config_path.as_deref()).context("Invalid configuration")?;

    info!(
        port = args.port,
        git_hash = env!("ONAIR_GIT_HASH"),
        pipe = %config.pipe_path.display(),
        "Starting OnAir playout"
    );

    let bus = EventBus::new(config.bus_capacity);
    let queue = Arc::new(PlayoutQueue::new());
    let cancel = CancellationToken::new();

    let listener_task = spawn_enqueue_listener(&bus, Arc::clone(&queue), cancel.clone());
    let bridge_task = DecoderBridge::new(
        Arc::clone(&queue),
        Arc::new(CommandDecoder::new(config.decoder.clone())),
        bus.publisher("onair-playout"),
        config.pipe_path.clone(),
        config.tick(),
    )
    .spawn(cancel.clone());

    // Encoder opens the pipe as soon as it starts
    if let Err(e) = ensure_fifo(&config.pipe_path) {
        warn!(error = %e, "Named pipe not ready, encoder may fail to start");
    }

    let supervisor = ProcessSupervisor::new(config.supervisor_config())
        .context("Invalid encoder supervisor settings")?;
    if let Err(e) = supervisor.start() {
        // Reported through /health; the service keeps running
        error!(error = %e, "Encoder failed to start");
    }

    let app = api::create_router(AppState {
        supervisor: supervisor.clone(),
        queue,
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

    cancel.cancel();
    supervisor.stop(config.stop_signal).await;
    let _ = tokio::join!(listener_task, bridge_task);

    info!("Shutdown complete");
    Ok(())
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
