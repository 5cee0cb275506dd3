//! Decoder bridge: drains the playout queue one track at a time
//!
//! On every tick the bridge tries to claim the queue gate. With a track in
//! hand it makes sure the named pipe exists, publishes `now-playing`, and
//! launches a decode process writing raw samples into the pipe. The gate is
//! released when that process exits, or right away if anything before that
//! fails (the track is dropped).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use onair_common::events::{EventPublisher, OnAirEvent, QueueItem};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::fifo::ensure_fifo;
use super::queue::PlayoutQueue;
use crate::error::Result;
use crate::supervisor::{CommandSpec, ExitInfo};

/// Default queue tick
pub const DEFAULT_TICK: Duration = Duration::from_millis(250);

/// Starts the external process that decodes one track into the pipe
pub trait DecodeLauncher: Send + Sync + 'static {
    fn launch(&self, item: &QueueItem, pipe: &Path) -> Result<Child>;
}

/// Launcher driven by a command template
///
/// `{input}` is replaced with the track source and `{output}` with the pipe
/// path, e.g. `ffmpeg -i {input} -f s16le -ar 44100 -ac 2 -y {output}`.
#[derive(Debug, Clone)]
pub struct CommandDecoder {
    template: CommandSpec,
}

impl CommandDecoder {
    pub fn new(template: CommandSpec) -> Self {
        Self { template }
    }
}

impl DecodeLauncher for CommandDecoder {
    fn launch(&self, item: &QueueItem, pipe: &Path) -> Result<Child> {
        let output = pipe.to_string_lossy();
        let command = self
            .template
            .render(&[("input", item.source.as_str()), ("output", output.as_ref())]);
        tracing::debug!(command = %command, "Launching decoder");
        command.spawn()
    }
}

/// Ties the queue, the decode launcher and the bus together
pub struct DecoderBridge {
    queue: Arc<PlayoutQueue>,
    launcher: Arc<dyn DecodeLauncher>,
    publisher: EventPublisher,
    pipe_path: PathBuf,
    tick: Duration,
}

impl DecoderBridge {
    pub fn new(
        queue: Arc<PlayoutQueue>,
        launcher: Arc<dyn DecodeLauncher>,
        publisher: EventPublisher,
        pipe_path: impl Into<PathBuf>,
        tick: Duration,
    ) -> Self {
        Self {
            queue,
            launcher,
            publisher,
            pipe_path: pipe_path.into(),
            tick,
        }
    }

    pub fn queue(&self) -> &Arc<PlayoutQueue> {
        &self.queue
    }

    /// Run the tick loop on a background task until `cancel` fires
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            pipe = %self.pipe_path.display(),
            tick_ms = self.tick.as_millis() as u64,
            "Decoder bridge started"
        );

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick_once(&cancel);
                }
            }
        }

        tracing::info!("Decoder bridge stopped");
    }

    /// One tick: start a decode if the gate is free and a track is pending
    ///
    /// Returns true when a decode process was launched.
    pub fn tick_once(&self, cancel: &CancellationToken) -> bool {
        let Some(item) = self.queue.try_begin() else {
            return false;
        };

        match self.begin_decode(&item) {
            Ok(child) => {
                tokio::spawn(wait_for_decoder(
                    child,
                    item,
                    Arc::clone(&self.queue),
                    cancel.clone(),
                ));
                true
            }
            Err(e) => {
                tracing::error!(
                    track_id = %item.track_id,
                    title = %item.title,
                    error = %e,
                    "Dropping track"
                );
                self.queue.finish();
                false
            }
        }
    }

    fn begin_decode(&self, item: &QueueItem) -> Result<Child> {
        ensure_fifo(&self.pipe_path)?;
        self.publisher
            .publish(OnAirEvent::now_playing(item, Utc::now()));
        tracing::info!(
            track_id = %item.track_id,
            title = %item.title,
            artist = %item.artist,
            remaining = self.queue.len(),
            "Now playing"
        );
        self.launcher.launch(item, &self.pipe_path)
    }
}

/// Hold the gate until the decoder exits; kill it on shutdown
async fn wait_for_decoder(
    mut child: Child,
    item: QueueItem,
    queue: Arc<PlayoutQueue>,
    cancel: CancellationToken,
) {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) => {
                let exit = ExitInfo::from(status);
                if status.success() {
                    tracing::debug!(track_id = %item.track_id, "Decode finished");
                } else {
                    tracing::warn!(
                        track_id = %item.track_id,
                        code = ?exit.code,
                        signal = ?exit.signal,
                        "Decoder exited abnormally"
                    );
                }
            }
            Err(e) => {
                tracing::error!(track_id = %item.track_id, error = %e, "Failed to wait on decoder");
            }
        },
        _ = cancel.cancelled() => {
            tracing::debug!(track_id = %item.track_id, "Shutdown, killing decoder");
            let _ = child.kill().await;
        }
    }
    queue.finish();
}
