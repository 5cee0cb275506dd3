//! Supervisor observers
//!
//! A [`SupervisorObserver`] receives every state change and every lifecycle
//! event of one [`ProcessSupervisor`](super::ProcessSupervisor). Observers are
//! injected at construction; the supervisor never logs through a global.
//!
//! Calls happen synchronously on the task that caused the change, after the
//! supervisor's internal lock is released. Implementations must not block.

use std::time::Duration;

use super::health::HealthSnapshot;

/// Lifecycle event emitted alongside state changes
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorEvent {
    /// Process spawned
    Spawned { pid: Option<u32> },
    /// Spawn failed; no retry follows
    SpawnFailed { error: String },
    /// Process exited (any cause)
    Exited {
        code: Option<i32>,
        signal: Option<String>,
    },
    /// Restart `attempt` will launch after `delay`
    RestartScheduled { attempt: u32, delay: Duration },
    /// Restart budget exhausted; supervisor gave up
    Degraded { restart_count: u32 },
    /// Grace deadline passed during stop; process force-killed
    ForceKilled { grace: Duration },
    /// Stop completed
    Stopped,
}

/// Receiver of supervisor notifications
pub trait SupervisorObserver: Send + Sync + 'static {
    /// Called after every state mutation with the resulting snapshot
    fn on_state_change(&self, name: &str, snapshot: &HealthSnapshot);

    /// Called for spawn/exit/restart/degraded/stop events
    fn on_event(&self, name: &str, event: &SupervisorEvent) {
        let _ = (name, event);
    }
}

/// Default observer: structured `tracing` output
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SupervisorObserver for TracingObserver {
    fn on_state_change(&self, name: &str, snapshot: &HealthSnapshot) {
        tracing::debug!(
            supervisor = name,
            state = %snapshot.state,
            live = snapshot.live,
            ready = snapshot.ready,
            restart_count = snapshot.restart_count,
            "Supervisor state changed"
        );
    }

    fn on_event(&self, name: &str, event: &SupervisorEvent) {
        match event {
            SupervisorEvent::Spawned { pid } => {
                tracing::info!(supervisor = name, pid = ?pid, "Process spawned");
            }
            SupervisorEvent::SpawnFailed { error } => {
                tracing::error!(supervisor = name, error = %error, "Process spawn failed");
            }
            SupervisorEvent::Exited { code, signal } => {
                tracing::warn!(
                    supervisor = name,
                    code = ?code,
                    signal = ?signal,
                    "Process exited"
                );
            }
            SupervisorEvent::RestartScheduled { attempt, delay } => {
                tracing::warn!(
                    supervisor = name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Restart scheduled"
                );
            }
            SupervisorEvent::Degraded { restart_count } => {
                tracing::error!(
                    supervisor = name,
                    restart_count,
                    "Restart budget exhausted, supervisor degraded (operator intervention required)"
                );
            }
            SupervisorEvent::ForceKilled { grace } => {
                tracing::warn!(
                    supervisor = name,
                    grace_ms = grace.as_millis() as u64,
                    "Process ignored termination signal, force-killed"
                );
            }
            SupervisorEvent::Stopped => {
                tracing::info!(supervisor = name, "Supervisor stopped");
            }
        }
    }
}
