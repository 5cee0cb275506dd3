//! Process supervisor core
//!
//! Keeps exactly one external process alive. On an unexpected exit the
//! process is relaunched after a jittered exponential delay; once the restart
//! budget is spent the supervisor parks in `degraded` and waits for an
//! operator.
//!
//! ```text
//! start() ──► launch ──► watcher task ──(exit)──► handle_exit
//!                ▲                                  │
//!                │            stopping ─────────────┼──► stopped
//!                │            budget spent ─────────┼──► degraded
//!                └── restart timer (sleep delay) ◄──┘ backing_off
//! ```
//!
//! All mutable state lives behind one `std::sync::Mutex` that is never held
//! across an await, so [`ProcessSupervisor::health`] never waits on I/O.
//! Observers are called after the lock is released.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::process::Child;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::backoff::BackoffPolicy;
use super::health::{HealthSnapshot, SupervisorState};
use super::observer::{SupervisorEvent, SupervisorObserver, TracingObserver};
use super::process::{send_signal, CommandSpec, ExitInfo, StopSignal};
use crate::error::{Error, Result};

/// Default grace period between the stop signal and SIGKILL
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// How long to wait for the kernel to reap a SIGKILLed process
const KILL_REAP_TIMEOUT: Duration = Duration::from_secs(2);

/// Static configuration of one supervisor
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Name used in logs and observer calls, e.g. "encoder"
    pub name: String,
    pub command: CommandSpec,
    /// Restarts allowed before `degraded`
    pub max_restarts: u32,
    pub backoff: BackoffPolicy,
    pub stop_grace: Duration,
}

impl SupervisorConfig {
    pub fn new(name: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            name: name.into(),
            command,
            max_restarts: 5,
            backoff: BackoffPolicy::default(),
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.command.program.trim().is_empty() {
            return Err(Error::Config(format!("{}: program must not be empty", self.name)));
        }
        if self.stop_grace.is_zero() {
            return Err(Error::Config(format!("{}: stop grace must be greater than zero", self.name)));
        }
        self.backoff.validate()
    }
}

/// Request forwarded to the task that owns the child
enum Control {
    Signal(StopSignal),
    Kill,
}

struct ChildHandle {
    pid: Option<u32>,
    control: mpsc::UnboundedSender<Control>,
    exited: watch::Receiver<bool>,
}

struct Core {
    health: HealthSnapshot,
    stopping: bool,
    child: Option<ChildHandle>,
    /// Pending relaunch while `backing_off`
    restart_timer: Option<JoinHandle<()>>,
}

/// Freshly spawned child, handed to its watcher task
struct Spawned {
    child: Child,
    control: mpsc::UnboundedReceiver<Control>,
    exited: watch::Sender<bool>,
}

/// What asked for a launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// `ProcessSupervisor::start`
    Start,
    /// Backoff timer elapsed; only valid while still `backing_off`
    Restart,
}

enum Notice {
    State(HealthSnapshot),
    Event(SupervisorEvent),
}

struct Inner {
    config: SupervisorConfig,
    observers: Vec<Arc<dyn SupervisorObserver>>,
    /// Re-entrancy guard for launches
    launching: AtomicBool,
    core: Mutex<Core>,
}

/// Supervisor for one external process
///
/// Cheap to clone; clones share the same process and state. Must be used
/// from within a tokio runtime.
#[derive(Clone)]
pub struct ProcessSupervisor {
    inner: Arc<Inner>,
}

impl ProcessSupervisor {
    /// Supervisor reporting through [`TracingObserver`]
    pub fn new(config: SupervisorConfig) -> Result<Self> {
        Self::with_observers(config, vec![Arc::new(TracingObserver)])
    }

    /// Supervisor reporting to the given observers, in order
    pub fn with_observers(
        config: SupervisorConfig,
        observers: Vec<Arc<dyn SupervisorObserver>>,
    ) -> Result<Self> {
        config.validate()?;
        let health = HealthSnapshot::new(config.max_restarts);
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                observers,
                launching: AtomicBool::new(false),
                core: Mutex::new(Core {
                    health,
                    stopping: false,
                    child: None,
                    restart_timer: None,
                }),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Copy of the current health snapshot
    pub fn health(&self) -> HealthSnapshot {
        self.inner.lock().health.clone()
    }

    /// PID of the managed process, if one is alive
    pub fn pid(&self) -> Option<u32> {
        self.inner.lock().child.as_ref().and_then(|child| child.pid)
    }

    /// Launch the process
    ///
    /// No-op while a launch is in flight or a process is alive. Fails with
    /// `InvalidState` when degraded or stopping, and with `Spawn` when the
    /// program cannot be started (no retry is scheduled for that case).
    pub fn start(&self) -> Result<()> {
        self.inner.launch(Trigger::Start)
    }

    /// Stop the process and finalize to `stopped`
    ///
    /// Sends `signal`, waits up to the configured grace period, then
    /// SIGKILLs. Cancels any pending restart. A degraded supervisor is left
    /// as is.
    pub async fn stop(&self, signal: StopSignal) {
        let inner = &self.inner;
        let mut notices = Vec::new();

        let running = {
            let mut core = inner.lock();
            match core.health.state {
                SupervisorState::Stopped => return,
                SupervisorState::Degraded => {
                    tracing::debug!(supervisor = %inner.config.name, "Stop ignored: supervisor degraded");
                    return;
                }
                SupervisorState::Stopping => {}
                _ => {
                    inner.transition(&mut core, SupervisorState::Stopping, &mut notices);
                }
            }
            core.stopping = true;
            if let Some(timer) = core.restart_timer.take() {
                timer.abort();
            }

            match &core.child {
                Some(child) => Some((child.control.clone(), child.exited.clone())),
                None => {
                    inner.finish_stop(&mut core, &mut notices);
                    None
                }
            }
        };
        inner.notify(notices);

        let Some((control, mut exited)) = running else {
            return;
        };

        tracing::info!(
            supervisor = %inner.config.name,
            signal = %signal,
            grace_ms = inner.config.stop_grace.as_millis() as u64,
            "Stopping supervised process"
        );
        let _ = control.send(Control::Signal(signal));

        let grace = inner.config.stop_grace;
        if tokio::time::timeout(grace, wait_exited(&mut exited)).await.is_err() {
            inner.notify(vec![Notice::Event(SupervisorEvent::ForceKilled { grace })]);
            let _ = control.send(Control::Kill);
            if tokio::time::timeout(KILL_REAP_TIMEOUT, wait_exited(&mut exited))
                .await
                .is_err()
            {
                tracing::error!(
                    supervisor = %inner.config.name,
                    "Process still not reaped after SIGKILL"
                );
            }
        }

        let mut notices = Vec::new();
        {
            let mut core = inner.lock();
            inner.finish_stop(&mut core, &mut notices);
        }
        inner.notify(notices);
    }
}

async fn wait_exited(exited: &mut watch::Receiver<bool>) {
    // Err means the watcher is gone, which only happens after exit
    let _ = exited.wait_for(|done| *done).await;
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, notices: Vec<Notice>) {
        for notice in &notices {
            for observer in &self.observers {
                match notice {
                    Notice::State(snapshot) => observer.on_state_change(&self.config.name, snapshot),
                    Notice::Event(event) => observer.on_event(&self.config.name, event),
                }
            }
        }
    }

    fn transition(&self, core: &mut Core, next: SupervisorState, notices: &mut Vec<Notice>) -> bool {
        let from = core.health.state;
        if core.health.transition(next) {
            notices.push(Notice::State(core.health.clone()));
            true
        } else {
            tracing::warn!(
                supervisor = %self.config.name,
                from = %from,
                to = %next,
                "Ignoring invalid state transition"
            );
            false
        }
    }

    fn launch(self: &Arc<Self>, trigger: Trigger) -> Result<()> {
        if self
            .launching
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(supervisor = %self.config.name, "Launch already in flight");
            return Ok(());
        }

        let mut notices = Vec::new();
        let result = {
            let mut core = self.lock();
            self.launch_locked(&mut core, trigger, &mut notices)
        };
        self.launching.store(false, Ordering::Release);
        self.notify(notices);

        // Watch only after `running` is reported so observers see the exit second
        let spawned = result?;
        if let Some(spawned) = spawned {
            tokio::spawn(Arc::clone(self).watch_child(spawned));
        }
        Ok(())
    }

    fn launch_locked(
        &self,
        core: &mut Core,
        trigger: Trigger,
        notices: &mut Vec<Notice>,
    ) -> Result<Option<Spawned>> {
        // Checked under the same lock as the spawn so a concurrent stop() wins
        if trigger == Trigger::Restart {
            // The timer task's own handle; dropping it does not cancel the task
            core.restart_timer = None;
            if core.stopping || core.health.state != SupervisorState::BackingOff {
                tracing::debug!(
                    supervisor = %self.config.name,
                    state = %core.health.state,
                    "Restart skipped"
                );
                return Ok(None);
            }
        }

        if core.child.is_some() {
            tracing::debug!(supervisor = %self.config.name, "Process already running");
            return Ok(None);
        }

        match core.health.state {
            SupervisorState::Degraded => {
                return Err(Error::InvalidState(format!(
                    "{} is degraded; reconstruct the supervisor to recover",
                    self.config.name
                )));
            }
            // Previous spawn failed; try again without re-entering the state
            SupervisorState::Starting => {}
            state => {
                if !self.transition(core, SupervisorState::Starting, notices) {
                    return Err(Error::InvalidState(format!(
                        "{} cannot start while {}",
                        self.config.name, state
                    )));
                }
            }
        }

        core.stopping = false;
        if let Some(timer) = core.restart_timer.take() {
            timer.abort();
        }

        match self.config.command.spawn() {
            Ok(child) => {
                let pid = child.id();
                let (control_tx, control_rx) = mpsc::unbounded_channel();
                let (exited_tx, exited_rx) = watch::channel(false);
                core.child = Some(ChildHandle {
                    pid,
                    control: control_tx,
                    exited: exited_rx,
                });
                core.health.last_start_at = Some(Utc::now());
                notices.push(Notice::Event(SupervisorEvent::Spawned { pid }));
                self.transition(core, SupervisorState::Running, notices);

                Ok(Some(Spawned {
                    child,
                    control: control_rx,
                    exited: exited_tx,
                }))
            }
            Err(err) => {
                notices.push(Notice::Event(SupervisorEvent::SpawnFailed {
                    error: err.to_string(),
                }));
                Err(err)
            }
        }
    }

    /// Owns the child until it exits; forwards stop requests to it
    async fn watch_child(self: Arc<Self>, spawned: Spawned) {
        let Spawned {
            mut child,
            mut control,
            exited,
        } = spawned;
        let status = loop {
            tokio::select! {
                status = child.wait() => break status,
                Some(request) = control.recv() => {
                    let delivered = match request {
                        Control::Signal(signal) => send_signal(&mut child, signal),
                        Control::Kill => child.start_kill().map_err(Error::from),
                    };
                    if let Err(e) = delivered {
                        tracing::warn!(
                            supervisor = %self.config.name,
                            error = %e,
                            "Failed to deliver stop request"
                        );
                    }
                }
            }
        };

        let exit = match status {
            Ok(status) => ExitInfo::from(status),
            Err(e) => {
                tracing::error!(supervisor = %self.config.name, error = %e, "Failed to wait on process");
                ExitInfo::default()
            }
        };

        self.handle_exit(exit);
        let _ = exited.send(true);
    }

    fn handle_exit(self: &Arc<Self>, exit: ExitInfo) {
        let mut notices = vec![Notice::Event(SupervisorEvent::Exited {
            code: exit.code,
            signal: exit.signal.clone(),
        })];

        {
            let mut core = self.lock();
            core.child = None;
            core.health.last_exit_code = exit.code;
            core.health.last_exit_signal = exit.signal;

            if core.stopping {
                self.finish_stop(&mut core, &mut notices);
            } else if core.health.restart_count >= self.config.max_restarts {
                let restart_count = core.health.restart_count;
                self.transition(&mut core, SupervisorState::Degraded, &mut notices);
                notices.push(Notice::Event(SupervisorEvent::Degraded { restart_count }));
            } else {
                core.health.restart_count += 1;
                let attempt = core.health.restart_count;
                let delay = self.config.backoff.delay(attempt);
                core.health.next_restart_in_ms = Some(delay.as_millis() as u64);
                self.transition(&mut core, SupervisorState::BackingOff, &mut notices);
                notices.push(Notice::Event(SupervisorEvent::RestartScheduled { attempt, delay }));

                let inner = Arc::clone(self);
                core.restart_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    inner.restart_after_backoff();
                }));
            }
        }

        self.notify(notices);
    }

    fn restart_after_backoff(self: &Arc<Self>) {
        if let Err(e) = self.launch(Trigger::Restart) {
            tracing::error!(supervisor = %self.config.name, error = %e, "Relaunch failed");
        }
    }

    fn finish_stop(&self, core: &mut Core, notices: &mut Vec<Notice>) {
        if core.health.state == SupervisorState::Stopped {
            return;
        }
        if self.transition(core, SupervisorState::Stopped, notices) {
            notices.push(Notice::Event(SupervisorEvent::Stopped));
        }
    }
}
