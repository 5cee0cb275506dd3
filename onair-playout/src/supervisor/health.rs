//! Supervisor state machine and health snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a supervised process
///
/// ```text
/// idle ─start─► starting ─spawned─► running ─exit, stopping─► stopping ─► stopped
///                  ▲                   │
///                  └──delay elapsed── backing_off ◄─exit, restarts left
///                                      │
///              running/backing_off ─exit, restarts exhausted─► degraded (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    Idle,
    Starting,
    Running,
    BackingOff,
    Degraded,
    Stopping,
    Stopped,
}

impl SupervisorState {
    /// Whether the state machine allows `self → next`
    pub fn can_transition_to(self, next: SupervisorState) -> bool {
        use SupervisorState::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Stopped, Starting)
                | (BackingOff, Starting)
                | (Starting, Running)
                | (Running, BackingOff)
                | (Running, Degraded)
                | (BackingOff, Degraded)
                | (Idle, Stopping)
                | (Starting, Stopping)
                | (Running, Stopping)
                | (BackingOff, Stopping)
                | (Stopping, Stopped)
        )
    }

    /// `(live, ready)` flags implied by the state
    fn flags(self) -> (bool, bool) {
        match self {
            SupervisorState::Idle | SupervisorState::Stopped => (false, false),
            SupervisorState::Running => (true, true),
            SupervisorState::Starting
            | SupervisorState::BackingOff
            | SupervisorState::Degraded
            | SupervisorState::Stopping => (true, false),
        }
    }
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SupervisorState::Idle => "idle",
            SupervisorState::Starting => "starting",
            SupervisorState::Running => "running",
            SupervisorState::BackingOff => "backing_off",
            SupervisorState::Degraded => "degraded",
            SupervisorState::Stopping => "stopping",
            SupervisorState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Point-in-time health of one supervised process
///
/// Handed out by value; holders never observe later mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub live: bool,
    pub ready: bool,
    pub degraded: bool,
    pub state: SupervisorState,
    pub restart_count: u32,
    pub max_restarts: u32,
    pub last_exit_code: Option<i32>,
    /// Signal name, e.g. "SIGKILL"
    pub last_exit_signal: Option<String>,
    pub next_restart_in_ms: Option<u64>,
    pub last_start_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl HealthSnapshot {
    pub fn new(max_restarts: u32) -> Self {
        Self {
            live: false,
            ready: false,
            degraded: false,
            state: SupervisorState::Idle,
            restart_count: 0,
            max_restarts,
            last_exit_code: None,
            last_exit_signal: None,
            next_restart_in_ms: None,
            last_start_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Move to `next` if the state machine allows it
    ///
    /// Updates `live`/`ready`/`degraded` and `updated_at`. Returns false (and
    /// leaves the snapshot untouched) for a disallowed transition.
    pub(crate) fn transition(&mut self, next: SupervisorState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        let (live, ready) = next.flags();
        self.state = next;
        self.live = live;
        self.ready = ready;
        self.degraded = next == SupervisorState::Degraded;
        if next != SupervisorState::BackingOff {
            self.next_restart_in_ms = None;
        }
        self.updated_at = Utc::now();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SupervisorState::*;

    #[test]
    fn test_new_snapshot_is_idle() {
        let snapshot = HealthSnapshot::new(3);
        assert_eq!(snapshot.state, Idle);
        assert!(!snapshot.live);
        assert!(!snapshot.ready);
        assert!(!snapshot.degraded);
        assert_eq!(snapshot.restart_count, 0);
        assert_eq!(snapshot.max_restarts, 3);
    }

    #[test]
    fn test_degraded_is_terminal() {
        for next in [Idle, Starting, Running, BackingOff, Stopping, Stopped] {
            assert!(!Degraded.can_transition_to(next), "degraded -> {}", next);
        }
    }

    #[test]
    fn test_running_cannot_jump_to_stopped() {
        assert!(!Running.can_transition_to(Stopped));
        assert!(Running.can_transition_to(Stopping));
    }

    #[test]
    fn test_transition_sets_flags() {
        let mut snapshot = HealthSnapshot::new(3);
        assert!(snapshot.transition(Starting));
        assert!(snapshot.live && !snapshot.ready);
        assert!(snapshot.transition(Running));
        assert!(snapshot.live && snapshot.ready);
        assert!(snapshot.transition(Degraded));
        assert!(snapshot.live && !snapshot.ready && snapshot.degraded);
    }

    #[test]
    fn test_rejected_transition_leaves_snapshot() {
        let mut snapshot = HealthSnapshot::new(3);
        let before = snapshot.clone();
        assert!(!snapshot.transition(Running));
        assert_eq!(snapshot, before);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let mut snapshot = HealthSnapshot::new(5);
        snapshot.transition(Starting);
        snapshot.transition(Running);
        snapshot.transition(BackingOff);
        snapshot.next_restart_in_ms = Some(1_200);

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["state"], "backing_off");
        assert_eq!(value["restartCount"], 0);
        assert_eq!(value["maxRestarts"], 5);
        assert_eq!(value["nextRestartInMs"], 1_200);
        assert!(value["lastExitCode"].is_null());
        assert!(value.get("updatedAt").is_some());
    }
}
