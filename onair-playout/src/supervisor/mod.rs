//! Process supervision for the external encoder
//!
//! [`ProcessSupervisor`] keeps one external process alive, restarting it with
//! jittered exponential backoff ([`BackoffPolicy`]) until the restart budget is
//! spent, at which point it parks in [`SupervisorState::Degraded`].

mod backoff;
mod core;
mod health;
mod observer;
mod process;

pub use self::backoff::{BackoffPolicy, MIN_BACKOFF};
pub use self::core::{ProcessSupervisor, SupervisorConfig, DEFAULT_STOP_GRACE};
pub use self::health::{HealthSnapshot, SupervisorState};
pub use self::observer::{SupervisorEvent, SupervisorObserver, TracingObserver};
pub use self::process::{CommandSpec, ExitInfo, StopSignal};
