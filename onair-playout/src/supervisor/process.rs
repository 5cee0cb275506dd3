//! External process plumbing: command specs, stop signals, exit details

use serde::{Deserialize, Serialize};
use std::process::{ExitStatus, Stdio};
use std::str::FromStr;
use tokio::process::{Child, Command};

use crate::error::{Error, Result};

/// Program plus argument list for an external process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Copy of this spec with `{name}` placeholders in the arguments replaced
    ///
    /// ```
    /// use onair_playout::supervisor::CommandSpec;
    ///
    /// let decoder = CommandSpec::new("ffmpeg", ["-i", "{input}", "-f", "s16le", "-y", "{output}"]);
    /// let rendered = decoder.render(&[("input", "/music/a.flac"), ("output", "/tmp/onair.pcm")]);
    /// assert_eq!(rendered.args[1], "/music/a.flac");
    /// assert_eq!(rendered.args[5], "/tmp/onair.pcm");
    /// ```
    pub fn render(&self, vars: &[(&str, &str)]) -> CommandSpec {
        let args = self
            .args
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (name, value)| {
                    acc.replace(&format!("{{{}}}", name), value)
                })
            })
            .collect();
        CommandSpec {
            program: self.program.clone(),
            args,
        }
    }

    /// Spawn with stdin closed and stdout/stderr inherited
    ///
    /// The child is killed if its handle is dropped, so an aborted owner
    /// never leaks a process.
    pub fn spawn(&self) -> Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                program: self.program.clone(),
                source,
            })
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Termination signal requested by `stop()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StopSignal {
    #[default]
    #[serde(rename = "SIGTERM")]
    Terminate,
    #[serde(rename = "SIGINT")]
    Interrupt,
    #[serde(rename = "SIGHUP")]
    Hangup,
    #[serde(rename = "SIGKILL")]
    Kill,
}

impl StopSignal {
    pub fn name(&self) -> &'static str {
        match self {
            StopSignal::Terminate => "SIGTERM",
            StopSignal::Interrupt => "SIGINT",
            StopSignal::Hangup => "SIGHUP",
            StopSignal::Kill => "SIGKILL",
        }
    }

    #[cfg(unix)]
    fn as_nix(&self) -> nix::sys::signal::Signal {
        use nix::sys::signal::Signal;
        match self {
            StopSignal::Terminate => Signal::SIGTERM,
            StopSignal::Interrupt => Signal::SIGINT,
            StopSignal::Hangup => Signal::SIGHUP,
            StopSignal::Kill => Signal::SIGKILL,
        }
    }
}

impl std::fmt::Display for StopSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StopSignal {
    type Err = Error;

    /// Accepts "SIGTERM", "TERM", "term", ...
    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.strip_prefix("SIG").unwrap_or(&upper) {
            "TERM" => Ok(StopSignal::Terminate),
            "INT" => Ok(StopSignal::Interrupt),
            "HUP" => Ok(StopSignal::Hangup),
            "KILL" => Ok(StopSignal::Kill),
            _ => Err(Error::Config(format!("unsupported stop signal: {}", s))),
        }
    }
}

/// Deliver `signal` to a running child
#[cfg(unix)]
pub(crate) fn send_signal(child: &mut Child, signal: StopSignal) -> Result<()> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // id() is None once the child has been reaped; nothing left to signal
    let Some(pid) = child.id() else {
        return Ok(());
    };
    let pid = i32::try_from(pid).map_err(|_| Error::Signal(format!("pid {} out of range", pid)))?;
    kill(Pid::from_raw(pid), signal.as_nix())
        .map_err(|e| Error::Signal(format!("{} to pid {}: {}", signal, pid, e)))
}

/// Deliver `signal` to a running child
///
/// Without POSIX signals every stop request is a hard kill.
#[cfg(not(unix))]
pub(crate) fn send_signal(child: &mut Child, signal: StopSignal) -> Result<()> {
    child
        .start_kill()
        .map_err(|e| Error::Signal(format!("{}: {}", signal, e)))
}

/// How a process ended
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    /// Signal name when the process was killed by a signal
    pub signal: Option<String>,
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            signal: signal_name(&status),
        }
    }
}

#[cfg(unix)]
fn signal_name(status: &ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;

    status.signal().map(|raw| {
        nix::sys::signal::Signal::try_from(raw)
            .map(|sig| sig.as_str().to_string())
            .unwrap_or_else(|_| format!("SIG{}", raw))
    })
}

#[cfg(not(unix))]
fn signal_name(_status: &ExitStatus) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_signal_parsing() {
        assert_eq!("SIGTERM".parse::<StopSignal>().unwrap(), StopSignal::Terminate);
        assert_eq!("term".parse::<StopSignal>().unwrap(), StopSignal::Terminate);
        assert_eq!(" sigint ".parse::<StopSignal>().unwrap(), StopSignal::Interrupt);
        assert_eq!("HUP".parse::<StopSignal>().unwrap(), StopSignal::Hangup);
        assert_eq!("SIGKILL".parse::<StopSignal>().unwrap(), StopSignal::Kill);
        assert!("SIGUSR1".parse::<StopSignal>().is_err());
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let spec = CommandSpec::new("decode", ["{input}", "{rate}"]);
        let rendered = spec.render(&[("input", "a.mp3")]);
        assert_eq!(rendered.args, vec!["a.mp3", "{rate}"]);
    }

    #[test]
    fn test_display_joins_args() {
        let spec = CommandSpec::new("ffmpeg", ["-re", "-i", "pipe"]);
        assert_eq!(spec.to_string(), "ffmpeg -re -i pipe");
    }

    #[tokio::test]
    async fn test_spawn_missing_program_is_spawn_error() {
        let spec = CommandSpec::new("/nonexistent/onair-encoder", Vec::<String>::new());
        match spec.spawn() {
            Err(Error::Spawn { program, .. }) => assert_eq!(program, "/nonexistent/onair-encoder"),
            other => panic!("Expected spawn error, got {:?}", other.map(|_| ())),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_info_reports_code_and_signal() {
        let mut child = CommandSpec::new("sh", ["-c", "exit 3"]).spawn().unwrap();
        let info = ExitInfo::from(child.wait().await.unwrap());
        assert_eq!(info, ExitInfo { code: Some(3), signal: None });

        let mut child = CommandSpec::new("sleep", ["5"]).spawn().unwrap();
        send_signal(&mut child, StopSignal::Kill).unwrap();
        let info = ExitInfo::from(child.wait().await.unwrap());
        assert_eq!(info.code, None);
        assert_eq!(info.signal.as_deref(), Some("SIGKILL"));
    }
}
