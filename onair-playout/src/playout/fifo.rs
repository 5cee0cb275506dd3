//! Named pipe shared by the decoder (writer) and the encoder (reader)

use std::path::Path;

use crate::error::{Error, Result};

/// Outcome of [`ensure_fifo`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FifoStatus {
    Created,
    Existing,
}

fn pipe_error(path: &Path, reason: impl Into<String>) -> Error {
    Error::Pipe {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

/// Create the FIFO at `path` unless it already exists
///
/// Idempotent; a concurrent creator winning the race (`EEXIST`) counts as
/// `Existing`. Anything at `path` that is not a FIFO is an error.
#[cfg(unix)]
pub fn ensure_fifo(path: &Path) -> Result<FifoStatus> {
    use nix::errno::Errno;
    use nix::sys::stat::Mode;
    use nix::unistd::mkfifo;

    if let Some(status) = existing_fifo(path)? {
        return Ok(status);
    }

    match mkfifo(path, Mode::from_bits_truncate(0o644)) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "Created named pipe");
            Ok(FifoStatus::Created)
        }
        Err(Errno::EEXIST) => existing_fifo(path)?
            .ok_or_else(|| pipe_error(path, "vanished after EEXIST")),
        Err(e) => Err(pipe_error(path, format!("mkfifo failed: {}", e))),
    }
}

#[cfg(unix)]
fn existing_fifo(path: &Path) -> Result<Option<FifoStatus>> {
    use std::os::unix::fs::FileTypeExt;

    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_fifo() => Ok(Some(FifoStatus::Existing)),
        Ok(_) => Err(pipe_error(path, "exists and is not a FIFO")),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Io(e)),
    }
}

#[cfg(not(unix))]
pub fn ensure_fifo(path: &Path) -> Result<FifoStatus> {
    Err(pipe_error(path, "named pipes require a Unix platform"))
}
