//! Configuration loading and environment overrides
//!
//! Every OnAir service resolves its settings in the same order:
//! 1. Compiled defaults (`Default` impl of the service's config struct)
//! 2. The service's table in the TOML config file, if one is found
//! 3. `ONAIR_*` environment variables
//!
//! The config file itself is located by [`resolve_config_path`]. A missing
//! file is not an error: the service logs a warning and starts on defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "ONAIR_CONFIG";

/// Config file resolution:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable `env_var_name`
/// 3. `~/.config/onair/config.toml`, then `/etc/onair/config.toml` (Linux)
///
/// Returns `None` when nothing is configured and no default file exists.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_file()
}

fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("onair").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/onair/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load the `[section]` table of a TOML file into `T`
///
/// - `path == None` or file missing: `T::default()` (warning logged for a missing file)
/// - section missing: `T::default()`
/// - unreadable file or invalid TOML: `Error::Config`
pub fn load_section<T>(path: Option<&Path>, section: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        tracing::info!(section, "No config file found, using compiled defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        tracing::warn!(
            path = %path.display(),
            section,
            "Config file not found, using compiled defaults"
        );
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    let document: toml::Table = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

    match document.get(section) {
        Some(table) => table
            .clone()
            .try_into()
            .map_err(|e| Error::Config(format!("{} [{}]: {}", path.display(), section, e))),
        None => {
            tracing::debug!(path = %path.display(), section, "Section absent, using defaults");
            Ok(T::default())
        }
    }
}

/// Overwrite `target` with the parsed value of env var `name`, if set
///
/// Returns `Error::Config` naming the variable when the value does not parse.
pub fn env_override<T>(name: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = std::env::var(name) {
        let value = raw
            .trim()
            .parse::<T>()
            .map_err(|e| Error::Config(format!("{}={:?}: {}", name, raw, e)))?;
        *target = value;
    }
    Ok(())
}

/// Overwrite an argument list with the whitespace-split value of env var `name`
pub fn env_override_args(name: &str, target: &mut Vec<String>) {
    if let Ok(raw) = std::env::var(name) {
        *target = raw.split_whitespace().map(str::to_string).collect();
    }
}
