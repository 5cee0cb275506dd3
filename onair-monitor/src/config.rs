//! onair-monitor configuration
//!
//! Compiled defaults, then the `[monitor]` table of the config file, then
//! `ONAIR_*` environment variables.
//!
//! ```toml
//! [monitor]
//! server_url = "http://icecast.internal:8000"
//! stats_path = "/status-json.xsl"
//! poll_interval_ms = 10000
//! failure_threshold = 3
//! ```

use std::path::Path;
use std::time::Duration;

use onair_common::config::{env_override, load_section};
use serde::Deserialize;

use crate::client::resolve_stats_url;
use crate::error::{Error, Result};
use crate::poller::PollerConfig;

/// TOML table read by this service
pub const CONFIG_SECTION: &str = "monitor";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Streaming server base URL
    pub server_url: String,
    /// Stats path joined onto `server_url`, or an absolute URL
    pub stats_path: String,
    pub poll_interval_ms: u64,
    pub failure_threshold: u32,
    pub fetch_timeout_ms: u64,
    pub bus_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".to_string(),
            stats_path: "/status-json.xsl".to_string(),
            poll_interval_ms: 10_000,
            failure_threshold: 3,
            fetch_timeout_ms: 5_000,
            bus_capacity: 1_000,
        }
    }
}

impl MonitorConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config: MonitorConfig = load_section(path, CONFIG_SECTION)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        env_override("ONAIR_SERVER_URL", &mut self.server_url)?;
        env_override("ONAIR_STATS_PATH", &mut self.stats_path)?;
        env_override("ONAIR_POLL_INTERVAL_MS", &mut self.poll_interval_ms)?;
        env_override("ONAIR_FAILURE_THRESHOLD", &mut self.failure_threshold)?;
        env_override("ONAIR_FETCH_TIMEOUT_MS", &mut self.fetch_timeout_ms)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.bus_capacity == 0 {
            return Err(Error::Config("bus_capacity must be greater than zero".to_string()));
        }
        self.poller_config().map(|_| ())
    }

    pub fn stats_url(&self) -> String {
        resolve_stats_url(&self.server_url, &self.stats_path)
    }

    pub fn poller_config(&self) -> Result<PollerConfig> {
        PollerConfig::new(
            self.stats_url(),
            Duration::from_millis(self.poll_interval_ms),
            self.failure_threshold,
            Duration::from_millis(self.fetch_timeout_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_defaults_resolve_stats_url() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stats_url(), "http://localhost:8000/status-json.xsl");
    }

    #[test]
    fn test_absolute_stats_path_wins() {
        let config = MonitorConfig {
            stats_path: "https://stats.example/icecast.json".to_string(),
            ..MonitorConfig::default()
        };
        assert_eq!(config.stats_url(), "https://stats.example/icecast.json");
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let config = MonitorConfig {
            failure_threshold: 0,
            ..MonitorConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_toml_section() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[monitor]\nserver_url = \"http://icecast:8000\"\nfailure_threshold = 5\n\n[playout]\nmax_restarts = 1"
        )
        .unwrap();

        let config: MonitorConfig = load_section(Some(file.path()), CONFIG_SECTION).unwrap();
        assert_eq!(config.server_url, "http://icecast:8000");
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.poll_interval_ms, 10_000);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("ONAIR_POLL_INTERVAL_MS", "2500");
        std::env::set_var("ONAIR_SERVER_URL", "http://edge:8000/");

        let mut config = MonitorConfig::default();
        let result = config.apply_env();

        std::env::remove_var("ONAIR_POLL_INTERVAL_MS");
        std::env::remove_var("ONAIR_SERVER_URL");

        result.unwrap();
        assert_eq!(config.poll_interval_ms, 2_500);
        assert_eq!(config.stats_url(), "http://edge:8000/status-json.xsl");
    }
}
