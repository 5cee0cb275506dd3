//! HTTP client for the streaming server's status endpoint

use std::time::Duration;

use onair_common::events::StreamStats;

use crate::error::{Error, PollError, Result};
use crate::stats::parse_icestats;

const USER_AGENT: &str = concat!("onair-monitor/", env!("CARGO_PKG_VERSION"));

/// Join a stats path onto the server base URL
///
/// An absolute `http://` or `https://` value is returned unchanged.
///
/// ```
/// use onair_monitor::client::resolve_stats_url;
///
/// assert_eq!(
///     resolve_stats_url("http://radio:8000/", "/status-json.xsl"),
///     "http://radio:8000/status-json.xsl"
/// );
/// assert_eq!(
///     resolve_stats_url("http://radio:8000", "https://cdn.example/stats"),
///     "https://cdn.example/stats"
/// );
/// ```
pub fn resolve_stats_url(base: &str, path_or_url: &str) -> String {
    let target = path_or_url.trim();
    if target.starts_with("http://") || target.starts_with("https://") {
        return target.to_string();
    }
    format!(
        "{}/{}",
        base.trim().trim_end_matches('/'),
        target.trim_start_matches('/')
    )
}

/// Fetches and normalises one stats document per call
#[derive(Debug, Clone)]
pub struct StatsClient {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl StatsClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            // Status endpoints are polled directly, never through HTTP(S)_PROXY
            .no_proxy()
            .build()
            .map_err(|e| Error::Client(e.to_string()))?;

        Ok(Self {
            http,
            url: url.into(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// GET the stats URL and parse it; bounded by the fetch timeout
    pub async fn fetch(&self) -> std::result::Result<Vec<StreamStats>, PollError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PollError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| self.request_error(e))?;
        parse_icestats(&body)
    }

    fn request_error(&self, e: reqwest::Error) -> PollError {
        if e.is_timeout() {
            PollError::Timeout(self.timeout)
        } else {
            PollError::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_joins_single_slash() {
        assert_eq!(
            resolve_stats_url("http://radio:8000", "status-json.xsl"),
            "http://radio:8000/status-json.xsl"
        );
        assert_eq!(
            resolve_stats_url("http://radio:8000//", "//admin/stats"),
            "http://radio:8000/admin/stats"
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port with nothing listening
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = StatsClient::new(
            format!("http://127.0.0.1:{}/status-json.xsl", port),
            Duration::from_secs(2),
        )
        .unwrap();

        assert!(matches!(client.fetch().await, Err(PollError::Transport(_))));
    }
}
