//! Self-rescheduling listener statistics poller
//!
//! Each cycle fetches the stats document, then sleeps for the poll interval
//! before the next fetch, so polls never overlap and the cadence is measured
//! from completion. Successes publish `listener-metrics`; failures count up
//! and, from the threshold on, publish `system-health-alert` on every poll.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use onair_common::events::{AlertStatus, EventPublisher, ListenerSnapshot, OnAirEvent};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::StatsClient;
use crate::error::{Error, PollError, Result};

/// Poller settings, validated by [`PollerConfig::new`]
#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    /// Full stats URL
    pub stats_url: String,
    pub interval: Duration,
    /// Consecutive failures before alerting; at least 1
    pub failure_threshold: u32,
    pub fetch_timeout: Duration,
}

impl PollerConfig {
    pub fn new(
        stats_url: impl Into<String>,
        interval: Duration,
        failure_threshold: u32,
        fetch_timeout: Duration,
    ) -> Result<Self> {
        let config = Self {
            stats_url: stats_url.into(),
            interval,
            failure_threshold,
            fetch_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::Config("poll interval must be greater than zero".to_string()));
        }
        if self.failure_threshold < 1 {
            return Err(Error::Config("failure threshold must be at least 1".to_string()));
        }
        if self.fetch_timeout.is_zero() {
            return Err(Error::Config("fetch timeout must be greater than zero".to_string()));
        }
        if !(self.stats_url.starts_with("http://") || self.stats_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "stats URL must be http(s), got {:?}",
                self.stats_url
            )));
        }
        Ok(())
    }
}

/// Failure bookkeeping of one poller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingState {
    pub consecutive_failures: u32,
    pub threshold: u32,
    pub interval_ms: u64,
    pub total_polls: u64,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl PollingState {
    fn new(config: &PollerConfig) -> Self {
        Self {
            consecutive_failures: 0,
            threshold: config.failure_threshold,
            interval_ms: config.interval.as_millis() as u64,
            total_polls: 0,
            last_success_at: None,
            last_error: None,
        }
    }

    /// At or above the alert threshold
    pub fn alerting(&self) -> bool {
        self.consecutive_failures >= self.threshold
    }
}

/// Result of one poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Success(ListenerSnapshot),
    Failure {
        error: PollError,
        consecutive_failures: u32,
        /// Whether a `system-health-alert` went out for this poll
        alerted: bool,
    },
}

struct PollerInner {
    config: PollerConfig,
    client: StatsClient,
    publisher: EventPublisher,
    state: Mutex<PollingState>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Periodic stats poller; cheap to clone, clones share one loop
#[derive(Clone)]
pub struct HealthPoller {
    inner: Arc<PollerInner>,
}

impl HealthPoller {
    pub fn new(config: PollerConfig, publisher: EventPublisher) -> Result<Self> {
        config.validate()?;
        let client = StatsClient::new(config.stats_url.clone(), config.fetch_timeout)?;
        let state = PollingState::new(&config);
        Ok(Self {
            inner: Arc::new(PollerInner {
                config,
                client,
                publisher,
                state: Mutex::new(state),
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &PollerConfig {
        &self.inner.config
    }

    /// Copy of the current polling state
    pub fn state(&self) -> PollingState {
        self.inner.lock_state().clone()
    }

    /// Run a single poll now, outside the schedule
    pub async fn poll_once(&self) -> PollOutcome {
        self.inner.poll_once().await
    }

    /// Start the polling loop; the first poll runs immediately
    ///
    /// No-op if already started. A stopped poller cannot be restarted.
    pub fn start(&self) {
        if self.inner.cancel.is_cancelled() {
            tracing::warn!("Poller already stopped, not restarting");
            return;
        }
        let mut task = self.inner.lock_task();
        if task.is_some() {
            return;
        }
        tracing::info!(
            url = %self.inner.config.stats_url,
            interval_ms = self.inner.config.interval.as_millis() as u64,
            threshold = self.inner.config.failure_threshold,
            "Starting listener stats poller"
        );
        *task = Some(tokio::spawn(Arc::clone(&self.inner).run()));
    }

    /// Cancel the next scheduled poll; an in-flight poll completes
    pub fn stop(&self) {
        self.inner.cancel.cancel();
    }

    /// Stop and wait for the loop task to finish
    pub async fn shutdown(&self) {
        self.stop();
        let task = self.inner.lock_task().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Poller task failed");
            }
        }
    }
}

impl PollerInner {
    fn lock_state(&self) -> MutexGuard<'_, PollingState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn run(self: Arc<Self>) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            self.poll_once().await;

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
        tracing::info!("Listener stats poller stopped");
    }

    async fn poll_once(&self) -> PollOutcome {
        let result = self.client.fetch().await;
        let now = Utc::now();

        match result {
            Ok(streams) => {
                let snapshot = ListenerSnapshot::from_streams(streams, now);
                {
                    let mut state = self.lock_state();
                    if state.consecutive_failures > 0 {
                        tracing::info!(
                            previous_failures = state.consecutive_failures,
                            "Stats endpoint recovered"
                        );
                    }
                    state.consecutive_failures = 0;
                    state.total_polls += 1;
                    state.last_success_at = Some(now);
                    state.last_error = None;
                }
                tracing::debug!(
                    total_listeners = snapshot.total_listeners,
                    stream_count = snapshot.stream_count,
                    "Listener stats polled"
                );
                self.publisher
                    .publish(OnAirEvent::ListenerMetrics(snapshot.clone()));
                PollOutcome::Success(snapshot)
            }
            Err(error) => {
                let (consecutive_failures, threshold) = {
                    let mut state = self.lock_state();
                    state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                    state.total_polls += 1;
                    state.last_error = Some(error.to_string());
                    (state.consecutive_failures, state.threshold)
                };
                tracing::warn!(
                    url = %self.config.stats_url,
                    error = %error,
                    consecutive_failures,
                    threshold,
                    "Listener stats poll failed"
                );

                let alerted = consecutive_failures >= threshold;
                if alerted {
                    let message = format!(
                        "Stats endpoint failed {} consecutive polls (threshold {}): {}",
                        consecutive_failures, threshold, error
                    );
                    tracing::error!(%message, "Raising system health alert");
                    self.publisher.publish(OnAirEvent::SystemHealthAlert {
                        status: AlertStatus::Degraded,
                        consecutive_failures,
                        threshold,
                        target_url: self.config.stats_url.clone(),
                        message,
                        detected_at: now,
                    });
                }

                PollOutcome::Failure {
                    error,
                    consecutive_failures,
                    alerted,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let ok = PollerConfig::new(
            "http://localhost:8000/status-json.xsl",
            Duration::from_secs(10),
            3,
            Duration::from_secs(5),
        );
        assert!(ok.is_ok());

        let url = "http://localhost:8000/status-json.xsl";
        let five = Duration::from_secs(5);
        assert!(PollerConfig::new(url, Duration::ZERO, 3, five).is_err());
        assert!(PollerConfig::new(url, five, 0, five).is_err());
        assert!(PollerConfig::new(url, five, 3, Duration::ZERO).is_err());
        assert!(PollerConfig::new("/status-json.xsl", five, 3, five).is_err());
    }

    #[test]
    fn test_alerting_threshold() {
        let config = PollerConfig::new(
            "http://localhost:8000/s",
            Duration::from_secs(1),
            2,
            Duration::from_secs(1),
        )
        .unwrap();
        let mut state = PollingState::new(&config);
        assert!(!state.alerting());
        state.consecutive_failures = 2;
        assert!(state.alerting());
    }
}
