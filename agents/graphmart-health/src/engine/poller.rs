//! Readiness polling
//!
//! Blocks until an artifact is online and complete, a deadline passes, or
//! the post-ready re-check finds failed or dirty layers. Deadlines are
//! re-evaluated on every iteration against the loop start.

use crate::contracts::*;
use crate::engine::{
    build_report, fetch_raw_status, inspect_layers, GraphmartController, StatusFetcher,
};
use crate::error::{FetchError, ReadinessError};
use crate::telemetry::HealthMetrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Polling cadence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Sleep between successful status checks
    #[serde(default = "default_poll_interval", with = "duration_secs")]
    pub poll_interval: Duration,

    /// Minimum spacing of progress log lines
    #[serde(default = "default_log_interval", with = "duration_secs")]
    pub log_interval: Duration,

    /// Sleep after a failed status check
    #[serde(default = "default_error_backoff", with = "duration_secs")]
    pub error_backoff: Duration,

    /// Deadline used when the caller does not give one
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub default_timeout: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_log_interval() -> Duration {
    Duration::from_secs(300)
}

fn default_error_backoff() -> Duration {
    Duration::from_secs(30)
}

fn default_timeout() -> Duration {
    Duration::from_secs(1000)
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            log_interval: default_log_interval(),
            error_backoff: default_error_backoff(),
            default_timeout: default_timeout(),
        }
    }
}

/// Serialize durations as whole seconds
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

/// Format elapsed time as `H:MM:SS`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Progress-log cadence, independent of the poll cadence.
///
/// Due on the first attempt, then at most once per `interval`, whatever the
/// outcome of the attempts in between.
#[derive(Debug, Clone)]
pub(crate) struct ProgressLog {
    start: Instant,
    interval: Duration,
    next_due: Instant,
}

impl ProgressLog {
    pub(crate) fn new(start: Instant, interval: Duration) -> Self {
        Self {
            start,
            interval,
            next_due: start,
        }
    }

    /// Elapsed time since start when a progress line is due at `now`
    pub(crate) fn due(&mut self, now: Instant) -> Option<Duration> {
        if now < self.next_due {
            return None;
        }
        self.next_due = now + self.interval;
        Some(now - self.start)
    }
}

/// Single-artifact readiness waiter
pub struct ReadinessPoller {
    fetcher: Arc<dyn StatusFetcher>,
    config: PollerConfig,
    metrics: Option<Arc<HealthMetrics>>,
}

impl ReadinessPoller {
    pub fn new(fetcher: Arc<dyn StatusFetcher>) -> Self {
        Self::with_config(fetcher, PollerConfig::default())
    }

    pub fn with_config(fetcher: Arc<dyn StatusFetcher>, config: PollerConfig) -> Self {
        Self {
            fetcher,
            config,
            metrics: None,
        }
    }

    /// Record poll attempts into the given metrics
    pub fn with_metrics(mut self, metrics: Arc<HealthMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Wait until the artifact is online and complete with no failed or
    /// dirty layers.
    pub async fn wait_until_ready(
        &self,
        id: &ArtifactId,
        timeout: Duration,
    ) -> Result<StatusReport, ReadinessError> {
        self.run(id, timeout).await.0
    }

    /// Same as [`wait_until_ready`](Self::wait_until_ready), folding the
    /// result and the last observed report into a [`PollOutcome`].
    pub async fn poll(&self, id: &ArtifactId, timeout: Duration) -> PollOutcome {
        match self.run(id, timeout).await {
            (Ok(report), _) => PollOutcome::Ready(report),
            (Err(e), last_report) => PollOutcome::Failed {
                reason: e.to_string(),
                last_report,
            },
        }
    }

    async fn run(
        &self,
        id: &ArtifactId,
        timeout: Duration,
    ) -> (Result<StatusReport, ReadinessError>, Option<StatusReport>) {
        let title = match self.fetcher.title(id).await {
            Ok(title) => title,
            Err(source) => {
                let err = ReadinessError::Transport {
                    title: id.to_string(),
                    last_status: "Unknown".to_string(),
                    source,
                };
                return (Err(err), None);
            }
        };

        tracing::debug!(
            artifact = %id,
            "Waiting {}s for graphmart {} to be ready",
            timeout.as_secs(),
            title
        );

        let start = Instant::now();
        let mut progress = ProgressLog::new(start, self.config.log_interval);
        let mut last_report: Option<StatusReport> = None;
        let mut online = false;
        let mut complete = false;

        while start.elapsed() < timeout {
            let attempt = self.fetch_report(id, &title).await;

            if let Some(elapsed) = progress.due(Instant::now()) {
                tracing::info!(
                    artifact = %id,
                    "Running status check loop, elapsed time: {}",
                    format_elapsed(elapsed)
                );
            }

            let pause = match attempt {
                Ok(report) => {
                    online = report.online;
                    complete = report.complete;
                    last_report = Some(report);
                    if online && complete {
                        self.record_attempt("ready");
                        break;
                    }
                    self.record_attempt("pending");
                    self.config.poll_interval
                }
                Err(e) => {
                    self.record_attempt("error");
                    tracing::info!(
                        artifact = %id,
                        error = %e,
                        "Graphmart is unavailable for a status check, sleeping before retrying"
                    );
                    self.config.error_backoff
                }
            };

            let remaining = timeout.saturating_sub(start.elapsed());
            tokio::time::sleep(pause.min(remaining)).await;
        }

        let last_status = last_report
            .as_ref()
            .map(|r| r.raw_status.clone())
            .unwrap_or_else(|| "Unknown".to_string());

        if !online {
            let err = ReadinessError::Timeout {
                title,
                timeout,
                last_status,
            };
            return (Err(err), last_report);
        }

        tracing::info!(artifact = %id, "Graphmart status: {}", last_status);
        tracing::info!(artifact = %id, "Graphmart is complete: {}", complete);
        tracing::info!(
            artifact = %id,
            "Total wait time: {}",
            format_elapsed(start.elapsed())
        );

        // Counts may have changed since the ready observation.
        let detail = match self.fetcher.status_detail(id).await {
            Ok(detail) => detail,
            Err(source) => {
                let err = ReadinessError::Transport {
                    title,
                    last_status,
                    source,
                };
                return (Err(err), last_report);
            }
        };
        inspect_layers(&title, &detail);

        let report = build_report(id.clone(), title.clone(), &detail.with_status(last_status.clone()));

        if report.failed_count > 0 {
            let err = ReadinessError::FailedLayers {
                title,
                count: report.failed_count,
                last_status,
            };
            return (Err(err), Some(report));
        }
        if report.dirty_count > 0 {
            let err = ReadinessError::DirtyLayers {
                title,
                count: report.dirty_count,
                last_status,
            };
            return (Err(err), Some(report));
        }

        tracing::info!(artifact = %id, "Graphmart: {} is Online", title);
        (Ok(report.clone()), Some(report))
    }

    async fn fetch_report(&self, id: &ArtifactId, title: &str) -> Result<StatusReport, FetchError> {
        let raw = fetch_raw_status(self.fetcher.as_ref(), id).await?;
        Ok(build_report(id.clone(), title.to_string(), &raw))
    }

    fn record_attempt(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_poll_attempt(outcome);
        }
    }
}

/// One entry of a sequential reload plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadTarget {
    pub uri: ArtifactId,
    #[serde(rename = "timeout_secs", with = "duration_secs")]
    pub timeout: Duration,
}

/// Reloads artifacts and waits for them to come back
pub struct ReloadCoordinator {
    controller: Arc<dyn GraphmartController>,
    poller: ReadinessPoller,
}

impl ReloadCoordinator {
    pub fn new(controller: Arc<dyn GraphmartController>, poller: ReadinessPoller) -> Self {
        Self { controller, poller }
    }

    /// Reload one artifact and block until it is ready
    pub async fn reload_and_wait(
        &self,
        id: &ArtifactId,
        timeout: Duration,
    ) -> Result<StatusReport, ReloadError> {
        tracing::info!(artifact = %id, "Starting reload of graphmart");
        self.controller
            .reload(id)
            .await
            .map_err(|source| ReloadError::Trigger {
                action: "reload",
                id: id.clone(),
                source,
            })?;
        let report = self.poller.wait_until_ready(id, timeout).await?;
        tracing::info!(artifact = %id, "Reload complete for graphmart: {}", report.title);
        Ok(report)
    }

    /// Refresh dirty layers of one artifact and block until it is ready
    pub async fn refresh_and_wait(
        &self,
        id: &ArtifactId,
        timeout: Duration,
    ) -> Result<StatusReport, ReloadError> {
        tracing::info!(artifact = %id, "Starting refresh of graphmart");
        self.controller
            .refresh(id)
            .await
            .map_err(|source| ReloadError::Trigger {
                action: "refresh",
                id: id.clone(),
                source,
            })?;
        let report = self.poller.wait_until_ready(id, timeout).await?;
        tracing::info!(artifact = %id, "Refresh complete for graphmart: {}", report.title);
        Ok(report)
    }

    /// Reload artifacts one after another; stops at the first failure.
    pub async fn reload_sequential(
        &self,
        plan: &[ReloadTarget],
    ) -> Result<Vec<StatusReport>, ReloadError> {
        let total = plan.len();
        let mut reports = Vec::with_capacity(total);

        for (i, target) in plan.iter().enumerate() {
            tracing::info!(
                artifact = %target.uri,
                "[{}/{}] Starting reload of graphmart (timeout: {:.1} hours)",
                i + 1,
                total,
                target.timeout.as_secs_f64() / 3600.0
            );
            let report = self.reload_and_wait(&target.uri, target.timeout).await?;
            tracing::info!(
                "[{}/{}] Successfully completed reload of graphmart: {}",
                i + 1,
                total,
                report.title
            );
            reports.push(report);
        }

        tracing::info!("All {} graphmarts reloaded successfully", total);
        Ok(reports)
    }
}

/// Reload failures
#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    #[error("Failed to trigger {action} of {id}: {source}")]
    Trigger {
        action: &'static str,
        id: ArtifactId,
        #[source]
        source: FetchError,
    },

    #[error(transparent)]
    Readiness(#[from] ReadinessError),
}
