//! Continuous monitoring
//!
//! Re-classifies a fixed list of artifacts on an interval and hands every
//! report to an observer, strictly in input order. Cancellation is checked
//! between iterations; an in-flight fetch always runs to completion.

use crate::contracts::*;
use crate::engine::{check_status, StatusFetcher};
use crate::engine::poller::duration_secs;
use crate::error::ObserverError;
use crate::telemetry::HealthMetrics;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Receives every report produced by the monitor
pub trait ReportObserver: Send + Sync {
    fn on_report(&self, report: &StatusReport) -> Result<(), ObserverError>;
}

impl<F> ReportObserver for F
where
    F: Fn(&StatusReport) -> Result<(), ObserverError> + Send + Sync,
{
    fn on_report(&self, report: &StatusReport) -> Result<(), ObserverError> {
        self(report)
    }
}

/// Log level at which a report raises an alert, `None` when no alert is due
pub fn alert_level(category: HealthCategory) -> Option<tracing::Level> {
    match category {
        HealthCategory::Failed | HealthCategory::Offline => Some(tracing::Level::ERROR),
        HealthCategory::Degraded => Some(tracing::Level::WARN),
        HealthCategory::Healthy | HealthCategory::Unknown => None,
    }
}

/// Observer that raises log alerts for unhealthy artifacts
pub struct AlertingObserver;

impl ReportObserver for AlertingObserver {
    fn on_report(&self, report: &StatusReport) -> Result<(), ObserverError> {
        let explanation = report.explanation.as_deref().unwrap_or("no details");
        match alert_level(report.category) {
            Some(tracing::Level::ERROR) => tracing::error!(
                artifact = %report.id,
                category = %report.category,
                "ALERT: {} is {}: {}",
                report.title,
                report.category,
                explanation
            ),
            Some(_) => tracing::warn!(
                artifact = %report.id,
                category = %report.category,
                "WARNING: {} is {}: {}",
                report.title,
                report.category,
                explanation
            ),
            None => {}
        }
        Ok(())
    }
}

/// Cooperative cancellation token
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Resolves once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Monitoring cadence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Pause between iterations
    #[serde(default = "default_interval", with = "duration_secs")]
    pub interval: Duration,

    /// Stop after this long; run until cancelled when absent
    #[serde(default, with = "optional_duration_secs")]
    pub duration: Option<Duration>,
}

fn default_interval() -> Duration {
    Duration::from_secs(60)
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            duration: None,
        }
    }
}

mod optional_duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|secs| secs.map(Duration::from_secs))
    }
}

/// Why a monitoring run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    DurationReached,
    Cancelled,
}

/// Summary of a finished monitoring run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSummary {
    pub iterations: u64,
    pub exit: MonitorExit,
}

/// Interval-driven monitor
pub struct ContinuousMonitor {
    fetcher: Arc<dyn StatusFetcher>,
    config: MonitorConfig,
    metrics: Option<Arc<HealthMetrics>>,
}

impl ContinuousMonitor {
    pub fn new(fetcher: Arc<dyn StatusFetcher>, config: MonitorConfig) -> Self {
        Self {
            fetcher,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<HealthMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run until the configured duration elapses or `cancel` fires
    pub async fn run(
        &self,
        ids: &[ArtifactId],
        observer: &dyn ReportObserver,
        cancel: &CancellationToken,
    ) -> MonitorSummary {
        let start = Instant::now();
        let mut iterations = 0u64;

        loop {
            if cancel.is_cancelled() {
                tracing::info!("Monitoring stopped by user");
                return MonitorSummary {
                    iterations,
                    exit: MonitorExit::Cancelled,
                };
            }

            iterations += 1;
            tracing::info!(iteration = iterations, "=== Monitoring Check #{} ===", iterations);

            for id in ids {
                let report = check_status(self.fetcher.as_ref(), id).await;
                if let Some(metrics) = &self.metrics {
                    metrics.record_report(&report);
                }
                log_report(&report);
                notify(observer, &report);
            }

            if let Some(duration) = self.config.duration {
                if start.elapsed() >= duration {
                    tracing::info!(
                        "Monitoring duration of {}s reached. Stopping.",
                        duration.as_secs()
                    );
                    return MonitorSummary {
                        iterations,
                        exit: MonitorExit::DurationReached,
                    };
                }
            }

            tracing::info!("Next check in {} seconds...", self.config.interval.as_secs());
            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = cancel.cancelled() => {}
            }
        }
    }
}

fn log_report(report: &StatusReport) {
    tracing::info!(
        artifact = %report.id,
        category = %report.category,
        "{} {}: {} ({})",
        report.category.icon(),
        report.title,
        report.category,
        report.raw_status
    );
    if let Some(explanation) = &report.explanation {
        tracing::info!(artifact = %report.id, "  └─ {}", explanation);
    }
}

/// Deliver one report; observer failures and panics are logged only
fn notify(observer: &dyn ReportObserver, report: &StatusReport) {
    match catch_unwind(AssertUnwindSafe(|| observer.on_report(report))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(artifact = %report.id, error = %e, "Callback error"),
        Err(_) => tracing::error!(artifact = %report.id, "Callback panicked"),
    }
}
