//! Telemetry for the Graphmart Health Agent
//!
//! - `graphmart_health_checks_total` (counter) - classifications by category
//! - `graphmart_health_fetch_errors_total` (counter) - checks that ended `unknown`
//! - `graphmart_health_category` (gauge) - latest severity index per artifact
//! - `graphmart_health_poll_attempts_total` (counter) - readiness polls by outcome

use crate::contracts::{HealthCategory, StatusReport};
use prometheus::{CounterVec, GaugeVec, IntCounter, Opts, Registry};
use std::sync::Arc;
use thiserror::Error;

/// Telemetry errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Metrics error: {0}")]
    MetricsError(#[from] prometheus::Error),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

const NAMESPACE: &str = "graphmart_health";

/// Health metrics for Prometheus
pub struct HealthMetrics {
    registry: Arc<Registry>,

    /// Classifications by category
    checks_total: CounterVec,

    /// Checks whose fetch failed
    fetch_errors_total: IntCounter,

    /// Latest severity index by artifact
    category: GaugeVec,

    /// Readiness poll attempts by outcome
    poll_attempts_total: CounterVec,
}

impl HealthMetrics {
    /// Create metrics in a fresh registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Create and register metrics with an existing registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let checks_total = CounterVec::new(
            Opts::new("checks_total", "Artifact health classifications by category")
                .namespace(NAMESPACE),
            &["category"],
        )?;

        let fetch_errors_total = IntCounter::with_opts(
            Opts::new("fetch_errors_total", "Artifact checks that failed to fetch status")
                .namespace(NAMESPACE),
        )?;

        let category = GaugeVec::new(
            Opts::new(
                "category",
                "Latest health category severity (0 healthy .. 4 unknown)",
            )
            .namespace(NAMESPACE),
            &["artifact"],
        )?;

        let poll_attempts_total = CounterVec::new(
            Opts::new("poll_attempts_total", "Readiness poll attempts by outcome")
                .namespace(NAMESPACE),
            &["outcome"],
        )?;

        registry.register(Box::new(checks_total.clone()))?;
        registry.register(Box::new(fetch_errors_total.clone()))?;
        registry.register(Box::new(category.clone()))?;
        registry.register(Box::new(poll_attempts_total.clone()))?;

        Ok(Self {
            registry,
            checks_total,
            fetch_errors_total,
            category,
            poll_attempts_total,
        })
    }

    /// Record one classification
    pub fn record_report(&self, report: &StatusReport) {
        self.checks_total
            .with_label_values(&[report.category.as_str()])
            .inc();
        if report.category == HealthCategory::Unknown {
            self.fetch_errors_total.inc();
        }
        self.category
            .with_label_values(&[report.id.as_str()])
            .set(f64::from(report.category.severity()));
    }

    /// Record one readiness poll attempt
    pub fn record_poll_attempt(&self, outcome: &str) {
        self.poll_attempts_total.with_label_values(&[outcome]).inc();
    }

    /// Encode metrics as text for scraping
    pub fn encode_text(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| TelemetryError::Encoding(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Encoding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::ArtifactId;

    #[test]
    fn test_record_report() {
        let metrics = HealthMetrics::new().unwrap();
        let report = StatusReport::unknown(ArtifactId::new("urn:gm:1"), "refused");

        metrics.record_report(&report);
        metrics.record_poll_attempt("pending");

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("graphmart_health_checks_total{category=\"unknown\"} 1"));
        assert!(text.contains("graphmart_health_fetch_errors_total 1"));
        assert!(text.contains("graphmart_health_category{artifact=\"urn:gm:1\"} 4"));
        assert!(text.contains("graphmart_health_poll_attempts_total{outcome=\"pending\"} 1"));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Arc::new(Registry::new());
        assert!(HealthMetrics::with_registry(Arc::clone(&registry)).is_ok());
        assert!(HealthMetrics::with_registry(registry).is_err());
    }
}
