//! Graphmart Health Agent Contracts
//!
//! Report shapes consumed by dashboards and alerting, plus the decoded
//! status payload returned by the artifact service.

mod status;
mod subsystems;

pub use status::*;
pub use subsystems::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier (usually a URI) naming one graphmart
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtifactId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ArtifactId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Health categories, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthCategory {
    /// Online, complete, no failed or dirty layers
    Healthy,
    /// Online with dirty layers, or still processing
    Degraded,
    /// Online with failed layers
    Failed,
    /// Not online
    Offline,
    /// Status could not be fetched or decoded
    Unknown,
}

impl HealthCategory {
    pub const ALL: [HealthCategory; 5] = [
        HealthCategory::Healthy,
        HealthCategory::Degraded,
        HealthCategory::Failed,
        HealthCategory::Offline,
        HealthCategory::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthCategory::Healthy => "healthy",
            HealthCategory::Degraded => "degraded",
            HealthCategory::Failed => "failed",
            HealthCategory::Offline => "offline",
            HealthCategory::Unknown => "unknown",
        }
    }

    /// Severity index (0 = best)
    pub fn severity(&self) -> u8 {
        *self as u8
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthCategory::Healthy)
    }

    /// Single-character marker used in log lines and table output
    pub fn icon(&self) -> &'static str {
        match self {
            HealthCategory::Healthy => "✓",
            HealthCategory::Degraded => "⚠",
            HealthCategory::Failed => "✗",
            HealthCategory::Offline => "○",
            HealthCategory::Unknown => "?",
        }
    }
}

impl fmt::Display for HealthCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category plus optional human-readable reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: HealthCategory,
    pub explanation: Option<String>,
}

impl Classification {
    pub fn new(category: HealthCategory, explanation: Option<String>) -> Self {
        Self {
            category,
            explanation,
        }
    }
}

/// Immutable snapshot of one artifact's health.
///
/// Field names are part of the dashboard contract and must not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub id: ArtifactId,
    pub title: String,
    pub raw_status: String,
    pub online: bool,
    pub complete: bool,
    pub failed_count: u32,
    pub dirty_count: u32,
    pub category: HealthCategory,
    pub explanation: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl StatusReport {
    /// Report for an artifact whose status could not be fetched
    pub fn unknown(id: ArtifactId, error: impl Into<String>) -> Self {
        Self {
            id,
            title: "Unknown".to_string(),
            raw_status: "Unknown".to_string(),
            online: false,
            complete: false,
            failed_count: 0,
            dirty_count: 0,
            category: HealthCategory::Unknown,
            explanation: Some(error.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.category.is_healthy()
    }
}

/// Terminal result of a bounded readiness wait
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollOutcome {
    Ready(StatusReport),
    Failed {
        reason: String,
        last_report: Option<StatusReport>,
    },
}

impl PollOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, PollOutcome::Ready(_))
    }

    /// Most recent report observed, if any
    pub fn report(&self) -> Option<&StatusReport> {
        match self {
            PollOutcome::Ready(report) => Some(report),
            PollOutcome::Failed { last_report, .. } => last_report.as_ref(),
        }
    }
}

/// Merged result of one aggregation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateReport {
    /// Correlation id for this pass
    pub request_id: Uuid,

    /// When the pass started
    pub timestamp: DateTime<Utc>,

    /// AND of every sub-system flag below
    pub overall_healthy: bool,

    /// Every artifact classified `healthy`
    pub artifacts_healthy: bool,

    /// Every artifact connected to AnzoGraph (true when not checked)
    pub anzograph_healthy: bool,

    /// No search-index errors found (true when not checked)
    pub search_index_healthy: bool,

    /// Authentication probe succeeded (true when not checked)
    pub auth_healthy: bool,

    /// Per-artifact reports, in input order
    pub artifacts: Vec<StatusReport>,

    #[serde(default)]
    pub anzograph_details: Vec<AnzoGraphConnectionReport>,

    #[serde(default)]
    pub search_index_details: Vec<SearchIndexHealthReport>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_details: Option<AuthHealthReport>,

    /// Total duration in milliseconds
    pub duration_ms: u64,
}

impl AggregateReport {
    /// Worst category across all artifacts, `None` when empty
    pub fn worst_category(&self) -> Option<HealthCategory> {
        self.artifacts.iter().map(|r| r.category).max()
    }

    /// Number of artifacts in the given category
    pub fn count(&self, category: HealthCategory) -> usize {
        self.artifacts
            .iter()
            .filter(|r| r.category == category)
            .count()
    }

    /// Process exit code for CLI integration
    pub fn exit_code(&self) -> i32 {
        if self.overall_healthy {
            0
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_ordering() {
        assert!(HealthCategory::Healthy < HealthCategory::Degraded);
        assert!(HealthCategory::Degraded < HealthCategory::Failed);
        assert!(HealthCategory::Failed < HealthCategory::Offline);
        assert!(HealthCategory::Offline < HealthCategory::Unknown);
        assert_eq!(HealthCategory::Unknown.severity(), 4);
    }

    #[test]
    fn test_report_field_names() {
        let report = StatusReport::unknown(ArtifactId::new("urn:gm:1"), "boom");
        let value = serde_json::to_value(&report).unwrap();
        let obj = value.as_object().unwrap();

        for key in [
            "id",
            "title",
            "rawStatus",
            "online",
            "complete",
            "failedCount",
            "dirtyCount",
            "category",
            "explanation",
            "timestamp",
        ] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert_eq!(obj.len(), 10);
        assert_eq!(value["category"], "unknown");
        assert_eq!(value["id"], "urn:gm:1");
    }

    #[test]
    fn test_poll_outcome_report() {
        let report = StatusReport::unknown(ArtifactId::new("a"), "x");
        let failed = PollOutcome::Failed {
            reason: "timeout".into(),
            last_report: Some(report.clone()),
        };
        assert!(!failed.is_ready());
        assert_eq!(failed.report(), Some(&report));
        assert!(PollOutcome::Ready(report).is_ready());
    }
}
