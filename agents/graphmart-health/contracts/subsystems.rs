//! Auxiliary sub-system reports
//!
//! Connectivity of the serving engine, search indexing and authentication
//! are not exposed by dedicated endpoints; these reports carry what can be
//! inferred from artifact status and from an authenticated probe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ArtifactId;

/// AnzoGraph connectivity of one artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnzoGraphConnectionReport {
    pub artifact_id: ArtifactId,
    pub is_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azg_uri: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// Search-index errors found in one artifact's layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndexHealthReport {
    pub artifact_id: ArtifactId,
    pub is_healthy: bool,
    /// Enabled layers whose own error mentions indexing; `None` when the
    /// status could not be fetched
    pub failed_layers: Option<u32>,
    pub errors: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

/// Result of the authentication probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthHealthReport {
    pub is_authenticated: bool,
    pub response_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}
