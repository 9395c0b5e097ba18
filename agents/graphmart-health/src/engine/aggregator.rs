//! Health aggregation
//!
//! Classifies a list of artifacts one after another and merges the results,
//! optionally with auxiliary sub-system checks. A failure on one artifact is
//! confined to that artifact's entry.

use crate::contracts::*;
use crate::engine::classifier::truncate_chars;
use crate::engine::{check_status, fetch_raw_status, AuthProbe, StatusFetcher, MAX_ERROR_CHARS};
use crate::telemetry::HealthMetrics;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Error fragments that point at the search-index service
pub const SEARCH_INDEX_KEYWORDS: [&str; 6] = [
    "elasticsearch",
    "elastic",
    "es index",
    "es indexing",
    "indexing service",
    "search index",
];

/// Multi-artifact health aggregator
pub struct HealthAggregator {
    fetcher: Arc<dyn StatusFetcher>,
    auth_probe: Option<Arc<dyn AuthProbe>>,
    metrics: Option<Arc<HealthMetrics>>,
}

impl HealthAggregator {
    pub fn new(fetcher: Arc<dyn StatusFetcher>) -> Self {
        Self {
            fetcher,
            auth_probe: None,
            metrics: None,
        }
    }

    /// Include an authentication probe in auxiliary checks
    pub fn with_auth_probe(mut self, probe: Arc<dyn AuthProbe>) -> Self {
        self.auth_probe = Some(probe);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<HealthMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Classify every artifact in order and merge the results
    pub async fn aggregate(&self, ids: &[ArtifactId], include_aux_checks: bool) -> AggregateReport {
        let started = Instant::now();
        let timestamp = Utc::now();

        let mut artifacts = Vec::with_capacity(ids.len());
        for id in ids {
            let report = check_status(self.fetcher.as_ref(), id).await;
            if let Some(metrics) = &self.metrics {
                metrics.record_report(&report);
            }
            artifacts.push(report);
        }
        let artifacts_healthy = artifacts.iter().all(StatusReport::is_healthy);

        let mut anzograph_details = Vec::new();
        let mut search_index_details = Vec::new();
        let mut auth_details = None;

        if include_aux_checks {
            tracing::info!("Checking search index connectivity...");
            for id in ids {
                let report = self.check_search_index(id).await;
                if !report.is_healthy {
                    tracing::warn!(
                        artifact = %id,
                        "Search index issues detected: {} error(s)",
                        report.errors.len()
                    );
                }
                search_index_details.push(report);
            }

            tracing::info!("Checking AnzoGraph connectivity...");
            for id in ids {
                let report = self.check_anzograph(id).await;
                if !report.is_connected {
                    tracing::warn!(
                        artifact = %id,
                        "AnzoGraph connection issue: {}",
                        report.error.as_deref().unwrap_or("unknown")
                    );
                }
                anzograph_details.push(report);
            }

            if let Some(probe) = &self.auth_probe {
                tracing::info!("Checking authentication...");
                let report = check_authentication(probe.as_ref()).await;
                if !report.is_authenticated {
                    tracing::warn!(
                        "Authentication failed: {}",
                        report.error.as_deref().unwrap_or("unknown")
                    );
                }
                auth_details = Some(report);
            }
        }

        let anzograph_healthy = anzograph_details.iter().all(|r| r.is_connected);
        let search_index_healthy = search_index_details.iter().all(|r| r.is_healthy);
        let auth_healthy = auth_details.as_ref().map_or(true, |r| r.is_authenticated);

        AggregateReport {
            request_id: Uuid::new_v4(),
            timestamp,
            overall_healthy: artifacts_healthy
                && anzograph_healthy
                && search_index_healthy
                && auth_healthy,
            artifacts_healthy,
            anzograph_healthy,
            search_index_healthy,
            auth_healthy,
            artifacts,
            anzograph_details,
            search_index_details,
            auth_details,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// AnzoGraph connectivity of one artifact
    pub async fn check_anzograph(&self, id: &ArtifactId) -> AnzoGraphConnectionReport {
        match fetch_raw_status(self.fetcher.as_ref(), id).await {
            Ok(raw) => anzograph_connection(id, &raw),
            Err(e) => {
                tracing::error!(artifact = %id, error = %e, "Failed to check AnzoGraph connectivity");
                AnzoGraphConnectionReport {
                    artifact_id: id.clone(),
                    is_connected: false,
                    azg_uri: None,
                    status: "Unknown".to_string(),
                    error: Some(e.to_string()),
                    checked_at: Utc::now(),
                }
            }
        }
    }

    /// Search-index errors in one artifact's layers
    pub async fn check_search_index(&self, id: &ArtifactId) -> SearchIndexHealthReport {
        match self.fetcher.status_detail(id).await {
            Ok(raw) => search_index_health(id, &raw),
            Err(e) => {
                tracing::error!(artifact = %id, error = %e, "Failed to check search index connectivity");
                SearchIndexHealthReport {
                    artifact_id: id.clone(),
                    is_healthy: false,
                    failed_layers: None,
                    errors: vec![e.to_string()],
                    checked_at: Utc::now(),
                }
            }
        }
    }
}

/// Connected when online and bound to an AnzoGraph server
pub fn anzograph_connection(id: &ArtifactId, raw: &RawStatus) -> AnzoGraphConnectionReport {
    let online = raw.is_online();
    let is_connected = online && raw.static_azg_server.is_some();

    let error = if raw.static_azg_server.is_none() {
        Some("No AZG server configured".to_string())
    } else if !online {
        Some(format!("artifact is {}", raw.status))
    } else {
        None
    };

    AnzoGraphConnectionReport {
        artifact_id: id.clone(),
        is_connected,
        azg_uri: raw.static_azg_server.clone(),
        status: raw.status.clone(),
        error,
        checked_at: Utc::now(),
    }
}

fn mentions_search_index(error: &str) -> bool {
    let lower = error.to_lowercase();
    SEARCH_INDEX_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Infer search-index trouble from enabled layer and step errors
pub fn search_index_health(id: &ArtifactId, raw: &RawStatus) -> SearchIndexHealthReport {
    let mut failed_layers = 0;
    let mut errors = Vec::new();

    for layer in raw.child_layer.iter().filter(|l| l.enabled) {
        if let Some(error) = layer.error.as_deref().filter(|e| mentions_search_index(e)) {
            failed_layers += 1;
            errors.push(format!(
                "Layer '{}': {}",
                layer.display_title(),
                truncate_chars(error, MAX_ERROR_CHARS)
            ));
        }

        for step in layer.child.iter().filter(|s| s.enabled) {
            if let Some(error) = step.error.as_deref().filter(|e| mentions_search_index(e)) {
                errors.push(format!(
                    "Step '{}': {}",
                    step.display_title(),
                    truncate_chars(error, MAX_ERROR_CHARS)
                ));
            }
        }
    }

    SearchIndexHealthReport {
        artifact_id: id.clone(),
        is_healthy: errors.is_empty(),
        failed_layers: Some(failed_layers),
        errors,
        checked_at: Utc::now(),
    }
}

/// Run the authentication probe, timing it
pub async fn check_authentication<P>(probe: &P) -> AuthHealthReport
where
    P: AuthProbe + ?Sized,
{
    let started = Instant::now();
    let result = probe.probe_auth().await;
    let response_time_ms = started.elapsed().as_secs_f64() * 1000.0;

    match result {
        Ok(_) => AuthHealthReport {
            is_authenticated: true,
            response_time_ms,
            error: None,
            checked_at: Utc::now(),
        },
        Err(e) => AuthHealthReport {
            is_authenticated: false,
            response_time_ms,
            error: Some(e.to_string()),
            checked_at: Utc::now(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anzograph_connection() {
        let id = ArtifactId::new("urn:gm:1");

        let connected = anzograph_connection(&id, &RawStatus::new("Online").with_azg_server("urn:azg"));
        assert!(connected.is_connected);
        assert!(connected.error.is_none());

        let unbound = anzograph_connection(&id, &RawStatus::new("Online"));
        assert!(!unbound.is_connected);
        assert_eq!(unbound.error.as_deref(), Some("No AZG server configured"));

        let offline = anzograph_connection(&id, &RawStatus::new("Offline").with_azg_server("urn:azg"));
        assert!(!offline.is_connected);
        assert_eq!(offline.error.as_deref(), Some("artifact is Offline"));
    }

    #[test]
    fn test_search_index_health() {
        let id = ArtifactId::new("urn:gm:1");
        let raw = RawStatus::new("Online")
            .with_layer(LayerStatus::new("Index").with_error("Elasticsearch cluster unreachable"))
            .with_layer(LayerStatus::new("Load").with_error("disk full"))
            .with_layer(
                LayerStatus::new("Search")
                    .with_step(StepStatus::new("Push").with_error("search index rejected batch")),
            )
            .with_layer(LayerStatus::new("Old").with_error("ES index missing").disabled());

        let report = search_index_health(&id, &raw);
        assert!(!report.is_healthy);
        assert_eq!(report.failed_layers, Some(1));
        assert_eq!(
            report.errors,
            vec![
                "Layer 'Index': Elasticsearch cluster unreachable".to_string(),
                "Step 'Push': search index rejected batch".to_string(),
            ]
        );
    }

    #[test]
    fn test_search_index_clean() {
        let raw = RawStatus::new("Online").with_layer(LayerStatus::new("Load"));
        let report = search_index_health(&ArtifactId::new("a"), &raw);
        assert!(report.is_healthy);
        assert_eq!(report.failed_layers, Some(0));
    }
}
