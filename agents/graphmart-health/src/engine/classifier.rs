//! Status classification
//!
//! Maps a detailed status into one health category. The rules are applied
//! in order and the first match wins.

use crate::contracts::*;
use crate::engine::StatusFetcher;
use crate::error::FetchResult;
use chrono::Utc;

/// Error text kept per layer in listings
pub const MAX_ERROR_CHARS: usize = 200;

/// Error lines echoed to the log when inspecting layers
pub const MAX_ERROR_LINES: usize = 5;

/// Classify a detailed status.
///
/// 1. not online: `Offline`
/// 2. failed layers: `Failed`
/// 3. dirty layers: `Degraded`
/// 4. complete: `Healthy`
/// 5. otherwise: `Degraded` (still processing)
pub fn classify(raw: &RawStatus) -> Classification {
    if !raw.is_online() {
        Classification::new(
            HealthCategory::Offline,
            Some(format!("artifact is {}", raw.status)),
        )
    } else if raw.failed_layers > 0 {
        Classification::new(
            HealthCategory::Failed,
            Some(format!("{} layer(s) failed", raw.failed_layers)),
        )
    } else if raw.dirty_layers > 0 {
        Classification::new(
            HealthCategory::Degraded,
            Some(format!("{} layer(s) are dirty", raw.dirty_layers)),
        )
    } else if raw.is_complete {
        Classification::new(HealthCategory::Healthy, None)
    } else {
        Classification::new(
            HealthCategory::Degraded,
            Some("processing in progress".to_string()),
        )
    }
}

/// Build a report from fetched data
pub fn build_report(id: ArtifactId, title: String, raw: &RawStatus) -> StatusReport {
    let Classification {
        category,
        explanation,
    } = classify(raw);

    StatusReport {
        id,
        title,
        raw_status: raw.status.clone(),
        online: raw.is_online(),
        complete: raw.is_complete,
        failed_count: raw.failed_layers,
        dirty_count: raw.dirty_layers,
        category,
        explanation,
        timestamp: Utc::now(),
    }
}

/// Fetch the status token and detail for one artifact.
///
/// The short token from the status endpoint replaces whatever the detail
/// payload carried.
pub async fn fetch_raw_status<F>(fetcher: &F, id: &ArtifactId) -> FetchResult<RawStatus>
where
    F: StatusFetcher + ?Sized,
{
    let token = fetcher.status(id).await?;
    let detail = fetcher.status_detail(id).await?;
    Ok(detail.with_status(token))
}

/// Fetch title, status token and detail for one artifact
pub async fn fetch_snapshot<F>(fetcher: &F, id: &ArtifactId) -> FetchResult<(String, RawStatus)>
where
    F: StatusFetcher + ?Sized,
{
    let title = fetcher.title(id).await?;
    let raw = fetch_raw_status(fetcher, id).await?;
    Ok((title, raw))
}

/// Check one artifact. Never fails: fetch errors become `Unknown` reports.
pub async fn check_status<F>(fetcher: &F, id: &ArtifactId) -> StatusReport
where
    F: StatusFetcher + ?Sized,
{
    match fetch_snapshot(fetcher, id).await {
        Ok((title, raw)) => {
            let report = build_report(id.clone(), title, &raw);
            tracing::debug!(
                artifact = %id,
                category = %report.category,
                "Classified artifact status"
            );
            report
        }
        Err(e) => {
            tracing::error!(
                artifact = %id,
                error_kind = e.kind(),
                error = %e,
                "Failed to check graphmart status"
            );
            StatusReport::unknown(id.clone(), e.to_string())
        }
    }
}

/// Per-layer listing
pub fn layer_statuses(raw: &RawStatus) -> Vec<LayerStatusReport> {
    raw.child_layer
        .iter()
        .map(|layer| LayerStatusReport {
            uri: layer.uri.clone().unwrap_or_default(),
            title: layer.display_title().to_string(),
            enabled: layer.enabled,
            has_error: layer.error.is_some(),
            error_message: layer.error.as_deref().map(|e| truncate_chars(e, MAX_ERROR_CHARS)),
        })
        .collect()
}

/// Log failed/dirty counts and the head of each enabled layer and step error
pub fn inspect_layers(title: &str, raw: &RawStatus) {
    tracing::info!(
        title,
        failed_layers = raw.failed_layers,
        dirty_layers = raw.dirty_layers,
        "Found {} failed layers and {} dirty layers",
        raw.failed_layers,
        raw.dirty_layers
    );

    for layer in raw.failed_enabled_layers() {
        if let Some(error) = &layer.error {
            tracing::info!(
                "Layer [ {} ] failed with error:\n{}...",
                layer.display_title(),
                head_lines(error, MAX_ERROR_LINES)
            );
        }
        for step in layer.child.iter().filter(|s| s.enabled) {
            if let Some(error) = &step.error {
                tracing::info!(
                    "Step [ {} ] failed with error:\n{}...",
                    step.display_title(),
                    head_lines(error, MAX_ERROR_LINES)
                );
            }
        }
    }
}

pub(crate) fn head_lines(text: &str, n: usize) -> String {
    text.lines().take(n).collect::<Vec<_>>().join("\n")
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use proptest::prelude::*;

    fn raw(online: bool, complete: bool, failed: u32, dirty: u32) -> RawStatus {
        RawStatus::new(if online { "Online" } else { "Offline" })
            .with_complete(complete)
            .with_failed_layers(failed)
            .with_dirty_layers(dirty)
    }

    #[test]
    fn test_offline_dominates_failed() {
        let c = classify(&raw(false, true, 3, 0));
        assert_eq!(c.category, HealthCategory::Offline);
        assert_eq!(c.explanation.as_deref(), Some("artifact is Offline"));
    }

    #[test]
    fn test_failed_dominates_dirty() {
        let c = classify(&raw(true, true, 1, 4));
        assert_eq!(c.category, HealthCategory::Failed);
        assert_eq!(c.explanation.as_deref(), Some("1 layer(s) failed"));
    }

    #[test]
    fn test_dirty_is_degraded() {
        let c = classify(&raw(true, true, 0, 2));
        assert_eq!(c.category, HealthCategory::Degraded);
        assert_eq!(c.explanation.as_deref(), Some("2 layer(s) are dirty"));
    }

    #[test]
    fn test_incomplete_is_processing() {
        let c = classify(&raw(true, false, 0, 0));
        assert_eq!(c.category, HealthCategory::Degraded);
        assert_eq!(c.explanation.as_deref(), Some("processing in progress"));
    }

    #[test]
    fn test_healthy() {
        let c = classify(&raw(true, true, 0, 0));
        assert_eq!(c, Classification::new(HealthCategory::Healthy, None));
    }

    #[test]
    fn test_namespaced_token_is_online() {
        let raw = RawStatus::new("http://cambridgesemantics.com/ontologies/Graphmarts#Online")
            .with_complete(true);
        assert_eq!(classify(&raw).category, HealthCategory::Healthy);
    }

    struct Unreachable;

    #[async_trait::async_trait]
    impl StatusFetcher for Unreachable {
        async fn status(&self, _id: &ArtifactId) -> FetchResult<String> {
            Ok("Online".to_string())
        }

        async fn status_detail(&self, _id: &ArtifactId) -> FetchResult<RawStatus> {
            Err(FetchError::network("connection refused"))
        }

        async fn title(&self, _id: &ArtifactId) -> FetchResult<String> {
            Ok("Sales".to_string())
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_is_unknown() {
        let id = ArtifactId::new("http://cambridgesemantics.com/graphmart/sales");
        let report = check_status(&Unreachable, &id).await;
        assert_eq!(report.id, id);
        assert_eq!(report.category, HealthCategory::Unknown);
        assert_eq!(
            report.explanation.as_deref(),
            Some("Network error: connection refused")
        );
    }

    #[test]
    fn test_layer_statuses_truncates_errors() {
        let long_error = "x".repeat(500);
        let raw = RawStatus::new("Online")
            .with_layer(LayerStatus::new("Load").with_error(long_error))
            .with_layer(LayerStatus::default());

        let layers = layer_statuses(&raw);
        assert_eq!(layers.len(), 2);
        assert!(layers[0].has_error);
        assert_eq!(layers[0].error_message.as_ref().unwrap().len(), MAX_ERROR_CHARS);
        assert_eq!(layers[1].title, "Unknown");
        assert!(!layers[1].enabled);
        assert!(layers[1].error_message.is_none());
    }

    #[test]
    fn test_head_lines() {
        let text = "1\n2\n3\n4\n5\n6\n7";
        assert_eq!(head_lines(text, 5), "1\n2\n3\n4\n5");
        assert_eq!(head_lines("single", 5), "single");
    }

    proptest! {
        #[test]
        fn classification_is_total_and_idempotent(
            status in ".{0,40}",
            complete in any::<bool>(),
            failed in any::<u32>(),
            dirty in any::<u32>(),
        ) {
            let raw = RawStatus::new(status)
                .with_complete(complete)
                .with_failed_layers(failed)
                .with_dirty_layers(dirty);
            let first = classify(&raw);
            let second = classify(&raw);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn offline_always_wins(failed in any::<u32>(), dirty in any::<u32>(), complete in any::<bool>()) {
            let c = classify(&raw(false, complete, failed, dirty));
            prop_assert_eq!(c.category, HealthCategory::Offline);
        }

        #[test]
        fn online_failures_always_fail(failed in 1u32.., dirty in any::<u32>(), complete in any::<bool>()) {
            let c = classify(&raw(true, complete, failed, dirty));
            prop_assert_eq!(c.category, HealthCategory::Failed);
        }

        #[test]
        fn category_depends_only_on_counts_and_flags(
            prefix in "[a-z:/#.]{0,20}",
            complete in any::<bool>(),
            failed in 0u32..3,
            dirty in 0u32..3,
        ) {
            let decorated = RawStatus::new(format!("{prefix}Online"))
                .with_complete(complete)
                .with_failed_layers(failed)
                .with_dirty_layers(dirty)
                .with_layer(LayerStatus::new("ignored").with_error("ignored"));
            let plain = raw(true, complete, failed, dirty);
            prop_assert_eq!(classify(&decorated), classify(&plain));
        }
    }
}
