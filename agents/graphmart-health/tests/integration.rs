//! Integration tests for the Graphmart Health Agent

use async_trait::async_trait;
use graphmart_health::contracts::*;
use graphmart_health::engine::*;
use graphmart_health::error::{FetchError, FetchResult, ObserverError, ReadinessError};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Fetcher replaying a per-artifact sequence of status payloads.
///
/// Each readiness poll consumes one entry; the last entry repeats forever.
#[derive(Default)]
struct InMemoryFetcher {
    scripts: Mutex<HashMap<String, VecDeque<FetchResult<RawStatus>>>>,
    calls: Mutex<Vec<String>>,
}

impl InMemoryFetcher {
    fn with_script(self, id: &str, script: Vec<FetchResult<RawStatus>>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(id.to_string(), script.into());
        self
    }

    fn next(&self, id: &ArtifactId, consume: bool) -> FetchResult<RawStatus> {
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts
            .get_mut(id.as_str())
            .ok_or_else(|| FetchError::Server {
                status: 404,
                message: format!("no graphmart {}", id),
            })?;
        let front = queue
            .front()
            .cloned()
            .ok_or_else(|| FetchError::network("empty script"))?;
        if (consume || front.is_err()) && queue.len() > 1 {
            queue.pop_front();
        }
        front
    }

    fn record(&self, call: &str, id: &ArtifactId) {
        self.calls.lock().unwrap().push(format!("{} {}", call, id));
    }

    fn calls_of(&self, call: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| c.strip_prefix(&format!("{} ", call)).map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl StatusFetcher for InMemoryFetcher {
    async fn status(&self, id: &ArtifactId) -> FetchResult<String> {
        self.record("status", id);
        self.next(id, false).map(|raw| raw.status)
    }

    async fn status_detail(&self, id: &ArtifactId) -> FetchResult<RawStatus> {
        self.record("detail", id);
        self.next(id, true)
    }

    async fn title(&self, id: &ArtifactId) -> FetchResult<String> {
        self.record("title", id);
        Ok(format!("GM {}", id))
    }
}

#[derive(Default)]
struct RecordingController {
    reloaded: Mutex<Vec<String>>,
}

#[async_trait]
impl GraphmartController for RecordingController {
    async fn reload(&self, id: &ArtifactId) -> FetchResult<()> {
        self.reloaded.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn refresh(&self, _id: &ArtifactId) -> FetchResult<()> {
        Ok(())
    }
}

struct RejectingProbe;

#[async_trait]
impl AuthProbe for RejectingProbe {
    async fn probe_auth(&self) -> FetchResult<Duration> {
        Err(FetchError::Auth("HTTP 401 Unauthorized".to_string()))
    }
}

fn healthy() -> RawStatus {
    RawStatus::new("Online").with_complete(true)
}

fn ids(names: &[&str]) -> Vec<ArtifactId> {
    names.iter().map(|n| ArtifactId::new(*n)).collect()
}

#[tokio::test]
async fn test_aggregate_isolates_failing_artifact() {
    let fetcher = Arc::new(
        InMemoryFetcher::default()
            .with_script("a", vec![Err(FetchError::network("connection refused"))])
            .with_script("b", vec![Ok(healthy())]),
    );
    let aggregator = HealthAggregator::new(fetcher.clone());

    let report = aggregator.aggregate(&ids(&["a", "b"]), false).await;

    assert_eq!(report.artifacts.len(), 2);
    assert_eq!(report.artifacts[0].id.as_str(), "a");
    assert_eq!(report.artifacts[0].category, HealthCategory::Unknown);
    assert!(report.artifacts[0]
        .explanation
        .as_deref()
        .unwrap()
        .contains("connection refused"));
    assert_eq!(report.artifacts[1].id.as_str(), "b");
    assert_eq!(report.artifacts[1].category, HealthCategory::Healthy);
    assert!(!report.artifacts_healthy);
    assert!(!report.overall_healthy);
    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.worst_category(), Some(HealthCategory::Unknown));
}

#[tokio::test]
async fn test_aggregate_preserves_input_order() {
    let fetcher = Arc::new(
        InMemoryFetcher::default()
            .with_script("z", vec![Ok(healthy())])
            .with_script("m", vec![Ok(RawStatus::new("Offline"))])
            .with_script("a", vec![Ok(healthy().with_dirty_layers(2))]),
    );
    let aggregator = HealthAggregator::new(fetcher.clone());

    let report = aggregator.aggregate(&ids(&["z", "m", "a"]), false).await;

    let order: Vec<&str> = report.artifacts.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(order, vec!["z", "m", "a"]);
    assert_eq!(fetcher.calls_of("title"), vec!["z", "m", "a"]);
    assert_eq!(report.count(HealthCategory::Offline), 1);
    assert_eq!(report.count(HealthCategory::Degraded), 1);
}

#[tokio::test]
async fn test_aggregate_with_aux_checks() {
    let fetcher = Arc::new(
        InMemoryFetcher::default()
            .with_script("a", vec![Ok(healthy().with_azg_server("urn:azg:1"))])
            .with_script(
                "b",
                vec![Ok(healthy().with_layer(
                    LayerStatus::new("Index").with_error("Elasticsearch cluster is red"),
                ))],
            ),
    );
    let aggregator =
        HealthAggregator::new(fetcher.clone()).with_auth_probe(Arc::new(RejectingProbe));

    let report = aggregator.aggregate(&ids(&["a", "b"]), true).await;

    assert!(report.artifacts_healthy);
    assert!(!report.search_index_healthy);
    assert!(!report.anzograph_healthy);
    assert!(!report.auth_healthy);
    assert!(!report.overall_healthy);

    assert!(report.anzograph_details[0].is_connected);
    assert_eq!(
        report.anzograph_details[1].error.as_deref(),
        Some("No AZG server configured")
    );
    assert!(report.search_index_details[0].is_healthy);
    assert_eq!(report.search_index_details[1].failed_layers, Some(1));
    let auth = report.auth_details.as_ref().unwrap();
    assert!(!auth.is_authenticated);
    assert!(auth.error.as_deref().unwrap().contains("401"));
}

#[tokio::test]
async fn test_aggregate_without_aux_checks_skips_them() {
    let fetcher = Arc::new(InMemoryFetcher::default().with_script("a", vec![Ok(healthy())]));
    let aggregator =
        HealthAggregator::new(fetcher.clone()).with_auth_probe(Arc::new(RejectingProbe));

    let report = aggregator.aggregate(&ids(&["a"]), false).await;

    assert!(report.overall_healthy);
    assert!(report.anzograph_details.is_empty());
    assert!(report.auth_details.is_none());
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn test_status_report_field_names() {
    let fetcher = InMemoryFetcher::default().with_script("a", vec![Ok(healthy())]);
    let report = check_status(&fetcher, &ArtifactId::new("a")).await;

    let value = serde_json::to_value(&report).unwrap();
    let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        vec![
            "category",
            "complete",
            "dirtyCount",
            "explanation",
            "failedCount",
            "id",
            "online",
            "rawStatus",
            "timestamp",
            "title",
        ]
    );
    assert_eq!(value["category"], "healthy");
}

#[tokio::test(start_paused = true)]
async fn test_poller_times_out_when_never_online() {
    let fetcher = Arc::new(
        InMemoryFetcher::default().with_script("a", vec![Ok(RawStatus::new("Offline"))]),
    );
    let poller = ReadinessPoller::new(fetcher.clone());

    let start = Instant::now();
    let err = poller
        .wait_until_ready(&ArtifactId::new("a"), Duration::from_secs(60))
        .await
        .unwrap_err();
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_secs(60));
    assert!(elapsed <= Duration::from_secs(65));
    match err {
        ReadinessError::Timeout {
            title, last_status, ..
        } => {
            assert_eq!(title, "GM a");
            assert_eq!(last_status, "Offline");
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_poller_ready_after_activation() {
    let fetcher = Arc::new(InMemoryFetcher::default().with_script(
        "a",
        vec![
            Ok(RawStatus::new("Activating")),
            Ok(RawStatus::new("Online")),
            Ok(healthy()),
        ],
    ));
    let poller = ReadinessPoller::new(fetcher.clone());

    let start = Instant::now();
    let report = poller
        .wait_until_ready(&ArtifactId::new("a"), Duration::from_secs(600))
        .await
        .unwrap();

    assert_eq!(start.elapsed(), Duration::from_secs(10));
    assert_eq!(report.category, HealthCategory::Healthy);
    assert_eq!(report.title, "GM a");
}

#[tokio::test(start_paused = true)]
async fn test_poller_rejects_failed_layers_after_ready() {
    let fetcher = Arc::new(
        InMemoryFetcher::default().with_script("a", vec![Ok(healthy().with_failed_layers(1))]),
    );
    let poller = ReadinessPoller::new(fetcher.clone());

    let err = poller
        .wait_until_ready(&ArtifactId::new("a"), Duration::from_secs(60))
        .await
        .unwrap_err();

    assert!(matches!(err, ReadinessError::FailedLayers { count: 1, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_poller_backs_off_on_transport_error() {
    let fetcher = Arc::new(InMemoryFetcher::default().with_script(
        "a",
        vec![Err(FetchError::network("connection reset")), Ok(healthy())],
    ));
    let poller = ReadinessPoller::new(fetcher.clone());

    let start = Instant::now();
    let outcome = poller
        .poll(&ArtifactId::new("a"), Duration::from_secs(600))
        .await;

    assert!(outcome.is_ready());
    assert_eq!(start.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_poll_outcome_keeps_last_report() {
    let fetcher = Arc::new(
        InMemoryFetcher::default().with_script("a", vec![Ok(RawStatus::new("Activating"))]),
    );
    let poller = ReadinessPoller::new(fetcher.clone());

    let outcome = poller
        .poll(&ArtifactId::new("a"), Duration::from_secs(20))
        .await;

    match outcome {
        PollOutcome::Failed {
            reason,
            last_report,
        } => {
            assert!(reason.contains("not ready after 20 seconds"));
            let last = last_report.unwrap();
            assert_eq!(last.category, HealthCategory::Offline);
            assert_eq!(last.raw_status, "Activating");
        }
        PollOutcome::Ready(_) => panic!("expected failure"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_reload_sequential_stops_at_first_failure() {
    let fetcher = Arc::new(
        InMemoryFetcher::default()
            .with_script("a", vec![Ok(healthy())])
            .with_script("b", vec![Ok(healthy().with_dirty_layers(3))])
            .with_script("c", vec![Ok(healthy())]),
    );
    let controller = Arc::new(RecordingController::default());
    let coordinator =
        ReloadCoordinator::new(controller.clone(), ReadinessPoller::new(fetcher.clone()));

    let plan: Vec<ReloadTarget> = ["a", "b", "c"]
        .iter()
        .map(|id| ReloadTarget {
            uri: ArtifactId::new(*id),
            timeout: Duration::from_secs(120),
        })
        .collect();

    let err = coordinator.reload_sequential(&plan).await.unwrap_err();

    assert!(matches!(
        err,
        ReloadError::Readiness(ReadinessError::DirtyLayers { count: 3, .. })
    ));
    assert_eq!(*controller.reloaded.lock().unwrap(), vec!["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_reports_in_input_order() {
    let fetcher = Arc::new(
        InMemoryFetcher::default()
            .with_script("x", vec![Ok(healthy())])
            .with_script("y", vec![Err(FetchError::network("timed out"))]),
    );
    let monitor = ContinuousMonitor::new(
        fetcher.clone(),
        MonitorConfig {
            interval: Duration::from_secs(30),
            duration: Some(Duration::from_secs(30)),
        },
    );
    let seen = Mutex::new(Vec::new());
    let observer = |report: &StatusReport| -> Result<(), ObserverError> {
        seen.lock()
            .unwrap()
            .push((report.id.to_string(), report.category));
        Ok(())
    };

    let summary = monitor
        .run(&ids(&["x", "y"]), &observer, &CancellationToken::new())
        .await;

    assert_eq!(summary.iterations, 2);
    assert_eq!(summary.exit, MonitorExit::DurationReached);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ("x".to_string(), HealthCategory::Healthy),
            ("y".to_string(), HealthCategory::Unknown),
            ("x".to_string(), HealthCategory::Healthy),
            ("y".to_string(), HealthCategory::Unknown),
        ]
    );
    assert_eq!(fetcher.calls_of("status"), vec!["x", "y", "x", "y"]);
}
