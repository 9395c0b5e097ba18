//! HTTP handler for the Graphmart Health Agent
//!
//! Read-only report surface: liveness, an on-demand aggregate report over
//! the configured artifacts, and Prometheus metrics.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::contracts::*;
use crate::engine::HealthAggregator;
use crate::telemetry::HealthMetrics;
use crate::{AGENT_ID, AGENT_VERSION};

/// Application state
pub struct AppState {
    pub aggregator: HealthAggregator,
    pub graphmarts: Vec<ArtifactId>,
    pub metrics: Arc<HealthMetrics>,
}

impl AppState {
    pub fn new(
        aggregator: HealthAggregator,
        graphmarts: Vec<ArtifactId>,
        metrics: Arc<HealthMetrics>,
    ) -> Self {
        Self {
            aggregator,
            graphmarts,
            metrics,
        }
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/report", get(aggregate_report))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        agent_id: AGENT_ID.to_string(),
        agent_version: AGENT_VERSION.to_string(),
    })
}

/// Aggregate report over the configured graphmarts
async fn aggregate_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<AggregateReport>, (StatusCode, Json<ApiError>)> {
    if state.graphmarts.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError {
                error: "InvalidInput".to_string(),
                message: "No graphmarts configured".to_string(),
            }),
        ));
    }

    let report = state
        .aggregator
        .aggregate(&state.graphmarts, query.aux.unwrap_or(false))
        .await;

    tracing::info!(
        request_id = %report.request_id,
        overall_healthy = report.overall_healthy,
        "Aggregate report served"
    );
    Ok(Json(report))
}

/// Prometheus scrape endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode_text() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::warn!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Query parameters for `/api/v1/report`
#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    /// Include search-index, AnzoGraph and authentication checks
    pub aux: Option<bool>,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub agent_id: String,
    pub agent_version: String,
}

/// API error
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
}
