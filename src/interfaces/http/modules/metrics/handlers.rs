//! Prometheus scrape endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Exposition format expected by Prometheus scrapers.
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Clone)]
pub struct MetricsState {
    pub prometheus: PrometheusHandle,
}

/// `GET /metrics` — renders everything the recorder has accumulated.
pub async fn prometheus_metrics(State(state): State<MetricsState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", PROMETHEUS_CONTENT_TYPE)],
        state.prometheus.render(),
    )
}

// ── Tests ──────────────────────────────────────────────────────
