//! Liveness endpoint.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::application::gateway::SharedDeviceRegistry;

#[derive(Clone)]
pub struct HealthState {
    pub registry: SharedDeviceRegistry,
    pub started_at: Arc<Instant>,
}

/// Service liveness snapshot. With an in-memory store there is no
/// backing component to degrade on, so the status is always "ok" while
/// the process answers.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub connected_devices: u32,
}

impl HealthResponse {
    fn snapshot(state: &HealthState) -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.started_at.elapsed().as_secs(),
            connected_devices: state.registry.connection_count() as u32,
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse::snapshot(&state))
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::gateway::create_device_registry;

    #[test]
    fn snapshot_reports_crate_version_and_device_count() {
        let state = HealthState {
            registry: create_device_registry(),
            started_at: Arc::new(Instant::now()),
        };
        let snapshot = HealthResponse::snapshot(&state);
        assert_eq!(snapshot.status, "ok");
        assert_eq!(snapshot.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(snapshot.connected_devices, 0);
    }
}
