//! Telemetry ingestion DTOs
//!
//! Mirrors the device-channel telemetry calls for gateway-style
//! integrations that report over HTTP instead of holding a socket.

use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

/// Battery reading
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BatteryReportRequest {
    /// Battery percentage, 0..=100
    #[validate(range(min = 0, max = 100))]
    pub percentage: u8,
}

/// Position fix
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PositionReportRequest {
    pub latitude: f64,
    pub longitude: f64,
}

/// Occupancy sensor reading
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct OccupancyReportRequest {
    pub occupied: bool,
    /// Vehicle seen in the slot; required when occupied
    pub vehicle_id: Option<String>,
}
