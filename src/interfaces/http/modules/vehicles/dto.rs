//! Vehicle API DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::domain::Vehicle;

/// Request to register a vehicle
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateVehicleRequest {
    /// Vehicle class: Muscle, Electric or Scooter
    #[validate(length(min = 1, max = 16))]
    pub class: String,
    /// Model label
    #[validate(length(min = 1, max = 64))]
    pub model: String,
    /// Per-minute rate; omitted means the class fallback rate
    pub rate_per_minute: Option<Decimal>,
    /// Home lot the vehicle is registered at
    #[validate(length(min = 1, max = 64))]
    pub home_lot_id: String,
}

/// Request to toggle the maintenance flag
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetMaintenanceRequest {
    pub enabled: bool,
}

/// Request to dock a vehicle into a specific slot
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DockVehicleRequest {
    #[validate(length(min = 1, max = 64))]
    pub slot_id: String,
}

/// List filter for vehicles
#[derive(Debug, Deserialize, IntoParams)]
pub struct VehicleListQuery {
    /// Filter by status: Available, InUse, Maintenance, LowBattery
    pub status: Option<String>,
    /// Filter by home lot
    pub lot_id: Option<String>,
}

/// Proximity search parameters
#[derive(Debug, Deserialize, IntoParams)]
pub struct NearbyQuery {
    pub latitude: f64,
    pub longitude: f64,
    /// Search radius in kilometers
    pub radius_km: Option<f64>,
}

/// Vehicle returned by all vehicle endpoints
#[derive(Debug, Serialize, ToSchema)]
pub struct VehicleDto {
    pub id: String,
    /// Muscle, Electric or Scooter
    pub class: String,
    pub model: String,
    /// Available, InUse, Maintenance or LowBattery
    pub status: String,
    /// Battery percentage; null for muscle vehicles
    pub battery_percent: Option<u8>,
    pub rate_per_minute: Decimal,
    pub latitude: f64,
    pub longitude: f64,
    /// Slot the vehicle is docked in, if any
    pub slot_id: Option<String>,
    pub home_lot_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl VehicleDto {
    pub fn from_domain(vehicle: Vehicle) -> Self {
        Self {
            id: vehicle.id,
            class: vehicle.class.as_str().to_string(),
            model: vehicle.model,
            status: vehicle.status.as_str().to_string(),
            battery_percent: vehicle.battery_percent,
            rate_per_minute: vehicle.rate_per_minute,
            latitude: vehicle.position.latitude,
            longitude: vehicle.position.longitude,
            slot_id: vehicle.slot_id,
            home_lot_id: vehicle.home_lot_id,
            created_at: vehicle.created_at,
        }
    }
}

/// Vehicle with its distance from the searched point
#[derive(Debug, Serialize, ToSchema)]
pub struct NearbyVehicleDto {
    pub vehicle: VehicleDto,
    /// Distance in kilometers, rounded to meters
    pub distance_km: f64,
}

impl NearbyVehicleDto {
    pub fn from_domain(vehicle: Vehicle, distance_km: f64) -> Self {
        Self {
            vehicle: VehicleDto::from_domain(vehicle),
            distance_km: (distance_km * 1000.0).round() / 1000.0,
        }
    }
}
