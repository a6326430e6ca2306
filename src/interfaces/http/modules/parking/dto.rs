//! Parking API DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::application::services::LotAvailability;
use crate::domain::{ParkingLot, Slot};

/// Request to create a parking lot
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateLotRequest {
    /// Display name
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Street address
    #[validate(length(min = 1, max = 200))]
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Number of slots to seed, 1..=500
    #[validate(range(min = 1, max = 500))]
    pub capacity: u32,
}

/// Request to toggle slot maintenance
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SlotMaintenanceRequest {
    pub enabled: bool,
}

/// Parking lot
#[derive(Debug, Serialize, ToSchema)]
pub struct LotDto {
    pub id: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub capacity: u32,
    pub created_at: DateTime<Utc>,
}

impl LotDto {
    pub fn from_domain(lot: ParkingLot) -> Self {
        Self {
            id: lot.id,
            name: lot.name,
            address: lot.address,
            latitude: lot.position.latitude,
            longitude: lot.position.longitude,
            capacity: lot.capacity,
            created_at: lot.created_at,
        }
    }
}

/// Parking slot with its LED state
#[derive(Debug, Serialize, ToSchema)]
pub struct SlotDto {
    pub id: String,
    pub lot_id: String,
    /// Sequence number within the lot, 1-based
    pub number: u32,
    /// Free, Occupied or Maintenance
    pub status: String,
    /// Docked vehicle, set exactly when Occupied
    pub vehicle_id: Option<String>,
    /// Green, Red or Yellow
    pub led_color: String,
    pub updated_at: DateTime<Utc>,
}

impl SlotDto {
    pub fn from_domain(slot: Slot) -> Self {
        Self {
            id: slot.id,
            lot_id: slot.lot_id,
            number: slot.number,
            status: slot.status.as_str().to_string(),
            vehicle_id: slot.vehicle_id,
            led_color: slot.led_color.as_str().to_string(),
            updated_at: slot.updated_at,
        }
    }
}

/// Lot with its full slot listing
#[derive(Debug, Serialize, ToSchema)]
pub struct LotDetailDto {
    pub lot: LotDto,
    pub slots: Vec<SlotDto>,
}

/// Per-lot slot counts broken down by status
#[derive(Debug, Serialize, ToSchema)]
pub struct AvailabilityDto {
    pub lot_id: String,
    pub capacity: u32,
    pub free: usize,
    pub occupied: usize,
    pub maintenance: usize,
}

impl AvailabilityDto {
    pub fn from_domain(availability: LotAvailability) -> Self {
        Self {
            lot_id: availability.lot_id,
            capacity: availability.capacity,
            free: availability.free,
            occupied: availability.occupied,
            maintenance: availability.maintenance,
        }
    }
}

/// Lot with its distance from the searched point
#[derive(Debug, Serialize, ToSchema)]
pub struct NearbyLotDto {
    pub lot: LotDto,
    /// Distance in kilometers, rounded to meters
    pub distance_km: f64,
}

impl NearbyLotDto {
    pub fn from_domain(lot: ParkingLot, distance_km: f64) -> Self {
        Self {
            lot: LotDto::from_domain(lot),
            distance_km: (distance_km * 1000.0).round() / 1000.0,
        }
    }
}
