//! Ride API DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::domain::Ride;

/// Request to start a ride
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct StartRideRequest {
    /// Rider account ID
    #[validate(length(min = 1, max = 64))]
    pub rider_id: String,
    /// Vehicle to unlock
    #[validate(length(min = 1, max = 64))]
    pub vehicle_id: String,
}

/// Request to end a ride at a destination lot
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EndRideRequest {
    /// Lot the vehicle is being returned to
    #[validate(length(min = 1, max = 64))]
    pub destination_lot_id: String,
}

/// Optional cancellation details
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CancelRideRequest {
    /// Free-text reason, recorded in the log
    pub reason: Option<String>,
}

/// Ride summary returned by all ride endpoints
#[derive(Debug, Serialize, ToSchema)]
pub struct RideDto {
    pub id: String,
    pub rider_id: String,
    pub vehicle_id: String,
    pub origin_lot_id: Option<String>,
    pub destination_lot_id: Option<String>,
    /// InProgress, Completed or Cancelled
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Minutes between start and end; zero while in progress
    pub duration_minutes: f64,
    /// Billed cost, zero unless completed
    pub cost: Decimal,
    /// Loyalty points earned, zero unless completed
    pub eco_points: i32,
}

impl RideDto {
    pub fn from_domain(ride: Ride) -> Self {
        let duration_minutes = ride.duration_minutes();
        Self {
            id: ride.id,
            rider_id: ride.rider_id,
            vehicle_id: ride.vehicle_id,
            origin_lot_id: ride.origin_lot_id,
            destination_lot_id: ride.destination_lot_id,
            status: ride.status.as_str().to_string(),
            started_at: ride.started_at,
            ended_at: ride.ended_at,
            duration_minutes,
            cost: ride.cost,
            eco_points: ride.eco_points,
        }
    }
}
