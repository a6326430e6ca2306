//! Rider account and loyalty DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::application::services::RiderStats;
use crate::domain::{Rider, Voucher};

/// Request to credit a rider balance
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TopUpRequest {
    /// Amount to credit; must be positive
    pub amount: Decimal,
}

/// Request to convert loyalty points into a voucher
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ConvertPointsRequest {
    /// Points to burn; a positive multiple of 100
    pub points: i32,
}

/// Rider account
#[derive(Debug, Serialize, ToSchema)]
pub struct RiderDto {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Monetary balance; may be negative after a ride debit
    pub balance: Decimal,
    pub eco_points: i32,
    /// Active or Suspended
    pub status: String,
    pub registered_at: DateTime<Utc>,
}

impl RiderDto {
    pub fn from_domain(rider: Rider) -> Self {
        Self {
            id: rider.id,
            name: rider.name,
            email: rider.email,
            balance: rider.balance,
            eco_points: rider.eco_points,
            status: rider.status.as_str().to_string(),
            registered_at: rider.registered_at,
        }
    }
}

/// Issued loyalty voucher
#[derive(Debug, Serialize, ToSchema)]
pub struct VoucherDto {
    pub id: String,
    pub rider_id: String,
    pub value: Decimal,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Valid, Redeemed or Expired
    pub status: String,
}

impl VoucherDto {
    pub fn from_domain(voucher: Voucher) -> Self {
        Self {
            id: voucher.id,
            rider_id: voucher.rider_id,
            value: voucher.value,
            issued_at: voucher.issued_at,
            expires_at: voucher.expires_at,
            status: voucher.status.as_str().to_string(),
        }
    }
}

/// Usage totals over completed rides
#[derive(Debug, Serialize, ToSchema)]
pub struct RiderStatsDto {
    pub total_rides: usize,
    pub total_minutes: f64,
    pub total_spend: Decimal,
    pub points_earned: i32,
}

impl RiderStatsDto {
    pub fn from_domain(stats: RiderStats) -> Self {
        Self {
            total_rides: stats.total_rides,
            total_minutes: stats.total_minutes,
            total_spend: stats.total_spend,
            points_earned: stats.points_earned,
        }
    }
}
