//! Ride entity and lifecycle

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

/// Ride status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RideStatus {
    /// Vehicle unlocked, rider underway
    InProgress,
    /// Ended normally, billed
    Completed,
    /// Aborted, nothing billed
    Cancelled,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "InProgress",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "InProgress" => Some(Self::InProgress),
            "Completed" => Some(Self::Completed),
            "Cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// One rental session from unlock to lock or cancel.
/// Mutated exactly once after creation, by `complete` or `cancel`.
#[derive(Debug, Clone)]
pub struct Ride {
    /// Unique ride ID
    pub id: String,
    /// Rider who started the ride
    pub rider_id: String,
    /// Vehicle being ridden
    pub vehicle_id: String,
    /// Lot the vehicle left from
    pub origin_lot_id: Option<String>,
    /// Lot the vehicle was returned to
    pub destination_lot_id: Option<String>,
    /// When the ride started
    pub started_at: DateTime<Utc>,
    /// When the ride ended or was cancelled
    pub ended_at: Option<DateTime<Utc>>,
    /// Billed cost, zero until completed
    pub cost: Decimal,
    /// Loyalty points earned, zero until completed
    pub eco_points: i32,
    /// Ride status
    pub status: RideStatus,
}

impl Ride {
    pub fn new(
        id: impl Into<String>,
        rider_id: impl Into<String>,
        vehicle_id: impl Into<String>,
        origin_lot_id: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            rider_id: rider_id.into(),
            vehicle_id: vehicle_id.into(),
            origin_lot_id,
            destination_lot_id: None,
            started_at: Utc::now(),
            ended_at: None,
            cost: Decimal::ZERO,
            eco_points: 0,
            status: RideStatus::InProgress,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == RideStatus::InProgress
    }

    /// Elapsed time against a caller-supplied clock reading.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        now - self.started_at
    }

    /// Minutes between start and end, fractional; zero while in progress.
    pub fn duration_minutes(&self) -> f64 {
        match self.ended_at {
            Some(end) => (end - self.started_at).num_milliseconds() as f64 / 60_000.0,
            None => 0.0,
        }
    }

    pub fn complete(
        &mut self,
        destination_lot_id: impl Into<String>,
        ended_at: DateTime<Utc>,
        cost: Decimal,
        eco_points: i32,
    ) {
        self.destination_lot_id = Some(destination_lot_id.into());
        self.ended_at = Some(ended_at);
        self.cost = cost;
        self.eco_points = eco_points;
        self.status = RideStatus::Completed;
    }

    pub fn cancel(&mut self, ended_at: DateTime<Utc>) {
        self.ended_at = Some(ended_at);
        self.status = RideStatus::Cancelled;
    }
}

// ── Tests ──────────────────────────────────────────────────────
