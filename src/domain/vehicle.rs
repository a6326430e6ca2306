//! Vehicle entity and geo position

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::pricing;

/// Battery percentage at or below which a vehicle is flagged LowBattery
pub const LOW_BATTERY_THRESHOLD: u8 = 20;

/// WGS84 coordinate pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance in kilometers (haversine).
    pub fn distance_km(&self, other: &GeoPosition) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0;
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lng = (other.longitude - self.longitude).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.latitude.to_radians().cos()
                * other.latitude.to_radians().cos()
                * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

/// Vehicle class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleClass {
    /// Pedal-powered, no battery, earns loyalty points
    Muscle,
    /// Electric bicycle
    Electric,
    /// Electric scooter
    Scooter,
}

impl VehicleClass {
    /// Muscle vehicles carry no battery pack.
    pub fn has_battery(&self) -> bool {
        !matches!(self, Self::Muscle)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Muscle => "Muscle",
            Self::Electric => "Electric",
            Self::Scooter => "Scooter",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Muscle" => Some(Self::Muscle),
            "Electric" => Some(Self::Electric),
            "Scooter" => Some(Self::Scooter),
            _ => None,
        }
    }
}

/// Vehicle status state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleStatus {
    /// Parked and rentable
    Available,
    /// On an active ride
    InUse,
    /// Taken out of service by an operator
    Maintenance,
    /// Battery at or below the threshold; not rentable
    LowBattery,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::InUse => "InUse",
            Self::Maintenance => "Maintenance",
            Self::LowBattery => "LowBattery",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Available" => Some(Self::Available),
            "InUse" => Some(Self::InUse),
            "Maintenance" => Some(Self::Maintenance),
            "LowBattery" => Some(Self::LowBattery),
            _ => None,
        }
    }
}

/// Shared vehicle
#[derive(Debug, Clone)]
pub struct Vehicle {
    /// Unique vehicle ID; doubles as the device ID on the gateway
    pub id: String,
    /// Vehicle class
    pub class: VehicleClass,
    /// Model label
    pub model: String,
    /// Current status
    pub status: VehicleStatus,
    /// Battery percentage; None for Muscle class
    pub battery_percent: Option<u8>,
    /// Per-minute rate; zero means "use the class fallback rate"
    pub rate_per_minute: Decimal,
    /// Last reported position
    pub position: GeoPosition,
    /// Slot the vehicle is docked in, if any
    pub slot_id: Option<String>,
    /// Lot the vehicle currently belongs to, if any
    pub home_lot_id: Option<String>,
    /// When the vehicle was registered
    pub created_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn new(
        id: impl Into<String>,
        class: VehicleClass,
        model: impl Into<String>,
        rate_per_minute: Decimal,
        position: GeoPosition,
    ) -> Self {
        Self {
            id: id.into(),
            class,
            model: model.into(),
            status: VehicleStatus::Available,
            battery_percent: class.has_battery().then_some(100),
            rate_per_minute,
            position,
            slot_id: None,
            home_lot_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == VehicleStatus::Available
    }

    /// Rate used for billing: the vehicle's own rate when set,
    /// otherwise the pinned class fallback.
    pub fn billing_rate(&self) -> Decimal {
        if self.rate_per_minute > Decimal::ZERO {
            self.rate_per_minute
        } else {
            pricing::default_rate(self.class)
        }
    }

    /// Whether the latest battery reading puts the vehicle at or
    /// below the low-battery threshold.
    pub fn battery_is_low(&self) -> bool {
        matches!(self.battery_percent, Some(pct) if pct <= LOW_BATTERY_THRESHOLD)
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_vehicle(class: VehicleClass) -> Vehicle {
        Vehicle::new(
            "VH-1",
            class,
            "Test Model",
            Decimal::new(25, 2),
            GeoPosition::new(41.3111, 69.2797),
        )
    }

    #[test]
    fn muscle_vehicle_has_no_battery() {
        let vehicle = sample_vehicle(VehicleClass::Muscle);
        assert_eq!(vehicle.battery_percent, None);
        assert!(!VehicleClass::Muscle.has_battery());
    }

    #[test]
    fn powered_vehicle_starts_at_full_battery() {
        let vehicle = sample_vehicle(VehicleClass::Scooter);
        assert_eq!(vehicle.battery_percent, Some(100));
        assert!(vehicle.is_available());
    }

    #[test]
    fn billing_rate_prefers_own_rate() {
        let vehicle = sample_vehicle(VehicleClass::Electric);
        assert_eq!(vehicle.billing_rate(), Decimal::new(25, 2));
    }

    #[test]
    fn billing_rate_falls_back_to_class_table() {
        let mut vehicle = sample_vehicle(VehicleClass::Electric);
        vehicle.rate_per_minute = Decimal::ZERO;
        assert_eq!(vehicle.billing_rate(), pricing::default_rate(VehicleClass::Electric));
    }

    #[test]
    fn battery_threshold_is_inclusive() {
        let mut vehicle = sample_vehicle(VehicleClass::Electric);
        vehicle.battery_percent = Some(20);
        assert!(vehicle.battery_is_low());
        vehicle.battery_percent = Some(21);
        assert!(!vehicle.battery_is_low());
    }

    #[test]
    fn haversine_distance_tashkent_samarkand() {
        let tashkent = GeoPosition::new(41.2995, 69.2401);
        let samarkand = GeoPosition::new(39.6542, 66.9597);
        let d = tashkent.distance_km(&samarkand);
        assert!((260.0..280.0).contains(&d), "got {d}");
    }

    #[test]
    fn haversine_distance_zero_for_same_point() {
        let p = GeoPosition::new(41.3111, 69.2797);
        assert!(p.distance_km(&p) < 1e-9);
    }
}
