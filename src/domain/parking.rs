//! Parking lot and slot entities

use chrono::{DateTime, Utc};

use crate::domain::vehicle::GeoPosition;

/// Slot status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    /// Empty and claimable
    Free,
    /// Holds a docked vehicle
    Occupied,
    /// Taken out of service by an operator
    Maintenance,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Occupied => "Occupied",
            Self::Maintenance => "Maintenance",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Free" => Some(Self::Free),
            "Occupied" => Some(Self::Occupied),
            "Maintenance" => Some(Self::Maintenance),
            _ => None,
        }
    }
}

/// Slot LED indicator color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedColor {
    Green,
    Red,
    Yellow,
    Blue,
}

impl LedColor {
    /// LED color is a pure function of slot status.
    pub fn for_status(status: SlotStatus) -> Self {
        match status {
            SlotStatus::Free => Self::Green,
            SlotStatus::Occupied => Self::Red,
            SlotStatus::Maintenance => Self::Yellow,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "Green",
            Self::Red => "Red",
            Self::Yellow => "Yellow",
            Self::Blue => "Blue",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Green" => Some(Self::Green),
            "Red" => Some(Self::Red),
            "Yellow" => Some(Self::Yellow),
            "Blue" => Some(Self::Blue),
            _ => None,
        }
    }
}

/// Parking lot; owns its slots, static once created
#[derive(Debug, Clone)]
pub struct ParkingLot {
    /// Unique lot ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Street address
    pub address: String,
    /// Geo position
    pub position: GeoPosition,
    /// Number of slots seeded at creation
    pub capacity: u32,
    /// When the lot was created
    pub created_at: DateTime<Utc>,
}

impl ParkingLot {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
        position: GeoPosition,
        capacity: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            position,
            capacity,
            created_at: Utc::now(),
        }
    }
}

/// Single vehicle-sized bay with an LED indicator.
/// Invariant: Occupied ⇔ vehicle_id is set.
#[derive(Debug, Clone)]
pub struct Slot {
    /// Unique slot ID; doubles as the LED controller device ID
    pub id: String,
    /// Owning lot
    pub lot_id: String,
    /// Sequence number within the lot, 1-based
    pub number: u32,
    /// Slot status
    pub status: SlotStatus,
    /// Docked vehicle, set exactly when Occupied
    pub vehicle_id: Option<String>,
    /// Stored LED color, always `LedColor::for_status(status)`
    pub led_color: LedColor,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Slot {
    pub fn new(id: impl Into<String>, lot_id: impl Into<String>, number: u32) -> Self {
        Self {
            id: id.into(),
            lot_id: lot_id.into(),
            number,
            status: SlotStatus::Free,
            vehicle_id: None,
            led_color: LedColor::Green,
            updated_at: Utc::now(),
        }
    }

    pub fn is_free(&self) -> bool {
        self.status == SlotStatus::Free
    }

    pub fn mark_occupied(&mut self, vehicle_id: impl Into<String>) {
        self.status = SlotStatus::Occupied;
        self.vehicle_id = Some(vehicle_id.into());
        self.led_color = LedColor::for_status(self.status);
        self.updated_at = Utc::now();
    }

    pub fn mark_free(&mut self) {
        self.status = SlotStatus::Free;
        self.vehicle_id = None;
        self.led_color = LedColor::for_status(self.status);
        self.updated_at = Utc::now();
    }

    pub fn mark_maintenance(&mut self) {
        self.status = SlotStatus::Maintenance;
        self.vehicle_id = None;
        self.led_color = LedColor::for_status(self.status);
        self.updated_at = Utc::now();
    }
}

// ── Tests ──────────────────────────────────────────────────────
