//! Notification events
//!
//! Everything the service tells the outside world about: ride
//! lifecycle, battery alerts, slot occupancy, device connectivity.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Event types for notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// A ride was started
    RideStarted(RideStartedEvent),
    /// A ride completed and was billed
    RideCompleted(RideCompletedEvent),
    /// A ride was cancelled, nothing billed
    RideCancelled(RideCancelledEvent),
    /// A vehicle reported battery at or below the threshold
    LowBattery(LowBatteryEvent),
    /// A slot changed occupancy
    SlotOccupancyChanged(SlotOccupancyChangedEvent),
    /// A device connected to the gateway
    DeviceConnected(DeviceConnectedEvent),
    /// A device disconnected from the gateway
    DeviceDisconnected(DeviceDisconnectedEvent),
}

impl Event {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::RideStarted(_) => "ride_started",
            Event::RideCompleted(_) => "ride_completed",
            Event::RideCancelled(_) => "ride_cancelled",
            Event::LowBattery(_) => "low_battery",
            Event::SlotOccupancyChanged(_) => "slot_occupancy_changed",
            Event::DeviceConnected(_) => "device_connected",
            Event::DeviceDisconnected(_) => "device_disconnected",
        }
    }

    /// The entity the event is about (vehicle, slot or device ID).
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            Event::RideStarted(e) => Some(&e.vehicle_id),
            Event::RideCompleted(e) => Some(&e.vehicle_id),
            Event::RideCancelled(e) => Some(&e.vehicle_id),
            Event::LowBattery(e) => Some(&e.vehicle_id),
            Event::SlotOccupancyChanged(e) => Some(&e.slot_id),
            Event::DeviceConnected(e) => Some(&e.device_id),
            Event::DeviceDisconnected(e) => Some(&e.device_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideStartedEvent {
    pub ride_id: String,
    pub rider_id: String,
    pub vehicle_id: String,
    pub origin_lot_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideCompletedEvent {
    pub ride_id: String,
    pub rider_id: String,
    pub vehicle_id: String,
    pub destination_lot_id: String,
    pub cost: Decimal,
    pub eco_points: i32,
    pub duration_minutes: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideCancelledEvent {
    pub ride_id: String,
    pub rider_id: String,
    pub vehicle_id: String,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowBatteryEvent {
    pub vehicle_id: String,
    pub percentage: u8,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotOccupancyChangedEvent {
    pub slot_id: String,
    pub lot_id: String,
    pub occupied: bool,
    pub vehicle_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConnectedEvent {
    pub device_id: String,
    pub remote_addr: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDisconnectedEvent {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Envelope with a unique ID and publish timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

impl EventMessage {
    pub fn new(event: Event) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = Event::LowBattery(LowBatteryEvent {
            vehicle_id: "VH-1".into(),
            percentage: 18,
            timestamp: Utc::now(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "LowBattery");
        assert_eq!(json["data"]["vehicle_id"], "VH-1");
        assert_eq!(json["data"]["percentage"], 18);
    }

    #[test]
    fn entity_id_points_at_the_subject() {
        let event = Event::SlotOccupancyChanged(SlotOccupancyChangedEvent {
            slot_id: "SL-3".into(),
            lot_id: "LOT-1".into(),
            occupied: true,
            vehicle_id: Some("VH-1".into()),
            timestamp: Utc::now(),
        });
        assert_eq!(event.entity_id(), Some("SL-3"));
        assert_eq!(event.event_type(), "slot_occupancy_changed");
    }
}
