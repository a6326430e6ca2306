//! Telemetry reactor
//!
//! Applies inbound battery, position and occupancy reports to the
//! store and re-renders slot LEDs. Reports are facts from the field:
//! they are applied without plausibility checks, and each one is
//! handled independently of the others.

use metrics::counter;
use tracing::{debug, info};

use crate::application::events::{
    Event, LowBatteryEvent, SharedEventBus, SlotOccupancyChangedEvent,
};
use crate::application::gateway::{DeviceCommand, SharedDeviceGateway};
use crate::domain::{
    DomainError, DomainResult, GeoPosition, LedColor, Slot, SlotStatus, Vehicle, VehicleStatus,
    LOW_BATTERY_THRESHOLD,
};
use crate::infrastructure::SharedEntityStore;

pub struct TelemetryService {
    store: SharedEntityStore,
    gateway: SharedDeviceGateway,
    events: SharedEventBus,
}

impl TelemetryService {
    pub fn new(
        store: SharedEntityStore,
        gateway: SharedDeviceGateway,
        events: SharedEventBus,
    ) -> Self {
        Self {
            store,
            gateway,
            events,
        }
    }

    /// Store a battery reading and move the vehicle across the
    /// low-battery boundary where the state machine allows it:
    /// Available flips to LowBattery at or below the threshold,
    /// LowBattery flips back to Available above it. Other statuses
    /// keep the reading but never change state here.
    pub async fn on_battery_report(
        &self,
        vehicle_id: &str,
        percentage: u8,
    ) -> DomainResult<Vehicle> {
        let vehicle = self
            .store
            .get_vehicle(vehicle_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Vehicle", vehicle_id))?;

        if !vehicle.class.has_battery() {
            debug!(vehicle_id, "battery report for unpowered vehicle ignored");
            return Ok(vehicle);
        }

        counter!("mobility_telemetry_events_total", "kind" => "battery").increment(1);

        let was_low = vehicle.battery_is_low() || vehicle.status == VehicleStatus::LowBattery;
        self.store.set_vehicle_battery(vehicle_id, percentage).await?;

        if percentage <= LOW_BATTERY_THRESHOLD {
            if vehicle.status == VehicleStatus::Available {
                if let Err(err) = self
                    .store
                    .compare_and_swap_vehicle_status(
                        vehicle_id,
                        VehicleStatus::Available,
                        VehicleStatus::LowBattery,
                    )
                    .await
                {
                    debug!(vehicle_id, error = %err, "vehicle moved before low-battery flag applied");
                }
            }
            if !was_low {
                info!(vehicle_id, percentage, "battery low");
                self.events.publish(Event::LowBattery(LowBatteryEvent {
                    vehicle_id: vehicle_id.to_string(),
                    percentage,
                    timestamp: chrono::Utc::now(),
                }));
            }
        } else if vehicle.status == VehicleStatus::LowBattery {
            if let Err(err) = self
                .store
                .compare_and_swap_vehicle_status(
                    vehicle_id,
                    VehicleStatus::LowBattery,
                    VehicleStatus::Available,
                )
                .await
            {
                debug!(vehicle_id, error = %err, "vehicle moved before low-battery flag cleared");
            } else {
                info!(vehicle_id, percentage, "battery recovered");
            }
        }

        self.store
            .get_vehicle(vehicle_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Vehicle", vehicle_id))
    }

    /// Overwrite the vehicle position with the reported fix.
    pub async fn on_position_report(
        &self,
        vehicle_id: &str,
        latitude: f64,
        longitude: f64,
    ) -> DomainResult<()> {
        self.store
            .update_vehicle_position(vehicle_id, GeoPosition::new(latitude, longitude))
            .await?;
        counter!("mobility_telemetry_events_total", "kind" => "position").increment(1);
        Ok(())
    }

    /// Reconcile a slot with its occupancy sensor. A report matching
    /// the stored state is a no-op; a change re-renders the LED.
    pub async fn on_slot_occupancy_report(
        &self,
        slot_id: &str,
        occupied: bool,
        vehicle_id: Option<&str>,
    ) -> DomainResult<Slot> {
        let slot = self
            .store
            .get_slot(slot_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Slot", slot_id))?;

        counter!("mobility_telemetry_events_total", "kind" => "occupancy").increment(1);

        if occupied {
            if slot.status == SlotStatus::Occupied {
                if slot.vehicle_id.as_deref() != vehicle_id {
                    debug!(
                        slot_id,
                        stored = slot.vehicle_id.as_deref().unwrap_or("-"),
                        reported = vehicle_id.unwrap_or("-"),
                        "occupied report names a different vehicle, keeping stored one"
                    );
                }
                return Ok(slot);
            }
            let Some(vehicle_id) = vehicle_id else {
                return Err(DomainError::Validation(format!(
                    "occupied report for slot {slot_id} names no vehicle"
                )));
            };
            let updated = self
                .store
                .set_slot_occupancy(slot_id, Some(vehicle_id.to_string()))
                .await?;
            info!(slot_id, vehicle_id, "slot reported occupied");
            self.render_led(&updated).await;
            self.publish_occupancy(&updated);
            Ok(updated)
        } else {
            if slot.status == SlotStatus::Free {
                return Ok(slot);
            }
            let updated = self.store.set_slot_occupancy(slot_id, None).await?;
            info!(slot_id, "slot reported free");
            self.render_led(&updated).await;
            self.publish_occupancy(&updated);
            Ok(updated)
        }
    }

    async fn render_led(&self, slot: &Slot) {
        super::send_best_effort(
            &self.gateway,
            &slot.id,
            DeviceCommand::SetLedColor(LedColor::for_status(slot.status)),
            "occupancy led",
        )
        .await;
    }

    fn publish_occupancy(&self, slot: &Slot) {
        self.events
            .publish(Event::SlotOccupancyChanged(SlotOccupancyChangedEvent {
                slot_id: slot.id.clone(),
                lot_id: slot.lot_id.clone(),
                occupied: slot.status == SlotStatus::Occupied,
                vehicle_id: slot.vehicle_id.clone(),
                timestamp: slot.updated_at,
            }));
    }
}

// ── Tests ──────────────────────────────────────────────────────
