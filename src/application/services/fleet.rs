//! Fleet service
//!
//! Operator-facing vehicle management: registering vehicles, docking
//! them into slots, the maintenance toggle and proximity search.

use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::application::gateway::{DeviceCommand, SharedDeviceGateway};
use crate::domain::{
    pricing, DomainError, DomainResult, GeoPosition, LedColor, Vehicle, VehicleClass,
    VehicleStatus,
};
use crate::infrastructure::SharedEntityStore;

/// Default proximity search radius in kilometers.
const DEFAULT_SEARCH_RADIUS_KM: f64 = 1.0;

pub struct FleetService {
    store: SharedEntityStore,
    gateway: SharedDeviceGateway,
}

impl FleetService {
    pub fn new(store: SharedEntityStore, gateway: SharedDeviceGateway) -> Self {
        Self { store, gateway }
    }

    /// Register a vehicle at its home lot. The vehicle starts
    /// Available but undocked; `place_in_slot` assigns a bay.
    pub async fn create_vehicle(
        &self,
        class: VehicleClass,
        model: &str,
        rate_per_minute: Option<Decimal>,
        home_lot_id: &str,
    ) -> DomainResult<Vehicle> {
        let lot = self
            .store
            .get_lot(home_lot_id)
            .await?
            .ok_or_else(|| DomainError::not_found("ParkingLot", home_lot_id))?;

        let rate = rate_per_minute.unwrap_or_else(|| pricing::default_rate(class));
        let mut vehicle = Vehicle::new(
            Uuid::new_v4().to_string(),
            class,
            model,
            rate,
            lot.position,
        );
        vehicle.home_lot_id = Some(lot.id.clone());

        self.store.create_vehicle(vehicle.clone()).await?;
        info!(
            vehicle_id = %vehicle.id,
            class = class.as_str(),
            lot_id = %lot.id,
            "vehicle registered"
        );
        Ok(vehicle)
    }

    pub async fn get_vehicle(&self, id: &str) -> DomainResult<Vehicle> {
        self.store
            .get_vehicle(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Vehicle", id))
    }

    pub async fn list_vehicles(
        &self,
        status: Option<VehicleStatus>,
        lot_id: Option<&str>,
    ) -> DomainResult<Vec<Vehicle>> {
        let vehicles = self.store.list_vehicles().await?;
        Ok(vehicles
            .into_iter()
            .filter(|v| status.map_or(true, |s| v.status == s))
            .filter(|v| lot_id.map_or(true, |l| v.home_lot_id.as_deref() == Some(l)))
            .collect())
    }

    /// Remove a vehicle from the fleet and free the slot it was
    /// docked in. Vehicles on a ride cannot be deleted.
    pub async fn delete_vehicle(&self, id: &str) -> DomainResult<()> {
        let vehicle = self.get_vehicle(id).await?;
        self.store.delete_vehicle(id).await?;

        if let Some(slot_id) = vehicle.slot_id {
            let slot = self.store.release_slot(&slot_id).await?;
            super::send_best_effort(
                &self.gateway,
                &slot.id,
                DeviceCommand::SetLedColor(LedColor::for_status(slot.status)),
                "slot led after vehicle removal",
            )
            .await;
        }

        info!(vehicle_id = id, "vehicle removed from fleet");
        Ok(())
    }

    /// Toggle the maintenance flag. Entering maintenance is allowed
    /// from Available and LowBattery; a vehicle on a ride stays put.
    pub async fn set_maintenance(&self, id: &str, enabled: bool) -> DomainResult<Vehicle> {
        let vehicle = self.get_vehicle(id).await?;

        if enabled {
            match vehicle.status {
                VehicleStatus::Maintenance => {}
                VehicleStatus::InUse => {
                    return Err(DomainError::StateConflict(format!(
                        "vehicle {id} is on a ride and cannot enter maintenance"
                    )))
                }
                observed => {
                    self.store
                        .compare_and_swap_vehicle_status(id, observed, VehicleStatus::Maintenance)
                        .await?;
                    info!(vehicle_id = id, "vehicle entered maintenance");
                }
            }
        } else if vehicle.status == VehicleStatus::Maintenance {
            self.store
                .compare_and_swap_vehicle_status(
                    id,
                    VehicleStatus::Maintenance,
                    VehicleStatus::Available,
                )
                .await?;
            info!(vehicle_id = id, "vehicle left maintenance");
        }

        self.get_vehicle(id).await
    }

    /// Dock an idle vehicle into a specific free slot.
    pub async fn place_in_slot(&self, vehicle_id: &str, slot_id: &str) -> DomainResult<Vehicle> {
        let vehicle = self.get_vehicle(vehicle_id).await?;
        if vehicle.status == VehicleStatus::InUse {
            return Err(DomainError::StateConflict(format!(
                "vehicle {vehicle_id} is on a ride"
            )));
        }
        if let Some(current) = &vehicle.slot_id {
            return Err(DomainError::Validation(format!(
                "vehicle {vehicle_id} is already docked in slot {current}"
            )));
        }

        let slot = self
            .store
            .get_slot(slot_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Slot", slot_id))?;
        let lot = self
            .store
            .get_lot(&slot.lot_id)
            .await?
            .ok_or_else(|| DomainError::not_found("ParkingLot", &slot.lot_id))?;

        self.store.claim_slot(slot_id, vehicle_id).await?;
        self.store
            .dock_vehicle(vehicle_id, slot_id, &lot.id, lot.position)
            .await?;
        super::send_best_effort(
            &self.gateway,
            slot_id,
            DeviceCommand::SetLedColor(LedColor::Red),
            "slot led after docking",
        )
        .await;

        info!(vehicle_id, slot_id, lot_id = %lot.id, "vehicle docked");
        self.get_vehicle(vehicle_id).await
    }

    /// Available vehicles within `radius_km` of a point, closest
    /// first, with the distance in kilometers.
    pub async fn nearby_vehicles(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: Option<f64>,
    ) -> DomainResult<Vec<(Vehicle, f64)>> {
        let origin = GeoPosition::new(latitude, longitude);
        let radius = radius_km.unwrap_or(DEFAULT_SEARCH_RADIUS_KM);

        let mut hits: Vec<(Vehicle, f64)> = self
            .store
            .list_vehicles()
            .await?
            .into_iter()
            .filter(|v| v.is_available())
            .map(|v| {
                let distance = origin.distance_km(&v.position);
                (v, distance)
            })
            .filter(|(_, distance)| *distance <= radius)
            .collect();
        hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(hits)
    }
}

// ── Tests ──────────────────────────────────────────────────────
