//! In-memory entity store

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;

use super::EntityStore;
use crate::domain::{
    DomainError, DomainResult, GeoPosition, ParkingLot, Ride, Rider, Slot, SlotStatus, Vehicle,
    VehicleStatus, Voucher,
};

/// DashMap-backed store. Conditional updates take the shard write
/// guard via `get_mut`, so check-and-set is atomic per record.
pub struct InMemoryStore {
    riders: DashMap<String, Rider>,
    vehicles: DashMap<String, Vehicle>,
    lots: DashMap<String, ParkingLot>,
    slots: DashMap<String, Slot>,
    rides: DashMap<String, Ride>,
    vouchers: DashMap<String, Voucher>,
    /// rider id → in-progress ride id; the single-active-ride invariant
    /// lives in this map's insert-if-absent semantics
    active_rides: DashMap<String, String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            riders: DashMap::new(),
            vehicles: DashMap::new(),
            lots: DashMap::new(),
            slots: DashMap::new(),
            rides: DashMap::new(),
            vouchers: DashMap::new(),
            active_rides: DashMap::new(),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn create_rider(&self, rider: Rider) -> DomainResult<()> {
        if self.riders.contains_key(&rider.id) {
            return Err(DomainError::Validation(format!(
                "rider {} already exists",
                rider.id
            )));
        }
        self.riders.insert(rider.id.clone(), rider);
        Ok(())
    }

    async fn get_rider(&self, id: &str) -> DomainResult<Option<Rider>> {
        Ok(self.riders.get(id).map(|r| r.clone()))
    }

    async fn list_riders(&self) -> DomainResult<Vec<Rider>> {
        Ok(self.riders.iter().map(|e| e.value().clone()).collect())
    }

    async fn adjust_rider_balance(&self, id: &str, delta: Decimal) -> DomainResult<Rider> {
        let mut rider = self
            .riders
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found("Rider", id))?;
        rider.balance += delta;
        Ok(rider.clone())
    }

    async fn add_rider_points(&self, id: &str, points: i32) -> DomainResult<Rider> {
        let mut rider = self
            .riders
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found("Rider", id))?;
        rider.eco_points += points;
        Ok(rider.clone())
    }

    async fn deduct_rider_points(&self, id: &str, points: i32) -> DomainResult<Rider> {
        let mut rider = self
            .riders
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found("Rider", id))?;
        if rider.eco_points < points {
            return Err(DomainError::Validation(format!(
                "rider {} holds {} points, asked to deduct {}",
                id, rider.eco_points, points
            )));
        }
        rider.eco_points -= points;
        Ok(rider.clone())
    }

    async fn create_vehicle(&self, vehicle: Vehicle) -> DomainResult<()> {
        if self.vehicles.contains_key(&vehicle.id) {
            return Err(DomainError::Validation(format!(
                "vehicle {} already exists",
                vehicle.id
            )));
        }
        self.vehicles.insert(vehicle.id.clone(), vehicle);
        Ok(())
    }

    async fn get_vehicle(&self, id: &str) -> DomainResult<Option<Vehicle>> {
        Ok(self.vehicles.get(id).map(|v| v.clone()))
    }

    async fn list_vehicles(&self) -> DomainResult<Vec<Vehicle>> {
        Ok(self.vehicles.iter().map(|e| e.value().clone()).collect())
    }

    async fn delete_vehicle(&self, id: &str) -> DomainResult<()> {
        if self
            .vehicles
            .remove_if(id, |_, v| v.status != VehicleStatus::InUse)
            .is_some()
        {
            return Ok(());
        }
        if self.vehicles.contains_key(id) {
            Err(DomainError::Validation(format!(
                "vehicle {id} is on a ride and cannot be deleted"
            )))
        } else {
            Err(DomainError::not_found("Vehicle", id))
        }
    }

    async fn compare_and_swap_vehicle_status(
        &self,
        id: &str,
        expected: VehicleStatus,
        new: VehicleStatus,
    ) -> DomainResult<()> {
        let mut vehicle = self
            .vehicles
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found("Vehicle", id))?;
        if vehicle.status != expected {
            return Err(DomainError::StateConflict(format!(
                "vehicle {} is {}, expected {}",
                id,
                vehicle.status.as_str(),
                expected.as_str()
            )));
        }
        vehicle.status = new;
        Ok(())
    }

    async fn set_vehicle_battery(&self, id: &str, percent: u8) -> DomainResult<()> {
        let mut vehicle = self
            .vehicles
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found("Vehicle", id))?;
        vehicle.battery_percent = Some(percent.min(100));
        Ok(())
    }

    async fn update_vehicle_position(&self, id: &str, position: GeoPosition) -> DomainResult<()> {
        let mut vehicle = self
            .vehicles
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found("Vehicle", id))?;
        vehicle.position = position;
        Ok(())
    }

    async fn dock_vehicle(
        &self,
        id: &str,
        slot_id: &str,
        lot_id: &str,
        position: GeoPosition,
    ) -> DomainResult<()> {
        let mut vehicle = self
            .vehicles
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found("Vehicle", id))?;
        vehicle.slot_id = Some(slot_id.to_string());
        vehicle.home_lot_id = Some(lot_id.to_string());
        vehicle.position = position;
        Ok(())
    }

    async fn detach_vehicle_from_slot(&self, id: &str) -> DomainResult<()> {
        let mut vehicle = self
            .vehicles
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found("Vehicle", id))?;
        vehicle.slot_id = None;
        Ok(())
    }

    async fn create_lot(&self, lot: ParkingLot) -> DomainResult<()> {
        if self.lots.contains_key(&lot.id) {
            return Err(DomainError::Validation(format!(
                "lot {} already exists",
                lot.id
            )));
        }
        self.lots.insert(lot.id.clone(), lot);
        Ok(())
    }

    async fn get_lot(&self, id: &str) -> DomainResult<Option<ParkingLot>> {
        Ok(self.lots.get(id).map(|l| l.clone()))
    }

    async fn list_lots(&self) -> DomainResult<Vec<ParkingLot>> {
        Ok(self.lots.iter().map(|e| e.value().clone()).collect())
    }

    async fn create_slot(&self, slot: Slot) -> DomainResult<()> {
        if self.slots.contains_key(&slot.id) {
            return Err(DomainError::Validation(format!(
                "slot {} already exists",
                slot.id
            )));
        }
        self.slots.insert(slot.id.clone(), slot);
        Ok(())
    }

    async fn get_slot(&self, id: &str) -> DomainResult<Option<Slot>> {
        Ok(self.slots.get(id).map(|s| s.clone()))
    }

    async fn slots_in_lot(&self, lot_id: &str) -> DomainResult<Vec<Slot>> {
        let mut slots: Vec<Slot> = self
            .slots
            .iter()
            .filter(|e| e.value().lot_id == lot_id)
            .map(|e| e.value().clone())
            .collect();
        slots.sort_by_key(|s| s.number);
        Ok(slots)
    }

    async fn free_slots_in_lot(&self, lot_id: &str) -> DomainResult<Vec<Slot>> {
        let mut slots: Vec<Slot> = self
            .slots
            .iter()
            .filter(|e| e.value().lot_id == lot_id && e.value().is_free())
            .map(|e| e.value().clone())
            .collect();
        slots.sort_by_key(|s| s.number);
        Ok(slots)
    }

    async fn claim_slot(&self, slot_id: &str, vehicle_id: &str) -> DomainResult<Slot> {
        let mut slot = self
            .slots
            .get_mut(slot_id)
            .ok_or_else(|| DomainError::not_found("Slot", slot_id))?;
        if !slot.is_free() {
            return Err(DomainError::StateConflict(format!(
                "slot {} is {}, expected Free",
                slot_id,
                slot.status.as_str()
            )));
        }
        slot.mark_occupied(vehicle_id);
        Ok(slot.clone())
    }

    async fn release_slot(&self, slot_id: &str) -> DomainResult<Slot> {
        let mut slot = self
            .slots
            .get_mut(slot_id)
            .ok_or_else(|| DomainError::not_found("Slot", slot_id))?;
        match slot.status {
            SlotStatus::Occupied => {
                slot.mark_free();
                Ok(slot.clone())
            }
            SlotStatus::Free => Ok(slot.clone()),
            SlotStatus::Maintenance => Err(DomainError::StateConflict(format!(
                "slot {slot_id} is under maintenance"
            ))),
        }
    }

    async fn set_slot_occupancy(
        &self,
        slot_id: &str,
        vehicle_id: Option<String>,
    ) -> DomainResult<Slot> {
        let mut slot = self
            .slots
            .get_mut(slot_id)
            .ok_or_else(|| DomainError::not_found("Slot", slot_id))?;
        match vehicle_id {
            Some(vehicle_id) => slot.mark_occupied(vehicle_id),
            None => slot.mark_free(),
        }
        Ok(slot.clone())
    }

    async fn set_slot_maintenance(&self, slot_id: &str, enabled: bool) -> DomainResult<Slot> {
        let mut slot = self
            .slots
            .get_mut(slot_id)
            .ok_or_else(|| DomainError::not_found("Slot", slot_id))?;
        if slot.status == SlotStatus::Occupied {
            return Err(DomainError::StateConflict(format!(
                "slot {slot_id} is occupied"
            )));
        }
        if enabled {
            slot.mark_maintenance();
        } else if slot.status == SlotStatus::Maintenance {
            slot.mark_free();
        }
        Ok(slot.clone())
    }

    async fn create_ride(&self, ride: Ride) -> DomainResult<()> {
        match self.active_rides.entry(ride.rider_id.clone()) {
            Entry::Occupied(entry) => Err(DomainError::ActiveRideExists {
                rider_id: ride.rider_id.clone(),
                ride_id: entry.get().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(ride.id.clone());
                self.rides.insert(ride.id.clone(), ride);
                Ok(())
            }
        }
    }

    async fn get_ride(&self, id: &str) -> DomainResult<Option<Ride>> {
        Ok(self.rides.get(id).map(|r| r.clone()))
    }

    async fn finish_ride(&self, ride: Ride) -> DomainResult<()> {
        if !self.rides.contains_key(&ride.id) {
            return Err(DomainError::not_found("Ride", ride.id));
        }
        self.active_rides
            .remove_if(&ride.rider_id, |_, active| active == &ride.id);
        self.rides.insert(ride.id.clone(), ride);
        Ok(())
    }

    async fn update_ride(&self, ride: Ride) -> DomainResult<()> {
        if !self.rides.contains_key(&ride.id) {
            return Err(DomainError::not_found("Ride", ride.id));
        }
        self.rides.insert(ride.id.clone(), ride);
        Ok(())
    }

    async fn active_ride_for_rider(&self, rider_id: &str) -> DomainResult<Option<Ride>> {
        let ride_id = match self.active_rides.get(rider_id) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };
        Ok(self.rides.get(&ride_id).map(|r| r.clone()))
    }

    async fn rides_for_rider(&self, rider_id: &str) -> DomainResult<Vec<Ride>> {
        let mut rides: Vec<Ride> = self
            .rides
            .iter()
            .filter(|e| e.value().rider_id == rider_id)
            .map(|e| e.value().clone())
            .collect();
        rides.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(rides)
    }

    async fn count_active_rides(&self) -> DomainResult<usize> {
        Ok(self.active_rides.len())
    }

    async fn create_voucher(&self, voucher: Voucher) -> DomainResult<()> {
        self.vouchers.insert(voucher.id.clone(), voucher);
        Ok(())
    }

    async fn vouchers_for_rider(&self, rider_id: &str) -> DomainResult<Vec<Voucher>> {
        let mut vouchers: Vec<Voucher> = self
            .vouchers
            .iter()
            .filter(|e| e.value().rider_id == rider_id)
            .map(|e| e.value().clone())
            .collect();
        vouchers.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(vouchers)
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VehicleClass;

    fn sample_vehicle(id: &str) -> Vehicle {
        Vehicle::new(
            id,
            VehicleClass::Electric,
            "CityBike E1",
            Decimal::new(10, 2),
            GeoPosition::new(41.31, 69.28),
        )
    }

    fn sample_rider(id: &str) -> Rider {
        Rider::new(id, "Test Rider", "rider@example.com", Decimal::new(1000, 2))
    }

    #[tokio::test]
    async fn cas_vehicle_status_rejects_wrong_expected_state() {
        let store = InMemoryStore::new();
        store.create_vehicle(sample_vehicle("VH-1")).await.unwrap();

        store
            .compare_and_swap_vehicle_status("VH-1", VehicleStatus::Available, VehicleStatus::InUse)
            .await
            .unwrap();

        let err = store
            .compare_and_swap_vehicle_status("VH-1", VehicleStatus::Available, VehicleStatus::InUse)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::StateConflict(_)));

        let vehicle = store.get_vehicle("VH-1").await.unwrap().unwrap();
        assert_eq!(vehicle.status, VehicleStatus::InUse);
    }

    #[tokio::test]
    async fn claim_slot_rejects_non_free() {
        let store = InMemoryStore::new();
        store.create_slot(Slot::new("SL-1", "LOT-1", 1)).await.unwrap();

        store.claim_slot("SL-1", "VH-1").await.unwrap();
        let err = store.claim_slot("SL-1", "VH-2").await.unwrap_err();
        assert!(matches!(err, DomainError::StateConflict(_)));

        let slot = store.get_slot("SL-1").await.unwrap().unwrap();
        assert_eq!(slot.vehicle_id.as_deref(), Some("VH-1"));
    }

    #[tokio::test]
    async fn release_slot_is_idempotent_on_free() {
        let store = InMemoryStore::new();
        store.create_slot(Slot::new("SL-1", "LOT-1", 1)).await.unwrap();

        store.claim_slot("SL-1", "VH-1").await.unwrap();
        store.release_slot("SL-1").await.unwrap();
        let slot = store.release_slot("SL-1").await.unwrap();
        assert!(slot.is_free());
        assert!(slot.vehicle_id.is_none());
    }

    #[tokio::test]
    async fn release_slot_fails_on_maintenance() {
        let store = InMemoryStore::new();
        store.create_slot(Slot::new("SL-1", "LOT-1", 1)).await.unwrap();
        store.set_slot_maintenance("SL-1", true).await.unwrap();

        let err = store.release_slot("SL-1").await.unwrap_err();
        assert!(matches!(err, DomainError::StateConflict(_)));
    }

    #[tokio::test]
    async fn second_in_progress_ride_is_rejected_per_rider() {
        let store = InMemoryStore::new();
        store
            .create_ride(Ride::new("RI-1", "RD-1", "VH-1", None))
            .await
            .unwrap();

        let err = store
            .create_ride(Ride::new("RI-2", "RD-1", "VH-2", None))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ActiveRideExists { .. }));

        // different rider is unaffected
        store
            .create_ride(Ride::new("RI-3", "RD-2", "VH-2", None))
            .await
            .unwrap();
        assert_eq!(store.count_active_rides().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn finish_ride_releases_the_active_key() {
        let store = InMemoryStore::new();
        let mut ride = Ride::new("RI-1", "RD-1", "VH-1", None);
        store.create_ride(ride.clone()).await.unwrap();

        ride.cancel(chrono::Utc::now());
        store.finish_ride(ride).await.unwrap();
        assert!(store.active_ride_for_rider("RD-1").await.unwrap().is_none());

        // rider can start again
        store
            .create_ride(Ride::new("RI-2", "RD-1", "VH-1", None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn free_slots_come_back_in_sequence_order() {
        let store = InMemoryStore::new();
        for number in [4u32, 1, 3, 2] {
            store
                .create_slot(Slot::new(format!("SL-{number}"), "LOT-1", number))
                .await
                .unwrap();
        }
        store.claim_slot("SL-1", "VH-1").await.unwrap();

        let free = store.free_slots_in_lot("LOT-1").await.unwrap();
        let numbers: Vec<u32> = free.iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn delete_vehicle_is_blocked_while_in_use() {
        let store = InMemoryStore::new();
        store.create_vehicle(sample_vehicle("VH-1")).await.unwrap();
        store
            .compare_and_swap_vehicle_status("VH-1", VehicleStatus::Available, VehicleStatus::InUse)
            .await
            .unwrap();

        let err = store.delete_vehicle("VH-1").await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        store
            .compare_and_swap_vehicle_status("VH-1", VehicleStatus::InUse, VehicleStatus::Available)
            .await
            .unwrap();
        store.delete_vehicle("VH-1").await.unwrap();
        assert!(store.get_vehicle("VH-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deduct_points_requires_sufficient_balance() {
        let store = InMemoryStore::new();
        store.create_rider(sample_rider("RD-1")).await.unwrap();
        store.add_rider_points("RD-1", 150).await.unwrap();

        let err = store.deduct_rider_points("RD-1", 200).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let rider = store.deduct_rider_points("RD-1", 100).await.unwrap();
        assert_eq!(rider.eco_points, 50);
    }

    #[tokio::test]
    async fn balance_adjustment_may_go_negative() {
        let store = InMemoryStore::new();
        store.create_rider(sample_rider("RD-1")).await.unwrap();

        let rider = store
            .adjust_rider_balance("RD-1", Decimal::new(-1500, 2))
            .await
            .unwrap();
        assert_eq!(rider.balance, Decimal::new(-500, 2));
    }

    #[tokio::test]
    async fn ride_history_is_newest_first() {
        let store = InMemoryStore::new();
        let mut first = Ride::new("RI-1", "RD-1", "VH-1", None);
        first.started_at = chrono::Utc::now() - chrono::Duration::hours(2);
        first.cancel(chrono::Utc::now() - chrono::Duration::hours(1));
        store.rides.insert(first.id.clone(), first);

        let second = Ride::new("RI-2", "RD-1", "VH-2", None);
        store.create_ride(second).await.unwrap();

        let history = store.rides_for_rider("RD-1").await.unwrap();
        let ids: Vec<&str> = history.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["RI-2", "RI-1"]);
    }
}
