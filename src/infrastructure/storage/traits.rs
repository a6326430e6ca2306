//! Entity store trait definitions

use async_trait::async_trait;

use crate::domain::{
    DomainResult, ParkingLot, Ride, Rider, Slot, Vehicle, VehicleStatus, Voucher,
};
use rust_decimal::Decimal;

/// Keyed record store for all domain entities.
///
/// Status mutations on the ride path go through conditional updates:
/// `compare_and_swap_vehicle_status` and `claim_slot` fail with
/// `StateConflict` when the record left the expected state, which is
/// what makes concurrent ride operations safe without locks.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // Rider operations
    async fn create_rider(&self, rider: Rider) -> DomainResult<()>;
    async fn get_rider(&self, id: &str) -> DomainResult<Option<Rider>>;
    async fn list_riders(&self) -> DomainResult<Vec<Rider>>;
    /// Apply a signed delta to the balance. No floor: ride debits may
    /// push the balance negative.
    async fn adjust_rider_balance(&self, id: &str, delta: Decimal) -> DomainResult<Rider>;
    async fn add_rider_points(&self, id: &str, points: i32) -> DomainResult<Rider>;
    /// Deduct points, failing when the rider holds fewer than asked.
    async fn deduct_rider_points(&self, id: &str, points: i32) -> DomainResult<Rider>;

    // Vehicle operations
    async fn create_vehicle(&self, vehicle: Vehicle) -> DomainResult<()>;
    async fn get_vehicle(&self, id: &str) -> DomainResult<Option<Vehicle>>;
    async fn list_vehicles(&self) -> DomainResult<Vec<Vehicle>>;
    /// Delete a vehicle unless it is on a ride.
    async fn delete_vehicle(&self, id: &str) -> DomainResult<()>;
    /// Transition status only when the stored status equals `expected`.
    async fn compare_and_swap_vehicle_status(
        &self,
        id: &str,
        expected: VehicleStatus,
        new: VehicleStatus,
    ) -> DomainResult<()>;
    async fn set_vehicle_battery(&self, id: &str, percent: u8) -> DomainResult<()>;
    async fn update_vehicle_position(&self, id: &str, position: crate::domain::GeoPosition)
        -> DomainResult<()>;
    /// Park a vehicle: attach slot, lot and position in one write.
    async fn dock_vehicle(
        &self,
        id: &str,
        slot_id: &str,
        lot_id: &str,
        position: crate::domain::GeoPosition,
    ) -> DomainResult<()>;
    async fn detach_vehicle_from_slot(&self, id: &str) -> DomainResult<()>;

    // Parking lot operations
    async fn create_lot(&self, lot: ParkingLot) -> DomainResult<()>;
    async fn get_lot(&self, id: &str) -> DomainResult<Option<ParkingLot>>;
    async fn list_lots(&self) -> DomainResult<Vec<ParkingLot>>;

    // Slot operations
    async fn create_slot(&self, slot: Slot) -> DomainResult<()>;
    async fn get_slot(&self, id: &str) -> DomainResult<Option<Slot>>;
    /// All slots of a lot, ascending sequence number.
    async fn slots_in_lot(&self, lot_id: &str) -> DomainResult<Vec<Slot>>;
    /// Free slots of a lot, ascending sequence number.
    async fn free_slots_in_lot(&self, lot_id: &str) -> DomainResult<Vec<Slot>>;
    /// Claim a specific Free slot for a vehicle (CAS Free→Occupied).
    async fn claim_slot(&self, slot_id: &str, vehicle_id: &str) -> DomainResult<Slot>;
    /// Free a slot. Idempotent when already Free; fails on Maintenance.
    async fn release_slot(&self, slot_id: &str) -> DomainResult<Slot>;
    /// Unconditional occupancy overwrite for sensor reports:
    /// `Some(vehicle)` marks Occupied, `None` marks Free.
    async fn set_slot_occupancy(
        &self,
        slot_id: &str,
        vehicle_id: Option<String>,
    ) -> DomainResult<Slot>;
    /// Toggle Free⇄Maintenance; rejected while Occupied.
    async fn set_slot_maintenance(&self, slot_id: &str, enabled: bool) -> DomainResult<Slot>;

    // Ride operations
    /// Create a ride, reserving the rider's single-active-ride key.
    /// Fails with `ActiveRideExists` when the rider already has one.
    async fn create_ride(&self, ride: Ride) -> DomainResult<()>;
    async fn get_ride(&self, id: &str) -> DomainResult<Option<Ride>>;
    /// Persist a completed or cancelled ride and release the rider's
    /// active-ride key.
    async fn finish_ride(&self, ride: Ride) -> DomainResult<()>;
    /// Used by tests and recovery paths to adjust an in-progress ride
    /// record without touching the active-ride key.
    async fn update_ride(&self, ride: Ride) -> DomainResult<()>;
    async fn active_ride_for_rider(&self, rider_id: &str) -> DomainResult<Option<Ride>>;
    /// Ride history, newest first.
    async fn rides_for_rider(&self, rider_id: &str) -> DomainResult<Vec<Ride>>;
    async fn count_active_rides(&self) -> DomainResult<usize>;

    // Voucher operations
    async fn create_voucher(&self, voucher: Voucher) -> DomainResult<()>;
    async fn vouchers_for_rider(&self, rider_id: &str) -> DomainResult<Vec<Voucher>>;
}
