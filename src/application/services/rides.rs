//! Ride lifecycle orchestration
//!
//! Keeps vehicle state, slot state and rider balance consistent across
//! StartRide, EndRide and CancelRide without a distributed transaction.
//! The rules that hold it together:
//!
//! - Unlock gates ride creation: no ride record exists for a vehicle
//!   that never physically opened.
//! - Lock gates billing: money never moves for a vehicle that is still
//!   unlocked.
//! - Store mutations on the ride path go through conditional updates,
//!   so concurrent requests race on the store, not on a lock.
//! - After a successful Unlock, any later failure rolls back with a
//!   Lock command and a status revert before the error is returned.

use chrono::Utc;
use metrics::counter;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::events::{
    Event, RideCancelledEvent, RideCompletedEvent, RideStartedEvent, SharedEventBus,
};
use crate::application::gateway::{DeviceCommand, SharedDeviceGateway};
use crate::domain::{pricing, DomainError, DomainResult, LedColor, Ride, Slot, VehicleStatus};
use crate::infrastructure::SharedEntityStore;

/// How many destination-slot candidates one EndRide will race for
/// before giving up.
const SLOT_CLAIM_ATTEMPTS: usize = 3;

/// Orchestrates the ride lifecycle across store and gateway.
pub struct RideService {
    store: SharedEntityStore,
    gateway: SharedDeviceGateway,
    events: SharedEventBus,
}

impl RideService {
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

    /// Start a ride: validate, unlock the vehicle, claim it, free its
    /// slot, create the ride record.
    pub async fn start_ride(&self, rider_id: &str, vehicle_id: &str) -> DomainResult<Ride> {
        let rider = self
            .store
            .get_rider(rider_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Rider", rider_id))?;

        if !rider.is_active() {
            return Err(DomainError::Validation(format!(
                "rider {rider_id} account is suspended"
            )));
        }

        if let Some(active) = self.store.active_ride_for_rider(rider_id).await? {
            return Err(DomainError::ActiveRideExists {
                rider_id: rider_id.to_string(),
                ride_id: active.id,
            });
        }

        let minimum = pricing::min_balance_to_start();
        if rider.balance < minimum {
            return Err(DomainError::InsufficientBalance {
                required: minimum,
                available: rider.balance,
            });
        }

        let vehicle = self
            .store
            .get_vehicle(vehicle_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Vehicle", vehicle_id))?;

        if !vehicle.is_available() {
            return Err(DomainError::VehicleNotAvailable(vehicle_id.to_string()));
        }

        // The ride ID travels with the Unlock command so the device can
        // attribute the opening to a ride.
        let ride_id = Uuid::new_v4().to_string();

        self.gateway
            .send_command(
                vehicle_id,
                DeviceCommand::Unlock {
                    ride_id: ride_id.clone(),
                },
            )
            .await
            .map_err(|err| DomainError::ActuationFailed {
                device_id: vehicle_id.to_string(),
                reason: err.to_string(),
            })?;

        // Claim the vehicle. Losing here means another request took it
        // between our availability read and now; re-lock and report it
        // as plain unavailability.
        if let Err(err) = self
            .store
            .compare_and_swap_vehicle_status(
                vehicle_id,
                VehicleStatus::Available,
                VehicleStatus::InUse,
            )
            .await
        {
            self.send_best_effort(vehicle_id, DeviceCommand::Lock, "relock after lost claim")
                .await;
            return Err(match err {
                DomainError::StateConflict(_) => {
                    DomainError::VehicleNotAvailable(vehicle_id.to_string())
                }
                other => other,
            });
        }

        if let Some(slot_id) = vehicle.slot_id.as_deref() {
            if let Err(err) = self.free_origin_slot(vehicle_id, slot_id).await {
                self.rollback_started_vehicle(vehicle_id).await;
                return Err(err);
            }
        }

        let ride = Ride::new(ride_id, rider_id, vehicle_id, vehicle.home_lot_id.clone());
        if let Err(err) = self.store.create_ride(ride.clone()).await {
            // Lost the single-active-ride race against another ride of
            // the same rider. The freed origin slot stays free; the
            // vehicle goes back to Available, locked.
            self.rollback_started_vehicle(vehicle_id).await;
            return Err(err);
        }

        counter!("mobility_rides_started_total").increment(1);
        info!(ride_id = %ride.id, rider_id, vehicle_id, "ride started");

        self.events.publish(Event::RideStarted(RideStartedEvent {
            ride_id: ride.id.clone(),
            rider_id: ride.rider_id.clone(),
            vehicle_id: ride.vehicle_id.clone(),
            origin_lot_id: ride.origin_lot_id.clone(),
            timestamp: ride.started_at,
        }));

        Ok(ride)
    }

    /// End a ride: lock the vehicle, bill the rider, dock the vehicle
    /// into a claimed slot in the destination lot.
    pub async fn end_ride(&self, ride_id: &str, destination_lot_id: &str) -> DomainResult<Ride> {
        let ride = self
            .store
            .get_ride(ride_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Ride", ride_id))?;

        if !ride.is_in_progress() {
            return Err(DomainError::StateConflict(format!(
                "ride {ride_id} is {}",
                ride.status.as_str()
            )));
        }

        let vehicle = self
            .store
            .get_vehicle(&ride.vehicle_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Vehicle", ride.vehicle_id.clone()))?;

        self.store
            .get_rider(&ride.rider_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Rider", ride.rider_id.clone()))?;

        let lot = self
            .store
            .get_lot(destination_lot_id)
            .await?
            .ok_or_else(|| DomainError::not_found("ParkingLot", destination_lot_id))?;

        // Cheap precondition before any physical command: a full lot
        // must not leave the vehicle locked mid-ride.
        if self
            .store
            .free_slots_in_lot(destination_lot_id)
            .await?
            .is_empty()
        {
            return Err(DomainError::NoFreeSlot(destination_lot_id.to_string()));
        }

        self.gateway
            .send_command(&ride.vehicle_id, DeviceCommand::Lock)
            .await
            .map_err(|err| DomainError::ActuationFailed {
                device_id: ride.vehicle_id.clone(),
                reason: err.to_string(),
            })?;

        let now = Utc::now();
        let elapsed = ride.elapsed(now);
        let cost = pricing::ride_cost(elapsed, vehicle.billing_rate())?;
        let points = pricing::eco_points(elapsed, vehicle.class)?;

        let slot = match self
            .claim_destination_slot(destination_lot_id, &ride.vehicle_id)
            .await?
        {
            Some(slot) => slot,
            None => {
                // Every candidate was taken while we were locking. The
                // vehicle must reopen; the ride keeps running.
                self.send_best_effort(
                    &ride.vehicle_id,
                    DeviceCommand::Unlock {
                        ride_id: ride.id.clone(),
                    },
                    "reopen after lost slot race",
                )
                .await;
                return Err(DomainError::NoFreeSlot(destination_lot_id.to_string()));
            }
        };

        if let Err(err) = self
            .store
            .compare_and_swap_vehicle_status(
                &ride.vehicle_id,
                VehicleStatus::InUse,
                VehicleStatus::Available,
            )
            .await
        {
            // The vehicle left InUse underneath us (operator action).
            // Hand the slot back; the vehicle stays locked where it is.
            if let Err(release_err) = self.store.release_slot(&slot.id).await {
                warn!(
                    slot_id = %slot.id,
                    error = %release_err,
                    "failed to release slot after vehicle status conflict"
                );
            }
            return Err(err);
        }

        self.store
            .dock_vehicle(&ride.vehicle_id, &slot.id, destination_lot_id, lot.position)
            .await?;

        // Money moves only now, after the lock and both status
        // transitions have committed.
        self.store
            .adjust_rider_balance(&ride.rider_id, -cost)
            .await?;
        if points > 0 {
            self.store.add_rider_points(&ride.rider_id, points).await?;
        }

        self.send_best_effort(
            &slot.id,
            DeviceCommand::SetLedColor(LedColor::Red),
            "destination slot led",
        )
        .await;

        let mut completed = ride;
        completed.complete(destination_lot_id, now, cost, points);
        self.store.finish_ride(completed.clone()).await?;

        counter!("mobility_rides_completed_total").increment(1);
        info!(
            ride_id,
            vehicle_id = %completed.vehicle_id,
            slot_id = %slot.id,
            cost = %completed.cost,
            points = completed.eco_points,
            "ride completed"
        );

        self.events
            .publish(Event::RideCompleted(RideCompletedEvent {
                ride_id: completed.id.clone(),
                rider_id: completed.rider_id.clone(),
                vehicle_id: completed.vehicle_id.clone(),
                destination_lot_id: destination_lot_id.to_string(),
                cost: completed.cost,
                eco_points: completed.eco_points,
                duration_minutes: completed.duration_minutes(),
                timestamp: now,
            }));

        Ok(completed)
    }

    /// Cancel a ride: nothing is billed and the cancellation always
    /// completes, even when the lock command or the status swap fails.
    pub async fn cancel_ride(&self, ride_id: &str, reason: Option<&str>) -> DomainResult<Ride> {
        let ride = self
            .store
            .get_ride(ride_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Ride", ride_id))?;

        if !ride.is_in_progress() {
            return Err(DomainError::StateConflict(format!(
                "ride {ride_id} is {}",
                ride.status.as_str()
            )));
        }

        if let Err(err) = self
            .gateway
            .send_command(&ride.vehicle_id, DeviceCommand::Lock)
            .await
        {
            warn!(
                vehicle_id = %ride.vehicle_id,
                error = %err,
                "lock failed during cancellation, continuing"
            );
        }

        if let Err(err) = self
            .store
            .compare_and_swap_vehicle_status(
                &ride.vehicle_id,
                VehicleStatus::InUse,
                VehicleStatus::Available,
            )
            .await
        {
            warn!(
                vehicle_id = %ride.vehicle_id,
                error = %err,
                "vehicle status conflict during cancellation, continuing"
            );
        }

        let now = Utc::now();
        let mut cancelled = ride;
        cancelled.cancel(now);
        self.store.finish_ride(cancelled.clone()).await?;

        counter!("mobility_rides_cancelled_total").increment(1);
        info!(
            ride_id,
            vehicle_id = %cancelled.vehicle_id,
            reason = reason.unwrap_or("none given"),
            "ride cancelled"
        );

        self.events
            .publish(Event::RideCancelled(RideCancelledEvent {
                ride_id: cancelled.id.clone(),
                rider_id: cancelled.rider_id.clone(),
                vehicle_id: cancelled.vehicle_id.clone(),
                reason: reason.map(String::from),
                timestamp: now,
            }));

        Ok(cancelled)
    }

    pub async fn get_ride(&self, ride_id: &str) -> DomainResult<Ride> {
        self.store
            .get_ride(ride_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Ride", ride_id))
    }

    pub async fn active_ride(&self, rider_id: &str) -> DomainResult<Option<Ride>> {
        self.store.active_ride_for_rider(rider_id).await
    }

    pub async fn ride_history(&self, rider_id: &str) -> DomainResult<Vec<Ride>> {
        self.store.rides_for_rider(rider_id).await
    }

    // ── Internals ──────────────────────────────────────────────

    /// Free the slot the vehicle leaves behind and turn its LED green.
    async fn free_origin_slot(&self, vehicle_id: &str, slot_id: &str) -> DomainResult<()> {
        self.store.release_slot(slot_id).await?;
        self.store.detach_vehicle_from_slot(vehicle_id).await?;
        self.send_best_effort(
            slot_id,
            DeviceCommand::SetLedColor(LedColor::Green),
            "origin slot led",
        )
        .await;
        Ok(())
    }

    /// Claim the lowest-numbered free slot, retrying against concurrent
    /// claimers with a fresh candidate each attempt.
    async fn claim_destination_slot(
        &self,
        lot_id: &str,
        vehicle_id: &str,
    ) -> DomainResult<Option<Slot>> {
        for attempt in 1..=SLOT_CLAIM_ATTEMPTS {
            let candidates = self.store.free_slots_in_lot(lot_id).await?;
            let Some(candidate) = candidates.into_iter().next() else {
                return Ok(None);
            };
            match self.store.claim_slot(&candidate.id, vehicle_id).await {
                Ok(slot) => return Ok(Some(slot)),
                Err(DomainError::StateConflict(_)) => {
                    debug!(
                        slot_id = %candidate.id,
                        attempt,
                        "slot claim lost, trying next candidate"
                    );
                }
                Err(other) => return Err(other),
            }
        }
        Ok(None)
    }

    /// Undo a committed vehicle claim: status back to Available, then a
    /// Lock so the vehicle does not sit open and rentable.
    async fn rollback_started_vehicle(&self, vehicle_id: &str) {
        if let Err(err) = self
            .store
            .compare_and_swap_vehicle_status(
                vehicle_id,
                VehicleStatus::InUse,
                VehicleStatus::Available,
            )
            .await
        {
            warn!(vehicle_id, error = %err, "failed to revert vehicle claim");
        }
        self.send_best_effort(vehicle_id, DeviceCommand::Lock, "relock after failed start")
            .await;
    }

    async fn send_best_effort(&self, device_id: &str, command: DeviceCommand, context: &str) {
        super::send_best_effort(&self.gateway, device_id, command, context).await;
    }
}

// ── Tests ──────────────────────────────────────────────────────
