//! Parking service
//!
//! Lot registration with slot seeding, availability counts,
//! proximity search and the slot maintenance toggle.

use tracing::info;
use uuid::Uuid;

use crate::application::gateway::{DeviceCommand, SharedDeviceGateway};
use crate::domain::{
    DomainError, DomainResult, GeoPosition, LedColor, ParkingLot, Slot, SlotStatus,
};
use crate::infrastructure::SharedEntityStore;

/// Default proximity search radius in kilometers.
const DEFAULT_SEARCH_RADIUS_KM: f64 = 2.0;

/// Per-lot slot counts broken down by status.
#[derive(Debug, Clone)]
pub struct LotAvailability {
    pub lot_id: String,
    pub capacity: u32,
    pub free: usize,
    pub occupied: usize,
    pub maintenance: usize,
}

pub struct ParkingService {
    store: SharedEntityStore,
    gateway: SharedDeviceGateway,
}

impl ParkingService {
    pub fn new(store: SharedEntityStore, gateway: SharedDeviceGateway) -> Self {
        Self { store, gateway }
    }

    /// Create a lot and seed its slots, numbered 1..=capacity. Slot
    /// IDs double as LED controller device IDs on the gateway.
    pub async fn create_lot(
        &self,
        name: &str,
        address: &str,
        latitude: f64,
        longitude: f64,
        capacity: u32,
    ) -> DomainResult<ParkingLot> {
        let lot = ParkingLot::new(
            Uuid::new_v4().to_string(),
            name,
            address,
            GeoPosition::new(latitude, longitude),
            capacity,
        );
        self.store.create_lot(lot.clone()).await?;
        for number in 1..=capacity {
            let slot = Slot::new(format!("{}-S{number}", lot.id), &lot.id, number);
            self.store.create_slot(slot).await?;
        }
        info!(lot_id = %lot.id, name, capacity, "parking lot created");
        Ok(lot)
    }

    pub async fn get_lot(&self, id: &str) -> DomainResult<(ParkingLot, Vec<Slot>)> {
        let lot = self
            .store
            .get_lot(id)
            .await?
            .ok_or_else(|| DomainError::not_found("ParkingLot", id))?;
        let slots = self.store.slots_in_lot(id).await?;
        Ok((lot, slots))
    }

    pub async fn list_lots(&self) -> DomainResult<Vec<ParkingLot>> {
        self.store.list_lots().await
    }

    pub async fn lot_availability(&self, id: &str) -> DomainResult<LotAvailability> {
        let (lot, slots) = self.get_lot(id).await?;
        let count = |status: SlotStatus| slots.iter().filter(|s| s.status == status).count();
        Ok(LotAvailability {
            lot_id: lot.id,
            capacity: lot.capacity,
            free: count(SlotStatus::Free),
            occupied: count(SlotStatus::Occupied),
            maintenance: count(SlotStatus::Maintenance),
        })
    }

    /// Lots within `radius_km` of a point, closest first, with the
    /// distance in kilometers.
    pub async fn nearby_lots(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: Option<f64>,
    ) -> DomainResult<Vec<(ParkingLot, f64)>> {
        let origin = GeoPosition::new(latitude, longitude);
        let radius = radius_km.unwrap_or(DEFAULT_SEARCH_RADIUS_KM);

        let mut hits: Vec<(ParkingLot, f64)> = self
            .store
            .list_lots()
            .await?
            .into_iter()
            .map(|lot| {
                let distance = origin.distance_km(&lot.position);
                (lot, distance)
            })
            .filter(|(_, distance)| *distance <= radius)
            .collect();
        hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(hits)
    }

    /// Toggle a slot's maintenance flag and re-render its LED.
    /// Occupied slots cannot be toggled.
    pub async fn set_slot_maintenance(&self, slot_id: &str, enabled: bool) -> DomainResult<Slot> {
        let slot = self.store.set_slot_maintenance(slot_id, enabled).await?;
        super::send_best_effort(
            &self.gateway,
            &slot.id,
            DeviceCommand::SetLedColor(LedColor::for_status(slot.status)),
            "slot led after maintenance toggle",
        )
        .await;
        info!(slot_id, enabled, "slot maintenance toggled");
        Ok(slot)
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::application::gateway::testing::RecordingGateway;
    use crate::infrastructure::{EntityStore, InMemoryStore};

    struct Fixture {
        store: Arc<InMemoryStore>,
        gateway: Arc<RecordingGateway>,
        service: ParkingService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(RecordingGateway::default());
        let service = ParkingService::new(store.clone(), gateway.clone());
        Fixture {
            store,
            gateway,
            service,
        }
    }

    #[tokio::test]
    async fn create_seeds_numbered_slots() {
        let fx = fixture();
        let lot = fx
            .service
            .create_lot("Central", "1 Main St", 41.3111, 69.2797, 3)
            .await
            .unwrap();

        let (fetched, slots) = fx.service.get_lot(&lot.id).await.unwrap();
        assert_eq!(fetched.capacity, 3);
        assert_eq!(slots.len(), 3);
        for (i, slot) in slots.iter().enumerate() {
            assert_eq!(slot.number, (i + 1) as u32);
            assert_eq!(slot.id, format!("{}-S{}", lot.id, i + 1));
            assert_eq!(slot.status, SlotStatus::Free);
        }
    }

    #[tokio::test]
    async fn availability_counts_by_status() {
        let fx = fixture();
        let lot = fx
            .service
            .create_lot("Central", "1 Main St", 41.3111, 69.2797, 3)
            .await
            .unwrap();
        fx.store
            .claim_slot(&format!("{}-S1", lot.id), "VH-1")
            .await
            .unwrap();
        fx.service
            .set_slot_maintenance(&format!("{}-S2", lot.id), true)
            .await
            .unwrap();

        let availability = fx.service.lot_availability(&lot.id).await.unwrap();
        assert_eq!(availability.capacity, 3);
        assert_eq!(availability.free, 1);
        assert_eq!(availability.occupied, 1);
        assert_eq!(availability.maintenance, 1);
    }

    #[tokio::test]
    async fn availability_for_unknown_lot_is_not_found() {
        let fx = fixture();
        let err = fx.service.lot_availability("LOT-404").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn nearby_sorts_by_distance_within_radius() {
        let fx = fixture();
        let close = fx
            .service
            .create_lot("Close", "2 Main St", 41.3150, 69.2797, 1)
            .await
            .unwrap();
        let closest = fx
            .service
            .create_lot("Closest", "1 Main St", 41.3112, 69.2797, 1)
            .await
            .unwrap();
        fx.service
            .create_lot("Far", "99 Ring Rd", 41.50, 69.50, 1)
            .await
            .unwrap();

        let hits = fx.service.nearby_lots(41.3111, 69.2797, None).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|(lot, _)| lot.id.as_str()).collect();
        assert_eq!(ids, vec![closest.id.as_str(), close.id.as_str()]);
    }

    #[tokio::test]
    async fn slot_maintenance_toggle_rerenders_led() {
        let fx = fixture();
        let lot = fx
            .service
            .create_lot("Central", "1 Main St", 41.3111, 69.2797, 1)
            .await
            .unwrap();
        let slot_id = format!("{}-S1", lot.id);

        let slot = fx.service.set_slot_maintenance(&slot_id, true).await.unwrap();
        assert_eq!(slot.status, SlotStatus::Maintenance);
        assert_eq!(slot.led_color, LedColor::Yellow);

        let slot = fx.service.set_slot_maintenance(&slot_id, false).await.unwrap();
        assert_eq!(slot.status, SlotStatus::Free);
        assert_eq!(slot.led_color, LedColor::Green);

        assert_eq!(
            fx.gateway.actions_for(&slot_id),
            vec!["SetLedColor", "SetLedColor"]
        );
    }

    #[tokio::test]
    async fn occupied_slot_cannot_enter_maintenance() {
        let fx = fixture();
        let lot = fx
            .service
            .create_lot("Central", "1 Main St", 41.3111, 69.2797, 1)
            .await
            .unwrap();
        let slot_id = format!("{}-S1", lot.id);
        fx.store.claim_slot(&slot_id, "VH-1").await.unwrap();

        let err = fx
            .service
            .set_slot_maintenance(&slot_id, true)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::StateConflict(_)));
        assert!(fx.gateway.sent().is_empty());
    }
}
