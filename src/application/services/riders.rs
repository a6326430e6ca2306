//! Rider account service
//!
//! Account lookups, balance top-ups and usage statistics. Riders are
//! seeded by an operator; there is no self-service registration.

use rust_decimal::Decimal;
use tracing::info;

use crate::domain::{DomainError, DomainResult, Rider, RideStatus};
use crate::infrastructure::SharedEntityStore;

/// Usage totals derived from a rider's completed rides.
#[derive(Debug, Clone)]
pub struct RiderStats {
    pub total_rides: usize,
    pub total_minutes: f64,
    pub total_spend: Decimal,
    pub points_earned: i32,
}

pub struct RiderService {
    store: SharedEntityStore,
}

impl RiderService {
    pub fn new(store: SharedEntityStore) -> Self {
        Self { store }
    }

    pub async fn get_rider(&self, id: &str) -> DomainResult<Rider> {
        self.store
            .get_rider(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Rider", id))
    }

    /// Credit the balance. Only positive amounts are accepted.
    pub async fn top_up(&self, rider_id: &str, amount: Decimal) -> DomainResult<Rider> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::Validation(format!(
                "top-up amount must be positive, got {amount}"
            )));
        }
        self.get_rider(rider_id).await?;
        let rider = self.store.adjust_rider_balance(rider_id, amount).await?;
        info!(rider_id, amount = %amount, balance = %rider.balance, "balance topped up");
        Ok(rider)
    }

    /// Totals over completed rides. Cancelled rides bill nothing and
    /// are left out.
    pub async fn stats(&self, rider_id: &str) -> DomainResult<RiderStats> {
        self.get_rider(rider_id).await?;
        let rides = self.store.rides_for_rider(rider_id).await?;

        let mut stats = RiderStats {
            total_rides: 0,
            total_minutes: 0.0,
            total_spend: Decimal::ZERO,
            points_earned: 0,
        };
        for ride in rides.iter().filter(|r| r.status == RideStatus::Completed) {
            stats.total_rides += 1;
            stats.total_minutes += ride.duration_minutes();
            stats.total_spend += ride.cost;
            stats.points_earned += ride.eco_points;
        }
        Ok(stats)
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use super::*;
    use crate::domain::Ride;
    use crate::infrastructure::{EntityStore, InMemoryStore};

    struct Fixture {
        store: Arc<InMemoryStore>,
        service: RiderService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let service = RiderService::new(store.clone());
        Fixture { store, service }
    }

    async fn seed_rider(store: &InMemoryStore, id: &str) {
        store
            .create_rider(Rider::new(id, "Aziza", "aziza@example.com", Decimal::new(500, 2)))
            .await
            .unwrap();
    }

    async fn seed_finished_ride(
        store: &InMemoryStore,
        ride_id: &str,
        rider_id: &str,
        minutes: i64,
        cost: Decimal,
        points: i32,
    ) {
        let mut ride = Ride::new(ride_id, rider_id, "VH-1", Some("LOT-1".into()));
        ride.started_at = Utc::now() - Duration::minutes(minutes);
        store.create_ride(ride.clone()).await.unwrap();
        ride.complete("LOT-2", Utc::now(), cost, points);
        store.finish_ride(ride).await.unwrap();
    }

    #[tokio::test]
    async fn top_up_credits_balance() {
        let fx = fixture();
        seed_rider(&fx.store, "RD-1").await;

        let rider = fx
            .service
            .top_up("RD-1", Decimal::new(1050, 2))
            .await
            .unwrap();
        assert_eq!(rider.balance, Decimal::new(1550, 2));
    }

    #[tokio::test]
    async fn top_up_rejects_non_positive_amounts() {
        let fx = fixture();
        seed_rider(&fx.store, "RD-1").await;

        for amount in [Decimal::ZERO, Decimal::new(-100, 2)] {
            let err = fx.service.top_up("RD-1", amount).await.unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }

        let rider = fx.service.get_rider("RD-1").await.unwrap();
        assert_eq!(rider.balance, Decimal::new(500, 2));
    }

    #[tokio::test]
    async fn unknown_rider_is_not_found() {
        let fx = fixture();
        let err = fx.service.get_rider("RD-404").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
        let err = fx
            .service
            .top_up("RD-404", Decimal::ONE)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn stats_sum_completed_rides_only() {
        let fx = fixture();
        seed_rider(&fx.store, "RD-1").await;
        seed_finished_ride(&fx.store, "RI-1", "RD-1", 10, Decimal::new(100, 2), 20).await;
        seed_finished_ride(&fx.store, "RI-2", "RD-1", 5, Decimal::new(75, 2), 0).await;

        // a cancelled ride must not count
        let mut cancelled = Ride::new("RI-3", "RD-1", "VH-1", None);
        fx.store.create_ride(cancelled.clone()).await.unwrap();
        cancelled.cancel(Utc::now());
        fx.store.finish_ride(cancelled).await.unwrap();

        let stats = fx.service.stats("RD-1").await.unwrap();
        assert_eq!(stats.total_rides, 2);
        assert_eq!(stats.total_spend, Decimal::new(175, 2));
        assert_eq!(stats.points_earned, 20);
        assert!(stats.total_minutes > 14.9 && stats.total_minutes < 15.1);
    }

    #[tokio::test]
    async fn stats_for_fresh_rider_are_zero() {
        let fx = fixture();
        seed_rider(&fx.store, "RD-1").await;

        let stats = fx.service.stats("RD-1").await.unwrap();
        assert_eq!(stats.total_rides, 0);
        assert_eq!(stats.total_spend, Decimal::ZERO);
        assert_eq!(stats.points_earned, 0);
        assert_eq!(stats.total_minutes, 0.0);
    }
}
