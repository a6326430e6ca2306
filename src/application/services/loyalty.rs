//! Loyalty service
//!
//! Converts accumulated loyalty points into monetary vouchers. The
//! voucher value is credited to the rider balance at issue time, so
//! a voucher record is a receipt rather than an outstanding claim.

use tracing::info;
use uuid::Uuid;

use crate::domain::{pricing, DomainError, DomainResult, Voucher};
use crate::infrastructure::SharedEntityStore;

pub struct LoyaltyService {
    store: SharedEntityStore,
}

impl LoyaltyService {
    pub fn new(store: SharedEntityStore) -> Self {
        Self { store }
    }

    /// Convert points into a voucher. Points burn in multiples of one
    /// hundred; the voucher value lands on the balance immediately.
    pub async fn convert_points(&self, rider_id: &str, points: i32) -> DomainResult<Voucher> {
        self.store
            .get_rider(rider_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Rider", rider_id))?;

        if !pricing::can_convert_points(points) {
            return Err(DomainError::Validation(format!(
                "{points} points cannot be converted, conversion takes positive multiples of {}",
                pricing::POINTS_PER_VOUCHER
            )));
        }

        self.store.deduct_rider_points(rider_id, points).await?;

        let voucher = Voucher::new(
            Uuid::new_v4().to_string(),
            rider_id,
            pricing::voucher_value(points),
        );
        self.store.create_voucher(voucher.clone()).await?;
        let rider = self
            .store
            .adjust_rider_balance(rider_id, voucher.value)
            .await?;

        info!(
            rider_id,
            points,
            voucher_id = %voucher.id,
            value = %voucher.value,
            balance = %rider.balance,
            "points converted to voucher"
        );
        Ok(voucher)
    }

    pub async fn list_vouchers(&self, rider_id: &str) -> DomainResult<Vec<Voucher>> {
        self.store
            .get_rider(rider_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Rider", rider_id))?;
        self.store.vouchers_for_rider(rider_id).await
    }
}

// ── Tests ──────────────────────────────────────────────────────
