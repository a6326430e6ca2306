//! Fare calculator: pure pricing and loyalty functions
//!
//! Costs bill fractional minutes at a per-minute rate, rounded to two
//! decimal places. Loyalty points accrue per full elapsed minute and
//! only for muscle-powered vehicles.

use chrono::Duration;
use rust_decimal::Decimal;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::vehicle::VehicleClass;

/// Loyalty points per full ride minute, Muscle class only
pub const ECO_POINTS_PER_MINUTE: i32 = 2;

/// Points consumed per issued voucher
pub const POINTS_PER_VOUCHER: i32 = 100;

/// Minimum balance required to start a ride (2.00)
pub fn min_balance_to_start() -> Decimal {
    Decimal::new(200, 2)
}

/// Voucher value per hundred converted points (2.00)
pub fn voucher_value_per_hundred() -> Decimal {
    Decimal::new(200, 2)
}

/// Pinned per-minute fallback rates by class: Muscle < Electric < Scooter.
pub fn default_rate(class: VehicleClass) -> Decimal {
    match class {
        VehicleClass::Muscle => Decimal::new(5, 2),
        VehicleClass::Electric => Decimal::new(10, 2),
        VehicleClass::Scooter => Decimal::new(15, 2),
    }
}

/// Ride cost: elapsed time × per-minute rate, two decimal places.
pub fn ride_cost(elapsed: Duration, rate_per_minute: Decimal) -> DomainResult<Decimal> {
    let millis = elapsed.num_milliseconds();
    if millis < 0 {
        return Err(DomainError::InvalidDuration(format!(
            "elapsed time is negative: {millis}ms"
        )));
    }
    let minutes = Decimal::new(millis, 0) / Decimal::new(60_000, 0);
    Ok((minutes * rate_per_minute).round_dp(2))
}

/// Loyalty points for a ride: full minutes × bonus rate for Muscle
/// class, zero for everything else.
pub fn eco_points(elapsed: Duration, class: VehicleClass) -> DomainResult<i32> {
    if elapsed.num_milliseconds() < 0 {
        return Err(DomainError::InvalidDuration(format!(
            "elapsed time is negative: {}ms",
            elapsed.num_milliseconds()
        )));
    }
    if class != VehicleClass::Muscle {
        return Ok(0);
    }
    let full_minutes = elapsed.num_minutes() * ECO_POINTS_PER_MINUTE as i64;
    Ok(i32::try_from(full_minutes).unwrap_or(i32::MAX))
}

/// Points are convertible in multiples of one hundred only.
pub fn can_convert_points(points: i32) -> bool {
    points >= POINTS_PER_VOUCHER && points % POINTS_PER_VOUCHER == 0
}

/// Voucher value for a convertible point amount.
pub fn voucher_value(points: i32) -> Decimal {
    Decimal::from(points / POINTS_PER_VOUCHER) * voucher_value_per_hundred()
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn electric_ten_minutes_at_quarter_rate() {
        let cost = ride_cost(Duration::minutes(10), Decimal::new(25, 2)).unwrap();
        assert_eq!(cost, Decimal::new(250, 2));
    }

    #[test]
    fn muscle_five_minutes_costs_quarter_unit() {
        let cost = ride_cost(Duration::minutes(5), Decimal::new(5, 2)).unwrap();
        assert_eq!(cost, Decimal::new(25, 2));
    }

    #[test]
    fn fractional_minutes_are_billed() {
        // 90 seconds at 0.10/min = 0.15
        let cost = ride_cost(Duration::seconds(90), Decimal::new(10, 2)).unwrap();
        assert_eq!(cost, Decimal::new(15, 2));
    }

    #[test]
    fn cost_rounds_to_two_decimals() {
        // 100 seconds at 0.10/min = 0.1666... -> 0.17
        let cost = ride_cost(Duration::seconds(100), Decimal::new(10, 2)).unwrap();
        assert_eq!(cost, Decimal::new(17, 2));
    }

    #[test]
    fn negative_duration_is_rejected() {
        let err = ride_cost(Duration::minutes(-1), Decimal::new(10, 2)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidDuration(_)));
        let err = eco_points(Duration::minutes(-1), VehicleClass::Muscle).unwrap_err();
        assert!(matches!(err, DomainError::InvalidDuration(_)));
    }

    #[test]
    fn muscle_earns_two_points_per_full_minute() {
        assert_eq!(eco_points(Duration::minutes(5), VehicleClass::Muscle).unwrap(), 10);
        // partial minute does not count
        assert_eq!(
            eco_points(Duration::seconds(5 * 60 + 59), VehicleClass::Muscle).unwrap(),
            10
        );
    }

    #[test]
    fn powered_classes_earn_no_points() {
        assert_eq!(eco_points(Duration::minutes(30), VehicleClass::Electric).unwrap(), 0);
        assert_eq!(eco_points(Duration::minutes(30), VehicleClass::Scooter).unwrap(), 0);
    }

    #[test]
    fn fallback_rates_are_ordered_by_class() {
        assert!(default_rate(VehicleClass::Muscle) < default_rate(VehicleClass::Electric));
        assert!(default_rate(VehicleClass::Electric) < default_rate(VehicleClass::Scooter));
    }

    #[test]
    fn conversion_requires_multiples_of_one_hundred() {
        assert!(can_convert_points(100));
        assert!(can_convert_points(300));
        assert!(!can_convert_points(99));
        assert!(!can_convert_points(250));
        assert!(!can_convert_points(0));
    }

    #[test]
    fn voucher_value_scales_with_points() {
        assert_eq!(voucher_value(100), Decimal::new(200, 2));
        assert_eq!(voucher_value(300), Decimal::new(600, 2));
    }
}
