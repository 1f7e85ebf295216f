//! Pure pricing arithmetic shared by the checkout engine.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::errors::ServiceError;

/// Rounds a monetary amount to 2 decimal places, midpoints away from zero.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Computes the integer discount percentage between a cost and its
/// discounted cost: `floor((cost - discounted) / cost * 100)`.
///
/// Fails with a validation error when `cost` is not positive.
pub fn discount_percentage(cost: Decimal, discounted: Decimal) -> Result<i32, ServiceError> {
    if cost <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Cost must be positive to compute a discount percentage".to_string(),
        ));
    }

    let percent = (cost - discounted) * dec!(100) / cost;
    Ok(percent.floor().to_i32().unwrap_or(0))
}

/// Applies a flat percent reduction to a cost, rounded to 2 decimals.
pub fn discounted_price(cost: Decimal, percent: i32) -> Decimal {
    round2(cost - cost * Decimal::from(percent) / dec!(100))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn percentage_is_floored() {
        assert_eq!(discount_percentage(dec!(300), dec!(200)).unwrap(), 33);
        assert_eq!(discount_percentage(dec!(100), dec!(75)).unwrap(), 25);
    }

    #[test]
    fn percentage_of_equal_costs_is_zero() {
        assert_eq!(discount_percentage(dec!(500), dec!(500)).unwrap(), 0);
    }

    #[test]
    fn percentage_stays_below_one_hundred() {
        // cost > discounted > 0 always lands in [0, 100)
        for (cost, discounted) in [
            (dec!(100), dec!(0.01)),
            (dec!(1000), dec!(999)),
            (dec!(49.99), dec!(24.99)),
        ] {
            let pct = discount_percentage(cost, discounted).unwrap();
            assert!((0..100).contains(&pct), "{} out of range", pct);
        }
    }

    #[test]
    fn non_positive_cost_is_rejected() {
        assert_matches!(
            discount_percentage(dec!(0), dec!(0)),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            discount_percentage(dec!(-10), dec!(5)),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn discounted_price_applies_flat_percent() {
        assert_eq!(discounted_price(dec!(200), 25), dec!(150));
        assert_eq!(discounted_price(dec!(99.99), 10), dec!(89.99));
        assert_eq!(discounted_price(dec!(100), 0), dec!(100));
    }

    #[test]
    fn round2_half_up() {
        assert_eq!(round2(dec!(10.005)), dec!(10.01));
        assert_eq!(round2(dec!(349)), dec!(349));
    }
}
