//! Shipping cost calculation.
//!
//! `cost = round2((BASE_PRICE + distance_km * KM_RATE) * tier_rate)`, with the
//! full breakdown retained for audit display.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::models::DeliveryTier;
use crate::services::pricing::round2;

/// Flat handling price charged on every shipment.
pub const BASE_PRICE: Decimal = dec!(100);

/// Cost per kilometer of route distance.
pub const KM_RATE: Decimal = dec!(24.9);

impl DeliveryTier {
    /// Fixed cost multiplier for the tier.
    pub fn rate(&self) -> Decimal {
        match self {
            DeliveryTier::Base => dec!(1.0),
            DeliveryTier::Express => dec!(1.5),
            DeliveryTier::Lightning => dec!(3.0),
        }
    }
}

/// Itemized shipping cost breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingQuote {
    pub distance_km: Decimal,
    pub distance_cost: Decimal,
    pub base_price: Decimal,
    pub tier_rate: Decimal,
    pub km_rate: Decimal,
    pub total: Decimal,
}

/// Prices a shipment for the given route distance and delivery tier.
///
/// Negative distances are rejected; the routing service reports unreachable
/// destinations as errors, never as garbage distances.
pub fn quote(distance_km: Decimal, tier: DeliveryTier) -> Result<ShippingQuote, ServiceError> {
    if distance_km < Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "Route distance cannot be negative: {} km",
            distance_km
        )));
    }

    let distance_cost = round2(distance_km * KM_RATE);
    let total = round2((BASE_PRICE + distance_km * KM_RATE) * tier.rate());

    Ok(ShippingQuote {
        distance_km,
        distance_cost,
        base_price: BASE_PRICE,
        tier_rate: tier.rate(),
        km_rate: KM_RATE,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    #[test]
    fn base_tier_ten_km() {
        let q = quote(dec!(10), DeliveryTier::Base).unwrap();
        assert_eq!(q.total, dec!(349.00));
        assert_eq!(q.distance_cost, dec!(249.00));
        assert_eq!(q.base_price, dec!(100));
    }

    #[test]
    fn lightning_tier_ten_km() {
        let q = quote(dec!(10), DeliveryTier::Lightning).unwrap();
        assert_eq!(q.total, dec!(1047.00));
    }

    #[test]
    fn zero_distance_charges_base_price_only() {
        let q = quote(dec!(0), DeliveryTier::Base).unwrap();
        assert_eq!(q.total, dec!(100.00));
        assert_eq!(q.distance_cost, dec!(0));
    }

    #[test]
    fn tier_rates_are_ordered() {
        let base = quote(dec!(42.5), DeliveryTier::Base).unwrap().total;
        let express = quote(dec!(42.5), DeliveryTier::Express).unwrap().total;
        let lightning = quote(dec!(42.5), DeliveryTier::Lightning).unwrap().total;
        assert!(base <= express && express <= lightning);
    }

    #[test]
    fn negative_distance_is_rejected() {
        assert_matches!(
            quote(dec!(-1), DeliveryTier::Base),
            Err(ServiceError::ValidationError(_))
        );
    }

    proptest! {
        #[test]
        fn cost_is_monotone_in_distance(a in 0u32..5_000, b in 0u32..5_000) {
            let (near, far) = if a <= b { (a, b) } else { (b, a) };
            let near_cost = quote(Decimal::from(near), DeliveryTier::Express).unwrap().total;
            let far_cost = quote(Decimal::from(far), DeliveryTier::Express).unwrap().total;
            prop_assert!(near_cost <= far_cost);
        }
    }
}
