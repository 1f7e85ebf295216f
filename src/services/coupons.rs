//! Coupon evaluation over a staged order.
//!
//! Scope dispatch happens once through an eligibility predicate; the
//! accumulation loop is shared by every scope.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::clients::CouponRecord;
use crate::errors::ServiceError;
use crate::models::{CouponData, CouponScope, LineItem, StagedOrder};
use crate::services::pricing::{discounted_price, round2};

/// How long a product counts as newly added, for `CouponScope::NewArrivals`.
pub const NEW_ARRIVAL_WINDOW_DAYS: i64 = 14;

fn eligible(item: &LineItem, coupon: &CouponRecord, new_arrival_cutoff: DateTime<Utc>) -> bool {
    match coupon.scope {
        CouponScope::All => !item.discount,
        CouponScope::NewArrivals => item.product_added >= new_arrival_cutoff,
        CouponScope::Category => coupon.category.as_deref() == Some(item.product_type.as_str()),
    }
}

/// Applies `coupon` to the staged order, recomputing totals.
///
/// Eligible lines get the coupon percent off their undiscounted line total;
/// ineligible lines keep their existing discounted line total. Fails without
/// touching the order when no line is eligible.
pub fn apply(order: &mut StagedOrder, coupon: &CouponRecord) -> Result<(), ServiceError> {
    let cutoff = Utc::now() - Duration::days(NEW_ARRIVAL_WINDOW_DAYS);

    let mut total = Decimal::ZERO;
    let mut eligible_count = 0usize;

    for item in &order.items {
        if eligible(item, coupon, cutoff) {
            total += discounted_price(item.line_total(), coupon.percent);
            eligible_count += 1;
        } else {
            total += item.line_discounted_total();
        }
    }

    if eligible_count == 0 {
        return Err(ServiceError::InvalidOperation(format!(
            "Coupon {} is not applicable to any order item",
            coupon.code
        )));
    }

    order.coupon_data = Some(CouponData {
        code: coupon.code.clone(),
        title: coupon.title.clone(),
        description: coupon.description.clone(),
        percent: coupon.percent,
    });
    order.price_details.coupon_percent = Some(coupon.percent);
    order.price_details.coupon_discounted_total = Some(round2(total));
    order.price_details.recompute_total();

    Ok(())
}

/// Clears any applied coupon and restores totals to the pre-coupon amounts.
pub fn remove(order: &mut StagedOrder) -> Result<(), ServiceError> {
    if order.coupon_data.is_none() {
        return Err(ServiceError::NotFound(
            "No coupon applied to this checkout".to_string(),
        ));
    }

    order.coupon_data = None;
    order.price_details.coupon_percent = None;
    order.price_details.coupon_discounted_total = None;
    order.price_details.recompute_total();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PriceDetails, UserData};
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn item(price: Decimal, discounted: Decimal, discount: bool, age_days: i64) -> LineItem {
        LineItem {
            sku: "SKU-1".into(),
            title: "Item".into(),
            price,
            discounted_price: discounted,
            discount,
            quantity: 1,
            product_added: Utc::now() - Duration::days(age_days),
            product_type: "widget".into(),
            image: None,
        }
    }

    fn order_with(items: Vec<LineItem>) -> StagedOrder {
        let total: Decimal = items.iter().map(LineItem::line_total).sum();
        let discounted: Decimal = items.iter().map(LineItem::line_discounted_total).sum();
        StagedOrder {
            user_id: Uuid::new_v4(),
            language: "en".into(),
            items,
            price_details: PriceDetails {
                total_price: total,
                total_discounted_price: discounted,
                discount_percent: 0,
                coupon_percent: None,
                coupon_discounted_total: None,
                shipping_cost: None,
                total_cost: discounted,
                currency: "USD".into(),
            },
            user_data: UserData {
                name: "Ada".into(),
                surname: "Lovelace".into(),
                email: "ada@example.com".into(),
                phone: "+1555".into(),
            },
            shipping_data: None,
            coupon_data: None,
            created_at: Utc::now(),
        }
    }

    fn coupon(scope: CouponScope, percent: i32, category: Option<&str>) -> CouponRecord {
        CouponRecord {
            code: "SAVE".into(),
            title: "Save".into(),
            description: "test coupon".into(),
            percent,
            scope,
            category: category.map(str::to_string),
        }
    }

    #[test]
    fn all_scope_skips_already_discounted_items() {
        let mut order = order_with(vec![
            item(dec!(100), dec!(100), false, 30),
            item(dec!(200), dec!(150), true, 30),
        ]);

        apply(&mut order, &coupon(CouponScope::All, 10, None)).unwrap();

        // 10% off the undiscounted line, the discounted line untouched
        assert_eq!(
            order.price_details.coupon_discounted_total,
            Some(dec!(240.00))
        );
        assert_eq!(order.price_details.total_cost, dec!(240.00));
        assert_eq!(order.price_details.coupon_percent, Some(10));
    }

    #[test]
    fn all_scope_fails_when_everything_is_discounted() {
        let mut order = order_with(vec![
            item(dec!(100), dec!(80), true, 30),
            item(dec!(50), dec!(40), true, 30),
        ]);
        let before = order.price_details.total_cost;

        let err = apply(&mut order, &coupon(CouponScope::All, 10, None)).unwrap_err();
        assert_matches!(err, ServiceError::InvalidOperation(_));

        // no partial mutation
        assert!(order.coupon_data.is_none());
        assert!(order.price_details.coupon_percent.is_none());
        assert_eq!(order.price_details.total_cost, before);
    }

    #[test]
    fn new_arrivals_scope_uses_fourteen_day_cutoff() {
        let mut order = order_with(vec![
            item(dec!(100), dec!(100), false, 3),
            item(dec!(100), dec!(100), false, 40),
        ]);

        apply(&mut order, &coupon(CouponScope::NewArrivals, 50, None)).unwrap();

        // only the 3-day-old item qualifies
        assert_eq!(
            order.price_details.coupon_discounted_total,
            Some(dec!(150.00))
        );
    }

    #[test]
    fn category_scope_matches_product_type() {
        let mut order = order_with(vec![item(dec!(100), dec!(100), false, 30)]);

        apply(&mut order, &coupon(CouponScope::Category, 20, Some("widget"))).unwrap();
        assert_eq!(
            order.price_details.coupon_discounted_total,
            Some(dec!(80.00))
        );

        let mut other = order_with(vec![item(dec!(100), dec!(100), false, 30)]);
        let err = apply(
            &mut other,
            &coupon(CouponScope::Category, 20, Some("gadget")),
        )
        .unwrap_err();
        assert_matches!(err, ServiceError::InvalidOperation(_));
    }

    #[test]
    fn remove_restores_pre_coupon_total() {
        let mut order = order_with(vec![item(dec!(100), dec!(100), false, 30)]);
        order.price_details.shipping_cost = Some(dec!(100));
        order.price_details.recompute_total();
        let before = order.price_details.total_cost;

        apply(&mut order, &coupon(CouponScope::All, 25, None)).unwrap();
        assert_eq!(order.price_details.total_cost, dec!(175.00));

        remove(&mut order).unwrap();
        assert_eq!(order.price_details.total_cost, before);
        assert!(order.coupon_data.is_none());
    }

    #[test]
    fn remove_without_coupon_is_not_found() {
        let mut order = order_with(vec![item(dec!(100), dec!(100), false, 30)]);
        assert_matches!(remove(&mut order), Err(ServiceError::NotFound(_)));
    }
}
