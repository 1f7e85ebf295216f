//! Checkout orchestration: the staged-order state machine.
//!
//! Each operation loads the staged document, validates its precondition,
//! applies the pure engines, and rewrites the whole document with a refreshed
//! TTL. Failure paths never persist a partially mutated document.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    clients::{
        BasketClient, CatalogClient, CouponClient, CustomerClient, RouteClient, RouteSummary,
    },
    entities::order,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        DeliveryTier, LineItem, PaymentMethod, PriceDetails, ShippingData, StagedOrder, UserData,
    },
    services::{
        coupons,
        orders::OrderService,
        pricing::{discount_percentage, round2},
        shipping,
    },
    staging::StagedOrderStore,
};

/// Parameters for starting a checkout.
#[derive(Debug, Clone)]
pub struct InitiateCheckout {
    pub language: String,
}

/// Parameters for selecting shipping.
#[derive(Debug, Clone)]
pub struct SelectShipping {
    pub address_id: Uuid,
    pub delivery_tier: DeliveryTier,
}

#[derive(Clone)]
pub struct CheckoutService {
    staging: Arc<dyn StagedOrderStore>,
    basket: Arc<dyn BasketClient>,
    catalog: Arc<dyn CatalogClient>,
    customers: Arc<dyn CustomerClient>,
    coupons: Arc<dyn CouponClient>,
    routing: Arc<dyn RouteClient>,
    orders: Arc<OrderService>,
    event_sender: Arc<EventSender>,
    currency: String,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        staging: Arc<dyn StagedOrderStore>,
        basket: Arc<dyn BasketClient>,
        catalog: Arc<dyn CatalogClient>,
        customers: Arc<dyn CustomerClient>,
        coupons: Arc<dyn CouponClient>,
        routing: Arc<dyn RouteClient>,
        orders: Arc<OrderService>,
        event_sender: Arc<EventSender>,
        currency: String,
    ) -> Self {
        Self {
            staging,
            basket,
            catalog,
            customers,
            coupons,
            routing,
            orders,
            event_sender,
            currency,
        }
    }

    async fn load(&self, user_id: Uuid) -> Result<StagedOrder, ServiceError> {
        self.staging
            .get(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No checkout in progress".to_string()))
    }

    /// Builds a staged order from the basket and catalog snapshots and creates
    /// it in the staging store.
    #[instrument(skip(self, input), fields(user_id = %user_id, language = %input.language))]
    pub async fn initiate(
        &self,
        user_id: Uuid,
        input: InitiateCheckout,
    ) -> Result<StagedOrder, ServiceError> {
        if self.staging.exists(user_id).await? {
            return Err(ServiceError::Conflict(
                "An order is already in progress for this user".to_string(),
            ));
        }

        let entries = self.basket.items(user_id).await?;
        if entries.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "Basket is empty".to_string(),
            ));
        }

        let profile = self
            .customers
            .user_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;
        let phone = profile
            .phone
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                ServiceError::ValidationError(
                    "A phone number is required before checkout".to_string(),
                )
            })?;

        let mut items = Vec::with_capacity(entries.len());
        for entry in &entries {
            let product = self
                .catalog
                .product_by_sku(&input.language, &entry.sku)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", entry.sku))
                })?;

            items.push(LineItem {
                sku: product.sku,
                title: product.title,
                price: product.price,
                discounted_price: product.discounted_price,
                discount: product.discount,
                quantity: entry.quantity,
                product_added: product.created_at,
                product_type: product.product_type,
                image: product.images.first().cloned(),
            });
        }

        let total_price: Decimal = items.iter().map(LineItem::line_total).sum();
        let total_discounted: Decimal = items.iter().map(LineItem::line_discounted_total).sum();
        let discount_percent = if total_price > Decimal::ZERO {
            discount_percentage(total_price, total_discounted)?
        } else {
            0
        };

        let order = StagedOrder {
            user_id,
            language: input.language,
            items,
            price_details: PriceDetails {
                total_price: round2(total_price),
                total_discounted_price: round2(total_discounted),
                discount_percent,
                coupon_percent: None,
                coupon_discounted_total: None,
                shipping_cost: None,
                total_cost: round2(total_discounted),
                currency: self.currency.clone(),
            },
            user_data: UserData {
                name: profile.name,
                surname: profile.surname,
                email: profile.email,
                phone,
            },
            shipping_data: None,
            coupon_data: None,
            created_at: Utc::now(),
        };

        // The conditional create is authoritative; the exists() probe above
        // only short-circuits the basket and catalog work.
        if !self.staging.create(&order).await? {
            return Err(ServiceError::Conflict(
                "An order is already in progress for this user".to_string(),
            ));
        }

        info!(items = order.items.len(), "checkout staged");
        self.event_sender
            .send_or_log(Event::CheckoutStarted { user_id })
            .await;

        Ok(order)
    }

    /// Returns the current staged-order snapshot.
    #[instrument(skip(self))]
    pub async fn get(&self, user_id: Uuid) -> Result<StagedOrder, ServiceError> {
        self.load(user_id).await
    }

    /// Deletes the staged order.
    #[instrument(skip(self))]
    pub async fn cancel(&self, user_id: Uuid) -> Result<(), ServiceError> {
        if !self.staging.delete(user_id).await? {
            return Err(ServiceError::NotFound(
                "No checkout in progress".to_string(),
            ));
        }

        info!("checkout cancelled");
        self.event_sender
            .send_or_log(Event::CheckoutCancelled { user_id })
            .await;
        Ok(())
    }

    /// Applies a coupon to the staged order.
    #[instrument(skip(self))]
    pub async fn apply_coupon(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<StagedOrder, ServiceError> {
        let mut order = self.load(user_id).await?;

        if order.coupon_data.is_some() {
            return Err(ServiceError::Conflict(
                "A coupon has already been applied".to_string(),
            ));
        }

        let coupon = self
            .coupons
            .coupon_by_code(code, &order.language)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", code)))?;

        coupons::apply(&mut order, &coupon)?;
        self.staging.put(&order).await?;

        info!(code = %coupon.code, "coupon applied");
        self.event_sender
            .send_or_log(Event::CouponApplied {
                user_id,
                code: coupon.code,
            })
            .await;

        Ok(order)
    }

    /// Removes the applied coupon and restores pre-coupon totals.
    #[instrument(skip(self))]
    pub async fn remove_coupon(&self, user_id: Uuid) -> Result<StagedOrder, ServiceError> {
        let mut order = self.load(user_id).await?;

        coupons::remove(&mut order)?;
        self.staging.put(&order).await?;

        self.event_sender
            .send_or_log(Event::CouponRemoved { user_id })
            .await;

        Ok(order)
    }

    /// Resolves the route to the chosen address and prices the shipment.
    #[instrument(skip(self, input), fields(user_id = %user_id, tier = %input.delivery_tier))]
    pub async fn apply_shipping(
        &self,
        user_id: Uuid,
        input: SelectShipping,
    ) -> Result<StagedOrder, ServiceError> {
        let mut order = self.load(user_id).await?;

        if order.shipping_data.is_some() {
            return Err(ServiceError::Conflict(
                "Shipping has already been selected".to_string(),
            ));
        }

        let destination = self
            .customers
            .address_by_id(user_id, input.address_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Address {} not found", input.address_id))
            })?;
        let warehouse = self.customers.warehouse_address().await?;

        let route = self
            .routing
            .route(
                (warehouse.longitude, warehouse.latitude),
                (destination.longitude, destination.latitude),
            )
            .await?;

        let distance_km = Decimal::from_f64(route.distance_meters)
            .map(|m| m / Decimal::from(1000))
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Routing service returned an unusable distance: {}",
                    route.distance_meters
                ))
            })?;

        let quote = shipping::quote(distance_km, input.delivery_tier)?;
        let estimated_delivery = Utc::now() + Duration::days(delivery_days(&route));

        order.shipping_data = Some(ShippingData {
            warehouse_address: warehouse.address,
            destination_address: destination.display(),
            postal_code: destination.postal_code.clone(),
            cost: quote.total,
            estimated_delivery,
            delivery_tier: input.delivery_tier,
            breakdown: quote.clone(),
        });
        order.price_details.shipping_cost = Some(quote.total);
        order.price_details.recompute_total();

        self.staging.put(&order).await?;

        info!(cost = %quote.total, distance_km = %quote.distance_km, "shipping selected");
        self.event_sender
            .send_or_log(Event::ShippingSelected {
                user_id,
                tier: input.delivery_tier,
            })
            .await;

        Ok(order)
    }

    /// Clears the shipping selection and subtracts its cost from the total.
    #[instrument(skip(self))]
    pub async fn remove_shipping(&self, user_id: Uuid) -> Result<StagedOrder, ServiceError> {
        let mut order = self.load(user_id).await?;

        if order.shipping_data.is_none() {
            return Err(ServiceError::NotFound(
                "No shipping selected for this checkout".to_string(),
            ));
        }

        order.shipping_data = None;
        order.price_details.shipping_cost = None;
        order.price_details.recompute_total();

        self.staging.put(&order).await?;

        self.event_sender
            .send_or_log(Event::ShippingRemoved { user_id })
            .await;

        Ok(order)
    }

    /// Commits the staged order durably, then clears the basket and deletes
    /// the staged document.
    ///
    /// A failed commit leaves the staged order (and basket) available for
    /// retry until the TTL reaps it. A failed basket clear after a successful
    /// commit is logged and left stale; clearing is idempotent.
    #[instrument(skip(self))]
    pub async fn finalize(
        &self,
        user_id: Uuid,
        method: PaymentMethod,
    ) -> Result<order::Model, ServiceError> {
        let order = self.load(user_id).await?;

        let committed = self.orders.finalize_staged(&order, method).await?;

        self.staging.delete(user_id).await?;
        if let Err(err) = self.basket.clear(user_id).await {
            warn!(error = %err, "basket clear failed after order commit; leaving it stale");
        }

        self.event_sender
            .send_or_log(Event::CheckoutCompleted {
                user_id,
                order_id: committed.id,
            })
            .await;

        Ok(committed)
    }
}

/// Derives the estimated delivery lead time in whole days from the route
/// duration, never less than one day.
fn delivery_days(route: &RouteSummary) -> i64 {
    let days = (route.duration_seconds / 86_400.0).ceil() as i64;
    days.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_days_floor_is_one() {
        let short = RouteSummary {
            distance_meters: 1_000.0,
            duration_seconds: 600.0,
        };
        assert_eq!(delivery_days(&short), 1);
    }

    #[test]
    fn delivery_days_round_up() {
        let long = RouteSummary {
            distance_meters: 2_000_000.0,
            duration_seconds: 100_000.0,
        };
        assert_eq!(delivery_days(&long), 2);
    }
}
