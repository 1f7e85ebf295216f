//! Domain model for the staged (in-progress) checkout.
//!
//! A staged order is a single JSON document held in the staging store under a
//! per-user key with a TTL. It is rewritten whole on every mutation; there is
//! no partial-update path.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::pricing::round2;
use crate::services::shipping::ShippingQuote;

/// In-progress checkout aggregate, one per user at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedOrder {
    pub user_id: Uuid,
    /// Catalog locale used for all line-item lookups.
    pub language: String,
    pub items: Vec<LineItem>,
    pub price_details: PriceDetails,
    /// Buyer snapshot taken at staging time, not live-joined.
    pub user_data: UserData,
    pub shipping_data: Option<ShippingData>,
    pub coupon_data: Option<CouponData>,
    pub created_at: DateTime<Utc>,
}

/// One basket line, priced from the catalog snapshot at staging time.
/// Later catalog changes do not affect a staged order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub sku: String,
    pub title: String,
    /// Unit cost.
    pub price: Decimal,
    /// Unit discounted cost.
    pub discounted_price: Decimal,
    /// Whether the product carried its own discount when staged.
    pub discount: bool,
    pub quantity: i32,
    /// When the product was added to the catalog.
    pub product_added: DateTime<Utc>,
    pub product_type: String,
    pub image: Option<String>,
}

impl LineItem {
    /// Undiscounted line cost: unit price times quantity.
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    /// Discounted line cost as frozen at staging time.
    pub fn line_discounted_total(&self) -> Decimal {
        self.discounted_price * Decimal::from(self.quantity)
    }
}

/// Aggregate totals for the staged order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceDetails {
    pub total_price: Decimal,
    pub total_discounted_price: Decimal,
    pub discount_percent: i32,
    pub coupon_percent: Option<i32>,
    pub coupon_discounted_total: Option<Decimal>,
    pub shipping_cost: Option<Decimal>,
    /// Amount due: discounted (or coupon-discounted) total plus shipping.
    pub total_cost: Decimal,
    pub currency: String,
}

impl PriceDetails {
    /// Recomputes `total_cost` from the current coupon/shipping state.
    /// Invariant: `total_cost = (coupon_discounted_total ?? total_discounted_price)
    /// + (shipping_cost ?? 0)`, rounded to 2 decimals.
    pub fn recompute_total(&mut self) {
        let base = self
            .coupon_discounted_total
            .unwrap_or(self.total_discounted_price);
        let shipping = self.shipping_cost.unwrap_or(Decimal::ZERO);
        self.total_cost = round2(base + shipping);
    }
}

/// Buyer contact snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserData {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub phone: String,
}

/// Chosen shipping selection, including the audit breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingData {
    pub warehouse_address: String,
    pub destination_address: String,
    pub postal_code: String,
    pub cost: Decimal,
    pub estimated_delivery: DateTime<Utc>,
    pub delivery_tier: DeliveryTier,
    pub breakdown: ShippingQuote,
}

/// Applied coupon snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponData {
    pub code: String,
    pub title: String,
    pub description: String,
    pub percent: i32,
}

/// Delivery tiers with fixed cost multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryTier {
    Base,
    Express,
    Lightning,
}

impl DeliveryTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryTier::Base => "base",
            DeliveryTier::Express => "express",
            DeliveryTier::Lightning => "lightning",
        }
    }
}

impl std::fmt::Display for DeliveryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which line items a coupon's discount applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponScope {
    /// Items that do not already carry their own discount.
    All,
    /// Items added to the catalog within the recent-arrival window.
    NewArrivals,
    /// Items whose product type matches the coupon category.
    Category,
}

/// Payment methods accepted at checkout. Payment is recorded, not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Cash,
}

impl PaymentMethod {
    /// Card payments are recorded as paid immediately; cash settles on delivery.
    pub fn is_card(&self) -> bool {
        matches!(self, PaymentMethod::CreditCard | PaymentMethod::DebitCard)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::Cash => "cash",
        }
    }
}
