//! Interfaces to the collaborating services the checkout engine consumes.
//!
//! Catalog, basket, customer/address and coupon data live in sibling services;
//! the orchestrator only ever talks to them through these seams.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::CouponScope;

pub mod http;
pub mod routing;

pub use self::http::{HttpBasketClient, HttpCatalogClient, HttpCouponClient, HttpCustomerClient};
pub use self::routing::{GeoPoint, HttpRouteClient, RouteClient, RouteSummary};

/// One basket line as stored by the basket service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasketEntry {
    pub sku: String,
    pub quantity: i32,
}

#[async_trait]
pub trait BasketClient: Send + Sync {
    async fn items(&self, user_id: Uuid) -> Result<Vec<BasketEntry>, ServiceError>;
    async fn clear(&self, user_id: Uuid) -> Result<(), ServiceError>;
}

/// Catalog snapshot of a sellable product, as returned for a (language, SKU) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub sku: String,
    pub title: String,
    pub price: Decimal,
    pub discounted_price: Decimal,
    pub discount: bool,
    pub discount_percent: i32,
    pub in_stock: bool,
    pub on_sale: bool,
    pub images: Vec<String>,
    pub product_type: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn product_by_sku(
        &self,
        language: &str,
        sku: &str,
    ) -> Result<Option<CatalogProduct>, ServiceError>;
}

/// Buyer contact details held by the profile service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub phone: Option<String>,
}

/// A saved delivery address with its geocoded position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerAddress {
    pub city: String,
    pub line1: String,
    pub line2: Option<String>,
    pub postal_code: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl CustomerAddress {
    /// Single-line rendering used in shipping records.
    pub fn display(&self) -> String {
        match &self.line2 {
            Some(line2) => format!("{}, {}, {}", self.line1, line2, self.city),
            None => format!("{}, {}", self.line1, self.city),
        }
    }
}

/// Dispatch warehouse location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseAddress {
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[async_trait]
pub trait CustomerClient: Send + Sync {
    async fn user_by_id(&self, user_id: Uuid) -> Result<Option<CustomerProfile>, ServiceError>;
    async fn address_by_id(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> Result<Option<CustomerAddress>, ServiceError>;
    async fn warehouse_address(&self) -> Result<WarehouseAddress, ServiceError>;
}

/// A usable (non-expired) coupon; expiry is enforced by the coupon service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponRecord {
    pub code: String,
    pub title: String,
    pub description: String,
    pub percent: i32,
    pub scope: CouponScope,
    pub category: Option<String>,
}

#[async_trait]
pub trait CouponClient: Send + Sync {
    async fn coupon_by_code(
        &self,
        code: &str,
        language: &str,
    ) -> Result<Option<CouponRecord>, ServiceError>;
}
