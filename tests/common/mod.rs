//! Shared test harness: in-memory staging store, hand-rolled collaborator
//! fakes and an in-memory SQLite durable store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, Schema};
use tokio::sync::mpsc;
use uuid::Uuid;

use storefront_api::clients::{
    BasketClient, BasketEntry, CatalogClient, CatalogProduct, CouponClient, CouponRecord,
    CustomerAddress, CustomerClient, CustomerProfile, RouteClient, RouteSummary, WarehouseAddress,
};
use storefront_api::entities;
use storefront_api::errors::ServiceError;
use storefront_api::events::{Event, EventSender};
use storefront_api::services::{CheckoutService, OrderService};
use storefront_api::staging::InMemoryStagedOrderStore;

pub struct FakeBasket {
    pub items: Mutex<Vec<BasketEntry>>,
    pub cleared: AtomicBool,
}

impl FakeBasket {
    pub fn with_items(items: Vec<BasketEntry>) -> Arc<Self> {
        Arc::new(Self {
            items: Mutex::new(items),
            cleared: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl BasketClient for FakeBasket {
    async fn items(&self, _user_id: Uuid) -> Result<Vec<BasketEntry>, ServiceError> {
        Ok(self.items.lock().unwrap().clone())
    }

    async fn clear(&self, _user_id: Uuid) -> Result<(), ServiceError> {
        self.items.lock().unwrap().clear();
        self.cleared.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeCatalog {
    pub products: HashMap<String, CatalogProduct>,
}

impl FakeCatalog {
    pub fn with_products(products: Vec<CatalogProduct>) -> Arc<Self> {
        Arc::new(Self {
            products: products.into_iter().map(|p| (p.sku.clone(), p)).collect(),
        })
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn product_by_sku(
        &self,
        _language: &str,
        sku: &str,
    ) -> Result<Option<CatalogProduct>, ServiceError> {
        Ok(self.products.get(sku).cloned())
    }
}

pub struct FakeCustomers {
    pub profile: Option<CustomerProfile>,
    pub addresses: HashMap<Uuid, CustomerAddress>,
}

#[async_trait]
impl CustomerClient for FakeCustomers {
    async fn user_by_id(&self, _user_id: Uuid) -> Result<Option<CustomerProfile>, ServiceError> {
        Ok(self.profile.clone())
    }

    async fn address_by_id(
        &self,
        _user_id: Uuid,
        address_id: Uuid,
    ) -> Result<Option<CustomerAddress>, ServiceError> {
        Ok(self.addresses.get(&address_id).cloned())
    }

    async fn warehouse_address(&self) -> Result<WarehouseAddress, ServiceError> {
        Ok(WarehouseAddress {
            address: "Dock 4, Harbor Road".into(),
            latitude: 40.0,
            longitude: 29.0,
        })
    }
}

pub struct FakeCoupons {
    pub coupons: HashMap<String, CouponRecord>,
}

impl FakeCoupons {
    pub fn with_coupons(coupons: Vec<CouponRecord>) -> Arc<Self> {
        Arc::new(Self {
            coupons: coupons.into_iter().map(|c| (c.code.clone(), c)).collect(),
        })
    }
}

#[async_trait]
impl CouponClient for FakeCoupons {
    async fn coupon_by_code(
        &self,
        code: &str,
        _language: &str,
    ) -> Result<Option<CouponRecord>, ServiceError> {
        Ok(self.coupons.get(code).cloned())
    }
}

pub enum FakeRouteBehavior {
    Respond(RouteSummary),
    TimeOut,
}

pub struct FakeRoute {
    pub behavior: FakeRouteBehavior,
}

impl FakeRoute {
    pub fn with_distance(distance_meters: f64, duration_seconds: f64) -> Arc<Self> {
        Arc::new(Self {
            behavior: FakeRouteBehavior::Respond(RouteSummary {
                distance_meters,
                duration_seconds,
            }),
        })
    }

    pub fn timing_out() -> Arc<Self> {
        Arc::new(Self {
            behavior: FakeRouteBehavior::TimeOut,
        })
    }
}

#[async_trait]
impl RouteClient for FakeRoute {
    async fn route(
        &self,
        _from: (f64, f64),
        _to: (f64, f64),
    ) -> Result<RouteSummary, ServiceError> {
        match &self.behavior {
            FakeRouteBehavior::Respond(summary) => Ok(*summary),
            FakeRouteBehavior::TimeOut => Err(ServiceError::Timeout(
                "Routing service did not respond in time".into(),
            )),
        }
    }
}

/// Connects an in-memory SQLite database and creates the order tables.
pub async fn setup_db() -> Arc<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    // a shared :memory: database needs a single pooled connection
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.expect("sqlite connect");

    let schema = Schema::new(DbBackend::Sqlite);
    for statement in [
        schema.create_table_from_entity(entities::Order),
        schema.create_table_from_entity(entities::OrderItem),
        schema.create_table_from_entity(entities::OrderPayment),
        schema.create_table_from_entity(entities::OrderShipping),
    ] {
        db.execute(db.get_database_backend().build(&statement))
            .await
            .expect("create table");
    }

    Arc::new(db)
}

pub fn product(sku: &str, price: Decimal, discounted: Decimal, discount: bool) -> CatalogProduct {
    CatalogProduct {
        sku: sku.to_string(),
        title: format!("Product {}", sku),
        price,
        discounted_price: discounted,
        discount,
        discount_percent: 0,
        in_stock: true,
        on_sale: discount,
        images: vec![format!("{}.jpg", sku)],
        product_type: "widget".to_string(),
        created_at: Utc::now() - ChronoDuration::days(30),
    }
}

pub fn profile_with_phone() -> CustomerProfile {
    CustomerProfile {
        name: "Ada".into(),
        surname: "Lovelace".into(),
        email: "ada@example.com".into(),
        phone: Some("+15551234".into()),
    }
}

pub struct Harness {
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub staging: Arc<InMemoryStagedOrderStore>,
    pub basket: Arc<FakeBasket>,
    pub db: Arc<DatabaseConnection>,
    pub user_id: Uuid,
    pub address_id: Uuid,
    _event_rx: mpsc::Receiver<Event>,
}

pub struct HarnessOptions {
    pub basket_items: Vec<BasketEntry>,
    pub products: Vec<CatalogProduct>,
    pub profile: Option<CustomerProfile>,
    pub coupons: Vec<CouponRecord>,
    pub route: Arc<FakeRoute>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            basket_items: vec![BasketEntry {
                sku: "A1".into(),
                quantity: 2,
            }],
            products: vec![product(
                "A1",
                Decimal::from(500),
                Decimal::from(500),
                false,
            )],
            profile: Some(profile_with_phone()),
            coupons: vec![],
            route: FakeRoute::with_distance(0.0, 3_600.0),
        }
    }
}

pub async fn harness(options: HarnessOptions) -> Harness {
    let db = setup_db().await;
    let (event_tx, event_rx) = mpsc::channel(256);
    let event_sender = Arc::new(EventSender::new(event_tx));

    let staging = Arc::new(InMemoryStagedOrderStore::new(Duration::from_secs(60)));
    let basket = FakeBasket::with_items(options.basket_items);
    let catalog = FakeCatalog::with_products(options.products);
    let user_id = Uuid::new_v4();
    let address_id = Uuid::new_v4();

    let mut addresses = HashMap::new();
    addresses.insert(
        address_id,
        CustomerAddress {
            city: "Springfield".into(),
            line1: "12 Elm Street".into(),
            line2: None,
            postal_code: "49007".into(),
            latitude: 40.1,
            longitude: 29.1,
        },
    );
    let customers = Arc::new(FakeCustomers {
        profile: options.profile,
        addresses,
    });
    let coupons = FakeCoupons::with_coupons(options.coupons);

    let orders = Arc::new(OrderService::new(db.clone(), event_sender.clone()));
    let checkout = Arc::new(CheckoutService::new(
        staging.clone(),
        basket.clone(),
        catalog,
        customers,
        coupons,
        options.route,
        orders.clone(),
        event_sender,
        "USD".to_string(),
    ));

    Harness {
        checkout,
        orders,
        staging,
        basket,
        db,
        user_id,
        address_id,
        _event_rx: event_rx,
    }
}
