use std::sync::Arc;

use crate::services::{CheckoutService, OrderService};

pub mod checkout;
pub mod common;
pub mod orders;

/// Service bundle shared with every handler through `AppState`.
#[derive(Clone)]
pub struct AppServices {
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
}
