use std::sync::Arc;

use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    handlers::common::{created_response, success_response, validate_input},
    models::{DeliveryTier, PaymentMethod},
    services::checkout::{InitiateCheckout, SelectShipping},
    AppState,
};

/// Creates the router for checkout endpoints. The staged order is addressed
/// by the authenticated user, not by a path id.
pub fn checkout_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(initiate_checkout))
        .route("/", get(get_checkout))
        .route("/", delete(cancel_checkout))
        .route("/coupon", post(apply_coupon))
        .route("/coupon", delete(remove_coupon))
        .route("/shipping", post(apply_shipping))
        .route("/shipping", delete(remove_shipping))
        .route("/complete", post(complete_checkout))
}

#[derive(Debug, Deserialize, Validate)]
pub struct InitiateCheckoutRequest {
    #[validate(length(min = 2, max = 8))]
    pub language: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ApplyCouponRequest {
    #[validate(length(min = 1))]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ApplyShippingRequest {
    pub address_id: Uuid,
    pub delivery_tier: DeliveryTier,
}

#[derive(Debug, Deserialize)]
pub struct CompleteCheckoutRequest {
    pub payment_method: PaymentMethod,
}

/// Start a checkout from the caller's basket
async fn initiate_checkout(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<InitiateCheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let order = state
        .services
        .checkout
        .initiate(
            user.user_id,
            InitiateCheckout {
                language: payload.language,
            },
        )
        .await?;

    Ok(created_response(order))
}

/// Current staged-order snapshot
async fn get_checkout(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.services.checkout.get(user.user_id).await?;
    Ok(success_response(order))
}

/// Abandon the staged order
async fn cancel_checkout(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    state.services.checkout.cancel(user.user_id).await?;
    Ok(success_response(
        serde_json::json!({ "message": "Checkout cancelled" }),
    ))
}

/// Apply a coupon code
async fn apply_coupon(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<ApplyCouponRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let order = state
        .services
        .checkout
        .apply_coupon(user.user_id, &payload.code)
        .await?;
    Ok(success_response(order))
}

/// Remove the applied coupon
async fn remove_coupon(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.services.checkout.remove_coupon(user.user_id).await?;
    Ok(success_response(order))
}

/// Select a shipping address and delivery tier
async fn apply_shipping(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<ApplyShippingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .checkout
        .apply_shipping(
            user.user_id,
            SelectShipping {
                address_id: payload.address_id,
                delivery_tier: payload.delivery_tier,
            },
        )
        .await?;
    Ok(success_response(order))
}

/// Clear the shipping selection
async fn remove_shipping(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .checkout
        .remove_shipping(user.user_id)
        .await?;
    Ok(success_response(order))
}

/// Finalize the staged order into a durable order
async fn complete_checkout(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<CompleteCheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .checkout
        .finalize(user.user_id, payload.payment_method)
        .await?;

    Ok(created_response(serde_json::json!({
        "order_id": order.id,
        "order_number": order.order_number,
        "status": order.status,
        "total_amount": order.total_amount,
        "currency": order.currency,
    })))
}
