use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    entities::order::OrderStatus,
    errors::ApiError,
    handlers::common::success_response,
    AppState,
};

/// Creates the router for durable-order endpoints
pub fn order_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:id", get(get_order))
        .route("/:id/status", put(update_order_status))
        .route("/:id/cancel", post(cancel_order))
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

/// Fetch an order with its items, payment and shipping records
async fn get_order(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let details = state.services.orders.get_order(order_id).await?;
    Ok(success_response(details))
}

/// Set an order's status
async fn update_order_status(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .update_status(order_id, payload.status)
        .await?;
    Ok(success_response(order))
}

/// Cancel an order unless it has already closed out
async fn cancel_order(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.services.orders.cancel_order(order_id).await?;
    Ok(success_response(order))
}
