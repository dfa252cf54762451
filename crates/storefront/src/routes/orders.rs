//! Order route handlers.
//!
//! Customers create, read, and cancel their own orders; admins drive the
//! fulfillment state machine and payment recording across all orders.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use sundrop_core::{Order, OrderId, OrderStatus, PaymentMethod, RequestToken, ShippingAddress};

use crate::error::Result;
use crate::middleware::{RequireAdmin, RequireCustomer};
use crate::state::AppState;

/// Create order payload.
///
/// `request_token` makes retries idempotent; clients that do not supply
/// one get a fresh token (and thus no retry protection).
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub request_token: Option<RequestToken>,
}

/// Record payment payload.
///
/// `transaction_id` is the gateway charge reference; omit it for a
/// payment taken out of band.
#[derive(Debug, Deserialize)]
pub struct MarkPaidRequest {
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// Status transition payload.
#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub order_status: OrderStatus,
}

/// Snapshot the caller's cart into a new order.
#[instrument(skip(state, form))]
pub async fn create(
    State(state): State<AppState>,
    RequireCustomer(caller): RequireCustomer,
    Json(form): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let token = form.request_token.unwrap_or_else(RequestToken::generate);
    let order = state.orders().create_order(
        caller.customer_id,
        form.shipping_address,
        form.payment_method,
        &token,
    )?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// List the caller's own orders, newest first.
#[instrument(skip(state))]
pub async fn my_orders(
    State(state): State<AppState>,
    RequireCustomer(caller): RequireCustomer,
) -> Json<Vec<Order>> {
    Json(state.orders().list_own(caller.customer_id))
}

/// Read one order; owners see their own, admins see any.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    RequireCustomer(caller): RequireCustomer,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(state.orders().get_order(&caller, id)?))
}

/// Record a captured payment (admin).
#[instrument(skip(state))]
pub async fn mark_paid(
    State(state): State<AppState>,
    RequireAdmin(_caller): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(form): Json<MarkPaidRequest>,
) -> Result<Json<Order>> {
    Ok(Json(state.orders().mark_paid(id, form.transaction_id).await?))
}

/// Apply a fulfillment status transition (admin).
#[instrument(skip(state))]
pub async fn set_status(
    State(state): State<AppState>,
    RequireAdmin(_caller): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(form): Json<SetStatusRequest>,
) -> Result<Json<Order>> {
    Ok(Json(
        state.orders().set_order_status(id, form.order_status).await?,
    ))
}

/// Cancel an order; owners cancel their own, admins any.
#[instrument(skip(state))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireCustomer(caller): RequireCustomer,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(state.orders().cancel(&caller, id).await?))
}

/// List every order in the store (admin).
#[instrument(skip(state))]
pub async fn list_all(
    State(state): State<AppState>,
    RequireAdmin(_caller): RequireAdmin,
) -> Json<Vec<Order>> {
    Json(state.orders().list_all())
}
