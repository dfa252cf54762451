//! Cart route handlers.
//!
//! All cart operations are scoped to the authenticated caller's own
//! cart; the owner ID comes from the identity extractor, never from the
//! request body.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::instrument;

use sundrop_core::{Cart, Color, ProductId, Size};

use crate::error::Result;
use crate::middleware::RequireCustomer;
use crate::state::AppState;

/// Add to cart payload.
#[derive(Debug, Deserialize)]
pub struct AddLineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    pub size: Size,
    pub color: Color,
}

/// Update cart line payload.
#[derive(Debug, Deserialize)]
pub struct UpdateLineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    pub size: Size,
    pub color: Color,
}

/// Remove cart line payload.
#[derive(Debug, Deserialize)]
pub struct RemoveLineRequest {
    pub product_id: ProductId,
    pub size: Size,
    pub color: Color,
}

/// Get the caller's cart, creating an empty one on first read.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    RequireCustomer(caller): RequireCustomer,
) -> Json<Cart> {
    Json(state.carts().get(caller.customer_id))
}

/// Add a line to the caller's cart.
#[instrument(skip(state))]
pub async fn add(
    State(state): State<AppState>,
    RequireCustomer(caller): RequireCustomer,
    Json(form): Json<AddLineRequest>,
) -> Result<Json<Cart>> {
    let cart = state
        .carts()
        .add_line(
            caller.customer_id,
            form.product_id,
            form.quantity,
            form.size,
            form.color,
        )
        .await?;
    Ok(Json(cart))
}

/// Replace a line's quantity; zero or less removes the line.
#[instrument(skip(state))]
pub async fn update(
    State(state): State<AppState>,
    RequireCustomer(caller): RequireCustomer,
    Json(form): Json<UpdateLineRequest>,
) -> Result<Json<Cart>> {
    let cart = state.carts().update_line(
        caller.customer_id,
        form.product_id,
        form.quantity,
        form.size,
        form.color,
    )?;
    Ok(Json(cart))
}

/// Remove a line; absent lines are a no-op.
#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    RequireCustomer(caller): RequireCustomer,
    Json(form): Json<RemoveLineRequest>,
) -> Result<Json<Cart>> {
    let cart =
        state
            .carts()
            .remove_line(caller.customer_id, form.product_id, form.size, form.color)?;
    Ok(Json(cart))
}

/// Empty the caller's cart.
#[instrument(skip(state))]
pub async fn clear(
    State(state): State<AppState>,
    RequireCustomer(caller): RequireCustomer,
) -> Result<Json<Cart>> {
    Ok(Json(state.carts().clear(caller.customer_id)?))
}
