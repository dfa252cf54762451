//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check
//!
//! # Cart (owner)
//! GET    /cart                 - Current cart (created lazily)
//! POST   /cart/add             - Add a line
//! PUT    /cart/update          - Replace a line quantity
//! DELETE /cart/remove          - Remove a line (idempotent)
//! DELETE /cart/clear           - Empty the cart
//!
//! # Orders
//! POST /orders                 - Snapshot cart into an order (owner)
//! GET  /orders/my-orders       - Caller's orders, newest first (owner)
//! GET  /orders/{id}            - One order (owner or admin)
//! PUT  /orders/{id}/payment    - Record payment (admin)
//! PUT  /orders/{id}/status     - Fulfillment transition (admin)
//! PUT  /orders/{id}/cancel     - Cancel + refund (owner or admin)
//! GET  /orders/all/orders      - Every order (admin)
//! ```

pub mod cart;
pub mod orders;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", put(cart::update))
        .route("/remove", delete(cart::remove))
        .route("/clear", delete(cart::clear))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(orders::create))
        .route("/my-orders", get(orders::my_orders))
        .route("/all/orders", get(orders::list_all))
        .route("/{id}", get(orders::show))
        .route("/{id}/payment", put(orders::mark_paid))
        .route("/{id}/status", put(orders::set_status))
        .route("/{id}/cancel", put(orders::cancel))
}

/// Create the full application router (without state).
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
}
