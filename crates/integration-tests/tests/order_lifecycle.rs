//! Order lifecycle through the HTTP surface.
//!
//! Covers order creation from a cart (including the idempotency token),
//! ownership checks, payment recording, fulfillment transitions, and
//! cancellation with its refund semantics.

use serde_json::{Value, json};

use axum::http::StatusCode;
use sundrop_core::CustomerId;
use sundrop_integration_tests::{
    RecordingGateway, TestApp, as_admin, as_customer, valid_address,
};

fn create_body(token: Option<&str>) -> Value {
    let mut body = json!({
        "shipping_address": valid_address(),
        "payment_method": "card",
    });
    if let Some(token) = token {
        body["request_token"] = json!(token);
    }
    body
}

/// Put two tees in the customer's cart and check out, returning the order.
async fn checkout(app: &TestApp, customer: CustomerId) -> Value {
    let add = json!({
        "product_id": app.tee.product_id,
        "quantity": 2,
        "size": "m",
        "color": "black",
    });
    let (status, _) = app
        .send(as_customer("POST", "/cart/add", customer, Some(add)))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, order) = app
        .send(as_customer("POST", "/orders", customer, Some(create_body(None))))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    order
}

fn order_path(order: &Value, suffix: &str) -> String {
    let id = order["id"].as_str().expect("order id");
    format!("/orders/{id}{suffix}")
}

#[tokio::test]
async fn create_snapshots_the_cart_and_empties_it() {
    let app = TestApp::new();
    let customer = CustomerId::generate();

    let order = checkout(&app, customer).await;
    assert_eq!(order["owner_id"], json!(customer));
    assert_eq!(order["order_status"], "processing");
    assert_eq!(order["payment_status"], "pending");
    assert_eq!(order["is_paid"], false);
    assert_eq!(order["lines"].as_array().expect("lines").len(), 1);
    assert_eq!(order["total"]["amount"], "48.00");

    let (_, cart) = app.send(as_customer("GET", "/cart", customer, None)).await;
    assert_eq!(cart["lines"], json!([]));
}

#[tokio::test]
async fn create_from_an_empty_cart_is_rejected() {
    let app = TestApp::new();
    let customer = CustomerId::generate();

    let (status, body) = app
        .send(as_customer("POST", "/orders", customer, Some(create_body(None))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "empty_cart");
}

#[tokio::test]
async fn create_rejects_a_blank_address_field() {
    let app = TestApp::new();
    let customer = CustomerId::generate();

    let add = json!({
        "product_id": app.tee.product_id,
        "quantity": 1,
        "size": "s",
        "color": "white",
    });
    app.send(as_customer("POST", "/cart/add", customer, Some(add)))
        .await;

    let mut body = create_body(None);
    body["shipping_address"]["city"] = json!("   ");
    let (status, body) = app
        .send(as_customer("POST", "/orders", customer, Some(body)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");
}

#[tokio::test]
async fn retried_token_returns_the_same_order() {
    let app = TestApp::new();
    let customer = CustomerId::generate();

    let add = json!({
        "product_id": app.hoodie.product_id,
        "quantity": 1,
        "size": "l",
        "color": "olive",
    });
    app.send(as_customer("POST", "/cart/add", customer, Some(add)))
        .await;

    let body = create_body(Some("checkout-attempt-1"));
    let (status, first) = app
        .send(as_customer("POST", "/orders", customer, Some(body.clone())))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // The retry lands after the cart was emptied; the token resolves it
    // to the order already created instead of failing on the empty cart.
    let (status, second) = app
        .send(as_customer("POST", "/orders", customer, Some(body)))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["id"], second["id"]);

    let (_, orders) = app
        .send(as_customer("GET", "/orders/my-orders", customer, None))
        .await;
    assert_eq!(orders.as_array().expect("orders").len(), 1);
}

#[tokio::test]
async fn only_the_owner_or_an_admin_can_read_an_order() {
    let app = TestApp::new();
    let owner = CustomerId::generate();
    let order = checkout(&app, owner).await;
    let path = order_path(&order, "");

    let (status, _) = app.send(as_customer("GET", &path, owner, None)).await;
    assert_eq!(status, StatusCode::OK);

    let stranger = CustomerId::generate();
    let (status, body) = app.send(as_customer("GET", &path, stranger, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, _) = app
        .send(as_admin("GET", &path, CustomerId::generate(), None))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn my_orders_lists_only_the_callers_orders() {
    let app = TestApp::new();
    let alice = CustomerId::generate();
    let bob = CustomerId::generate();

    let alice_order = checkout(&app, alice).await;
    checkout(&app, bob).await;

    let (status, orders) = app
        .send(as_customer("GET", "/orders/my-orders", alice, None))
        .await;
    assert_eq!(status, StatusCode::OK);
    let orders = orders.as_array().expect("orders");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], alice_order["id"]);
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let app = TestApp::new();
    let path = format!("/orders/{}", uuid::Uuid::new_v4());

    let (status, body) = app
        .send(as_customer("GET", &path, CustomerId::generate(), None))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn recording_payment_is_admin_only() {
    let app = TestApp::new();
    let owner = CustomerId::generate();
    let order = checkout(&app, owner).await;
    let path = order_path(&order, "/payment");
    let payment = json!({ "transaction_id": "tx_123" });

    // The owner cannot record their own payment.
    let (status, body) = app
        .send(as_customer("PUT", &path, owner, Some(payment.clone())))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let admin = CustomerId::generate();
    let (status, order) = app.send(as_admin("PUT", &path, admin, Some(payment))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["payment_status"], "paid");
    assert_eq!(order["is_paid"], true);
    assert_eq!(order["payment_result"]["transaction_id"], "tx_123");
    assert!(order["paid_at"].is_string());

    // Paying twice is a conflict.
    let (status, body) = app
        .send(as_admin("PUT", &path, admin, Some(json!({"transaction_id": "tx_456"}))))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_paid");
}

#[tokio::test]
async fn fulfillment_walks_the_transition_table() {
    let app = TestApp::new();
    let owner = CustomerId::generate();
    let order = checkout(&app, owner).await;
    let path = order_path(&order, "/status");
    let admin = CustomerId::generate();

    // processing -> delivered skips a step and is rejected.
    let (status, body) = app
        .send(as_admin("PUT", &path, admin, Some(json!({"order_status": "delivered"}))))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_transition");

    let (status, order) = app
        .send(as_admin("PUT", &path, admin, Some(json!({"order_status": "shipped"}))))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["order_status"], "shipped");

    let (status, order) = app
        .send(as_admin("PUT", &path, admin, Some(json!({"order_status": "delivered"}))))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["order_status"], "delivered");
    assert_eq!(order["is_delivered"], true);
    assert!(order["delivered_at"].is_string());
}

#[tokio::test]
async fn cancelling_an_unpaid_order_skips_the_gateway() {
    let app = TestApp::new();
    let owner = CustomerId::generate();
    let order = checkout(&app, owner).await;

    let (status, order) = app
        .send(as_customer("PUT", &order_path(&order, "/cancel"), owner, None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["order_status"], "cancelled");
    assert_eq!(order["payment_status"], "pending");
    assert_eq!(app.gateway.refund_count(), 0);
}

#[tokio::test]
async fn cancelling_a_paid_order_refunds_through_the_gateway() {
    let app = TestApp::new();
    let owner = CustomerId::generate();
    let order = checkout(&app, owner).await;

    let admin = CustomerId::generate();
    app.send(as_admin(
        "PUT",
        &order_path(&order, "/payment"),
        admin,
        Some(json!({"transaction_id": "tx_123"})),
    ))
    .await;

    let (status, order) = app
        .send(as_customer("PUT", &order_path(&order, "/cancel"), owner, None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["order_status"], "cancelled");
    assert_eq!(order["payment_status"], "refunded");
    assert_eq!(order["is_paid"], false);
    assert!(order["refunded_at"].is_string());
    assert_eq!(app.gateway.refund_count(), 1);
    assert_eq!(app.gateway.refunded_transactions(), vec!["tx_123"]);
}

#[tokio::test]
async fn manually_paid_orders_cancel_without_a_gateway_call() {
    let app = TestApp::new();
    let owner = CustomerId::generate();
    let order = checkout(&app, owner).await;

    // Payment recorded by hand carries no transaction to refund.
    let admin = CustomerId::generate();
    app.send(as_admin(
        "PUT",
        &order_path(&order, "/payment"),
        admin,
        Some(json!({})),
    ))
    .await;

    let (status, order) = app
        .send(as_customer("PUT", &order_path(&order, "/cancel"), owner, None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["order_status"], "cancelled");
    assert_eq!(order["payment_status"], "refunded");
    assert_eq!(app.gateway.refund_count(), 0);
}

#[tokio::test]
async fn a_failed_refund_aborts_the_cancellation() {
    let app = TestApp::with_gateway(RecordingGateway::failing());
    let owner = CustomerId::generate();
    let order = checkout(&app, owner).await;

    let admin = CustomerId::generate();
    app.send(as_admin(
        "PUT",
        &order_path(&order, "/payment"),
        admin,
        Some(json!({"transaction_id": "tx_123"})),
    ))
    .await;

    let (status, body) = app
        .send(as_customer("PUT", &order_path(&order, "/cancel"), owner, None))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "external_service");

    // Nothing was written; the order is still live and paid.
    let (_, order) = app
        .send(as_customer("GET", &order_path(&order, ""), owner, None))
        .await;
    assert_eq!(order["order_status"], "processing");
    assert_eq!(order["payment_status"], "paid");
    assert_eq!(order["is_paid"], true);
}

#[tokio::test]
async fn shipped_orders_cannot_be_cancelled() {
    let app = TestApp::new();
    let owner = CustomerId::generate();
    let order = checkout(&app, owner).await;

    let admin = CustomerId::generate();
    app.send(as_admin(
        "PUT",
        &order_path(&order, "/status"),
        admin,
        Some(json!({"order_status": "shipped"})),
    ))
    .await;

    let (status, body) = app
        .send(as_customer("PUT", &order_path(&order, "/cancel"), owner, None))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_transition");
}

#[tokio::test]
async fn only_the_owner_or_an_admin_can_cancel() {
    let app = TestApp::new();
    let owner = CustomerId::generate();
    let order = checkout(&app, owner).await;
    let path = order_path(&order, "/cancel");

    let stranger = CustomerId::generate();
    let (status, body) = app.send(as_customer("PUT", &path, stranger, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, order) = app
        .send(as_admin("PUT", &path, CustomerId::generate(), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["order_status"], "cancelled");
}

#[tokio::test]
async fn the_full_order_list_is_admin_only() {
    let app = TestApp::new();
    let alice = CustomerId::generate();
    let bob = CustomerId::generate();
    checkout(&app, alice).await;
    checkout(&app, bob).await;

    let (status, body) = app
        .send(as_customer("GET", "/orders/all/orders", alice, None))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, orders) = app
        .send(as_admin("GET", "/orders/all/orders", CustomerId::generate(), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders.as_array().expect("orders").len(), 2);
}
