//! Integration tests for Sundrop.
//!
//! Tests drive the full storefront router in process via
//! `tower::ServiceExt::oneshot` - no sockets, no database, no external
//! services. The payment gateway is a recording double so tests can
//! assert exactly how many refunds a scenario triggered.
//!
//! # Test Categories
//!
//! - `cart_flow` - cart CRUD, pricing, and identity enforcement
//! - `order_lifecycle` - order creation, payment, fulfillment, cancellation

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header::CONTENT_TYPE};
use secrecy::SecretString;
use tower::ServiceExt;

use sundrop_core::{CurrencyCode, CustomerId, Price, ProductId};
use sundrop_storefront::config::{PaymentGatewayConfig, StorefrontConfig};
use sundrop_storefront::middleware::{CUSTOMER_ID_HEADER, ROLE_HEADER};
use sundrop_storefront::routes;
use sundrop_storefront::services::catalog::{InMemoryCatalog, ProductQuote};
use sundrop_storefront::services::payments::{PaymentError, PaymentGateway, RefundReceipt};
use sundrop_storefront::state::AppState;

/// Configuration for tests; the gateway endpoint is never dialed because
/// tests substitute [`RecordingGateway`].
fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        host: "127.0.0.1".parse().expect("loopback address"),
        port: 0,
        gateway: PaymentGatewayConfig {
            endpoint: "http://gateway.invalid/".parse().expect("valid url"),
            api_key: SecretString::from("sk_live_integration_0000"),
            timeout: Duration::from_millis(100),
        },
        catalog_cache_ttl: Duration::from_secs(60),
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// Payment gateway double that records refunds instead of moving money.
pub struct RecordingGateway {
    fail: bool,
    refunds: AtomicUsize,
    transactions: std::sync::Mutex<Vec<String>>,
}

impl RecordingGateway {
    /// A gateway whose refunds always succeed.
    #[must_use]
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            refunds: AtomicUsize::new(0),
            transactions: std::sync::Mutex::new(Vec::new()),
        })
    }

    /// A gateway whose refunds always fail with a 502.
    #[must_use]
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            refunds: AtomicUsize::new(0),
            transactions: std::sync::Mutex::new(Vec::new()),
        })
    }

    /// How many refunds completed successfully.
    #[must_use]
    pub fn refund_count(&self) -> usize {
        self.refunds.load(Ordering::SeqCst)
    }

    /// Transaction IDs refunded, in order.
    #[must_use]
    pub fn refunded_transactions(&self) -> Vec<String> {
        self.transactions.lock().expect("gateway mutex").clone()
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn refund(&self, transaction_id: &str) -> Result<RefundReceipt, PaymentError> {
        if self.fail {
            return Err(PaymentError::Api {
                status: 502,
                message: "gateway unavailable".to_string(),
            });
        }
        self.refunds.fetch_add(1, Ordering::SeqCst);
        self.transactions
            .lock()
            .expect("gateway mutex")
            .push(transaction_id.to_string());
        Ok(RefundReceipt {
            refund_id: format!("re_{transaction_id}"),
        })
    }
}

/// The storefront app wired with an in-memory catalog and a gateway double.
pub struct TestApp {
    router: Router,
    pub gateway: Arc<RecordingGateway>,
    /// "Box Tee", 24.00 USD.
    pub tee: ProductQuote,
    /// "Heavy Hoodie", 68.00 USD.
    pub hoodie: ProductQuote,
}

fn quote(title: &str, amount: &str) -> ProductQuote {
    ProductQuote {
        product_id: ProductId::generate(),
        title: title.to_string(),
        unit_price: Price::new(amount.parse().expect("decimal literal"), CurrencyCode::USD),
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        Self::with_gateway(RecordingGateway::succeeding())
    }

    #[must_use]
    pub fn with_gateway(gateway: Arc<RecordingGateway>) -> Self {
        let tee = quote("Box Tee", "24.00");
        let hoodie = quote("Heavy Hoodie", "68.00");
        let catalog = InMemoryCatalog::new([tee.clone(), hoodie.clone()]);

        let state = AppState::new(test_config(), Arc::new(catalog), gateway.clone());
        let router = routes::routes().with_state(state);

        Self {
            router,
            gateway,
            tee,
            hoodie,
        }
    }

    /// Send one request through the router and decode the JSON body.
    ///
    /// Bodyless responses decode as `Value::Null`.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response body is JSON")
        };
        (status, json)
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

fn build_request(
    method: &str,
    path: &str,
    identity: Option<(CustomerId, &str)>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some((customer_id, role)) = identity {
        builder = builder
            .header(CUSTOMER_ID_HEADER, customer_id.to_string())
            .header(ROLE_HEADER, role);
    }
    match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("valid request"),
        None => builder.body(Body::empty()).expect("valid request"),
    }
}

/// A request authenticated as a customer.
#[must_use]
pub fn as_customer(
    method: &str,
    path: &str,
    customer_id: CustomerId,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    build_request(method, path, Some((customer_id, "customer")), body)
}

/// A request authenticated as an admin.
#[must_use]
pub fn as_admin(
    method: &str,
    path: &str,
    customer_id: CustomerId,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    build_request(method, path, Some((customer_id, "admin")), body)
}

/// A request with no identity headers.
#[must_use]
pub fn anonymous(method: &str, path: &str, body: Option<serde_json::Value>) -> Request<Body> {
    build_request(method, path, None, body)
}

/// A shipping address that passes validation.
#[must_use]
pub fn valid_address() -> serde_json::Value {
    serde_json::json!({
        "full_name": "Ada Buyer",
        "line1": "1 Orchard Lane",
        "city": "Portland",
        "postal_code": "97201",
        "country": "US",
    })
}
