//! Sundrop Storefront - cart and order service.
//!
//! This binary serves the storefront API on port 3000.
//!
//! # Architecture
//!
//! - Axum web framework with a JSON API surface
//! - In-memory versioned document store for carts and orders
//! - Catalog price oracle consulted on add-to-cart (TTL cached)
//! - HTTP payment gateway adapter for refund-on-cancel
//!
//! Authentication is handled upstream; requests arrive with caller
//! identity headers (see `middleware::auth`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use axum::{Router, routing::get};
use sentry::integrations::tracing as sentry_tracing;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sundrop_core::{CurrencyCode, Price, ProductId};
use sundrop_storefront::config::StorefrontConfig;
use sundrop_storefront::services::catalog::{InMemoryCatalog, ProductQuote};
use sundrop_storefront::services::payments::HttpPaymentGateway;
use sundrop_storefront::{routes, state::AppState};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Seed catalog for the price oracle.
///
/// The real catalog lives in an external service; these fixed IDs are
/// the launch assortment the storefront is deployed with.
fn seed_catalog() -> InMemoryCatalog {
    let seed = [
        ("b1a5e6fe-0e7b-4b3a-9a1e-7d5f5a2b9c01", "Box Tee", "24.00"),
        ("b1a5e6fe-0e7b-4b3a-9a1e-7d5f5a2b9c02", "Heavy Hoodie", "68.00"),
        ("b1a5e6fe-0e7b-4b3a-9a1e-7d5f5a2b9c03", "Canvas Pant", "84.00"),
        ("b1a5e6fe-0e7b-4b3a-9a1e-7d5f5a2b9c04", "Ribbed Beanie", "18.00"),
    ];

    InMemoryCatalog::new(seed.into_iter().map(|(id, title, price)| ProductQuote {
        product_id: id.parse::<ProductId>().expect("seed product id is a valid UUID"),
        title: title.to_string(),
        unit_price: Price::new(
            price.parse().expect("seed price is a valid decimal"),
            CurrencyCode::USD,
        ),
    }))
}

async fn health() -> &'static str {
    "ok"
}

async fn readiness() -> &'static str {
    "ready"
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Initialize tracing with EnvFilter and Sentry integration
    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sundrop_storefront=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let gateway =
        HttpPaymentGateway::new(&config.gateway).expect("Failed to build payment gateway client");

    let addr = config.socket_addr();
    let state = AppState::new(config, Arc::new(seed_catalog()), Arc::new(gateway));

    // Build router
    let app = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .await
        .expect("Server failed");
}
