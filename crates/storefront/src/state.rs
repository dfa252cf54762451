//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::services::cart::CartService;
use crate::services::catalog::{CachingOracle, PriceOracle};
use crate::services::orders::OrderService;
use crate::services::payments::PaymentGateway;
use crate::store::MemoryStore;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and hands out the two
/// services every route goes through; both share one document store.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    carts: CartService,
    orders: OrderService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The price oracle is wrapped in a TTL cache per the configured
    /// `catalog_cache_ttl`; the gateway is taken as given so tests can
    /// substitute a double.
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        oracle: Arc<dyn PriceOracle>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let store = MemoryStore::new();
        let cached_oracle: Arc<dyn PriceOracle> =
            Arc::new(CachingOracle::new(oracle, config.catalog_cache_ttl));
        let carts = CartService::new(store.clone(), cached_oracle);
        let orders = OrderService::new(store, gateway);

        Self {
            inner: Arc::new(AppStateInner { carts, orders }),
        }
    }

    /// Get a reference to the cart aggregate service.
    #[must_use]
    pub fn carts(&self) -> &CartService {
        &self.inner.carts
    }

    /// Get a reference to the order lifecycle service.
    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }
}
