//! Product price oracle.
//!
//! The cart aggregate consults the oracle exactly once, when a new line
//! is added; prices already in a cart or frozen into an order are never
//! re-queried. Quotes are cached with a short TTL so a rapid burst of
//! add-to-cart calls does not hammer the catalog.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use thiserror::Error;

use sundrop_core::{Price, ProductId};

/// Errors from price lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// No product with this ID exists in the catalog.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),
}

/// A priced product at a single instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuote {
    pub product_id: ProductId,
    pub title: String,
    pub unit_price: Price,
}

/// Read-only price/availability lookup by product ID.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Resolve the current quote for a product.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::ProductNotFound`] for unknown products.
    async fn lookup(&self, product_id: ProductId) -> Result<ProductQuote, CatalogError>;
}

/// In-memory catalog backing the oracle.
///
/// The real catalog service is an external collaborator; this shim holds
/// the seed data the storefront is deployed with.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    products: Arc<std::collections::HashMap<ProductId, ProductQuote>>,
}

impl InMemoryCatalog {
    /// Build a catalog from quotes.
    #[must_use]
    pub fn new(quotes: impl IntoIterator<Item = ProductQuote>) -> Self {
        Self {
            products: Arc::new(
                quotes
                    .into_iter()
                    .map(|quote| (quote.product_id, quote))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl PriceOracle for InMemoryCatalog {
    async fn lookup(&self, product_id: ProductId) -> Result<ProductQuote, CatalogError> {
        self.products
            .get(&product_id)
            .cloned()
            .ok_or(CatalogError::ProductNotFound(product_id))
    }
}

/// TTL-bounded caching layer over any oracle.
#[derive(Clone)]
pub struct CachingOracle {
    inner: Arc<dyn PriceOracle>,
    cache: Cache<ProductId, ProductQuote>,
}

impl CachingOracle {
    /// Wrap `inner` with a quote cache.
    #[must_use]
    pub fn new(inner: Arc<dyn PriceOracle>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(ttl)
            .build();
        Self { inner, cache }
    }
}

#[async_trait]
impl PriceOracle for CachingOracle {
    async fn lookup(&self, product_id: ProductId) -> Result<ProductQuote, CatalogError> {
        if let Some(quote) = self.cache.get(&product_id).await {
            return Ok(quote);
        }
        let quote = self.inner.lookup(product_id).await?;
        self.cache.insert(product_id, quote.clone()).await;
        Ok(quote)
    }
}
