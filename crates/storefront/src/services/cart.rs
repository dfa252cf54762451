//! Cart aggregate service.
//!
//! Every operation is a read-modify-write scoped to one owner: load the
//! cart at a version, mutate through the aggregate's methods (which
//! restore the total invariant), and save with a compare-and-swap. A
//! concurrent writer turns the save into `Conflict`, which the caller
//! retries; two racing mutations can never produce a total that does not
//! match the final line set.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use sundrop_core::{Cart, CartLine, Color, CustomerId, LineKey, ProductId, Size};

use crate::error::{AppError, Result};
use crate::services::catalog::PriceOracle;
use crate::store::{MemoryStore, carts::CartRepository};

/// The cart aggregate service.
#[derive(Clone)]
pub struct CartService {
    store: MemoryStore,
    oracle: Arc<dyn PriceOracle>,
}

impl CartService {
    /// Create the service.
    pub fn new(store: MemoryStore, oracle: Arc<dyn PriceOracle>) -> Self {
        Self { store, oracle }
    }

    /// Get the owner's cart, creating an empty one if none exists.
    #[must_use]
    pub fn get(&self, owner_id: CustomerId) -> Cart {
        CartRepository::new(&self.store).load_or_create(owner_id).value
    }

    /// Add a line to the owner's cart.
    ///
    /// The unit price is resolved through the price oracle at this
    /// instant; an existing `(product, size, color)` line merges
    /// quantities and keeps its original price.
    #[instrument(skip(self))]
    pub async fn add_line(
        &self,
        owner_id: CustomerId,
        product_id: ProductId,
        quantity: i64,
        size: Size,
        color: Color,
    ) -> Result<Cart> {
        let quantity = positive_quantity(quantity)?;
        let quote = self.oracle.lookup(product_id).await?;

        let repo = CartRepository::new(&self.store);
        let versioned = repo.load_or_create(owner_id);
        let mut cart = versioned.value;
        cart.add_line(
            CartLine {
                product_id,
                title: quote.title,
                quantity,
                size,
                color,
                unit_price: quote.unit_price,
            },
            Utc::now(),
        );
        Ok(repo.save(cart, versioned.version)?.value)
    }

    /// Replace the quantity of an existing line.
    ///
    /// A quantity of zero or less removes the line.
    #[instrument(skip(self))]
    pub fn update_line(
        &self,
        owner_id: CustomerId,
        product_id: ProductId,
        quantity: i64,
        size: Size,
        color: Color,
    ) -> Result<Cart> {
        let quantity = removal_or_quantity(quantity)?;

        let repo = CartRepository::new(&self.store);
        let versioned = repo.load_or_create(owner_id);
        let mut cart = versioned.value;
        cart.update_line(&LineKey::new(product_id, size, color), quantity, Utc::now())?;
        Ok(repo.save(cart, versioned.version)?.value)
    }

    /// Remove a line if present; a no-op when absent.
    #[instrument(skip(self))]
    pub fn remove_line(
        &self,
        owner_id: CustomerId,
        product_id: ProductId,
        size: Size,
        color: Color,
    ) -> Result<Cart> {
        let repo = CartRepository::new(&self.store);
        let versioned = repo.load_or_create(owner_id);
        let mut cart = versioned.value;
        cart.remove_line(&LineKey::new(product_id, size, color), Utc::now());
        Ok(repo.save(cart, versioned.version)?.value)
    }

    /// Empty the owner's cart.
    #[instrument(skip(self))]
    pub fn clear(&self, owner_id: CustomerId) -> Result<Cart> {
        let repo = CartRepository::new(&self.store);
        let versioned = repo.load_or_create(owner_id);
        let mut cart = versioned.value;
        cart.clear(Utc::now());
        Ok(repo.save(cart, versioned.version)?.value)
    }
}

fn positive_quantity(quantity: i64) -> Result<u32> {
    if quantity < 1 {
        return Err(AppError::Validation(format!(
            "quantity must be at least 1, got {quantity}"
        )));
    }
    u32::try_from(quantity)
        .map_err(|_| AppError::Validation(format!("quantity {quantity} out of range")))
}

/// Update semantics: zero or less means "remove the line"; anything
/// positive must still fit a line quantity.
fn removal_or_quantity(quantity: i64) -> Result<u32> {
    if quantity <= 0 {
        return Ok(0);
    }
    u32::try_from(quantity)
        .map_err(|_| AppError::Validation(format!("quantity {quantity} out of range")))
}
