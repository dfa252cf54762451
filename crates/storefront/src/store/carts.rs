//! Cart repository.
//!
//! One cart per customer, created lazily on first read or mutation and
//! never deleted. Writes are compare-and-swap against the version read.

use chrono::Utc;

use sundrop_core::{Cart, CustomerId};

use super::{MemoryStore, StoreError, Versioned};

/// Repository for cart documents.
pub struct CartRepository<'a> {
    store: &'a MemoryStore,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(store: &'a MemoryStore) -> Self {
        Self { store }
    }

    /// Load the customer's cart, creating an empty one if none exists.
    ///
    /// Never fails: a missing cart is not an error, it is an empty cart.
    #[must_use]
    pub fn load_or_create(&self, owner_id: CustomerId) -> Versioned<Cart> {
        let mut inner = self.store.write();
        inner
            .carts
            .entry(owner_id)
            .or_insert_with(|| Versioned::first(Cart::empty(owner_id, Utc::now())))
            .clone()
    }

    /// Save a cart, enforcing the version check.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the stored version no longer
    /// matches `expected_version` (another request wrote in between);
    /// the caller re-reads and retries.
    pub fn save(
        &self,
        cart: Cart,
        expected_version: u64,
    ) -> Result<Versioned<Cart>, StoreError> {
        let mut inner = self.store.write();
        let entry = inner
            .carts
            .entry(cart.owner_id)
            .or_insert_with(|| Versioned::first(Cart::empty(cart.owner_id, Utc::now())));

        if entry.version != expected_version {
            return Err(StoreError::Conflict {
                entity: "cart",
                expected: expected_version,
                found: entry.version,
            });
        }

        entry.version += 1;
        entry.value = cart;
        Ok(entry.clone())
    }
}
