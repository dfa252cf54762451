//! In-memory versioned document store.
//!
//! The storefront persists carts and orders as versioned documents behind
//! one shared [`MemoryStore`] (the analogue of a connection pool);
//! [`carts::CartRepository`] and [`orders::OrderRepository`] expose the
//! typed operations. Every write is a compare-and-swap against the
//! version the caller read: a lost update surfaces as
//! [`StoreError::Conflict`] instead of silently clobbering concurrent
//! changes. Different owners and different orders never contend beyond
//! the brief map access; no lock is held across I/O.

pub mod carts;
pub mod orders;

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use sundrop_core::{Cart, CustomerId, Order, OrderId, RequestToken};

/// Errors that can occur during store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Document does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Version check failed; another writer got there first.
    #[error("version check failed for {entity}: expected {expected}, found {found}")]
    Conflict {
        entity: &'static str,
        expected: u64,
        found: u64,
    },
}

/// A document together with its optimistic-concurrency version.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

impl<T> Versioned<T> {
    const fn first(value: T) -> Self {
        Self { version: 1, value }
    }
}

#[derive(Default)]
pub(crate) struct StoreInner {
    pub(crate) carts: HashMap<CustomerId, Versioned<Cart>>,
    pub(crate) orders: HashMap<OrderId, Versioned<Order>>,
    /// Idempotency index: request token -> the order it already created.
    pub(crate) order_tokens: HashMap<RequestToken, OrderId>,
}

/// Shared handle to the document store.
///
/// Cheaply cloneable; all clones see the same documents.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        // A poisoned lock means a writer panicked mid-operation; the
        // documents themselves are always left whole, so keep serving.
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
