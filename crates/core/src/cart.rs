//! The cart aggregate.
//!
//! A [`Cart`] owns its line items and its total. The total is never
//! accepted from a caller: every mutation goes through a method on
//! `Cart`, and every method ends by recomputing the total from the
//! lines. Call sites cannot forget the invariant because they never
//! touch it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Color, CurrencyCode, CustomerId, Price, ProductId, Size};

/// Errors from cart aggregate operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// The addressed line is not in the cart.
    #[error("no cart line for product {product_id} ({size}/{color})")]
    LineNotFound {
        product_id: ProductId,
        size: Size,
        color: Color,
    },
}

/// Identity key of a cart line.
///
/// At most one line per key exists in a cart; adding the same key again
/// merges quantities instead of appending a duplicate line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineKey {
    pub product_id: ProductId,
    pub size: Size,
    pub color: Color,
}

impl LineKey {
    /// Create a line key.
    #[must_use]
    pub const fn new(product_id: ProductId, size: Size, color: Color) -> Self {
        Self {
            product_id,
            size,
            color,
        }
    }
}

/// One line item in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    /// Product title at the time the line was added, for display.
    pub title: String,
    pub quantity: u32,
    pub size: Size,
    pub color: Color,
    /// Unit price captured from the catalog when the line was first added.
    /// Never re-queried retroactively.
    pub unit_price: Price,
}

impl CartLine {
    /// The identity key of this line.
    #[must_use]
    pub const fn key(&self) -> LineKey {
        LineKey::new(self.product_id, self.size, self.color)
    }

    /// `quantity * unit_price`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// A customer's shopping cart.
///
/// Invariant: `total` always equals the sum of `quantity * unit_price`
/// over `lines`. Enforced by recomputation at the end of every mutator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub owner_id: CustomerId,
    pub lines: Vec<CartLine>,
    pub total: Price,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Create an empty cart for `owner_id`.
    #[must_use]
    pub fn empty(owner_id: CustomerId, now: DateTime<Utc>) -> Self {
        Self {
            owner_id,
            lines: Vec::new(),
            total: Price::zero(CurrencyCode::default()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Add a line to the cart.
    ///
    /// If a line with the same `(product, size, color)` key already
    /// exists its quantity is incremented by `line.quantity` and its
    /// original unit price is kept; otherwise the line is appended.
    pub fn add_line(&mut self, line: CartLine, now: DateTime<Utc>) {
        match self.line_mut(&line.key()) {
            Some(existing) => existing.quantity += line.quantity,
            None => self.lines.push(line),
        }
        self.recompute_total(now);
    }

    /// Replace the quantity of an existing line.
    ///
    /// A quantity of zero removes the line. Unlike [`Self::add_line`],
    /// the quantity is replaced, not incremented.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] if no line matches `key`.
    pub fn update_line(
        &mut self,
        key: &LineKey,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<(), CartError> {
        if self.line(key).is_none() {
            return Err(CartError::LineNotFound {
                product_id: key.product_id,
                size: key.size,
                color: key.color,
            });
        }

        if quantity == 0 {
            self.lines.retain(|line| line.key() != *key);
        } else if let Some(line) = self.line_mut(key) {
            line.quantity = quantity;
        }
        self.recompute_total(now);
        Ok(())
    }

    /// Remove the line matching `key` if present.
    ///
    /// Idempotent: removing an absent line is a no-op, not an error.
    /// Returns whether a line was actually removed.
    pub fn remove_line(&mut self, key: &LineKey, now: DateTime<Utc>) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| line.key() != *key);
        let removed = self.lines.len() != before;
        self.recompute_total(now);
        removed
    }

    /// Empty the cart.
    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.lines.clear();
        self.recompute_total(now);
    }

    /// Look up a line by key.
    #[must_use]
    pub fn line(&self, key: &LineKey) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.key() == *key)
    }

    fn line_mut(&mut self, key: &LineKey) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|line| line.key() == *key)
    }

    /// Restore the total invariant from the current line set.
    ///
    /// The single place `total` is ever written. The total carries the
    /// currency of the lines (an empty cart falls back to the store
    /// default); lines never mix currencies because every price comes
    /// from the one catalog.
    fn recompute_total(&mut self, now: DateTime<Utc>) {
        let currency = self
            .lines
            .first()
            .map_or_else(CurrencyCode::default, |line| line.unit_price.currency_code);
        self.total = self
            .lines
            .iter()
            .map(CartLine::line_total)
            .fold(Price::zero(currency), |acc, line| acc + line);
        self.updated_at = now;
    }
}
