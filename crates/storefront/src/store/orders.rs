//! Order repository.
//!
//! Orders are inserted exactly once by [`OrderRepository::commit`] and
//! afterwards mutated only through compare-and-swap updates driven by the
//! lifecycle service. Orders are never deleted.

use chrono::Utc;

use sundrop_core::{Cart, CustomerId, Order, OrderId, RequestToken};

use super::{MemoryStore, StoreError, Versioned};

/// Outcome of an order commit.
#[derive(Debug)]
pub enum CommitOutcome {
    /// The order was written and the cart cleared.
    Created(Versioned<Order>),
    /// The request token was seen before; this is the order it created.
    /// The cart was not touched.
    Existing(Versioned<Order>),
}

impl CommitOutcome {
    /// The committed order either way.
    #[must_use]
    pub fn into_order(self) -> Versioned<Order> {
        match self {
            Self::Created(order) | Self::Existing(order) => order,
        }
    }
}

/// Repository for order documents.
pub struct OrderRepository<'a> {
    store: &'a MemoryStore,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(store: &'a MemoryStore) -> Self {
        Self { store }
    }

    /// Durably write a new order and clear the source cart, as one unit.
    ///
    /// The write, the idempotency-token record, and the cart clear happen
    /// under a single store lock: a failed order write never loses cart
    /// contents, and a retried request (same `token`) returns the order
    /// already created instead of snapshotting the cart again.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the cart changed since the
    /// caller read it at `cart_version`; nothing is written in that case.
    pub fn commit(
        &self,
        token: &RequestToken,
        order: Order,
        cleared_cart: Cart,
        cart_version: u64,
    ) -> Result<CommitOutcome, StoreError> {
        let mut inner = self.store.write();

        if let Some(existing_id) = inner.order_tokens.get(token).copied() {
            let existing = inner
                .orders
                .get(&existing_id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(format!("order {existing_id}")))?;
            return Ok(CommitOutcome::Existing(existing));
        }

        let owner_id = cleared_cart.owner_id;
        let cart_entry = inner
            .carts
            .entry(owner_id)
            .or_insert_with(|| Versioned::first(Cart::empty(owner_id, Utc::now())));
        if cart_entry.version != cart_version {
            return Err(StoreError::Conflict {
                entity: "cart",
                expected: cart_version,
                found: cart_entry.version,
            });
        }
        cart_entry.version += 1;
        cart_entry.value = cleared_cart;

        let order_id = order.id;
        let versioned = Versioned::first(order);
        inner.orders.insert(order_id, versioned.clone());
        inner.order_tokens.insert(token.clone(), order_id);

        Ok(CommitOutcome::Created(versioned))
    }

    /// Look up the order a request token already created, if any.
    #[must_use]
    pub fn find_by_token(&self, token: &RequestToken) -> Option<Versioned<Order>> {
        let inner = self.store.read();
        let id = inner.order_tokens.get(token)?;
        inner.orders.get(id).cloned()
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such order exists.
    pub fn get(&self, id: OrderId) -> Result<Versioned<Order>, StoreError> {
        self.store
            .read()
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("order {id}")))
    }

    /// Save lifecycle changes to an order, enforcing the version check.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the order does not exist, or
    /// [`StoreError::Conflict`] if the stored version no longer matches.
    pub fn update(
        &self,
        order: Order,
        expected_version: u64,
    ) -> Result<Versioned<Order>, StoreError> {
        let mut inner = self.store.write();
        let entry = inner
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| StoreError::NotFound(format!("order {}", order.id)))?;

        if entry.version != expected_version {
            return Err(StoreError::Conflict {
                entity: "order",
                expected: expected_version,
                found: entry.version,
            });
        }

        entry.version += 1;
        entry.value = order;
        Ok(entry.clone())
    }

    /// All orders belonging to `owner_id`, newest first.
    #[must_use]
    pub fn list_by_owner(&self, owner_id: CustomerId) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .store
            .read()
            .orders
            .values()
            .filter(|entry| entry.value.owner_id == owner_id)
            .map(|entry| entry.value.clone())
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    /// All orders in the store, newest first.
    #[must_use]
    pub fn list_all(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .store
            .read()
            .orders
            .values()
            .map(|entry| entry.value.clone())
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sundrop_core::{
        CartLine, Color, CurrencyCode, OrderStatus, PaymentMethod, Price, ProductId,
        ShippingAddress, Size,
    };

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Ada Buyer".to_string(),
            line1: "1 Orchard Lane".to_string(),
            line2: None,
            city: "Portland".to_string(),
            postal_code: "97201".to_string(),
            country: "US".to_string(),
        }
    }

    fn seeded_cart(owner: CustomerId) -> Cart {
        let mut cart = Cart::empty(owner, Utc::now());
        cart.add_line(
            CartLine {
                product_id: ProductId::generate(),
                title: "Box Tee".to_string(),
                quantity: 1,
                size: Size::M,
                color: Color::Black,
                unit_price: Price::new("24.00".parse().expect("decimal"), CurrencyCode::USD),
            },
            Utc::now(),
        );
        cart
    }

    fn commit_one(store: &MemoryStore, token: &RequestToken) -> Versioned<Order> {
        let owner = CustomerId::generate();
        let carts = super::super::carts::CartRepository::new(store);
        let mut versioned = carts.load_or_create(owner);
        versioned.value = seeded_cart(owner);
        let versioned = carts
            .save(versioned.value, versioned.version)
            .expect("seed cart");

        let order = Order::from_cart(
            OrderId::generate(),
            &versioned.value,
            address(),
            PaymentMethod::Card,
            Utc::now(),
        )
        .expect("non-empty cart");

        let mut cleared = versioned.value.clone();
        cleared.clear(Utc::now());

        OrderRepository::new(store)
            .commit(token, order, cleared, versioned.version)
            .expect("commit")
            .into_order()
    }

    #[test]
    fn commit_writes_order_and_clears_cart() {
        let store = MemoryStore::new();
        let token = RequestToken::generate();
        let order = commit_one(&store, &token);

        assert_eq!(order.value.order_status, OrderStatus::Processing);

        let cart = super::super::carts::CartRepository::new(&store)
            .load_or_create(order.value.owner_id);
        assert!(cart.value.is_empty());
    }

    #[test]
    fn same_token_returns_existing_order() {
        let store = MemoryStore::new();
        let token = RequestToken::generate();
        let first = commit_one(&store, &token);

        // Retry with the same token against a different cart state.
        let repo = OrderRepository::new(&store);
        let stale_cart = Cart::empty(first.value.owner_id, Utc::now());
        let duplicate = Order::from_cart(
            OrderId::generate(),
            &seeded_cart(first.value.owner_id),
            address(),
            PaymentMethod::Card,
            Utc::now(),
        )
        .expect("non-empty cart");

        let outcome = repo
            .commit(&token, duplicate, stale_cart, 999)
            .expect("idempotent retry short-circuits before the version check");
        let order = outcome.into_order();
        assert_eq!(order.value.id, first.value.id);
        assert_eq!(repo.list_all().len(), 1);
    }

    #[test]
    fn stale_cart_version_aborts_commit() {
        let store = MemoryStore::new();
        let token = RequestToken::generate();
        let first = commit_one(&store, &token);
        let owner = first.value.owner_id;

        let fresh_token = RequestToken::generate();
        let order = Order::from_cart(
            OrderId::generate(),
            &seeded_cart(owner),
            address(),
            PaymentMethod::Card,
            Utc::now(),
        )
        .expect("non-empty cart");

        let err = OrderRepository::new(&store)
            .commit(&fresh_token, order, Cart::empty(owner, Utc::now()), 999)
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { entity: "cart", .. }));
        // Nothing was written for the failed token.
        assert_eq!(OrderRepository::new(&store).list_all().len(), 1);
    }

    #[test]
    fn update_enforces_version_check() {
        let store = MemoryStore::new();
        let token = RequestToken::generate();
        let order = commit_one(&store, &token);
        let repo = OrderRepository::new(&store);

        let mut changed = order.value.clone();
        changed
            .transition_to(OrderStatus::Shipped, Utc::now())
            .expect("processing -> shipped");
        repo.update(changed.clone(), order.version).expect("fresh version");

        let err = repo.update(changed, order.version).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { entity: "order", .. }));
    }
}
