//! Order snapshot creation and the lifecycle state machine.
//!
//! Lifecycle mutations on one order serialize through a per-order async
//! mutex in addition to the store's version check. The mutex is what
//! makes the refund side effect safe: a second concurrent `cancel`
//! waits, re-reads, sees `cancelled`, and fails the transition check
//! without ever reaching the gateway. Operations on different orders
//! never share a lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::instrument;

use sundrop_core::{
    Caller, CustomerId, Order, OrderId, OrderStatus, PaymentMethod, PaymentResult, RequestToken,
    ShippingAddress,
};

use crate::error::{AppError, Result};
use crate::services::payments::PaymentGateway;
use crate::store::{MemoryStore, carts::CartRepository, orders::OrderRepository};

/// Order snapshot builder and lifecycle state machine.
#[derive(Clone)]
pub struct OrderService {
    store: MemoryStore,
    gateway: Arc<dyn PaymentGateway>,
    /// Per-order lifecycle locks. Entries for terminal orders are
    /// evicted on the transition that ends the lifecycle, so the map
    /// tracks live orders rather than all orders ever created.
    locks: Arc<Mutex<HashMap<OrderId, Arc<tokio::sync::Mutex<()>>>>>,
}

impl OrderService {
    /// Create the service.
    pub fn new(store: MemoryStore, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            store,
            gateway,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Convert the owner's cart into an immutable order and empty the cart.
    ///
    /// Idempotent under caller-supplied retry: a `token` that already
    /// created an order returns that order and leaves the cart alone.
    /// The order write and the cart clear commit as one unit.
    #[instrument(skip(self, shipping_address))]
    pub fn create_order(
        &self,
        owner_id: CustomerId,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
        token: &RequestToken,
    ) -> Result<Order> {
        let orders = OrderRepository::new(&self.store);

        // Fast path for a retried request.
        if let Some(existing) = orders.find_by_token(token) {
            tracing::info!(order_id = %existing.value.id, "request token replayed, returning existing order");
            return Ok(existing.value);
        }

        let carts = CartRepository::new(&self.store);
        let versioned = carts.load_or_create(owner_id);

        let order = match Order::from_cart(
            OrderId::generate(),
            &versioned.value,
            shipping_address,
            payment_method,
            Utc::now(),
        ) {
            Ok(order) => order,
            // A concurrent duplicate of this request may have committed
            // and cleared the cart between the token check and the read.
            Err(err) => {
                if let Some(existing) = orders.find_by_token(token) {
                    return Ok(existing.value);
                }
                return Err(err.into());
            }
        };

        let mut cleared = versioned.value.clone();
        cleared.clear(Utc::now());

        let committed = orders
            .commit(token, order, cleared, versioned.version)?
            .into_order();
        tracing::info!(order_id = %committed.value.id, total = %committed.value.total, "order created");
        Ok(committed.value)
    }

    /// Read one order, enforcing ownership for non-admin callers.
    pub fn get_order(&self, caller: &Caller, order_id: OrderId) -> Result<Order> {
        let order = OrderRepository::new(&self.store).get(order_id)?.value;
        if !caller.may_act_on(order.owner_id) {
            return Err(AppError::Forbidden("not your order".to_string()));
        }
        Ok(order)
    }

    /// All orders owned by the caller, newest first.
    #[must_use]
    pub fn list_own(&self, owner_id: CustomerId) -> Vec<Order> {
        OrderRepository::new(&self.store).list_by_owner(owner_id)
    }

    /// Every order in the store, newest first. Admin surface.
    #[must_use]
    pub fn list_all(&self) -> Vec<Order> {
        OrderRepository::new(&self.store).list_all()
    }

    /// Record a captured payment on an order. Admin surface.
    ///
    /// `transaction_id` is the gateway charge reference when one exists;
    /// a payment taken out of band (phone order) is recorded without one
    /// and will not produce a gateway refund on cancellation.
    #[instrument(skip(self))]
    pub async fn mark_paid(
        &self,
        order_id: OrderId,
        transaction_id: Option<String>,
    ) -> Result<Order> {
        let lock = self.order_lock(order_id);
        let _guard = lock.lock().await;

        let versioned = OrderRepository::new(&self.store).get(order_id)?;
        let mut order = versioned.value;
        let now = Utc::now();
        let result = transaction_id.map_or_else(
            || PaymentResult::manual(now),
            |tx| PaymentResult::gateway(tx, now),
        );
        order.mark_paid(result, now)?;

        Ok(OrderRepository::new(&self.store)
            .update(order, versioned.version)?
            .value)
    }

    /// Apply a fulfillment status transition. Admin surface.
    #[instrument(skip(self))]
    pub async fn set_order_status(&self, order_id: OrderId, target: OrderStatus) -> Result<Order> {
        let lock = self.order_lock(order_id);
        let _guard = lock.lock().await;

        let versioned = OrderRepository::new(&self.store).get(order_id)?;
        let mut order = versioned.value;
        order.transition_to(target, Utc::now())?;

        let saved = OrderRepository::new(&self.store)
            .update(order, versioned.version)?
            .value;
        if saved.order_status.is_terminal() {
            self.release_lock(order_id);
        }
        Ok(saved)
    }

    /// Cancel a `processing` order, refunding through the gateway first
    /// when a paid transaction exists.
    ///
    /// No partial cancellation: if the refund call fails or times out,
    /// nothing is written and the order stays `processing` for the
    /// caller to retry or escalate.
    #[instrument(skip(self, caller))]
    pub async fn cancel(&self, caller: &Caller, order_id: OrderId) -> Result<Order> {
        let lock = self.order_lock(order_id);
        let _guard = lock.lock().await;

        let versioned = OrderRepository::new(&self.store).get(order_id)?;
        let mut order = versioned.value;
        order.ensure_cancellable(caller)?;

        let now = Utc::now();
        if let Some(transaction_id) = order.refundable_transaction().map(str::to_owned) {
            // The one blocking external call; bounded by the gateway
            // client's timeout. Failure aborts the whole cancellation.
            let receipt = self.gateway.refund(&transaction_id).await?;
            tracing::info!(
                %order_id,
                transaction_id,
                refund_id = %receipt.refund_id,
                "refund captured for cancellation"
            );
            order.record_refund(now);
        } else if order.is_paid {
            // Paid without a gateway charge (manual payment): money must
            // move out of band, but the order still reflects the refund.
            tracing::warn!(%order_id, "cancelling manually-paid order; refund must be settled out of band");
            order.record_refund(now);
        }

        order.transition_to(OrderStatus::Cancelled, now)?;
        let saved = OrderRepository::new(&self.store)
            .update(order, versioned.version)?
            .value;
        self.release_lock(order_id);
        Ok(saved)
    }

    fn order_lock(&self, order_id: OrderId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        locks
            .entry(order_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drop the lock entry for an order whose lifecycle has ended.
    ///
    /// Tasks already waiting on the old lock still hold their `Arc` and
    /// finish normally; they re-read the order afterwards and fail the
    /// transition guards, never the refund path. A late caller that
    /// recreates the entry sees the same guards plus the version check.
    fn release_lock(&self, order_id: OrderId) {
        self.locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&order_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use sundrop_core::{
        Cart, CartLine, Color, CurrencyCode, PaymentStatus, Price, ProductId, Size,
    };

    use crate::services::payments::{PaymentError, RefundReceipt};
    use crate::store::carts::CartRepository;

    /// Gateway double: counts refunds, optionally failing them.
    struct MockGateway {
        refunds: AtomicUsize,
        fail: bool,
    }

    impl MockGateway {
        fn succeeding() -> Arc<Self> {
            Arc::new(Self {
                refunds: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                refunds: AtomicUsize::new(0),
                fail: true,
            })
        }

        fn refund_count(&self) -> usize {
            self.refunds.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PaymentGateway for MockGateway {
        async fn refund(&self, transaction_id: &str) -> std::result::Result<RefundReceipt, PaymentError> {
            self.refunds.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PaymentError::Api {
                    status: 503,
                    message: "gateway unavailable".to_string(),
                });
            }
            Ok(RefundReceipt {
                refund_id: format!("re_{transaction_id}"),
            })
        }
    }

    fn usd(amount: &str) -> Price {
        Price::new(amount.parse().expect("decimal"), CurrencyCode::USD)
    }

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

    fn seed_cart(store: &MemoryStore, owner: CustomerId) {
        let repo = CartRepository::new(store);
        let versioned = repo.load_or_create(owner);
        let mut cart: Cart = versioned.value;
        cart.add_line(
            CartLine {
                product_id: ProductId::generate(),
                title: "Box Tee".to_string(),
                quantity: 2,
                size: Size::M,
                color: Color::Black,
                unit_price: usd("24.00"),
            },
            Utc::now(),
        );
        repo.save(cart, versioned.version).expect("seed cart");
    }

    fn service(gateway: Arc<MockGateway>) -> (OrderService, MemoryStore) {
        let store = MemoryStore::new();
        (OrderService::new(store.clone(), gateway), store)
    }

    fn created_order(service: &OrderService, store: &MemoryStore) -> Order {
        let owner = CustomerId::generate();
        seed_cart(store, owner);
        service
            .create_order(owner, address(), PaymentMethod::Card, &RequestToken::generate())
            .expect("create order")
    }

    #[tokio::test]
    async fn create_order_snapshots_and_clears_cart() {
        let (service, store) = service(MockGateway::succeeding());
        let owner = CustomerId::generate();
        seed_cart(&store, owner);

        let order = service
            .create_order(owner, address(), PaymentMethod::Card, &RequestToken::generate())
            .expect("create order");

        assert_eq!(order.order_status, OrderStatus::Processing);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.total, usd("48.00"));

        let cart = CartRepository::new(&store).load_or_create(owner);
        assert!(cart.value.is_empty());
        assert_eq!(cart.value.total, usd("0"));
    }

    #[tokio::test]
    async fn create_order_from_empty_cart_fails() {
        let (service, _store) = service(MockGateway::succeeding());
        let err = service
            .create_order(
                CustomerId::generate(),
                address(),
                PaymentMethod::Card,
                &RequestToken::generate(),
            )
            .unwrap_err();
        assert!(matches!(err, AppError::EmptyCart));
    }

    #[tokio::test]
    async fn retried_token_returns_same_order_once() {
        let (service, store) = service(MockGateway::succeeding());
        let owner = CustomerId::generate();
        seed_cart(&store, owner);
        let token = RequestToken::generate();

        let first = service
            .create_order(owner, address(), PaymentMethod::Card, &token)
            .expect("first attempt");
        // The cart is now empty; without the token the retry would fail
        // with EmptyCart. With it, the original order comes back.
        let second = service
            .create_order(owner, address(), PaymentMethod::Card, &token)
            .expect("retry");

        assert_eq!(first.id, second.id);
        assert_eq!(service.list_all().len(), 1);
    }

    #[tokio::test]
    async fn snapshot_is_immune_to_later_price_changes() {
        // The order copies cart prices verbatim; there is no oracle in
        // this path at all, so a later catalog change cannot reach it.
        let (service, store) = service(MockGateway::succeeding());
        let order = created_order(&service, &store);
        assert_eq!(order.total, usd("48.00"));
        assert_eq!(order.lines.first().map(|l| l.unit_price), Some(usd("24.00")));
    }

    #[tokio::test]
    async fn ship_then_deliver() {
        let (service, store) = service(MockGateway::succeeding());
        let order = created_order(&service, &store);

        let shipped = service
            .set_order_status(order.id, OrderStatus::Shipped)
            .await
            .expect("processing -> shipped");
        assert_eq!(shipped.order_status, OrderStatus::Shipped);

        let delivered = service
            .set_order_status(order.id, OrderStatus::Delivered)
            .await
            .expect("shipped -> delivered");
        assert!(delivered.is_delivered);
        assert!(delivered.delivered_at.is_some());

        let err = service
            .set_order_status(order.id, OrderStatus::Shipped)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn mark_paid_guards() {
        let (service, store) = service(MockGateway::succeeding());
        let order = created_order(&service, &store);

        let paid = service
            .mark_paid(order.id, Some("tx_1".to_string()))
            .await
            .expect("first payment");
        assert!(paid.is_paid);
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert!(paid.paid_at.is_some());

        let err = service.mark_paid(order.id, None).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyPaid));
    }

    #[tokio::test]
    async fn cancel_unpaid_order_skips_gateway() {
        let gateway = MockGateway::succeeding();
        let (service, store) = service(gateway.clone());
        let order = created_order(&service, &store);
        let owner = Caller::customer(order.owner_id);

        let cancelled = service.cancel(&owner, order.id).await.expect("cancel");
        assert_eq!(cancelled.order_status, OrderStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Pending);
        assert_eq!(gateway.refund_count(), 0);
    }

    #[tokio::test]
    async fn cancel_paid_order_refunds_exactly_once() {
        let gateway = MockGateway::succeeding();
        let (service, store) = service(gateway.clone());
        let order = created_order(&service, &store);
        service
            .mark_paid(order.id, Some("tx_1".to_string()))
            .await
            .expect("pay");

        let cancelled = service
            .cancel(&Caller::admin(CustomerId::generate()), order.id)
            .await
            .expect("cancel");

        assert_eq!(gateway.refund_count(), 1);
        assert_eq!(cancelled.order_status, OrderStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
        assert!(!cancelled.is_paid);
        assert!(cancelled.refunded_at.is_some());
    }

    #[tokio::test]
    async fn failed_refund_aborts_cancellation() {
        let gateway = MockGateway::failing();
        let (service, store) = service(gateway.clone());
        let order = created_order(&service, &store);
        service
            .mark_paid(order.id, Some("tx_1".to_string()))
            .await
            .expect("pay");

        let caller = Caller::customer(order.owner_id);
        let err = service.cancel(&caller, order.id).await.unwrap_err();
        assert!(matches!(err, AppError::ExternalService(_)));

        // Untouched: still processing, still paid.
        let after = service.get_order(&caller, order.id).expect("read back");
        assert_eq!(after.order_status, OrderStatus::Processing);
        assert!(after.is_paid);
        assert_eq!(after.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn cancel_shipped_order_fails_and_leaves_it_untouched() {
        let (service, store) = service(MockGateway::succeeding());
        let order = created_order(&service, &store);
        service
            .set_order_status(order.id, OrderStatus::Shipped)
            .await
            .expect("ship");

        let caller = Caller::customer(order.owner_id);
        let err = service.cancel(&caller, order.id).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition {
                from: OrderStatus::Shipped,
                to: OrderStatus::Cancelled,
            }
        ));

        let after = service.get_order(&caller, order.id).expect("read back");
        assert_eq!(after.order_status, OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn stranger_cannot_cancel() {
        let (service, store) = service(MockGateway::succeeding());
        let order = created_order(&service, &store);

        let stranger = Caller::customer(CustomerId::generate());
        let err = service.cancel(&stranger, order.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn manually_paid_order_cancels_without_gateway_call() {
        let gateway = MockGateway::succeeding();
        let (service, store) = service(gateway.clone());
        let order = created_order(&service, &store);
        service.mark_paid(order.id, None).await.expect("manual pay");

        let cancelled = service
            .cancel(&Caller::admin(CustomerId::generate()), order.id)
            .await
            .expect("cancel");

        assert_eq!(gateway.refund_count(), 0);
        assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
        assert_eq!(cancelled.order_status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn terminal_orders_release_their_lifecycle_lock() {
        let (service, store) = service(MockGateway::succeeding());
        let order = created_order(&service, &store);

        // Live orders keep their lock entry across operations.
        service
            .mark_paid(order.id, Some("tx_1".to_string()))
            .await
            .expect("pay");
        assert!(service.locks.lock().expect("lock map").contains_key(&order.id));

        service
            .cancel(&Caller::customer(order.owner_id), order.id)
            .await
            .expect("cancel");
        assert!(!service.locks.lock().expect("lock map").contains_key(&order.id));

        // Delivery is the other terminal exit.
        let delivered = created_order(&service, &store);
        service
            .set_order_status(delivered.id, OrderStatus::Shipped)
            .await
            .expect("ship");
        assert!(service.locks.lock().expect("lock map").contains_key(&delivered.id));
        service
            .set_order_status(delivered.id, OrderStatus::Delivered)
            .await
            .expect("deliver");
        assert!(!service.locks.lock().expect("lock map").contains_key(&delivered.id));
    }

    #[tokio::test]
    async fn concurrent_cancels_refund_once() {
        let gateway = MockGateway::succeeding();
        let (service, store) = service(gateway.clone());
        let order = created_order(&service, &store);
        service
            .mark_paid(order.id, Some("tx_1".to_string()))
            .await
            .expect("pay");

        let caller = Caller::customer(order.owner_id);
        let a = {
            let service = service.clone();
            let caller = caller;
            tokio::spawn(async move { service.cancel(&caller, order.id).await })
        };
        let b = {
            let service = service.clone();
            let caller = caller;
            tokio::spawn(async move { service.cancel(&caller, order.id).await })
        };

        let results = [a.await.expect("join"), b.await.expect("join")];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let invalid = results
            .iter()
            .filter(|r| {
                matches!(
                    r,
                    Err(AppError::InvalidTransition { .. } | AppError::Conflict(_))
                )
            })
            .count();

        assert_eq!(successes, 1);
        assert_eq!(invalid, 1);
        assert_eq!(gateway.refund_count(), 1);
    }
}
