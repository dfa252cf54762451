//! Order snapshots and the lifecycle state machine.
//!
//! An [`Order`] is created exactly once, from a non-empty cart, and its
//! lines and total are frozen at that instant. The only fields that ever
//! change afterwards are the ones the state machine writes: statuses,
//! flags, timestamps, and the payment result. All guards live on the
//! `Order` methods here; the storefront service orchestrates persistence
//! and the gateway call around them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::Cart;
use crate::types::{
    Caller, Color, CustomerId, OrderId, OrderStatus, PaymentStatus, Price, ProductId, Size,
};

/// Errors from order construction and lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// An order cannot be created from an empty cart.
    #[error("cannot create an order from an empty cart")]
    EmptyCart,

    /// A required shipping address field is empty.
    #[error("shipping address field `{field}` must not be empty")]
    InvalidAddress { field: &'static str },

    /// The requested status change is not in the transition table.
    #[error("cannot transition order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The order is already marked paid.
    #[error("order is already paid")]
    AlreadyPaid,

    /// The order has been cancelled; no payment may be recorded.
    #[error("order is cancelled")]
    OrderCancelled,

    /// The caller does not own this order and is not an admin.
    #[error("caller does not own this order")]
    NotOwner,
}

/// How the customer intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Paypal,
    CashOnDelivery,
}

/// Where the order ships to.
///
/// `line2` is the only optional field; everything else must be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    /// Check that all required fields are present.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidAddress`] naming the first empty field.
    pub fn validate(&self) -> Result<(), OrderError> {
        let required = [
            ("full_name", &self.full_name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(OrderError::InvalidAddress { field });
            }
        }
        Ok(())
    }
}

/// The gateway's record of a captured payment.
///
/// `transaction_id` is `None` when an admin marked the order paid by hand
/// (e.g., payment taken over the phone) and no gateway charge exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub transaction_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl PaymentResult {
    /// A payment captured through the gateway.
    #[must_use]
    pub fn gateway(transaction_id: impl Into<String>, recorded_at: DateTime<Utc>) -> Self {
        Self {
            transaction_id: Some(transaction_id.into()),
            recorded_at,
        }
    }

    /// A payment recorded manually by an admin, with no gateway charge.
    #[must_use]
    pub const fn manual(recorded_at: DateTime<Utc>) -> Self {
        Self {
            transaction_id: None,
            recorded_at,
        }
    }
}

/// An immutable copy of a cart line frozen at order-creation time.
///
/// The unit price here never changes, even if the catalog price does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub title: String,
    pub quantity: u32,
    pub size: Size,
    pub color: Color,
    pub unit_price: Price,
}

impl OrderLine {
    /// `quantity * unit_price`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// A customer order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub owner_id: CustomerId,
    pub lines: Vec<OrderLine>,
    pub total: Price,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub is_paid: bool,
    pub is_delivered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refunded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_result: Option<PaymentResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Snapshot a cart into a new order.
    ///
    /// Lines and total are copied verbatim; prices are not re-queried.
    /// The cart itself is not touched here - emptying it is the
    /// storefront's transactional concern.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::EmptyCart`] if the cart has no lines, or
    /// [`OrderError::InvalidAddress`] if the address fails validation.
    pub fn from_cart(
        id: OrderId,
        cart: &Cart,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if cart.is_empty() {
            return Err(OrderError::EmptyCart);
        }
        shipping_address.validate()?;

        let lines = cart
            .lines
            .iter()
            .map(|line| OrderLine {
                product_id: line.product_id,
                title: line.title.clone(),
                quantity: line.quantity,
                size: line.size,
                color: line.color,
                unit_price: line.unit_price,
            })
            .collect();

        Ok(Self {
            id,
            owner_id: cart.owner_id,
            lines,
            total: cart.total,
            shipping_address,
            payment_method,
            order_status: OrderStatus::Processing,
            payment_status: PaymentStatus::Pending,
            is_paid: false,
            is_delivered: false,
            paid_at: None,
            delivered_at: None,
            refunded_at: None,
            payment_result: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a fulfillment status transition.
    ///
    /// Delivery additionally sets `is_delivered` and `delivered_at`;
    /// every other legal transition changes only the status.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] if the move is not in
    /// the transition table.
    pub fn transition_to(&mut self, target: OrderStatus, now: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.order_status.can_transition_to(target) {
            return Err(OrderError::InvalidTransition {
                from: self.order_status,
                to: target,
            });
        }
        self.order_status = target;
        if target == OrderStatus::Delivered {
            self.is_delivered = true;
            self.delivered_at = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Record a captured payment.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::AlreadyPaid`] if the order is already paid,
    /// or [`OrderError::OrderCancelled`] if it has been cancelled.
    pub fn mark_paid(&mut self, result: PaymentResult, now: DateTime<Utc>) -> Result<(), OrderError> {
        if self.is_paid {
            return Err(OrderError::AlreadyPaid);
        }
        if self.order_status == OrderStatus::Cancelled {
            return Err(OrderError::OrderCancelled);
        }
        self.payment_status = PaymentStatus::Paid;
        self.is_paid = true;
        self.paid_at = Some(now);
        self.payment_result = Some(result);
        self.updated_at = now;
        Ok(())
    }

    /// Check that `caller` may cancel this order right now.
    ///
    /// Cancellation is only legal while the order is `processing`, and
    /// only for the owner or an admin.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::NotOwner`] or [`OrderError::InvalidTransition`].
    pub fn ensure_cancellable(&self, caller: &Caller) -> Result<(), OrderError> {
        if !caller.may_act_on(self.owner_id) {
            return Err(OrderError::NotOwner);
        }
        if self.order_status != OrderStatus::Processing {
            return Err(OrderError::InvalidTransition {
                from: self.order_status,
                to: OrderStatus::Cancelled,
            });
        }
        Ok(())
    }

    /// The gateway transaction to refund on cancellation, if any.
    ///
    /// `None` either because the order was never paid or because the
    /// payment was recorded manually without a gateway charge.
    #[must_use]
    pub fn refundable_transaction(&self) -> Option<&str> {
        if !self.is_paid {
            return None;
        }
        self.payment_result
            .as_ref()
            .and_then(|result| result.transaction_id.as_deref())
    }

    /// Record a completed refund.
    pub fn record_refund(&mut self, now: DateTime<Utc>) {
        self.payment_status = PaymentStatus::Refunded;
        self.is_paid = false;
        self.refunded_at = Some(now);
        self.updated_at = now;
    }
}
