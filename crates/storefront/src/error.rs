//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Every failure maps to a stable machine-readable `code` plus a
//! human-readable message in a JSON body; internal details never reach
//! the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use sundrop_core::{CartError, OrderError, OrderStatus};

use crate::services::catalog::CatalogError;
use crate::services::payments::PaymentError;
use crate::store::StoreError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (product, order, cart line).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client (invalid quantity, missing address field).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Illegal order status change.
    #[error("Cannot transition order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Payment already recorded.
    #[error("Order is already paid")]
    AlreadyPaid,

    /// Operation not allowed on a cancelled order.
    #[error("Order is cancelled")]
    OrderCancelled,

    /// Order creation attempted from an empty cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Caller lacks rights on the entity.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Lost update detected by the version check; safe to retry.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Payment gateway timeout or error.
    #[error("Payment gateway error: {0}")]
    ExternalService(#[from] PaymentError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::AlreadyPaid => "already_paid",
            Self::OrderCancelled => "order_cancelled",
            Self::EmptyCart => "empty_cart",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::ExternalService(_) => "external_service",
            Self::Internal(_) => "internal",
        }
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::EmptyCart => StatusCode::BAD_REQUEST,
            Self::InvalidTransition { .. }
            | Self::AlreadyPaid
            | Self::OrderCancelled
            | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::ExternalService(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body returned to clients.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(self, Self::Internal(_) | Self::ExternalService(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Internal(_) => "Internal server error".to_string(),
            Self::ExternalService(_) => "Payment gateway unavailable".to_string(),
            _ => self.to_string(),
        };

        let body = ErrorBody {
            code: self.code(),
            message,
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::LineNotFound { .. } => Self::NotFound(err.to_string()),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::EmptyCart => Self::EmptyCart,
            OrderError::InvalidAddress { .. } => Self::Validation(err.to_string()),
            OrderError::InvalidTransition { from, to } => Self::InvalidTransition { from, to },
            OrderError::AlreadyPaid => Self::AlreadyPaid,
            OrderError::OrderCancelled => Self::OrderCancelled,
            OrderError::NotOwner => Self::Forbidden(err.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::NotFound(err.to_string()),
            StoreError::Conflict { .. } => Self::Conflict(err.to_string()),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::ProductNotFound(_) => Self::NotFound(err.to_string()),
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
