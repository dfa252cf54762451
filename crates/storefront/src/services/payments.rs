//! Payment gateway adapter.
//!
//! The gateway performs real money movement and is treated as untrusted:
//! every call is bounded by the configured timeout, and a timeout or
//! error response surfaces as [`PaymentError`] for the caller to handle.
//! Cancellation semantics depend on this: a failed refund must abort the
//! cancellation, so the adapter never swallows failures.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::PaymentGatewayConfig;

/// Errors that can occur when interacting with the payment gateway.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed (includes timeouts).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway returned an error response.
    #[error("gateway error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to build the client or parse a response.
    #[error("gateway protocol error: {0}")]
    Protocol(String),
}

/// The gateway's record of a completed refund.
#[derive(Debug, Clone, Deserialize)]
pub struct RefundReceipt {
    /// Gateway-assigned refund identifier.
    pub refund_id: String,
}

/// Charge/refund capability keyed by transaction ID.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Refund the full charge behind `transaction_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError`] on timeout, transport failure, or a
    /// non-success gateway response. Callers must treat any error as
    /// "no refund happened".
    async fn refund(&self, transaction_id: &str) -> Result<RefundReceipt, PaymentError>;
}

#[derive(Debug, Serialize)]
struct RefundRequest<'a> {
    transaction_id: &'a str,
}

/// HTTP client for the real payment gateway.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpPaymentGateway {
    /// Create a new gateway client.
    ///
    /// The request timeout from config applies to every call, connect
    /// time included.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaymentGatewayConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.api_key.expose_secret());
        let mut auth_header = HeaderValue::from_str(&auth_value)
            .map_err(|e| PaymentError::Protocol(format!("invalid API key format: {e}")))?;
        auth_header.set_sensitive(true);
        headers.insert("Authorization", auth_header);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    fn refunds_url(&self) -> Result<Url, PaymentError> {
        self.endpoint
            .join("refunds")
            .map_err(|e| PaymentError::Protocol(format!("invalid gateway endpoint: {e}")))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn refund(&self, transaction_id: &str) -> Result<RefundReceipt, PaymentError> {
        let url = self.refunds_url()?;
        let response = self
            .client
            .post(url)
            .json(&RefundRequest { transaction_id })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let receipt: RefundReceipt = response
            .json()
            .await
            .map_err(|e| PaymentError::Protocol(e.to_string()))?;

        tracing::info!(
            transaction_id,
            refund_id = %receipt.refund_id,
            "gateway refund completed"
        );
        Ok(receipt)
    }
}
