//! Payment providers.
//!
//! Exactly one provider is active per deployment, selected by
//! `PAYMENT_PROVIDER`. [`PaymentGateway`] wraps it and implements
//! [`PaymentProvider`] by dispatching to the configured variant.
//!
//! Callbacks are verified before anything else looks at them: a
//! [`ProviderEvent`] only exists once the signature has been checked and the
//! payload decoded.

pub mod liqpay;
pub mod stripe;

use axum::http::HeaderMap;
use bulava_core::{CurrencyError, OrderReference, OrderStatus};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::config::PaymentConfig;
use crate::db::StatusUpdate;
use crate::models::{NewOrderItem, OrderLookup};

pub use liqpay::LiqPayProvider;
pub use stripe::StripeProvider;

/// Errors raised while talking to, or hearing from, a payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// A required callback field or header is absent.
    #[error("missing callback field: {0}")]
    MissingField(&'static str),

    /// The callback signature does not match.
    #[error("invalid callback signature")]
    InvalidSignature,

    /// The signature timestamp is outside the accepted tolerance.
    #[error("callback signature timestamp outside tolerance")]
    StaleSignature,

    /// The signature is valid but the payload could not be decoded.
    #[error("malformed callback payload: {0}")]
    MalformedPayload(String),

    /// The provider API could not be reached.
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider API answered with an error.
    #[error("provider API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// An amount could not be expressed in the provider's units.
    #[error("invalid amount: {0}")]
    Amount(#[from] CurrencyError),
}

impl PaymentError {
    /// Whether this error rejects an incoming callback (as opposed to an
    /// outgoing API failure).
    #[must_use]
    pub const fn is_callback_rejection(&self) -> bool {
        matches!(
            self,
            Self::MissingField(_)
                | Self::InvalidSignature
                | Self::StaleSignature
                | Self::MalformedPayload(_)
        )
    }
}

/// Everything a provider needs to start collecting payment for an order.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub reference: OrderReference,
    pub total: Decimal,
    pub items: Vec<NewOrderItem>,
    pub customer_email: Option<String>,
    /// Where the customer lands after paying.
    pub result_url: String,
    /// Where the customer lands after abandoning the provider page.
    pub cancel_url: String,
    /// Server-to-server notification URL.
    pub callback_url: String,
}

impl CheckoutRequest {
    /// Human-readable payment description shown on the provider page.
    #[must_use]
    pub fn description(&self) -> String {
        format!("Payment for order {} at Bulava Arms", self.reference)
    }
}

/// How the customer is sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentRequest {
    /// A form the browser posts to the provider's hosted checkout.
    HostedForm {
        action_url: String,
        data: String,
        signature: String,
    },
    /// A provider-hosted session the browser is redirected to.
    Redirect { url: String, session_id: String },
}

/// A raw callback as received over HTTP.
#[derive(Debug, Clone, Copy)]
pub struct CallbackRequest<'a> {
    pub headers: &'a HeaderMap,
    pub body: &'a [u8],
}

/// A verified provider notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEvent {
    /// The order this event is about; `None` for events that carry no order
    /// reference, which are acknowledged and ignored.
    pub lookup: Option<OrderLookup>,
    /// The provider's own status word, kept for logging.
    pub provider_status: String,
    pub update: StatusUpdate,
}

/// A payment provider integration.
#[allow(async_fn_in_trait)]
pub trait PaymentProvider {
    /// Provider name as stored on orders.
    fn name(&self) -> &'static str;

    /// Prepare the customer-facing payment request for a freshly created order.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if the amount cannot be encoded or the provider
    /// API call fails.
    async fn build_payment_request(
        &self,
        checkout: &CheckoutRequest,
    ) -> Result<PaymentRequest, PaymentError>;

    /// Verify a callback and decode it into a [`ProviderEvent`].
    ///
    /// # Errors
    ///
    /// Returns a callback-rejection `PaymentError` for missing fields, bad
    /// signatures or undecodable payloads.
    fn verify_callback(&self, callback: CallbackRequest<'_>) -> Result<ProviderEvent, PaymentError>;

    /// Map a provider status word to an order status. Unknown words map to
    /// [`OrderStatus::Pending`].
    fn map_status(&self, provider_status: &str) -> OrderStatus;
}

/// The payment provider active in this deployment.
#[derive(Debug, Clone)]
pub enum PaymentGateway {
    LiqPay(LiqPayProvider),
    Stripe(StripeProvider),
}

impl PaymentGateway {
    /// Build the configured provider.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http` if the Stripe HTTP client cannot be built.
    pub fn from_config(config: &PaymentConfig) -> Result<Self, PaymentError> {
        match config {
            PaymentConfig::LiqPay(liqpay) => Ok(Self::LiqPay(LiqPayProvider::new(liqpay.clone()))),
            PaymentConfig::Stripe(stripe) => Ok(Self::Stripe(StripeProvider::new(stripe.clone())?)),
        }
    }
}

impl PaymentProvider for PaymentGateway {
    fn name(&self) -> &'static str {
        match self {
            Self::LiqPay(p) => p.name(),
            Self::Stripe(p) => p.name(),
        }
    }

    async fn build_payment_request(
        &self,
        checkout: &CheckoutRequest,
    ) -> Result<PaymentRequest, PaymentError> {
        match self {
            Self::LiqPay(p) => p.build_payment_request(checkout).await,
            Self::Stripe(p) => p.build_payment_request(checkout).await,
        }
    }

    fn verify_callback(&self, callback: CallbackRequest<'_>) -> Result<ProviderEvent, PaymentError> {
        match self {
            Self::LiqPay(p) => p.verify_callback(callback),
            Self::Stripe(p) => p.verify_callback(callback),
        }
    }

    fn map_status(&self, provider_status: &str) -> OrderStatus {
        match self {
            Self::LiqPay(p) => p.map_status(provider_status),
            Self::Stripe(p) => p.map_status(provider_status),
        }
    }
}

/// Constant-time comparison to prevent timing attacks.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"hello", b"hello"));
        assert!(!constant_time_compare(b"hello", b"world"));
        assert!(!constant_time_compare(b"hello", b"hell"));
        assert!(constant_time_compare(b"", b""));
    }

    #[test]
    fn test_callback_rejection_classification() {
        assert!(PaymentError::InvalidSignature.is_callback_rejection());
        assert!(PaymentError::MissingField("data").is_callback_rejection());
        assert!(PaymentError::MalformedPayload("x".into()).is_callback_rejection());
        assert!(
            !PaymentError::Api {
                status: 500,
                message: "boom".into()
            }
            .is_callback_rejection()
        );
    }

    #[test]
    fn test_payment_request_serializes_with_kind_tag() {
        let request = PaymentRequest::HostedForm {
            action_url: "https://www.liqpay.ua/api/3/checkout".into(),
            data: "e30=".into(),
            signature: "sig".into(),
        };
        let json = serde_json::to_value(&request).unwrap_or_default();
        assert_eq!(json["kind"], "hosted_form");
        assert_eq!(json["data"], "e30=");
    }
}
