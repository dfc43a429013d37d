//! Stripe Checkout.
//!
//! A Checkout Session is created over the REST API with form-encoded
//! parameters and the customer is redirected to its URL. Webhooks are signed
//! with `HMAC-SHA256(webhook_secret, "{t}.{body}")` and delivered in the
//! `Stripe-Signature` header as `t=<unix>,v1=<hex>[,v1=<hex>...]`.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, instrument, warn};

use bulava_core::{Money, OrderStatus};

use super::{
    CallbackRequest, CheckoutRequest, PaymentError, PaymentProvider, PaymentRequest,
    ProviderEvent, constant_time_compare,
};
use crate::config::StripeConfig;
use crate::db::StatusUpdate;
use crate::models::OrderLookup;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

const SESSION_COMPLETED: &str = "checkout.session.completed";
const SESSION_EVENT_PREFIX: &str = "checkout.session.";
const CHARGE_REFUNDED: &str = "charge.refunded";

// =============================================================================
// API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
struct WebhookEventData {
    object: EventObject,
}

/// The subset of a Checkout Session or Charge object this storefront reads.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventObject {
    client_reference_id: Option<String>,
    metadata: Option<HashMap<String, String>>,
    payment_status: Option<String>,
    /// Either an id or an expanded object.
    payment_intent: Option<serde_json::Value>,
}

impl EventObject {
    fn order_reference(&self) -> Option<String> {
        self.client_reference_id
            .clone()
            .or_else(|| {
                self.metadata
                    .as_ref()
                    .and_then(|m| m.get("order_id").cloned())
            })
            .filter(|r| !r.is_empty())
    }

    fn payment_intent_id(&self) -> Option<String> {
        match self.payment_intent.as_ref()? {
            serde_json::Value::String(id) if !id.is_empty() => Some(id.clone()),
            serde_json::Value::Object(obj) => obj
                .get("id")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned),
            _ => None,
        }
    }
}

// =============================================================================
// Provider
// =============================================================================

/// Stripe Checkout payment provider.
#[derive(Debug, Clone)]
pub struct StripeProvider {
    client: Client,
    config: StripeConfig,
}

impl StripeProvider {
    /// Create a provider with an HTTP client using the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http` if the HTTP client cannot be built.
    pub fn new(config: StripeConfig) -> Result<Self, PaymentError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Form parameters for `POST /v1/checkout/sessions`.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Amount` if a unit price cannot be expressed in
    /// minor units.
    pub fn session_params(
        &self,
        checkout: &CheckoutRequest,
    ) -> Result<Vec<(String, String)>, PaymentError> {
        let currency = self.config.currency;
        let reference = checkout.reference.as_str();

        let mut params = vec![
            ("mode".to_string(), "payment".to_string()),
            (
                "success_url".to_string(),
                format!("{}?session_id={{CHECKOUT_SESSION_ID}}", checkout.result_url),
            ),
            ("cancel_url".to_string(), checkout.cancel_url.clone()),
            ("client_reference_id".to_string(), reference.to_string()),
            ("metadata[order_id]".to_string(), reference.to_string()),
        ];
        if let Some(email) = &checkout.customer_email {
            params.push(("customer_email".to_string(), email.clone()));
        }

        for (i, item) in checkout.items.iter().enumerate() {
            let unit_amount = Money::new(item.unit_price, currency)?.minor_units()?;
            let prefix = format!("line_items[{i}]");
            params.extend([
                (
                    format!("{prefix}[price_data][currency]"),
                    currency.stripe_code().to_string(),
                ),
                (
                    format!("{prefix}[price_data][unit_amount]"),
                    unit_amount.to_string(),
                ),
                (
                    format!("{prefix}[price_data][product_data][name]"),
                    item.product_name.clone(),
                ),
                (format!("{prefix}[quantity]"), item.quantity.to_string()),
            ]);
        }

        Ok(params)
    }

    /// Check a `Stripe-Signature` header against the raw body at time `now`
    /// (unix seconds).
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` if the header is malformed or
    /// no `v1` entry matches, `PaymentError::StaleSignature` if the timestamp
    /// is outside the configured tolerance.
    pub fn verify_signature(&self, header: &str, body: &[u8], now: i64) -> Result<(), PaymentError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(PaymentError::InvalidSignature)?;
        if signatures.is_empty() {
            return Err(PaymentError::InvalidSignature);
        }
        let ts: i64 = timestamp
            .parse()
            .map_err(|_| PaymentError::InvalidSignature)?;

        let tolerance = i64::try_from(self.config.webhook_tolerance.as_secs()).unwrap_or(i64::MAX);
        if now.saturating_sub(ts).saturating_abs() > tolerance {
            return Err(PaymentError::StaleSignature);
        }

        let mut mac = HmacSha256::new_from_slice(self.config.webhook_secret.expose_secret().as_bytes())
            .map_err(|_| PaymentError::InvalidSignature)?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        let expected = hex::encode(mac.finalize().into_bytes());

        if signatures
            .iter()
            .any(|sig| constant_time_compare(expected.as_bytes(), sig.as_bytes()))
        {
            Ok(())
        } else {
            Err(PaymentError::InvalidSignature)
        }
    }

    /// Turn a verified webhook body into an event.
    fn decode_event(&self, body: &[u8]) -> Result<ProviderEvent, PaymentError> {
        let event: WebhookEvent = serde_json::from_slice(body)
            .map_err(|e| PaymentError::MalformedPayload(e.to_string()))?;
        debug!(event_id = %event.id, event_type = %event.event_type, "Stripe webhook decoded");

        let object = event.data.object;
        let payment_intent = object.payment_intent_id();

        let lookup = if event.event_type.starts_with(SESSION_EVENT_PREFIX) {
            object.order_reference().map(OrderLookup::Reference)
        } else if event.event_type == CHARGE_REFUNDED {
            payment_intent.clone().map(OrderLookup::ProviderPaymentId)
        } else {
            None
        };

        let provider_status = if event.event_type == SESSION_COMPLETED {
            object.payment_status.unwrap_or_default()
        } else {
            event.event_type
        };

        Ok(ProviderEvent {
            lookup,
            update: StatusUpdate {
                status: self.map_status(&provider_status),
                provider_payment_id: payment_intent,
                provider_order_id: None,
            },
            provider_status,
        })
    }

    fn sessions_url(&self) -> String {
        format!(
            "{}/v1/checkout/sessions",
            self.config.api_base.as_str().trim_end_matches('/')
        )
    }
}

impl PaymentProvider for StripeProvider {
    fn name(&self) -> &'static str {
        "stripe"
    }

    #[instrument(skip(self, checkout), fields(order_id = %checkout.reference))]
    async fn build_payment_request(
        &self,
        checkout: &CheckoutRequest,
    ) -> Result<PaymentRequest, PaymentError> {
        let params = self.session_params(checkout)?;

        let response = self
            .client
            .post(self.sessions_url())
            .bearer_auth(self.config.secret_key.expose_secret())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or(body);
            warn!(status = %status, "Stripe rejected checkout session");
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let session: CheckoutSession = response.json().await?;
        let url = session.url.ok_or_else(|| PaymentError::Api {
            status: status.as_u16(),
            message: format!("checkout session {} has no redirect url", session.id),
        })?;
        debug!(session_id = %session.id, "Stripe checkout session created");

        Ok(PaymentRequest::Redirect {
            url,
            session_id: session.id,
        })
    }

    fn verify_callback(&self, callback: CallbackRequest<'_>) -> Result<ProviderEvent, PaymentError> {
        let header = callback
            .headers
            .get(SIGNATURE_HEADER)
            .ok_or(PaymentError::MissingField("Stripe-Signature"))?
            .to_str()
            .map_err(|_| PaymentError::InvalidSignature)?;

        self.verify_signature(header, callback.body, chrono::Utc::now().timestamp())?;
        self.decode_event(callback.body)
    }

    fn map_status(&self, provider_status: &str) -> OrderStatus {
        match provider_status {
            "paid" | "no_payment_required" | "checkout.session.async_payment_succeeded" => {
                OrderStatus::Paid
            }
            "unpaid" => OrderStatus::Processing,
            "checkout.session.async_payment_failed" | "checkout.session.expired" => {
                OrderStatus::Cancelled
            }
            CHARGE_REFUNDED => OrderStatus::Refunded,
            _ => OrderStatus::Pending,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use axum::http::{HeaderMap, HeaderValue};
    use bulava_core::{Currency, OrderReference, ProductId};
    use rust_decimal::Decimal;
    use secrecy::SecretString;
    use url::Url;

    use super::*;
    use crate::models::NewOrderItem;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_767_225_600;

    fn provider() -> StripeProvider {
        StripeProvider::new(StripeConfig {
            secret_key: SecretString::from("sk_test_123"),
            webhook_secret: SecretString::from(SECRET),
            currency: Currency::Uah,
            api_base: Url::parse("https://api.stripe.com").unwrap(),
            timeout: Duration::from_secs(15),
            webhook_tolerance: Duration::from_secs(300),
        })
        .unwrap()
    }

    fn sign(secret: &str, timestamp: i64, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(body);
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn event(event_type: &str, object: &serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "id": "evt_1",
            "type": event_type,
            "data": { "object": object },
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_signature() {
        let body = br#"{"id":"evt_1"}"#;
        let header = sign(SECRET, NOW, body);
        assert!(provider().verify_signature(&header, body, NOW + 10).is_ok());
    }

    #[test]
    fn test_any_matching_v1_entry_is_accepted() {
        let body = br#"{"id":"evt_1"}"#;
        let valid = sign(SECRET, NOW, body);
        let (_, v1) = valid.split_once(",v1=").unwrap();
        let header = format!("t={NOW},v1=deadbeef,v0=ignored,v1={v1}");
        assert!(provider().verify_signature(&header, body, NOW).is_ok());
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let header = sign(SECRET, NOW, br#"{"amount":100}"#);
        let result = provider().verify_signature(&header, br#"{"amount":1}"#, NOW);
        assert!(matches!(result, Err(PaymentError::InvalidSignature)));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let body = br#"{"id":"evt_1"}"#;
        let header = sign("whsec_other", NOW, body);
        let result = provider().verify_signature(&header, body, NOW);
        assert!(matches!(result, Err(PaymentError::InvalidSignature)));
    }

    #[test]
    fn test_stale_timestamp_is_rejected() {
        let body = br#"{"id":"evt_1"}"#;
        let header = sign(SECRET, NOW, body);
        let result = provider().verify_signature(&header, body, NOW + 301);
        assert!(matches!(result, Err(PaymentError::StaleSignature)));
    }

    #[test]
    fn test_malformed_header_is_rejected() {
        let provider = provider();
        for header in ["", "t=abc,v1=00", "v1=00", format!("t={NOW}").as_str()] {
            let result = provider.verify_signature(header, b"{}", NOW);
            assert!(matches!(result, Err(PaymentError::InvalidSignature)), "{header}");
        }
    }

    #[test]
    fn test_missing_header_is_rejected() {
        let headers = HeaderMap::new();
        let result = provider().verify_callback(CallbackRequest { headers: &headers, body: b"{}" });
        assert!(matches!(result, Err(PaymentError::MissingField(_))));
    }

    #[test]
    fn test_verify_callback_with_current_timestamp() {
        let body = event(
            SESSION_COMPLETED,
            &serde_json::json!({
                "client_reference_id": "ORDER-0A1B2C3D4E5F",
                "payment_status": "paid",
                "payment_intent": "pi_123",
            }),
        );
        let mut headers = HeaderMap::new();
        let header = sign(SECRET, chrono::Utc::now().timestamp(), &body);
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&header).unwrap());

        let event = provider()
            .verify_callback(CallbackRequest { headers: &headers, body: &body })
            .unwrap();
        assert_eq!(
            event.lookup,
            Some(OrderLookup::Reference("ORDER-0A1B2C3D4E5F".to_string()))
        );
        assert_eq!(event.update.status, OrderStatus::Paid);
        assert_eq!(event.update.provider_payment_id.as_deref(), Some("pi_123"));
    }

    #[test]
    fn test_completed_unpaid_is_processing_with_metadata_fallback() {
        let body = event(
            SESSION_COMPLETED,
            &serde_json::json!({
                "client_reference_id": null,
                "metadata": { "order_id": "ORDER-FFFFFFFFFFFF" },
                "payment_status": "unpaid",
            }),
        );
        let event = provider().decode_event(&body).unwrap();
        assert_eq!(
            event.lookup,
            Some(OrderLookup::Reference("ORDER-FFFFFFFFFFFF".to_string()))
        );
        assert_eq!(event.provider_status, "unpaid");
        assert_eq!(event.update.status, OrderStatus::Processing);
    }

    #[test]
    fn test_event_type_mapping() {
        let provider = provider();
        let session = serde_json::json!({ "client_reference_id": "ORDER-0A1B2C3D4E5F" });

        let cases = [
            ("checkout.session.async_payment_succeeded", OrderStatus::Paid),
            ("checkout.session.async_payment_failed", OrderStatus::Cancelled),
            ("checkout.session.expired", OrderStatus::Cancelled),
        ];
        for (event_type, expected) in cases {
            let event = provider.decode_event(&event(event_type, &session)).unwrap();
            assert_eq!(event.update.status, expected, "{event_type}");
            assert!(event.lookup.is_some());
        }
    }

    #[test]
    fn test_charge_refunded_looks_up_by_payment_intent() {
        let body = event(
            CHARGE_REFUNDED,
            &serde_json::json!({ "id": "ch_1", "payment_intent": "pi_123", "metadata": {} }),
        );
        let event = provider().decode_event(&body).unwrap();
        assert_eq!(
            event.lookup,
            Some(OrderLookup::ProviderPaymentId("pi_123".to_string()))
        );
        assert_eq!(event.update.status, OrderStatus::Refunded);
    }

    #[test]
    fn test_unrelated_events_have_no_lookup() {
        let provider = provider();
        let body = event("payment_intent.created", &serde_json::json!({ "id": "pi_1" }));
        assert_eq!(provider.decode_event(&body).unwrap().lookup, None);

        let body = event(SESSION_COMPLETED, &serde_json::json!({ "payment_status": "paid" }));
        assert_eq!(provider.decode_event(&body).unwrap().lookup, None);
    }

    #[test]
    fn test_malformed_event_body() {
        let result = provider().decode_event(b"not json");
        assert!(matches!(result, Err(PaymentError::MalformedPayload(_))));
    }

    #[test]
    fn test_session_params() {
        let checkout = CheckoutRequest {
            reference: OrderReference::parse("ORDER-0A1B2C3D4E5F").unwrap(),
            total: Decimal::new(51_000, 2),
            items: vec![NewOrderItem {
                product_id: ProductId::new(7),
                product_name: "Scope mount".to_string(),
                quantity: 2,
                unit_price: Decimal::new(25_500, 2),
            }],
            customer_email: Some("buyer@example.com".to_string()),
            result_url: "https://shop.test/payments/result".to_string(),
            cancel_url: "https://shop.test/payments/cancel".to_string(),
            callback_url: "https://shop.test/payments/callback".to_string(),
        };
        let params: HashMap<String, String> =
            provider().session_params(&checkout).unwrap().into_iter().collect();

        assert_eq!(params["mode"], "payment");
        assert_eq!(
            params["success_url"],
            "https://shop.test/payments/result?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(params["client_reference_id"], "ORDER-0A1B2C3D4E5F");
        assert_eq!(params["metadata[order_id]"], "ORDER-0A1B2C3D4E5F");
        assert_eq!(params["customer_email"], "buyer@example.com");
        assert_eq!(params["line_items[0][price_data][currency]"], "uah");
        assert_eq!(params["line_items[0][price_data][unit_amount]"], "25500");
        assert_eq!(params["line_items[0][price_data][product_data][name]"], "Scope mount");
        assert_eq!(params["line_items[0][quantity]"], "2");
    }

    #[test]
    fn test_sessions_url_trims_trailing_slash() {
        assert_eq!(
            provider().sessions_url(),
            "https://api.stripe.com/v1/checkout/sessions"
        );
    }
}
