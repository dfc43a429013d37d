//! LiqPay hosted checkout.
//!
//! The storefront renders a form that posts `data` and `signature` to
//! LiqPay. `data` is base64-encoded JSON; `signature` is
//! `base64(sha1(private_key + data + private_key))`. Callbacks arrive as a
//! form with the same two fields, signed the same way.

use base64::{Engine, engine::general_purpose::STANDARD};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tracing::{debug, instrument};

use bulava_core::OrderStatus;

use super::{
    CallbackRequest, CheckoutRequest, PaymentError, PaymentProvider, PaymentRequest,
    ProviderEvent, constant_time_compare,
};
use crate::config::LiqPayConfig;
use crate::db::StatusUpdate;
use crate::models::OrderLookup;

/// LiqPay hosted checkout endpoint.
pub const CHECKOUT_URL: &str = "https://www.liqpay.ua/api/3/checkout";

const API_VERSION: &str = "3";

/// Parameters encoded into the `data` field of a payment form.
#[derive(Debug, Serialize)]
struct PaymentParams<'a> {
    version: &'static str,
    public_key: &'a str,
    action: &'static str,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    currency: &'static str,
    description: String,
    order_id: &'a str,
    result_url: &'a str,
    server_url: &'a str,
    language: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sandbox: Option<&'static str>,
}

/// The fields of a decoded callback payload this storefront reads.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CallbackPayload {
    order_id: Option<String>,
    status: Option<String>,
    /// Numeric in practice; accepted as any JSON scalar.
    payment_id: Option<serde_json::Value>,
    liqpay_order_id: Option<String>,
}

/// LiqPay payment provider.
#[derive(Debug, Clone)]
pub struct LiqPayProvider {
    config: LiqPayConfig,
}

impl LiqPayProvider {
    #[must_use]
    pub const fn new(config: LiqPayConfig) -> Self {
        Self { config }
    }

    /// Sign a base64 `data` string.
    #[must_use]
    pub fn sign(&self, data: &str) -> String {
        let private_key = self.config.private_key.expose_secret();
        let mut hasher = Sha1::new();
        hasher.update(private_key.as_bytes());
        hasher.update(data.as_bytes());
        hasher.update(private_key.as_bytes());
        STANDARD.encode(hasher.finalize())
    }

    /// Build the signed `data`/`signature` pair for a checkout.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::MalformedPayload` if the parameters cannot be
    /// serialized.
    pub fn payment_form(&self, checkout: &CheckoutRequest) -> Result<(String, String), PaymentError> {
        let params = PaymentParams {
            version: API_VERSION,
            public_key: &self.config.public_key,
            action: "pay",
            amount: checkout.total,
            currency: self.config.currency.code(),
            description: checkout.description(),
            order_id: checkout.reference.as_str(),
            result_url: &checkout.result_url,
            server_url: &checkout.callback_url,
            language: &self.config.language,
            sandbox: self.config.sandbox.then_some("1"),
        };

        let json = serde_json::to_vec(&params)
            .map_err(|e| PaymentError::MalformedPayload(e.to_string()))?;
        let data = STANDARD.encode(json);
        let signature = self.sign(&data);
        Ok((data, signature))
    }

    /// Check a `data`/`signature` pair and decode the payload.
    fn decode_verified(&self, data: &str, signature: &str) -> Result<CallbackPayload, PaymentError> {
        let expected = self.sign(data);
        if !constant_time_compare(expected.as_bytes(), signature.as_bytes()) {
            return Err(PaymentError::InvalidSignature);
        }

        let raw = STANDARD
            .decode(data)
            .map_err(|e| PaymentError::MalformedPayload(format!("data is not base64: {e}")))?;
        serde_json::from_slice(&raw)
            .map_err(|e| PaymentError::MalformedPayload(format!("data is not a JSON object: {e}")))
    }
}

impl PaymentProvider for LiqPayProvider {
    fn name(&self) -> &'static str {
        "liqpay"
    }

    #[instrument(skip(self, checkout), fields(order_id = %checkout.reference))]
    async fn build_payment_request(
        &self,
        checkout: &CheckoutRequest,
    ) -> Result<PaymentRequest, PaymentError> {
        let (data, signature) = self.payment_form(checkout)?;
        debug!("LiqPay payment form signed");

        Ok(PaymentRequest::HostedForm {
            action_url: CHECKOUT_URL.to_string(),
            data,
            signature,
        })
    }

    fn verify_callback(&self, callback: CallbackRequest<'_>) -> Result<ProviderEvent, PaymentError> {
        let mut data = None;
        let mut signature = None;
        for (key, value) in url::form_urlencoded::parse(callback.body) {
            match key.as_ref() {
                "data" => data = Some(value.into_owned()),
                "signature" => signature = Some(value.into_owned()),
                _ => {}
            }
        }
        let data = data
            .filter(|d| !d.is_empty())
            .ok_or(PaymentError::MissingField("data"))?;
        let signature = signature
            .filter(|s| !s.is_empty())
            .ok_or(PaymentError::MissingField("signature"))?;

        let payload = self.decode_verified(&data, &signature)?;

        let provider_status = payload.status.unwrap_or_default();
        let provider_payment_id = payload.payment_id.and_then(|id| match id {
            serde_json::Value::String(s) if !s.is_empty() => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        Ok(ProviderEvent {
            // A callback without an order id still targets an order; it
            // simply matches none.
            lookup: Some(OrderLookup::Reference(payload.order_id.unwrap_or_default())),
            update: StatusUpdate {
                status: self.map_status(&provider_status),
                provider_payment_id,
                provider_order_id: payload.liqpay_order_id.filter(|id| !id.is_empty()),
            },
            provider_status,
        })
    }

    fn map_status(&self, provider_status: &str) -> OrderStatus {
        match provider_status {
            "success" | "sandbox" => OrderStatus::Paid,
            "failure" => OrderStatus::Cancelled,
            "reversed" => OrderStatus::Refunded,
            "processing" => OrderStatus::Processing,
            _ => OrderStatus::Pending,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderMap;
    use bulava_core::{Currency, OrderReference};
    use secrecy::SecretString;

    use super::*;

    fn provider() -> LiqPayProvider {
        LiqPayProvider::new(LiqPayConfig {
            public_key: "sandbox_i12345".to_string(),
            private_key: SecretString::from("sandbox_private"),
            currency: Currency::Uah,
            language: "uk".to_string(),
            sandbox: true,
        })
    }

    fn checkout() -> CheckoutRequest {
        CheckoutRequest {
            reference: OrderReference::parse("ORDER-0A1B2C3D4E5F").unwrap(),
            total: Decimal::new(25_050, 2),
            items: Vec::new(),
            customer_email: None,
            result_url: "https://shop.test/payments/result".to_string(),
            cancel_url: "https://shop.test/payments/cancel".to_string(),
            callback_url: "https://shop.test/payments/callback".to_string(),
        }
    }

    fn callback_body(data: &str, signature: &str) -> Vec<u8> {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("data", data)
            .append_pair("signature", signature)
            .finish()
            .into_bytes()
    }

    fn signed_payload(provider: &LiqPayProvider, json: &str) -> (String, String) {
        let data = STANDARD.encode(json);
        let signature = provider.sign(&data);
        (data, signature)
    }

    #[test]
    fn test_signature_matches_reference_scheme() {
        let provider = provider();
        let data = "eyJ2ZXJzaW9uIjoiMyJ9";

        let mut hasher = Sha1::new();
        hasher.update(b"sandbox_private");
        hasher.update(data.as_bytes());
        hasher.update(b"sandbox_private");
        let expected = STANDARD.encode(hasher.finalize());

        assert_eq!(provider.sign(data), expected);
    }

    #[test]
    fn test_payment_form_contents() {
        let provider = provider();
        let (data, signature) = provider.payment_form(&checkout()).unwrap();
        assert_eq!(signature, provider.sign(&data));

        let decoded: serde_json::Value =
            serde_json::from_slice(&STANDARD.decode(&data).unwrap()).unwrap();
        assert_eq!(decoded["version"], "3");
        assert_eq!(decoded["action"], "pay");
        assert_eq!(decoded["public_key"], "sandbox_i12345");
        assert_eq!(decoded["amount"], 250.5);
        assert_eq!(decoded["currency"], "UAH");
        assert_eq!(decoded["order_id"], "ORDER-0A1B2C3D4E5F");
        assert_eq!(decoded["server_url"], "https://shop.test/payments/callback");
        assert_eq!(decoded["result_url"], "https://shop.test/payments/result");
        assert_eq!(decoded["language"], "uk");
        assert_eq!(decoded["sandbox"], "1");
    }

    #[tokio::test]
    async fn test_build_payment_request_is_hosted_form() {
        let request = provider().build_payment_request(&checkout()).await.unwrap();
        let PaymentRequest::HostedForm { action_url, .. } = request else {
            panic!("expected hosted form");
        };
        assert_eq!(action_url, CHECKOUT_URL);
    }

    #[test]
    fn test_verify_callback_success() {
        let provider = provider();
        let (data, signature) = signed_payload(
            &provider,
            r#"{"order_id":"ORDER-0A1B2C3D4E5F","status":"success","payment_id":123456,"liqpay_order_id":"LP-1"}"#,
        );
        let headers = HeaderMap::new();
        let body = callback_body(&data, &signature);

        let event = provider
            .verify_callback(CallbackRequest { headers: &headers, body: &body })
            .unwrap();

        assert_eq!(
            event.lookup,
            Some(OrderLookup::Reference("ORDER-0A1B2C3D4E5F".to_string()))
        );
        assert_eq!(event.provider_status, "success");
        assert_eq!(event.update.status, OrderStatus::Paid);
        assert_eq!(event.update.provider_payment_id.as_deref(), Some("123456"));
        assert_eq!(event.update.provider_order_id.as_deref(), Some("LP-1"));
    }

    #[test]
    fn test_tampered_data_is_rejected() {
        let provider = provider();
        let (_, signature) = signed_payload(&provider, r#"{"order_id":"ORDER-0A1B2C3D4E5F","status":"failure"}"#);
        let forged = STANDARD.encode(r#"{"order_id":"ORDER-0A1B2C3D4E5F","status":"success"}"#);
        let headers = HeaderMap::new();
        let body = callback_body(&forged, &signature);

        let result = provider.verify_callback(CallbackRequest { headers: &headers, body: &body });
        assert!(matches!(result, Err(PaymentError::InvalidSignature)));
    }

    #[test]
    fn test_tampered_signature_is_rejected() {
        let provider = provider();
        let (data, _) = signed_payload(&provider, r#"{"status":"success"}"#);
        let headers = HeaderMap::new();
        let body = callback_body(&data, "bm90LWEtc2lnbmF0dXJl");

        let result = provider.verify_callback(CallbackRequest { headers: &headers, body: &body });
        assert!(matches!(result, Err(PaymentError::InvalidSignature)));
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        let provider = provider();
        let headers = HeaderMap::new();

        let result = provider.verify_callback(CallbackRequest { headers: &headers, body: b"signature=abc" });
        assert!(matches!(result, Err(PaymentError::MissingField("data"))));

        let result = provider.verify_callback(CallbackRequest { headers: &headers, body: b"data=abc" });
        assert!(matches!(result, Err(PaymentError::MissingField("signature"))));
    }

    #[test]
    fn test_malformed_payload_after_valid_signature() {
        let provider = provider();
        let data = "not base64!";
        let signature = provider.sign(data);
        let headers = HeaderMap::new();
        let body = callback_body(data, &signature);

        let result = provider.verify_callback(CallbackRequest { headers: &headers, body: &body });
        assert!(matches!(result, Err(PaymentError::MalformedPayload(_))));

        let (data, signature) = signed_payload(&provider, r#""just a string""#);
        let body = callback_body(&data, &signature);
        let result = provider.verify_callback(CallbackRequest { headers: &headers, body: &body });
        assert!(matches!(result, Err(PaymentError::MalformedPayload(_))));
    }

    #[test]
    fn test_status_map() {
        let provider = provider();
        assert_eq!(provider.map_status("success"), OrderStatus::Paid);
        assert_eq!(provider.map_status("sandbox"), OrderStatus::Paid);
        assert_eq!(provider.map_status("failure"), OrderStatus::Cancelled);
        assert_eq!(provider.map_status("reversed"), OrderStatus::Refunded);
        assert_eq!(provider.map_status("processing"), OrderStatus::Processing);
        assert_eq!(provider.map_status("wait_accept"), OrderStatus::Pending);
        assert_eq!(provider.map_status(""), OrderStatus::Pending);
    }
}
