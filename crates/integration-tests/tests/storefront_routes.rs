//! In-process tests for storefront routes that do not need database rows.
//!
//! Each test builds the real router with an in-memory session store; see the
//! crate docs for how the pool is set up.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use bulava_integration_tests::{Provider, body_text, send, stripe_signature};
use serde_json::Value;

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

fn now() -> i64 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    i64::try_from(secs).unwrap()
}

fn location(response: &axum::http::Response<Body>) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_is_ok() {
    let response = send(Provider::LiqPay, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn test_readiness_reports_unreachable_database() {
    let response = send(Provider::LiqPay, get("/health/ready")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let response = send(Provider::LiqPay, get("/health")).await;
    assert!(response.headers().contains_key("x-request-id"));
}

// ============================================================================
// Cart
// ============================================================================

#[tokio::test]
async fn test_new_session_has_empty_cart() {
    let response = send(Provider::LiqPay, get("/cart/count")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["cart_items_count"], 0);
}

#[tokio::test]
async fn test_clear_cart_redirects_with_success() {
    let response = send(Provider::LiqPay, get("/cart/clear")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/cart?success=Cart+cleared");
}

// ============================================================================
// Checkout & return pages
// ============================================================================

#[tokio::test]
async fn test_checkout_with_empty_cart_redirects_to_cart() {
    let response = send(Provider::LiqPay, get("/checkout")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/cart?error=Cart+is+empty");
}

#[tokio::test]
async fn test_checkout_rejects_invalid_email() {
    let response = send(Provider::LiqPay, get("/checkout?email=not-an-email")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_result_without_pending_order_redirects() {
    let response = send(Provider::LiqPay, get("/payments/result")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/cart?error=Order+not+found");
}

#[tokio::test]
async fn test_cancel_redirects_with_message() {
    let response = send(Provider::Stripe, get("/payments/cancel")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/cart?error=Payment+was+cancelled");
}

// ============================================================================
// LiqPay callback
// ============================================================================

#[tokio::test]
async fn test_liqpay_callback_missing_fields_is_bad_request() {
    let response = send(Provider::LiqPay, form_post("/payments/callback", "data=abc")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_liqpay_callback_bad_signature_is_bad_request() {
    let response = send(
        Provider::LiqPay,
        form_post(
            "/payments/callback",
            "data=eyJvcmRlcl9pZCI6IjEyMyJ9&signature=forged",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Invalid signature");
}

// ============================================================================
// Stripe webhook
// ============================================================================

fn stripe_webhook(body: &str, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/payments/callback")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header("stripe-signature", signature);
    }
    builder.body(Body::from(body.to_owned())).unwrap()
}

#[tokio::test]
async fn test_stripe_webhook_without_signature_is_bad_request() {
    let response = send(Provider::Stripe, stripe_webhook("{}", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stripe_webhook_stale_signature_is_bad_request() {
    let body = r#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{}}}"#;
    let signature = stripe_signature(body, now() - 3_600);
    let response = send(Provider::Stripe, stripe_webhook(body, Some(signature))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stripe_webhook_tampered_body_is_bad_request() {
    let body = r#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{}}}"#;
    let signature = stripe_signature(body, now());
    let tampered = body.replace("evt_1", "evt_2");
    let response = send(Provider::Stripe, stripe_webhook(&tampered, Some(signature))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stripe_event_without_order_is_acknowledged() {
    let body = r#"{"id":"evt_9","type":"customer.created","data":{"object":{}}}"#;
    let signature = stripe_signature(body, now());
    let response = send(Provider::Stripe, stripe_webhook(body, Some(signature))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");
}
