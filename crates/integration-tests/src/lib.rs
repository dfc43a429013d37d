//! Integration test harness for the Bulava storefront.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process router tests (no database needed)
//! cargo test -p bulava-integration-tests
//!
//! # End-to-end tests against a running server and seeded database
//! STOREFRONT_BASE_URL=http://localhost:3000 cargo test -p bulava-integration-tests -- --ignored
//! ```
//!
//! The in-process tests build the real router with an in-memory session store
//! and a pool that never connects. Only paths that stop before the database
//! are exercised there; anything that needs rows lives in the ignored suite.

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use bulava_core::Currency;
use bulava_storefront::config::{LiqPayConfig, PaymentConfig, StorefrontConfig, StripeConfig};
use bulava_storefront::middleware::request_id_middleware;
use bulava_storefront::routes;
use bulava_storefront::state::AppState;
use hmac::{Hmac, Mac};
use secrecy::SecretString;
use sha2::Sha256;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use tower_sessions::{MemoryStore, SessionManagerLayer};
use url::Url;

/// LiqPay private key used by the test configuration.
pub const LIQPAY_PRIVATE_KEY: &str = "sandbox_Qm4vT9xLp2Zr7Bn1Kc8Wd3";

/// Stripe webhook secret used by the test configuration.
pub const STRIPE_WEBHOOK_SECRET: &str = "whsec_7Hq2Lx9Vb4Nk1Rt8Zm3Pc6";

/// Base URL for end-to-end tests (configurable via environment).
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Which provider the in-process app is configured with.
#[derive(Debug, Clone, Copy)]
pub enum Provider {
    LiqPay,
    Stripe,
}

fn payment_config(provider: Provider) -> PaymentConfig {
    match provider {
        Provider::LiqPay => PaymentConfig::LiqPay(LiqPayConfig {
            public_key: "sandbox_i00000000".to_string(),
            private_key: SecretString::from(LIQPAY_PRIVATE_KEY),
            currency: Currency::Uah,
            language: "uk".to_string(),
            sandbox: true,
        }),
        Provider::Stripe => PaymentConfig::Stripe(StripeConfig {
            secret_key: SecretString::from("sk_test_4eC39HqLyjWDarjtT1zdp7dc"),
            webhook_secret: SecretString::from(STRIPE_WEBHOOK_SECRET),
            currency: Currency::Uah,
            // Unroutable: the tests never reach the provider API.
            api_base: Url::parse("http://127.0.0.1:9").expect("valid url"),
            timeout: Duration::from_secs(1),
            webhook_tolerance: Duration::from_secs(300),
        }),
    }
}

/// Storefront configuration for in-process tests.
///
/// # Panics
///
/// Panics if the hard-coded URLs fail to parse.
#[must_use]
pub fn test_config(provider: Provider) -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://bulava@127.0.0.1:1/bulava_test"),
        host: "127.0.0.1".parse().expect("valid ip"),
        port: 3000,
        base_url: Url::parse("http://shop.bulava.test").expect("valid url"),
        payment: payment_config(provider),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Build the storefront router with an in-memory session store.
///
/// The pool points at a closed port and gives up quickly, so handlers that
/// reach the database fail fast instead of hanging the test.
///
/// # Panics
///
/// Panics if the pool options or payment provider cannot be built.
#[must_use]
pub fn test_app(provider: Provider) -> Router {
    let config = test_config(provider);
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(250))
        .connect_lazy("postgres://bulava@127.0.0.1:1/bulava_test")
        .expect("lazy pool");
    let state = AppState::new(config, pool).expect("payment provider");

    routes::routes()
        .layer(SessionManagerLayer::new(MemoryStore::default()).with_secure(false))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Send one request through a fresh app.
///
/// # Panics
///
/// Panics if the router returns an error (it is infallible).
pub async fn send(provider: Provider, request: Request<Body>) -> Response<Body> {
    test_app(provider)
        .oneshot(request)
        .await
        .expect("infallible router")
}

/// Read a response body as a string.
///
/// # Panics
///
/// Panics if the body cannot be read or is not UTF-8.
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

/// Build a `Stripe-Signature` header for `body` signed at `timestamp`.
///
/// # Panics
///
/// Panics if the HMAC key is rejected (it never is for HMAC-SHA256).
#[must_use]
pub fn stripe_signature(body: &str, timestamp: i64) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(STRIPE_WEBHOOK_SECRET.as_bytes()).expect("hmac key");
    mac.update(format!("{timestamp}.{body}").as_bytes());
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}
