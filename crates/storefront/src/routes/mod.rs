//! HTTP route handlers for storefront.
//!
//! Handlers answer with JSON views or redirects; rendering is left to the
//! front end.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (database ping)
//!
//! # Catalog
//! GET  /catalog                - Filtered, sorted, paginated listing
//! GET  /{slug}                 - Product detail
//!
//! # Cart (JSON for XMLHttpRequest callers, redirects otherwise)
//! GET  /cart                   - Cart view
//! GET  /cart/count             - Cart count badge
//! POST /cart/add/{id}          - Add product (form: quantity)
//! POST /cart/remove/{id}       - Remove product
//! POST /cart/update/{id}       - Set quantity (form: quantity)
//! GET  /cart/clear             - Empty the cart
//!
//! # Checkout & payments
//! GET  /checkout               - Create order and start payment
//! GET  /payments/result        - Customer return from the provider
//! GET  /payments/cancel        - Customer abandoned the provider page
//! POST /payments/callback      - Provider callback / webhook
//! ```

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod health;
pub mod payments;
pub mod products;

use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};

use crate::state::AppState;

/// Query parameter carrying a user-facing message on a redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Success,
    Error,
}

impl Notice {
    const fn key(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Redirect to `path` with a `success`/`error` message in the query string.
#[must_use]
pub fn notice_redirect(path: &str, notice: Notice, message: &str) -> Redirect {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair(notice.key(), message)
        .finish();
    Redirect::to(&format!("{path}?{query}"))
}

/// Create the health check router.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .route("/add/{id}", post(cart::add))
        .route("/remove/{id}", post(cart::remove))
        .route("/update/{id}", post(cart::update))
        .route("/clear", get(cart::clear))
}

/// Routes browsers call: catalog, cart, checkout and the provider return pages.
pub fn shopper_routes() -> Router<AppState> {
    Router::new()
        .route("/catalog", get(catalog::index))
        .nest("/cart", cart_routes())
        .route("/checkout", get(checkout::start))
        .route("/payments/result", get(payments::result))
        .route("/payments/cancel", get(payments::cancel))
        .route("/{slug}", get(products::show))
}

/// Routes payment providers call.
pub fn provider_routes() -> Router<AppState> {
    Router::new().route("/payments/callback", post(payments::callback))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health_routes())
        .merge(provider_routes())
        .merge(shopper_routes())
}
