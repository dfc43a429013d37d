//! Cart route handlers.
//!
//! The cart lives in the session. Mutating handlers answer `XMLHttpRequest`
//! callers with a JSON status object and everyone else with a redirect that
//! carries the message in a `success` or `error` query parameter.

use axum::{
    Form, Json,
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use bulava_core::ProductId;

use super::{Notice, notice_redirect};
use crate::db::CatalogRepository;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::{CartItem, Product};
use crate::services::cart as cart_store;
use crate::state::AppState;

/// Largest quantity accepted by the update form.
pub const MAX_LINE_QUANTITY: i64 = 99;

const OUT_OF_STOCK: &str = "Product is out of stock";
const INVALID_QUANTITY: &str = "Invalid quantity";
const UNPROCESSABLE: &str = "Could not process request";

/// Cart display data.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub cart_items_count: u64,
    /// Current catalog prices.
    pub subtotal: Decimal,
    pub discount: Decimal,
    /// Snapshot prices.
    pub total: Decimal,
}

/// Cart badge data.
#[derive(Debug, Serialize)]
pub struct CartCount {
    pub cart_items_count: u64,
}

/// Add/update form data. The quantity is parsed by hand so bad input gets
/// a message instead of a rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QuantityForm {
    pub quantity: Option<String>,
}

/// JSON body for AJAX cart actions.
#[derive(Debug, Serialize)]
pub struct CartActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart_items_count: Option<u64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub cart_total: Option<Decimal>,
}

/// Outcome of a cart action, rendered per caller.
struct CartReply {
    ajax: bool,
    body: CartActionResponse,
    /// Where non-AJAX callers are sent.
    redirect_to: &'static str,
}

impl CartReply {
    fn failure(ajax: bool, message: &str, redirect_to: &'static str) -> Self {
        Self {
            ajax,
            body: CartActionResponse {
                success: false,
                message: message.to_string(),
                cart_items_count: None,
                cart_total: None,
            },
            redirect_to,
        }
    }

    fn success(ajax: bool, message: String, cart_items_count: u64) -> Self {
        Self {
            ajax,
            body: CartActionResponse {
                success: true,
                message,
                cart_items_count: Some(cart_items_count),
                cart_total: None,
            },
            redirect_to: "/cart",
        }
    }

    fn with_total(mut self, total: Decimal) -> Self {
        self.body.cart_total = Some(total);
        self
    }
}

impl IntoResponse for CartReply {
    fn into_response(self) -> Response {
        if self.ajax {
            return Json(self.body).into_response();
        }
        let notice = if self.body.success {
            Notice::Success
        } else {
            Notice::Error
        };
        notice_redirect(self.redirect_to, notice, &self.body.message).into_response()
    }
}

fn is_ajax(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
}

/// Parse a form quantity, defaulting to 1 when absent.
fn parse_quantity(raw: Option<&str>) -> Option<i64> {
    match raw.map(str::trim) {
        None | Some("") => Some(1),
        Some(value) => value.parse().ok(),
    }
}

/// Quantity to add to a line already holding `existing`, if the line stays
/// within `1..=MAX_LINE_QUANTITY`.
fn addable_quantity(existing: Option<u32>, requested: i64) -> Option<u32> {
    let after = i64::from(existing.unwrap_or(0)).checked_add(requested)?;
    if requested < 1 || after > MAX_LINE_QUANTITY {
        return None;
    }
    u32::try_from(requested).ok()
}

async fn find_product(state: &AppState, id: ProductId) -> Result<Product> {
    CatalogRepository::new(state.pool())
        .get_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// Display the cart.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    let cart = cart_store::load_cart(&session).await?;
    let products = CatalogRepository::new(state.pool())
        .get_products(&cart.product_ids())
        .await?;

    Ok(Json(CartView {
        items: cart.items(&products),
        cart_items_count: cart.len(),
        subtotal: cart.subtotal(&products),
        discount: cart.discount(&products),
        total: cart.total_price(),
    }))
}

/// Cart count for header badges. Never reads the catalog.
#[instrument(skip(session))]
pub async fn count(session: Session) -> Result<Json<CartCount>> {
    let cart = cart_store::load_cart(&session).await?;
    Ok(Json(CartCount {
        cart_items_count: cart.len(),
    }))
}

/// Add a product to the cart.
#[instrument(skip(state, session, headers, form))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<ProductId>,
    Form(form): Form<QuantityForm>,
) -> Result<Response> {
    let ajax = is_ajax(&headers);
    let product = find_product(&state, id).await?;

    if !product.in_stock {
        return Ok(CartReply::failure(ajax, OUT_OF_STOCK, "/catalog").into_response());
    }

    let mut cart = cart_store::load_cart(&session).await?;
    let Some(quantity) = parse_quantity(form.quantity.as_deref())
        .and_then(|q| addable_quantity(cart.quantity_of(product.id), q))
    else {
        return Ok(CartReply::failure(ajax, INVALID_QUANTITY, "/cart").into_response());
    };

    cart.add(&product, quantity, false);
    cart_store::save_cart(&session, &cart).await?;

    let product_id = product.id.to_string();
    add_breadcrumb("cart", "Added product", Some(&[("product_id", product_id.as_str())]));

    Ok(CartReply::success(ajax, format!("{} added to cart", product.name), cart.len()).into_response())
}

/// Remove a product from the cart.
#[instrument(skip(state, session, headers))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<ProductId>,
) -> Result<Response> {
    let ajax = is_ajax(&headers);
    let product = find_product(&state, id).await?;

    let mut cart = cart_store::load_cart(&session).await?;
    if cart.remove(product.id) {
        cart_store::save_cart(&session, &cart).await?;
    }

    Ok(CartReply::success(ajax, format!("{} removed from cart", product.name), cart.len())
        .with_total(cart.total_price())
        .into_response())
}

/// Set the quantity of a cart line.
#[instrument(skip(state, session, headers, form))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<ProductId>,
    Form(form): Form<QuantityForm>,
) -> Result<Response> {
    let ajax = is_ajax(&headers);

    let Some(quantity) = parse_quantity(form.quantity.as_deref()) else {
        return Ok(CartReply::failure(ajax, UNPROCESSABLE, "/cart").into_response());
    };
    if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
        return Ok(CartReply::failure(ajax, INVALID_QUANTITY, "/cart").into_response());
    }

    let product = find_product(&state, id).await?;
    if !product.in_stock {
        return Ok(CartReply::failure(ajax, OUT_OF_STOCK, "/cart").into_response());
    }

    let mut cart = cart_store::load_cart(&session).await?;
    cart.update_quantity(product.id, quantity);
    cart_store::save_cart(&session, &cart).await?;

    Ok(CartReply::success(ajax, "Quantity updated".to_string(), cart.len())
        .with_total(cart.total_price())
        .into_response())
}

/// Empty the cart.
#[instrument(skip(session))]
pub async fn clear(session: Session) -> Result<Redirect> {
    cart_store::clear_cart(&session).await?;
    Ok(notice_redirect("/cart", Notice::Success, "Cart cleared"))
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, StatusCode};

    use super::*;

    #[test]
    fn test_is_ajax() {
        let mut headers = HeaderMap::new();
        assert!(!is_ajax(&headers));
        headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        assert!(is_ajax(&headers));
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(None), Some(1));
        assert_eq!(parse_quantity(Some("")), Some(1));
        assert_eq!(parse_quantity(Some(" 3 ")), Some(3));
        assert_eq!(parse_quantity(Some("-2")), Some(-2));
        assert_eq!(parse_quantity(Some("two")), None);
    }

    #[test]
    fn test_addable_quantity() {
        assert_eq!(addable_quantity(None, 1), Some(1));
        assert_eq!(addable_quantity(None, 99), Some(99));
        assert_eq!(addable_quantity(Some(98), 1), Some(1));
        assert_eq!(addable_quantity(None, 0), None);
        assert_eq!(addable_quantity(None, -3), None);
        assert_eq!(addable_quantity(None, 100), None);
        assert_eq!(addable_quantity(Some(99), 1), None);
        assert_eq!(addable_quantity(Some(50), 2_000_000), None);
        assert_eq!(addable_quantity(None, i64::MAX), None);
    }

    #[test]
    fn test_failure_reply_redirects_with_error() {
        let response = CartReply::failure(false, OUT_OF_STOCK, "/catalog").into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()["location"],
            "/catalog?error=Product+is+out+of+stock"
        );
    }

    #[test]
    fn test_ajax_reply_serializes_total_as_number() {
        let reply = CartReply::success(true, "Quantity updated".to_string(), 3)
            .with_total(Decimal::new(25_050, 2));
        let json = serde_json::to_value(&reply.body).unwrap_or_default();
        assert_eq!(json["success"], true);
        assert_eq!(json["cart_items_count"], 3);
        assert_eq!(json["cart_total"], 250.5);

        let response = reply.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_failure_json_omits_counts() {
        let reply = CartReply::failure(true, INVALID_QUANTITY, "/cart");
        let json = serde_json::to_value(&reply.body).unwrap_or_default();
        assert_eq!(json["success"], false);
        assert!(json.get("cart_items_count").is_none());
        assert!(json.get("cart_total").is_none());
    }
}
