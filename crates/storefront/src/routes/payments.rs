//! Payment return pages and provider callback.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::{info, instrument};

use super::{Notice, notice_redirect};
use crate::db::OrderRepository;
use crate::error::Result;
use crate::payments::CallbackRequest;
use crate::services::{cart as cart_store, reconciliation};
use crate::state::AppState;

const ORDER_NOT_FOUND: &str = "Order not found";

/// Customer return from the provider.
///
/// Shows the pending order as it currently stands; the callback may not have
/// arrived yet, so it can still be `pending`. The cart is cleared only once
/// payment is confirmed or in progress.
#[instrument(skip(state, session))]
pub async fn result(State(state): State<AppState>, session: Session) -> Result<Response> {
    let Some(reference) = cart_store::pending_order(&session).await? else {
        return Ok(notice_redirect("/cart", Notice::Error, ORDER_NOT_FOUND).into_response());
    };

    let Some(order) = OrderRepository::new(state.pool())
        .get_with_items(&reference)
        .await?
    else {
        cart_store::forget_pending_order(&session).await?;
        return Ok(notice_redirect("/cart", Notice::Error, ORDER_NOT_FOUND).into_response());
    };

    if order.order.status.confirms_payment() {
        cart_store::clear_cart(&session).await?;
    }
    cart_store::forget_pending_order(&session).await?;

    Ok(Json(order).into_response())
}

/// Customer abandoned the provider page. The order keeps its status; only a
/// provider callback changes it.
#[instrument(skip(session))]
pub async fn cancel(session: Session) -> Result<Redirect> {
    if let Some(reference) = cart_store::pending_order(&session).await? {
        info!(order_id = %reference, "Customer cancelled payment");
    }
    cart_store::forget_pending_order(&session).await?;
    Ok(notice_redirect("/cart", Notice::Error, "Payment was cancelled"))
}

/// Provider callback or webhook.
///
/// Bad signatures and malformed payloads are 400, unknown orders 404.
/// Everything else, including ignored events and disallowed transitions, is
/// acknowledged with 200 so the provider stops retrying.
#[instrument(skip(state, headers, body), fields(body_len = body.len()))]
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str> {
    reconciliation::handle_callback(
        &state,
        CallbackRequest {
            headers: &headers,
            body: &body,
        },
    )
    .await?;
    Ok("OK")
}
