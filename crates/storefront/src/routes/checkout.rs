//! Checkout handler.

use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use super::{Notice, notice_redirect};
use crate::error::Result;
use crate::models::Order;
use crate::payments::PaymentRequest;
use crate::services::checkout::{self, CheckoutContact, CheckoutError};
use crate::state::AppState;

/// Optional contact details.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutParams {
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Checkout view for hosted-form providers.
#[derive(Debug, Serialize)]
pub struct CheckoutView {
    pub order: Order,
    pub payment: PaymentRequest,
}

/// Create an order for the cart and send the customer to the provider.
///
/// Hosted-form providers get a JSON view carrying the signed form; redirect
/// providers get a 303 to the provider page. An empty cart, an order too
/// large to record or a provider failure sends the customer back to the cart with a message.
#[instrument(skip(state, session, params))]
pub async fn start(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<CheckoutParams>,
) -> Result<Response> {
    let contact = CheckoutContact::parse(params.email.as_deref(), params.phone.as_deref())
        .map_err(CheckoutError::from)?;

    match checkout::initiate(&state, &session, contact).await {
        Ok(outcome) => Ok(match outcome.payment {
            PaymentRequest::Redirect { url, .. } => Redirect::to(&url).into_response(),
            payment @ PaymentRequest::HostedForm { .. } => Json(CheckoutView {
                order: outcome.order,
                payment,
            })
            .into_response(),
        }),
        Err(CheckoutError::EmptyCart) => {
            Ok(notice_redirect("/cart", Notice::Error, "Cart is empty").into_response())
        }
        Err(e @ (CheckoutError::QuantityTooLarge(_) | CheckoutError::TotalTooLarge(_))) => {
            tracing::warn!(error = %e, "Checkout rejected oversized order");
            Ok(notice_redirect("/cart", Notice::Error, "Order is too large").into_response())
        }
        Err(CheckoutError::Payment(e)) => {
            let event_id = sentry::capture_error(&e);
            tracing::error!(error = %e, sentry_event_id = %event_id, "Payment provider failed during checkout");
            Ok(notice_redirect(
                "/cart",
                Notice::Error,
                "Payment could not be started. Please try again.",
            )
            .into_response())
        }
        Err(e) => Err(e.into()),
    }
}
