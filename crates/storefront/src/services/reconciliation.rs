//! Payment reconciliation.
//!
//! Provider callbacks are the authoritative source of order status. A
//! callback is verified before any order is looked up; the status change
//! itself is applied under a row lock by [`OrderRepository::apply_status`].

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use bulava_core::{OrderStatus, StatusTransition};

use crate::db::{OrderRepository, RepositoryError, StatusChange};
use crate::error::add_breadcrumb;
use crate::models::OrderLookup;
use crate::payments::{CallbackRequest, PaymentError, PaymentProvider};
use crate::state::AppState;

/// Errors that can occur while reconciling a provider callback.
#[derive(Debug, Error)]
pub enum ReconciliationError {
    /// The callback failed verification or decoding.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// The callback refers to an order that does not exist.
    #[error("no order for {0}")]
    OrderNotFound(OrderLookup),

    #[error(transparent)]
    Repository(RepositoryError),
}

/// What a verified callback did.
#[derive(Debug, Clone)]
pub enum ReconciliationOutcome {
    /// The event carries no order reference and was acknowledged only.
    Ignored { provider_status: String },
    /// The event was matched to an order.
    Applied(StatusChange),
}

impl ReconciliationOutcome {
    /// The order status after the callback, when an order was involved.
    #[must_use]
    pub const fn status(&self) -> Option<OrderStatus> {
        match self {
            Self::Ignored { .. } => None,
            Self::Applied(change) => Some(change.order.status),
        }
    }
}

/// Verify a provider callback and apply the status it reports.
///
/// # Errors
///
/// Returns `ReconciliationError::Payment` if the callback is rejected (no
/// database access happens in that case), `ReconciliationError::OrderNotFound`
/// if no order matches, or `ReconciliationError::Repository` on database
/// failure.
#[instrument(skip(state, callback), fields(provider = state.payments().name()))]
pub async fn handle_callback(
    state: &AppState,
    callback: CallbackRequest<'_>,
) -> Result<ReconciliationOutcome, ReconciliationError> {
    let event = state.payments().verify_callback(callback).inspect_err(|e| {
        warn!(error = %e, "Rejected payment callback");
    })?;

    let Some(lookup) = event.lookup else {
        debug!(provider_status = %event.provider_status, "Callback carries no order reference; ignoring");
        return Ok(ReconciliationOutcome::Ignored {
            provider_status: event.provider_status,
        });
    };

    let change = OrderRepository::new(state.pool())
        .apply_status(&lookup, &event.update)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => ReconciliationError::OrderNotFound(lookup.clone()),
            other => ReconciliationError::Repository(other),
        })?;

    let order_id = change.order.order_id.as_str();
    match change.transition {
        StatusTransition::Applied => {
            info!(
                order_id,
                from = %change.previous,
                to = %change.order.status,
                provider_status = %event.provider_status,
                "Order status updated"
            );
            add_breadcrumb(
                "payment",
                "Order status updated",
                Some(&[("order_id", order_id), ("status", change.order.status.as_str())]),
            );
        }
        StatusTransition::Unchanged => {
            debug!(order_id, status = %change.previous, "Repeated provider status; nothing to do");
        }
        StatusTransition::Rejected => {
            warn!(
                order_id,
                current = %change.previous,
                reported = %event.update.status,
                provider_status = %event.provider_status,
                "Ignoring disallowed status transition"
            );
        }
    }

    Ok(ReconciliationOutcome::Applied(change))
}
