//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::payments::PaymentError;
use crate::services::{CheckoutError, ReconciliationError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Payment provider operation failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Checkout could not be started.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// A provider callback could not be reconciled.
    #[error("Reconciliation error: {0}")]
    Reconciliation(#[from] ReconciliationError),

    /// Session storage failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

const ORDER_TOO_LARGE: &str = "Order is too large";

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Payment(err) => payment_status(err),
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart
                | CheckoutError::QuantityTooLarge(_)
                | CheckoutError::TotalTooLarge(_)
                | CheckoutError::Contact(_) => StatusCode::BAD_REQUEST,
                CheckoutError::Repository(err) => repository_status(err),
                CheckoutError::Payment(err) => payment_status(err),
                CheckoutError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Reconciliation(err) => match err {
                ReconciliationError::Payment(err) => payment_status(err),
                ReconciliationError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                ReconciliationError::Repository(err) => repository_status(err),
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to clients.
    fn public_message(&self) -> String {
        let status = self.status();
        if status.is_server_error() {
            return if status == StatusCode::BAD_GATEWAY {
                "Payment provider unavailable".to_string()
            } else {
                "Internal server error".to_string()
            };
        }

        match self {
            Self::Database(RepositoryError::NotFound)
            | Self::Checkout(CheckoutError::Repository(RepositoryError::NotFound))
            | Self::Reconciliation(ReconciliationError::OrderNotFound(_)) => {
                "Not found".to_string()
            }
            Self::Database(RepositoryError::Conflict(_)) => "Conflict".to_string(),
            Self::Payment(err)
            | Self::Checkout(CheckoutError::Payment(err))
            | Self::Reconciliation(ReconciliationError::Payment(err)) => {
                callback_message(err).to_string()
            }
            Self::Checkout(CheckoutError::EmptyCart) => "Cart is empty".to_string(),
            Self::Checkout(CheckoutError::QuantityTooLarge(_) | CheckoutError::TotalTooLarge(_)) => {
                ORDER_TOO_LARGE.to_string()
            }
            Self::Checkout(CheckoutError::Contact(err)) => err.to_string(),
            _ => self.to_string(),
        }
    }
}

const fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

const fn payment_status(err: &PaymentError) -> StatusCode {
    if err.is_callback_rejection() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::BAD_GATEWAY
    }
}

const fn callback_message(err: &PaymentError) -> &'static str {
    match err {
        PaymentError::MissingField(_) => "Missing callback field",
        PaymentError::InvalidSignature | PaymentError::StaleSignature => "Invalid signature",
        PaymentError::MalformedPayload(_) => "Malformed payload",
        PaymentError::Http(_) | PaymentError::Api { .. } | PaymentError::Amount(_) => {
            "Payment provider error"
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        (status, self.public_message()).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added product", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
