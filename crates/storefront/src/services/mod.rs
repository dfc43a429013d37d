//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `cart` - Cart and pending-order state in the session
//! - `checkout` - Order creation and payment request
//! - `reconciliation` - Provider callbacks to order status

pub mod cart;
pub mod checkout;
pub mod reconciliation;

pub use checkout::{CheckoutContact, CheckoutError, CheckoutOutcome};
pub use reconciliation::{ReconciliationError, ReconciliationOutcome};
