//! Session keys.
//!
//! Everything the storefront keeps in the session lives under one of these.

/// Session keys for cart and checkout state.
pub mod keys {
    /// Key for the serialized [`Cart`](crate::models::Cart).
    pub const CART: &str = "cart";

    /// Key for the reference of the order awaiting payment.
    pub const PENDING_ORDER_ID: &str = "pending_order_id";
}
