//! Core types for the Bulava storefront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod contact;
pub mod id;
pub mod money;
pub mod order_ref;
pub mod product;
pub mod status;

pub use contact::{ContactError, Email, Phone};
pub use id::*;
pub use money::{Currency, CurrencyError, Money};
pub use order_ref::{OrderReference, OrderReferenceError};
pub use product::ProductType;
pub use status::{OrderStatus, StatusTransition};
