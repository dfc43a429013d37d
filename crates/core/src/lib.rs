//! Bulava Core - Shared domain types.
//!
//! This crate provides the types shared by the storefront server and the CLI:
//! - `storefront` - Catalog, session cart, checkout and payment reconciliation
//! - `cli` - Migrations and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. `sqlx` support is behind the `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - IDs, order references, order status rules, money and contact types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
