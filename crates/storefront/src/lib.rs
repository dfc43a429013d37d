//! Bulava Arms storefront library.
//!
//! Catalog browsing, a session cart, checkout and payment reconciliation
//! for LiqPay and Stripe. The binary in `main.rs` wires these into an Axum
//! server; integration tests build the same router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod routes;
pub mod services;
pub mod state;
