//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request span carrying `request_id`)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions with `PostgreSQL` store)
//! 5. Rate limiting (governor, shopper routes only)

pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use rate_limit::storefront_rate_limiter;
pub use request_id::{make_request_span, request_id_middleware};
pub use session::create_session_layer;
