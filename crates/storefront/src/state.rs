//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::payments::{PaymentError, PaymentGateway};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    payments: PaymentGateway,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if the configured payment provider cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, PaymentError> {
        let payments = PaymentGateway::from_config(&config.payment)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                payments,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the active payment provider.
    #[must_use]
    pub fn payments(&self) -> &PaymentGateway {
        &self.inner.payments
    }
}
