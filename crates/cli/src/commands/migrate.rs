//! Database migration commands.
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Storefront migrations live in `crates/storefront/migrations/` and are
//! embedded at compile time. The session table is owned by
//! `tower-sessions-sqlx-store` and created through its own migration.

use thiserror::Error;
use tower_sessions_sqlx_store::PostgresStore;
use tracing::info;

use bulava_storefront::db;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run storefront database migrations and create the session table.
///
/// # Errors
///
/// Returns `MigrationError` if the database URL is missing, the connection
/// fails, or a migration does not apply.
pub async fn storefront() -> Result<(), MigrationError> {
    let database_url =
        super::database_url().ok_or(MigrationError::MissingEnvVar("STOREFRONT_DATABASE_URL"))?;

    info!("Connecting to storefront database...");
    let pool = db::create_pool(&database_url).await?;

    info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    info!("Creating session table...");
    PostgresStore::new(pool).migrate().await?;

    info!("Storefront migrations complete");
    Ok(())
}
