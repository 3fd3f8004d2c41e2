//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! sf-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (fallback: `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Storefront migrations: `crates/storefront/migrations/`. They create the
//! `storefront` schema and the `tower_sessions.session` table.

use thiserror::Error;

/// Errors from running migrations.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn storefront() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations")
        .run(&pool)
        .await
        .map_err(MigrationError::from)?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
