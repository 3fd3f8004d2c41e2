//! CLI command implementations.

pub mod migrate;
pub mod order;
pub mod seed;

use secrecy::SecretString;
use sqlx::PgPool;

/// Connect to the storefront database named by `STOREFRONT_DATABASE_URL`
/// (or `DATABASE_URL`).
///
/// # Errors
///
/// Returns an error if no URL is configured or the connection fails.
pub async fn connect() -> Result<PgPool, Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let database_url: SecretString =
        storefront::config::get_database_url("STOREFRONT_DATABASE_URL")
            .ok_or("STOREFRONT_DATABASE_URL not set")?;

    tracing::info!("Connecting to storefront database...");
    Ok(storefront::db::create_pool(&database_url).await?)
}
