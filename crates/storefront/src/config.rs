//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (fallback: `DATABASE_URL`).
//!   Without one the service runs on the in-memory backend.
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_BASE_URL` - Public URL (default: `http://localhost:3000`)
//! - `STOREFRONT_CURRENCY` - Currency label for amounts (default: EUR)
//! - `STOREFRONT_SHIPPING_COST` - Flat shipping charge per order (default: 15.00)
//! - `STOREFRONT_GUEST_CART_TTL_SECS` - Idle lifetime of a guest cart (default: 7 days)
//! - `STOREFRONT_GUEST_CART_CAPACITY` - Max guest carts held in memory (default: 100000)
//! - `STOREFRONT_CARD_DECLINE_ABOVE` - Simulated gateway declines totals above this
//! - `STOREFRONT_SEED_FILE` - YAML catalog loaded at start-up in development mode
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

use storefront_core::CurrencyCode;

/// Default guest cart lifetime, matching the session expiry.
const DEFAULT_GUEST_CART_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
///
/// Implements `Debug` manually to redact the database URL.
#[derive(Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` connection URL (contains password). `None` selects the
    /// in-memory backend.
    pub database_url: Option<SecretString>,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Currency label attached to every amount
    pub currency: CurrencyCode,
    /// Flat shipping cost added to every order
    pub shipping_cost: Decimal,
    /// Idle lifetime of a guest cart
    pub guest_cart_ttl: Duration,
    /// Maximum number of guest carts kept in memory
    pub guest_cart_capacity: u64,
    /// Simulated card gateway declines totals above this amount
    pub card_decline_above: Option<Decimal>,
    /// Catalog seed loaded at start-up in development mode
    pub seed_file: Option<PathBuf>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry transaction sample rate
    pub sentry_traces_sample_rate: f32,
}

impl std::fmt::Debug for StorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontConfig")
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("currency", &self.currency)
            .field("shipping_cost", &self.shipping_cost)
            .field("guest_cart_ttl", &self.guest_cart_ttl)
            .field("guest_cart_capacity", &self.guest_cart_capacity)
            .field("card_decline_above", &self.card_decline_above)
            .field("seed_file", &self.seed_file)
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"))
            .field("sentry_environment", &self.sentry_environment)
            .finish_non_exhaustive()
    }
}

impl Default for StorefrontConfig {
    /// Development defaults: in-memory backend on `127.0.0.1:3000`.
    fn default() -> Self {
        Self {
            database_url: None,
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            currency: CurrencyCode::EUR,
            shipping_cost: Decimal::new(1500, 2),
            guest_cart_ttl: Duration::from_secs(DEFAULT_GUEST_CART_TTL_SECS),
            guest_cart_capacity: 100_000,
            card_decline_above: None,
            seed_file: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if a variable is set but cannot be
    /// parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        let shipping_cost: Decimal =
            parse_env_or("STOREFRONT_SHIPPING_COST", defaults.shipping_cost)?;
        if shipping_cost.is_sign_negative() {
            return Err(ConfigError::InvalidEnvVar(
                "STOREFRONT_SHIPPING_COST".to_string(),
                "must not be negative".to_string(),
            ));
        }

        Ok(Self {
            database_url: get_database_url("STOREFRONT_DATABASE_URL"),
            host: parse_env_or("STOREFRONT_HOST", defaults.host)?,
            port: parse_env_or("STOREFRONT_PORT", defaults.port)?,
            base_url: get_env_or_default("STOREFRONT_BASE_URL", &defaults.base_url),
            currency: parse_env_or("STOREFRONT_CURRENCY", defaults.currency)?,
            shipping_cost,
            guest_cart_ttl: Duration::from_secs(parse_env_or(
                "STOREFRONT_GUEST_CART_TTL_SECS",
                DEFAULT_GUEST_CART_TTL_SECS,
            )?),
            guest_cart_capacity: parse_env_or(
                "STOREFRONT_GUEST_CART_CAPACITY",
                defaults.guest_cart_capacity,
            )?,
            card_decline_above: parse_optional_env("STOREFRONT_CARD_DECLINE_ABOVE")?,
            seed_file: get_optional_env("STOREFRONT_SEED_FILE").map(PathBuf::from),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env_or("SENTRY_SAMPLE_RATE", defaults.sentry_sample_rate)?,
            sentry_traces_sample_rate: parse_env_or(
                "SENTRY_TRACES_SAMPLE_RATE",
                defaults.sentry_traces_sample_rate,
            )?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
#[must_use]
pub fn get_database_url(primary_key: &str) -> Option<SecretString> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(SecretString::from)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an optional environment variable.
fn parse_optional_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key)
        .map(|value| parse_value(key, &value))
        .transpose()
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_optional_env(key)?.unwrap_or(default))
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
