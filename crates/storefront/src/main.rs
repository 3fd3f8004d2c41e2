//! Storefront - cart, pricing and checkout over JSON/HTTP.
//!
//! This binary serves the cart and order API on port 3000.
//!
//! # Backends
//!
//! - With `STOREFRONT_DATABASE_URL` set: `PostgreSQL` for the catalog, user
//!   carts, orders and sessions.
//! - Without it (development mode): everything in memory, optionally seeded
//!   from `STOREFRONT_SEED_FILE`.
//!
//! Guest carts live in memory in both modes.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use sentry::integrations::tracing as sentry_tracing;
use tower_sessions::MemoryStore;
use tower_sessions_sqlx_store::PostgresStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront::config::StorefrontConfig;
use storefront::db::{self, MemoryCatalog};
use storefront::routes;
use storefront::seed::CatalogSeed;
use storefront::state::{AppState, Stores};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Build the in-memory catalog for development mode.
async fn memory_catalog(config: &StorefrontConfig) -> MemoryCatalog {
    let Some(path) = &config.seed_file else {
        tracing::warn!("No STOREFRONT_SEED_FILE set; the catalog is empty");
        return MemoryCatalog::new();
    };

    let seed = CatalogSeed::load(path)
        .await
        .expect("Failed to load catalog seed");

    tracing::info!(
        products = seed.products.len(),
        promotions = seed.promotions.len(),
        "Catalog seeded in memory"
    );
    MemoryCatalog::from_seed(seed)
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "storefront=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p storefront-cli -- migrate
    let app = if let Some(database_url) = config.database_url.clone() {
        let pool = db::create_pool(&database_url)
            .await
            .expect("Failed to create database pool");
        tracing::info!("Database pool created");

        let session_store = PostgresStore::new(pool.clone());
        let state = AppState::new(config.clone(), Stores::postgres(pool));
        routes::app(state, session_store)
    } else {
        tracing::warn!("No database configured; running on the in-memory backend");
        let catalog = Arc::new(memory_catalog(&config).await);
        let state = AppState::new(config.clone(), Stores::in_memory(catalog));
        routes::app(state, MemoryStore::default())
    };

    // Sentry layers (outermost for full request coverage)
    let app = app
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
