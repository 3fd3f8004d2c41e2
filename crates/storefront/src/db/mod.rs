//! Storage for the storefront.
//!
//! # Database: `storefront` schema
//!
//! ## Tables
//!
//! - `category`, `product` - The catalog, including stock levels
//! - `promotion`, `promotion_product`, `promotion_category` - Promotions and their targets
//! - `cart`, `cart_line` - Signed-in users' carts
//! - `customer_order`, `order_line` - Placed orders
//! - `tower_sessions.session` - Session storage
//!
//! Guest carts are never written to the database; they live in
//! [`SessionCartStore`] for as long as the session does.
//!
//! # Backends
//!
//! Every store is a trait with a Postgres implementation and an in-memory one.
//! The in-memory backend serves development mode and the tests.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p storefront-cli -- migrate
//! ```

pub mod carts;
pub mod catalog;
pub mod memory;
pub mod orders;
pub mod session_carts;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use storefront_core::{
    CartLineId, CartOwner, OrderId, Product, ProductId, PromotionId, Quantity, UserId,
};

use crate::models::{CartLine, NewOrder, Order, PageRequest, StatusChange};

pub use carts::PgCartStore;
pub use catalog::PgCatalog;
pub use memory::{MemoryCatalog, MemoryOrderStore};
pub use orders::PgOrderStore;
pub use session_carts::SessionCartStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation or lost compare-and-set.
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Why an order could not be placed.
///
/// Any of these leaves stock, promotion usage and orders untouched.
#[derive(Debug, Error)]
pub enum PlaceOrderError {
    /// Stock ran out between validation and the write.
    #[error("insufficient stock for product {0}")]
    InsufficientStock(ProductId),

    /// The promotion reached its usage limit or was withdrawn.
    #[error("promotion {0} is no longer available")]
    PromotionUnavailable(PromotionId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for PlaceOrderError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Read access to the catalog plus the two stock mutations checkout needs.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Load a product with every promotion that may apply to it.
    ///
    /// Inactive products are returned; callers decide what that means.
    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Decrement stock if at least `quantity` remains. Returns whether it did.
    async fn decrement_stock(
        &self,
        id: ProductId,
        quantity: Quantity,
    ) -> Result<bool, RepositoryError>;

    /// Return `quantity` units to stock.
    async fn restock(&self, id: ProductId, quantity: Quantity) -> Result<(), RepositoryError>;
}

/// Cart line storage, identical for guest and user owners.
///
/// Quantity increments are atomic per line so concurrent adds never lose an
/// update.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Lines in insertion order. An unknown owner has no lines.
    async fn lines(&self, owner: &CartOwner) -> Result<Vec<CartLine>, RepositoryError>;

    /// Add `quantity` to the owner's line for `product_id`, capped at
    /// [`Quantity::MAX`], or append a new line priced at `unit_price`.
    async fn add_or_increment(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        quantity: Quantity,
        unit_price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<CartLine, RepositoryError>;

    /// Replace a line's quantity. `None` if the owner has no such line.
    async fn set_quantity(
        &self,
        owner: &CartOwner,
        line_id: CartLineId,
        quantity: Quantity,
    ) -> Result<Option<CartLine>, RepositoryError>;

    /// Remove a line. Returns whether it existed.
    async fn remove_line(
        &self,
        owner: &CartOwner,
        line_id: CartLineId,
    ) -> Result<bool, RepositoryError>;

    /// Remove every line.
    async fn clear(&self, owner: &CartOwner) -> Result<(), RepositoryError>;

    /// Take each given line's quantity out of the owner's cart, removing the
    /// line once nothing is left. Lines added since, or already gone, are
    /// left alone.
    async fn consume(&self, owner: &CartOwner, lines: &[CartLine]) -> Result<(), RepositoryError>;
}

/// Order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Atomically decrement stock for every line, count promotion usage,
    /// consume the order's cart lines from the user's cart and persist the
    /// order. Either all of it happens or none of it does.
    async fn place(&self, order: NewOrder) -> Result<Order, PlaceOrderError>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// One page of a user's orders, newest first.
    async fn list_for_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Vec<Order>, RepositoryError>;

    /// Apply a compare-and-set status change, restocking if it asks to.
    ///
    /// Fails with [`RepositoryError::Conflict`] if the order is no longer in
    /// the expected states and [`RepositoryError::NotFound`] if it is gone.
    async fn apply(&self, id: OrderId, change: &StatusChange) -> Result<Order, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
