//! Cart error types.

use thiserror::Error;

use storefront_core::{CartLineId, ProductId, QuantityError};

use crate::db::RepositoryError;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantity outside `1..=999`.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    /// Product does not exist or is not for sale.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The line is not in the owner's cart.
    #[error("cart line {0} not found")]
    LineNotFound(CartLineId),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
