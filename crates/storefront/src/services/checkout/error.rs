//! Checkout error types.

use thiserror::Error;

use storefront_core::{ProductId, PromotionId};

use crate::db::{PlaceOrderError, RepositoryError};
use crate::services::cart::CartError;

/// Errors that stop a checkout. None of them leaves a partial write behind.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Missing or malformed checkout details.
    #[error("{0}")]
    Validation(String),

    /// Only signed-in users can place orders.
    #[error("Sign in required")]
    SignInRequired,

    /// The cart has no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// Not enough stock for a line.
    #[error("insufficient stock for product {0}")]
    InsufficientStock(ProductId),

    /// A product in the cart is no longer for sale.
    #[error("product {0} is no longer available")]
    ProductUnavailable(ProductId),

    /// A promotion applied to the cart was used up or withdrawn meanwhile.
    #[error("promotion {0} is no longer available")]
    PromotionUnavailable(PromotionId),

    /// Cart read failed.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<PlaceOrderError> for CheckoutError {
    fn from(e: PlaceOrderError) -> Self {
        match e {
            PlaceOrderError::InsufficientStock(id) => Self::InsufficientStock(id),
            PlaceOrderError::PromotionUnavailable(id) => Self::PromotionUnavailable(id),
            PlaceOrderError::Repository(e) => Self::Repository(e),
        }
    }
}
