//! Order lifecycle error types.

use thiserror::Error;

use storefront_core::{OrderId, PaymentMethod, StatusTransitionError};

use crate::db::RepositoryError;
use crate::services::payment::PaymentError;

/// Errors that can occur while reading or transitioning orders.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order does not exist or belongs to someone else.
    #[error("order {0} not found")]
    NotFound(OrderId),

    /// The state machine forbids the requested change.
    #[error(transparent)]
    InvalidStatusTransition(#[from] StatusTransitionError),

    /// The payment method is settled offline, not through the gateway.
    #[error("{0} payments are settled offline")]
    OfflinePayment(PaymentMethod),

    /// The gateway declined the charge. The order has been cancelled.
    #[error("payment declined: {0}")]
    PaymentDeclined(String),

    /// The gateway failed; nothing changed.
    #[error(transparent)]
    Payment(PaymentError),

    /// Another request changed the order first.
    #[error("order {0} was modified concurrently")]
    ConcurrentUpdate(OrderId),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
