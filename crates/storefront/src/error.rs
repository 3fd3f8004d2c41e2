//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`; every error body is
//! `{ "success": false, "message": "..." }`.

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::cart::CartError;
use crate::services::checkout::CheckoutError;
use crate::services::orders::OrderError;
use crate::services::payment::PaymentError;

/// Message returned for every 500 so internals never leak.
const INTERNAL_MESSAGE: &str = "Internal server error";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cart operation failed.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Checkout failed.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Order query or transition failed.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Request body could not be parsed.
    #[error(transparent)]
    Json(#[from] JsonRejection),

    /// Path parameter could not be parsed.
    #[error(transparent)]
    Path(#[from] PathRejection),

    /// Query string could not be parsed.
    #[error(transparent)]
    Query(#[from] QueryRejection),

    /// User is not authenticated.
    #[error("{0}")]
    Unauthorized(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Cart(err) => cart_status(err),
            Self::Checkout(err) => match err {
                CheckoutError::Validation(_) | CheckoutError::EmptyCart => StatusCode::BAD_REQUEST,
                CheckoutError::InsufficientStock(_)
                | CheckoutError::ProductUnavailable(_)
                | CheckoutError::PromotionUnavailable(_) => StatusCode::CONFLICT,
                CheckoutError::SignInRequired => StatusCode::UNAUTHORIZED,
                CheckoutError::Cart(err) => cart_status(err),
                CheckoutError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Order(err) => match err {
                OrderError::NotFound(_) => StatusCode::NOT_FOUND,
                OrderError::InvalidStatusTransition(_) | OrderError::OfflinePayment(_) => {
                    StatusCode::BAD_REQUEST
                }
                OrderError::PaymentDeclined(_) => StatusCode::PAYMENT_REQUIRED,
                OrderError::Payment(PaymentError::Declined(_)) => StatusCode::PAYMENT_REQUIRED,
                OrderError::Payment(PaymentError::Unavailable(_)) => StatusCode::BAD_GATEWAY,
                OrderError::ConcurrentUpdate(_) => StatusCode::CONFLICT,
                OrderError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Json(rejection) if rejection.status().is_server_error() => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Json(_) | Self::Path(_) | Self::Query(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing message.
    fn message(&self) -> String {
        match self {
            _ if self.status() == StatusCode::INTERNAL_SERVER_ERROR => INTERNAL_MESSAGE.to_string(),
            Self::Order(OrderError::Payment(PaymentError::Unavailable(_))) => {
                "Payment provider unavailable, please try again".to_string()
            }
            Self::Json(rejection) => rejection.body_text(),
            Self::Path(rejection) => rejection.body_text(),
            Self::Query(rejection) => rejection.body_text(),
            _ => self.to_string(),
        }
    }
}

const fn cart_status(err: &CartError) -> StatusCode {
    match err {
        CartError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
        CartError::ProductNotFound(_) | CartError::LineNotFound(_) => StatusCode::NOT_FOUND,
        CartError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, %status, "Request rejected");
        }

        let body = ErrorBody {
            success: false,
            message: self.message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// JSON extractor whose rejections use the [`AppError`] body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Path extractor whose rejections use the [`AppError`] body.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

/// Query extractor whose rejections use the [`AppError`] body.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
