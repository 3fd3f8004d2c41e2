//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                        - Liveness check
//! GET    /health/ready                  - Readiness check (database ping)
//!
//! # Cart (guest or user)
//! GET    /cart                          - Cart view, priced now
//! POST   /cart/items                    - Add or increment a line
//! PUT    /cart/items/{lineId}           - Set a line's quantity
//! DELETE /cart/items/{lineId}           - Remove a line (idempotent)
//! DELETE /cart                          - Empty the cart
//! GET    /cart/count                    - Units in the cart
//!
//! # Orders
//! POST   /orders                        - Checkout (user)
//! GET    /orders?page=&size=            - Order history, paged (user)
//! GET    /orders/{id}                   - Order detail (user)
//! POST   /orders/{id}/pay               - Online payment (user)
//! POST   /orders/{id}/cancel            - Cancel (user)
//! POST   /orders/{id}/confirm-receipt   - Mark delivered (user)
//! ```

pub mod cart;
pub mod orders;

use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::from_fn,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;
use tower_sessions::SessionStore;

use crate::middleware::{create_session_layer, request_id_middleware};
use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add))
        .route("/items/{line_id}", put(cart::update).delete(cart::remove))
        .route("/count", get(cart::count))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(orders::create).get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/pay", post(orders::pay))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/confirm-receipt", post(orders::confirm_receipt))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
}

/// The routes with sessions, request IDs and tracing applied.
pub fn app<S>(state: AppState, session_store: S) -> Router
where
    S: SessionStore + Clone,
{
    let session_layer = create_session_layer(session_store, state.config());
    routes()
        .layer(session_layer)
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity in Postgres mode. Returns 503 Service
/// Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    let Some(pool) = state.pool() else {
        return StatusCode::OK;
    };
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!("Readiness check failed: {e}");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
