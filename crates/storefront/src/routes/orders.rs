//! Order route handlers.
//!
//! Every order route needs a signed-in user and only ever sees that user's
//! orders. Guests sign in before checking out; their cart is merged then.

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use tracing::instrument;

use storefront_core::{CartOwner, OrderId};

use crate::error::{AppJson, AppPath, AppQuery, Result};
use crate::middleware::RequireUser;
use crate::models::{Order, PageRequest};
use crate::services::checkout::CheckoutRequest;
use crate::state::AppState;

/// Check out the current cart.
#[instrument(skip(state, request))]
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    AppJson(request): AppJson<CheckoutRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let owner = CartOwner::user(user_id);
    let order = state.checkout().checkout(&owner, request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// One page of the user's orders, newest first: `?page=0&size=20`.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    AppQuery(page): AppQuery<PageRequest>,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.orders().list_for_user(user_id, page).await?))
}

/// One of the user's orders.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    AppPath(id): AppPath<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(state.orders().get_for_user(user_id, id).await?))
}

/// Pay an order online.
#[instrument(skip(state))]
pub async fn pay(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    AppPath(id): AppPath<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(state.orders().pay(user_id, id).await?))
}

/// Cancel an order that has not been delivered.
#[instrument(skip(state))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    AppPath(id): AppPath<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(state.orders().cancel(user_id, id).await?))
}

/// Confirm a shipped order arrived.
#[instrument(skip(state))]
pub async fn confirm_receipt(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    AppPath(id): AppPath<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(state.orders().confirm_receipt(user_id, id).await?))
}
