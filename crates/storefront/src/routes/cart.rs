//! Cart route handlers.
//!
//! Every handler works on the cart of the request's [`CurrentIdentity`]: the
//! signed-in user's persistent cart, or the session's guest cart.

use axum::{Json, extract::State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use storefront_core::{CartLineId, ProductId};

use crate::error::{AppJson, AppPath, Result};
use crate::middleware::CurrentIdentity;
use crate::models::{CartLineView, CartView};
use crate::state::AppState;

const fn default_quantity() -> i64 {
    1
}

/// Body of `POST /cart/items`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

/// Body of `PUT /cart/items/{lineId}`.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i64,
}

/// Response of `POST /cart/items`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemResponse {
    pub item: CartLineView,
    pub total_items: u32,
}

/// Response of `DELETE /cart/items/{lineId}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalItemsResponse {
    pub total_items: u32,
}

/// Response of `GET /cart/count`.
#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u32,
}

/// Show the cart, priced now.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    CurrentIdentity(owner): CurrentIdentity,
) -> Result<Json<CartView>> {
    Ok(Json(state.carts().view(&owner, Utc::now()).await?))
}

/// Add a product, or increment its existing line.
#[instrument(skip(state, body), fields(product_id = %body.product_id, quantity = body.quantity))]
pub async fn add(
    State(state): State<AppState>,
    CurrentIdentity(owner): CurrentIdentity,
    AppJson(body): AppJson<AddItemRequest>,
) -> Result<Json<AddItemResponse>> {
    let item = state
        .carts()
        .add_item(&owner, body.product_id, body.quantity, Utc::now())
        .await?;
    let total_items = state.carts().count(&owner).await?;
    Ok(Json(AddItemResponse { item, total_items }))
}

/// Replace a line's quantity.
#[instrument(skip(state, body))]
pub async fn update(
    State(state): State<AppState>,
    CurrentIdentity(owner): CurrentIdentity,
    AppPath(line_id): AppPath<CartLineId>,
    AppJson(body): AppJson<UpdateItemRequest>,
) -> Result<Json<CartLineView>> {
    let item = state
        .carts()
        .update_item(&owner, line_id, body.quantity, Utc::now())
        .await?;
    Ok(Json(item))
}

/// Remove a line. Removing a missing line is not an error.
#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    CurrentIdentity(owner): CurrentIdentity,
    AppPath(line_id): AppPath<CartLineId>,
) -> Result<Json<TotalItemsResponse>> {
    state.carts().remove_item(&owner, line_id).await?;
    let total_items = state.carts().count(&owner).await?;
    Ok(Json(TotalItemsResponse { total_items }))
}

/// Empty the cart.
#[instrument(skip(state))]
pub async fn clear(
    State(state): State<AppState>,
    CurrentIdentity(owner): CurrentIdentity,
) -> Result<Json<CartView>> {
    state.carts().clear(&owner).await?;
    Ok(Json(CartView::empty(state.config().currency)))
}

/// Number of units in the cart.
pub async fn count(
    State(state): State<AppState>,
    CurrentIdentity(owner): CurrentIdentity,
) -> Result<Json<CountResponse>> {
    let count = state.carts().count(&owner).await?;
    Ok(Json(CountResponse { count }))
}
