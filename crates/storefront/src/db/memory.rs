//! In-memory catalog and order storage.
//!
//! Used in development mode (no database configured) and by the tests. The
//! guarantees match the Postgres backend: stock decrements are
//! compare-and-decrement, and an order placement that fails part-way undoes
//! what it already did before anything becomes visible.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, RwLock};

use storefront_core::{
    CartOwner, OrderId, Product, ProductId, Promotion, PromotionId, PromotionStatus, Quantity,
    UserId,
};

use super::{CartStore, OrderStore, PlaceOrderError, ProductCatalog, RepositoryError};
use crate::models::{NewOrder, Order, PageRequest, StatusChange};
use crate::seed::CatalogSeed;

#[derive(Debug, Default)]
struct CatalogData {
    products: BTreeMap<ProductId, Product>,
    promotions: BTreeMap<PromotionId, Promotion>,
}

/// Products and promotions held in memory.
///
/// Promotions are stored once and attached to products on read, so a change
/// to a promotion is seen by every product it targets.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    data: RwLock<CatalogData>,
}

impl MemoryCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding the seed's products and promotions.
    #[must_use]
    pub fn from_seed(seed: CatalogSeed) -> Self {
        let mut data = CatalogData::default();
        for mut product in seed.products {
            product.promotions.clear();
            data.products.insert(product.id, product);
        }
        for promotion in seed.promotions {
            data.promotions.insert(promotion.id, promotion);
        }
        Self {
            data: RwLock::new(data),
        }
    }

    /// Insert or replace a product. Its `promotions` field is ignored.
    pub async fn insert_product(&self, mut product: Product) {
        product.promotions.clear();
        self.data.write().await.products.insert(product.id, product);
    }

    /// Insert or replace a promotion.
    pub async fn insert_promotion(&self, promotion: Promotion) {
        self.data
            .write()
            .await
            .promotions
            .insert(promotion.id, promotion);
    }

    /// Delete a product.
    pub async fn remove_product(&self, id: ProductId) -> bool {
        self.data.write().await.products.remove(&id).is_some()
    }

    /// Change a product's catalog price.
    pub async fn set_price(&self, id: ProductId, price: Decimal) -> bool {
        self.data
            .write()
            .await
            .products
            .get_mut(&id)
            .map(|product| product.price = price)
            .is_some()
    }

    /// Edit a promotion in place.
    pub async fn update_promotion(&self, id: PromotionId, edit: impl FnOnce(&mut Promotion)) -> bool {
        self.data
            .write()
            .await
            .promotions
            .get_mut(&id)
            .map(edit)
            .is_some()
    }

    /// Current stock of a product.
    pub async fn stock(&self, id: ProductId) -> Option<i32> {
        self.data
            .read()
            .await
            .products
            .get(&id)
            .map(|p| p.stock_quantity)
    }

    /// A promotion as currently stored.
    pub async fn promotion(&self, id: PromotionId) -> Option<Promotion> {
        self.data.read().await.promotions.get(&id).cloned()
    }

    /// Count one use of a promotion if it is active and below its limit.
    async fn try_use_promotion(&self, id: PromotionId) -> bool {
        let mut data = self.data.write().await;
        let Some(promotion) = data.promotions.get_mut(&id) else {
            return false;
        };
        let below_limit = promotion
            .max_uses
            .is_none_or(|max| promotion.current_uses < max);
        if promotion.status != PromotionStatus::Active || !below_limit {
            return false;
        }
        promotion.current_uses += 1;
        true
    }

    async fn release_promotion(&self, id: PromotionId) {
        if let Some(promotion) = self.data.write().await.promotions.get_mut(&id) {
            promotion.current_uses = (promotion.current_uses - 1).max(0);
        }
    }
}

#[async_trait]
impl ProductCatalog for MemoryCatalog {
    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let data = self.data.read().await;
        let Some(product) = data.products.get(&id) else {
            return Ok(None);
        };
        let mut product = product.clone();
        product.promotions = data
            .promotions
            .values()
            .filter(|promotion| promotion.match_tier(&product).is_some())
            .cloned()
            .collect();
        Ok(Some(product))
    }

    async fn decrement_stock(
        &self,
        id: ProductId,
        quantity: Quantity,
    ) -> Result<bool, RepositoryError> {
        let mut data = self.data.write().await;
        let product = data.products.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if product.stock_quantity < quantity.as_i32() {
            return Ok(false);
        }
        product.stock_quantity -= quantity.as_i32();
        Ok(true)
    }

    async fn restock(&self, id: ProductId, quantity: Quantity) -> Result<(), RepositoryError> {
        // A deleted product has nothing to restock.
        if let Some(product) = self.data.write().await.products.get_mut(&id) {
            product.stock_quantity = product.stock_quantity.saturating_add(quantity.as_i32());
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct OrderData {
    orders: BTreeMap<OrderId, Order>,
    last_id: i32,
}

/// Orders held in memory, mutating stock in a [`MemoryCatalog`] and
/// consuming ordered lines from the user carts in `carts`.
///
/// Placements are serialised by a lock over the order map.
pub struct MemoryOrderStore {
    catalog: Arc<MemoryCatalog>,
    carts: Arc<dyn CartStore>,
    data: Mutex<OrderData>,
}

impl MemoryOrderStore {
    #[must_use]
    pub fn new(catalog: Arc<MemoryCatalog>, carts: Arc<dyn CartStore>) -> Self {
        Self {
            catalog,
            carts,
            data: Mutex::new(OrderData::default()),
        }
    }

    /// Number of stored orders.
    pub async fn len(&self) -> usize {
        self.data.lock().await.orders.len()
    }

    /// Whether no order has been placed.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn undo(&self, taken: &[(ProductId, Quantity)], used: &[PromotionId]) {
        for &(product_id, quantity) in taken {
            if let Err(e) = self.catalog.restock(product_id, quantity).await {
                tracing::error!(%product_id, "Failed to undo stock decrement: {e}");
            }
        }
        for &promotion_id in used {
            self.catalog.release_promotion(promotion_id).await;
        }
    }
}

impl std::fmt::Debug for MemoryOrderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryOrderStore")
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn place(&self, order: NewOrder) -> Result<Order, PlaceOrderError> {
        let mut data = self.data.lock().await;

        let mut taken = Vec::with_capacity(order.lines.len());
        for line in &order.lines {
            match self
                .catalog
                .decrement_stock(line.product_id, line.quantity)
                .await
            {
                Ok(true) => taken.push((line.product_id, line.quantity)),
                Ok(false) | Err(RepositoryError::NotFound) => {
                    self.undo(&taken, &[]).await;
                    return Err(PlaceOrderError::InsufficientStock(line.product_id));
                }
                Err(e) => {
                    self.undo(&taken, &[]).await;
                    return Err(e.into());
                }
            }
        }

        let mut used = Vec::new();
        for promotion_id in order.applied_promotions() {
            if !self.catalog.try_use_promotion(promotion_id).await {
                self.undo(&taken, &used).await;
                return Err(PlaceOrderError::PromotionUnavailable(promotion_id));
            }
            used.push(promotion_id);
        }

        let owner = CartOwner::user(order.user_id);
        if let Err(e) = self.carts.consume(&owner, &order.cart_lines).await {
            self.undo(&taken, &used).await;
            return Err(e.into());
        }

        data.last_id += 1;
        let id = OrderId::new(data.last_id);
        let order = Order::from_new(id, order);
        data.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.data.lock().await.orders.get(&id).cloned())
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Vec<Order>, RepositoryError> {
        let data = self.data.lock().await;
        let mut orders: Vec<&Order> = data
            .orders
            .values()
            .filter(|order| order.user_id == user_id)
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit()).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn apply(&self, id: OrderId, change: &StatusChange) -> Result<Order, RepositoryError> {
        let mut data = self.data.lock().await;
        let order = data.orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if order.status != change.expected_status
            || order.payment_status != change.expected_payment
        {
            return Err(RepositoryError::Conflict(format!(
                "order {id} changed concurrently"
            )));
        }
        if change.restock {
            for line in &order.items {
                self.catalog.restock(line.product_id, line.quantity).await?;
            }
        }
        order.apply(change, Utc::now());
        Ok(order.clone())
    }
}
