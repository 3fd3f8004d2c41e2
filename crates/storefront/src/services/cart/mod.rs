//! Cart service.
//!
//! One API for both kinds of owner. The owner decides which store is used:
//! guest carts go to the session store, user carts to the persistent one.
//!
//! Unit prices are frozen when a line is first added. Discounts are resolved
//! again on every read, so a promotion that expires or changes status is
//! reflected on the next view.

mod error;

pub use error::CartError;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use storefront_core::pricing::price_unit;
use storefront_core::{
    CartLineId, CartOwner, CurrencyCode, GuestKey, Product, ProductId, Quantity, UserId,
};

use crate::db::{CartStore, ProductCatalog};
use crate::models::{CartLine, CartLineView, CartView};

/// Outcome of folding a guest cart into a user cart.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// Products whose guest quantity reached the user cart.
    pub merged: Vec<ProductId>,
    /// Products left behind because they could not be merged.
    pub skipped: Vec<ProductId>,
}

/// Cart operations over a guest store and a user store.
pub struct CartService {
    catalog: Arc<dyn ProductCatalog>,
    guests: Arc<dyn CartStore>,
    users: Arc<dyn CartStore>,
    currency: CurrencyCode,
}

impl CartService {
    /// Create a new cart service.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        guests: Arc<dyn CartStore>,
        users: Arc<dyn CartStore>,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            catalog,
            guests,
            users,
            currency,
        }
    }

    fn store(&self, owner: &CartOwner) -> &dyn CartStore {
        match owner {
            CartOwner::Guest { .. } => self.guests.as_ref(),
            CartOwner::User { .. } => self.users.as_ref(),
        }
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, CartError> {
        Ok(self.catalog.get(id).await?)
    }

    fn price(line: &CartLine, product: &Product, now: DateTime<Utc>) -> CartLineView {
        CartLineView::new(line, product.name.clone(), price_unit(line.unit_price, product, now))
    }

    /// Add `quantity` of a product, incrementing its line if there is one.
    ///
    /// A new line snapshots the current catalog price. Increments are capped
    /// at the per-line ceiling.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` if `quantity` is outside `1..=999`.
    /// Returns `CartError::ProductNotFound` if the product does not exist or
    /// is inactive.
    #[instrument(skip(self, owner), fields(owner = %owner))]
    pub async fn add_item(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<CartLineView, CartError> {
        let quantity = Quantity::new(quantity)?;
        let product = self
            .product(product_id)
            .await?
            .filter(|p| p.active)
            .ok_or(CartError::ProductNotFound(product_id))?;

        let line = self
            .store(owner)
            .add_or_increment(owner, product_id, quantity, product.price, now)
            .await?;

        Ok(Self::price(&line, &product, now))
    }

    /// Replace the quantity of one of the owner's lines.
    ///
    /// The line's product is looked up before anything is written. A line
    /// whose product has been deleted is dropped from the cart instead.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` if `quantity` is outside `1..=999`.
    /// Returns `CartError::LineNotFound` if the owner has no such line.
    /// Returns `CartError::ProductNotFound` if the line's product is gone.
    #[instrument(skip(self, owner), fields(owner = %owner))]
    pub async fn update_item(
        &self,
        owner: &CartOwner,
        line_id: CartLineId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<CartLineView, CartError> {
        let quantity = Quantity::new(quantity)?;
        let store = self.store(owner);
        let current = store
            .lines(owner)
            .await?
            .into_iter()
            .find(|line| line.id == line_id)
            .ok_or(CartError::LineNotFound(line_id))?;

        let Some(product) = self.product(current.product_id).await? else {
            tracing::warn!(product_id = %current.product_id, "Dropping cart line for missing product");
            store.remove_line(owner, line_id).await?;
            return Err(CartError::ProductNotFound(current.product_id));
        };

        let line = store
            .set_quantity(owner, line_id, quantity)
            .await?
            .ok_or(CartError::LineNotFound(line_id))?;
        Ok(Self::price(&line, &product, now))
    }

    /// Remove a line. Removing a line that is already gone succeeds.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if storage fails.
    #[instrument(skip(self, owner), fields(owner = %owner))]
    pub async fn remove_item(
        &self,
        owner: &CartOwner,
        line_id: CartLineId,
    ) -> Result<(), CartError> {
        let removed = self.store(owner).remove_line(owner, line_id).await?;
        if !removed {
            tracing::debug!(%line_id, "Line already absent");
        }
        Ok(())
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if storage fails.
    #[instrument(skip(self, owner), fields(owner = %owner))]
    pub async fn clear(&self, owner: &CartOwner) -> Result<(), CartError> {
        self.store(owner).clear(owner).await?;
        Ok(())
    }

    /// The cart with every line freshly priced at `now`.
    ///
    /// Never fails for an owner without a cart; that is an empty view. Lines
    /// whose product has been deleted are left out.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if storage fails.
    pub async fn view(&self, owner: &CartOwner, now: DateTime<Utc>) -> Result<CartView, CartError> {
        let lines = self.store(owner).lines(owner).await?;
        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            match self.product(line.product_id).await? {
                Some(product) => items.push(Self::price(line, &product, now)),
                None => {
                    tracing::warn!(
                        owner = %owner,
                        product_id = %line.product_id,
                        "Dropping cart line for missing product"
                    );
                }
            }
        }
        Ok(CartView::new(items, self.currency))
    }

    /// Stored lines, unpriced, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if storage fails.
    pub async fn lines(&self, owner: &CartOwner) -> Result<Vec<CartLine>, CartError> {
        Ok(self.store(owner).lines(owner).await?)
    }

    /// Total number of units in the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if storage fails.
    pub async fn count(&self, owner: &CartOwner) -> Result<u32, CartError> {
        let lines = self.store(owner).lines(owner).await?;
        Ok(lines.iter().map(|line| line.quantity.get()).sum())
    }

    /// Fold a guest cart into a user's cart, then discard the guest cart.
    ///
    /// Quantities for a product already in the user cart are added together
    /// and capped at the per-line ceiling; other lines are appended with the
    /// guest's snapshot price. A line that cannot be merged (product deleted
    /// or withdrawn, storage error) is skipped and logged. The guest cart is
    /// cleared whatever happened to individual lines, so running the merge a
    /// second time for the same guest key does nothing.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the guest cart cannot be read or
    /// cleared.
    #[instrument(skip_all, fields(guest = %guest, user_id = %user_id))]
    pub async fn merge(&self, guest: GuestKey, user_id: UserId) -> Result<MergeReport, CartError> {
        let guest = CartOwner::guest(guest);
        let user = CartOwner::user(user_id);
        let mut report = MergeReport::default();

        for line in self.guests.lines(&guest).await? {
            let product_id = line.product_id;
            match self.catalog.get(product_id).await {
                Ok(Some(product)) if product.active => {}
                Ok(_) => {
                    tracing::warn!(%product_id, "Skipping merge of unavailable product");
                    report.skipped.push(product_id);
                    continue;
                }
                Err(e) => {
                    tracing::warn!(%product_id, "Skipping merge line: {e}");
                    report.skipped.push(product_id);
                    continue;
                }
            }

            match self
                .users
                .add_or_increment(&user, product_id, line.quantity, line.unit_price, line.added_at)
                .await
            {
                Ok(_) => report.merged.push(product_id),
                Err(e) => {
                    tracing::warn!(%product_id, "Skipping merge line: {e}");
                    report.skipped.push(product_id);
                }
            }
        }

        self.guests.clear(&guest).await?;

        if !report.merged.is_empty() || !report.skipped.is_empty() {
            tracing::info!(
                merged = report.merged.len(),
                skipped = report.skipped.len(),
                "Merged guest cart"
            );
        }
        Ok(report)
    }
}

impl std::fmt::Debug for CartService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartService")
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Duration;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use storefront_core::{
        CategoryId, DiscountType, Promotion, PromotionId, PromotionStatus, QuantityError,
    };

    use super::*;
    use crate::db::{MemoryCatalog, SessionCartStore};

    fn product(id: i32, price: Decimal) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price,
            stock_quantity: 50,
            min_stock_threshold: 2,
            category_id: Some(CategoryId::new(1)),
            active: true,
            promotions: Vec::new(),
        }
    }

    fn twenty_off(product: i32) -> Promotion {
        Promotion {
            id: PromotionId::new(1),
            name: "20% off".to_string(),
            discount_type: DiscountType::Percentage,
            discount_percentage: Some(dec!(20)),
            discount_amount: None,
            status: PromotionStatus::Active,
            start_date: None,
            end_date: None,
            max_uses: None,
            current_uses: 0,
            applicable_products: BTreeSet::from([ProductId::new(product)]),
            applicable_categories: BTreeSet::new(),
        }
    }

    async fn setup() -> (Arc<MemoryCatalog>, CartService) {
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.insert_product(product(1, dec!(10.00))).await;
        catalog.insert_product(product(2, dec!(4.50))).await;
        let service = CartService::new(
            catalog.clone(),
            Arc::new(SessionCartStore::unbounded()),
            Arc::new(SessionCartStore::unbounded()),
            CurrencyCode::EUR,
        );
        (catalog, service)
    }

    fn guest() -> (GuestKey, CartOwner) {
        let key = GuestKey::generate();
        (key, CartOwner::guest(key))
    }

    #[tokio::test]
    async fn test_view_of_unknown_owner_is_empty() {
        let (_, carts) = setup().await;
        let (_, owner) = guest();
        let view = carts.view(&owner, Utc::now()).await.unwrap();
        assert!(view.is_empty());
        assert_eq!(view.total_amount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_add_rejects_out_of_range_quantity() {
        let (_, carts) = setup().await;
        let (_, owner) = guest();
        let now = Utc::now();
        for qty in [0, -1, 1000] {
            let err = carts.add_item(&owner, ProductId::new(1), qty, now).await;
            assert!(matches!(err, Err(CartError::InvalidQuantity(_))), "qty {qty}");
        }
        assert!(matches!(
            carts.add_item(&owner, ProductId::new(1), 0, now).await,
            Err(CartError::InvalidQuantity(QuantityError::TooSmall(0)))
        ));
    }

    #[tokio::test]
    async fn test_add_rejects_unknown_and_inactive_products() {
        let (catalog, carts) = setup().await;
        let (_, owner) = guest();
        let now = Utc::now();
        assert!(matches!(
            carts.add_item(&owner, ProductId::new(99), 1, now).await,
            Err(CartError::ProductNotFound(_))
        ));

        let mut hidden = product(3, dec!(1));
        hidden.active = false;
        catalog.insert_product(hidden).await;
        assert!(matches!(
            carts.add_item(&owner, ProductId::new(3), 1, now).await,
            Err(CartError::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_add_is_associative_in_quantity() {
        let (_, carts) = setup().await;
        let now = Utc::now();
        let (_, split) = guest();
        let (_, once) = guest();

        carts.add_item(&split, ProductId::new(1), 2, now).await.unwrap();
        let a = carts.add_item(&split, ProductId::new(1), 5, now).await.unwrap();
        let b = carts.add_item(&once, ProductId::new(1), 7, now).await.unwrap();

        assert_eq!(a.quantity, b.quantity);
        assert_eq!(a.line_total, b.line_total);
        assert_eq!(carts.view(&split, now).await.unwrap().items.len(), 1);
    }

    #[tokio::test]
    async fn test_unit_price_is_snapshotted_at_add_time() {
        let (catalog, carts) = setup().await;
        let (_, owner) = guest();
        let now = Utc::now();
        carts.add_item(&owner, ProductId::new(1), 1, now).await.unwrap();

        catalog.set_price(ProductId::new(1), dec!(25.00)).await;
        carts.add_item(&owner, ProductId::new(1), 1, now).await.unwrap();

        let view = carts.view(&owner, now).await.unwrap();
        assert_eq!(view.items[0].unit_price, dec!(10.00));
        assert_eq!(view.total_amount, dec!(20.00));
    }

    #[tokio::test]
    async fn test_view_applies_promotion_and_reflects_expiry() {
        let (catalog, carts) = setup().await;
        catalog.insert_promotion(twenty_off(1)).await;
        let (_, owner) = guest();
        let now = Utc::now();
        carts.add_item(&owner, ProductId::new(1), 2, now).await.unwrap();

        let view = carts.view(&owner, now).await.unwrap();
        let line = &view.items[0];
        assert_eq!(line.discounted_price, Some(dec!(8.00)));
        assert_eq!(line.line_total, dec!(16.00));
        assert_eq!(view.total_amount, dec!(16.00));
        assert_eq!(view.total_items, 2);

        catalog
            .update_promotion(PromotionId::new(1), |p| {
                p.end_date = Some(now - Duration::seconds(1));
            })
            .await;
        let view = carts.view(&owner, now).await.unwrap();
        assert_eq!(view.items[0].discounted_price, None);
        assert_eq!(view.total_amount, dec!(20.00));
    }

    #[tokio::test]
    async fn test_update_item() {
        let (_, carts) = setup().await;
        let (_, owner) = guest();
        let (_, stranger) = guest();
        let now = Utc::now();
        let line = carts.add_item(&owner, ProductId::new(2), 1, now).await.unwrap();

        let updated = carts.update_item(&owner, line.id, 4, now).await.unwrap();
        assert_eq!(updated.quantity.get(), 4);
        assert_eq!(updated.line_total, dec!(18.00));

        assert!(matches!(
            carts.update_item(&owner, line.id, 0, now).await,
            Err(CartError::InvalidQuantity(_))
        ));
        assert!(matches!(
            carts.update_item(&stranger, line.id, 2, now).await,
            Err(CartError::LineNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_for_deleted_product_writes_nothing() {
        let (catalog, carts) = setup().await;
        let (_, owner) = guest();
        let now = Utc::now();
        let line = carts.add_item(&owner, ProductId::new(1), 2, now).await.unwrap();
        carts.add_item(&owner, ProductId::new(2), 1, now).await.unwrap();
        catalog.remove_product(ProductId::new(1)).await;

        let result = carts.update_item(&owner, line.id, 7, now).await;
        assert!(matches!(result, Err(CartError::ProductNotFound(id)) if id == ProductId::new(1)));

        let stored = carts.lines(&owner).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].product_id, ProductId::new(2));
        assert_eq!(carts.count(&owner).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (_, carts) = setup().await;
        let (_, owner) = guest();
        let now = Utc::now();
        let line = carts.add_item(&owner, ProductId::new(1), 1, now).await.unwrap();
        carts.add_item(&owner, ProductId::new(2), 1, now).await.unwrap();

        carts.remove_item(&owner, line.id).await.unwrap();
        let once = carts.view(&owner, now).await.unwrap();
        carts.remove_item(&owner, line.id).await.unwrap();
        let twice = carts.view(&owner, now).await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice.items.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_and_count() {
        let (_, carts) = setup().await;
        let (_, owner) = guest();
        let now = Utc::now();
        carts.add_item(&owner, ProductId::new(1), 2, now).await.unwrap();
        carts.add_item(&owner, ProductId::new(2), 3, now).await.unwrap();
        assert_eq!(carts.count(&owner).await.unwrap(), 5);

        carts.clear(&owner).await.unwrap();
        carts.clear(&owner).await.unwrap();
        assert_eq!(carts.count(&owner).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_view_drops_lines_for_deleted_products() {
        let (catalog, carts) = setup().await;
        let (_, owner) = guest();
        let now = Utc::now();
        carts.add_item(&owner, ProductId::new(1), 1, now).await.unwrap();
        carts.add_item(&owner, ProductId::new(2), 1, now).await.unwrap();
        catalog.remove_product(ProductId::new(1)).await;

        let view = carts.view(&owner, now).await.unwrap();
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.total_amount, dec!(4.50));
    }

    #[tokio::test]
    async fn test_merge_adds_quantities_and_drains_guest() {
        let (_, carts) = setup().await;
        let (key, guest_owner) = guest();
        let user = CartOwner::user(UserId::new(7));
        let now = Utc::now();

        carts.add_item(&user, ProductId::new(1), 1, now).await.unwrap();
        carts.add_item(&guest_owner, ProductId::new(1), 2, now).await.unwrap();
        carts.add_item(&guest_owner, ProductId::new(2), 1, now).await.unwrap();

        let report = carts.merge(key, UserId::new(7)).await.unwrap();
        assert_eq!(report.merged.len(), 2);
        assert!(report.skipped.is_empty());

        let view = carts.view(&user, now).await.unwrap();
        let quantities: Vec<(i32, u32)> = view
            .items
            .iter()
            .map(|l| (l.product_id.as_i32(), l.quantity.get()))
            .collect();
        assert_eq!(quantities, vec![(1, 3), (2, 1)]);
        assert!(carts.view(&guest_owner, now).await.unwrap().is_empty());

        // A second merge for the same guest key changes nothing.
        let again = carts.merge(key, UserId::new(7)).await.unwrap();
        assert_eq!(again, MergeReport::default());
        assert_eq!(carts.count(&user).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_merge_caps_at_ceiling() {
        let (_, carts) = setup().await;
        let (key, guest_owner) = guest();
        let user = CartOwner::user(UserId::new(1));
        let now = Utc::now();
        carts.add_item(&user, ProductId::new(1), 600, now).await.unwrap();
        carts.add_item(&guest_owner, ProductId::new(1), 600, now).await.unwrap();

        carts.merge(key, UserId::new(1)).await.unwrap();
        assert_eq!(carts.count(&user).await.unwrap(), Quantity::MAX);
    }

    #[tokio::test]
    async fn test_merge_keeps_guest_snapshot_price() {
        let (catalog, carts) = setup().await;
        let (key, guest_owner) = guest();
        let now = Utc::now();
        carts.add_item(&guest_owner, ProductId::new(1), 1, now).await.unwrap();
        catalog.set_price(ProductId::new(1), dec!(99)).await;

        carts.merge(key, UserId::new(1)).await.unwrap();
        let view = carts.view(&CartOwner::user(UserId::new(1)), now).await.unwrap();
        assert_eq!(view.items[0].unit_price, dec!(10.00));
    }

    #[tokio::test]
    async fn test_merge_skips_deleted_products() {
        let (catalog, carts) = setup().await;
        let (key, guest_owner) = guest();
        let now = Utc::now();
        carts.add_item(&guest_owner, ProductId::new(1), 1, now).await.unwrap();
        carts.add_item(&guest_owner, ProductId::new(2), 2, now).await.unwrap();
        catalog.remove_product(ProductId::new(1)).await;

        let report = carts.merge(key, UserId::new(1)).await.unwrap();
        assert_eq!(report.skipped, vec![ProductId::new(1)]);
        assert_eq!(report.merged, vec![ProductId::new(2)]);
        assert!(carts.view(&guest_owner, now).await.unwrap().is_empty());
        assert_eq!(carts.count(&CartOwner::user(UserId::new(1))).await.unwrap(), 2);
    }
}
