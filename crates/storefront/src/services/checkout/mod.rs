//! Checkout: turn a cart into an order.
//!
//! Validation and pricing are pure reads. The only write that matters is
//! [`OrderStore::place`], which decrements stock, counts promotion usage,
//! takes the ordered lines out of the cart and stores the order atomically,
//! so a checkout that fails at any step leaves nothing behind. Lines added to
//! the cart while the order is being placed stay in the cart.

mod error;

pub use error::CheckoutError;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use storefront_core::pricing::price_unit;
use storefront_core::{CartOwner, CurrencyCode, PaymentMethod, line_total};

use crate::db::{OrderStore, ProductCatalog};
use crate::models::{NewOrder, NewOrderLine, Order};
use crate::services::cart::CartService;
use crate::services::notifications::NotificationSink;

/// Checkout details supplied by the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub shipping_address: String,
    /// Defaults to the shipping address.
    #[serde(default)]
    pub billing_address: Option<String>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Fixed charges added to every order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderCharges {
    pub shipping_cost: Decimal,
    pub currency: CurrencyCode,
}

/// Human-readable order number: `ORD-YYYYMMDD-XXXXXXXX`.
#[must_use]
pub fn order_number(now: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "ORD-{}-{}",
        now.format("%Y%m%d"),
        suffix.get(..8).unwrap_or(&suffix).to_uppercase()
    )
}

/// Assembles orders from carts.
pub struct CheckoutService {
    catalog: Arc<dyn ProductCatalog>,
    carts: Arc<CartService>,
    orders: Arc<dyn OrderStore>,
    notifier: Arc<dyn NotificationSink>,
    charges: OrderCharges,
}

impl CheckoutService {
    /// Create a new checkout service.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        carts: Arc<CartService>,
        orders: Arc<dyn OrderStore>,
        notifier: Arc<dyn NotificationSink>,
        charges: OrderCharges,
    ) -> Self {
        Self {
            catalog,
            carts,
            orders,
            notifier,
            charges,
        }
    }

    /// Place an order for everything in the owner's cart.
    ///
    /// Every line is re-validated against current stock and re-priced at
    /// `now`; the order freezes those prices. The order starts `PENDING` with
    /// payment `PENDING`.
    ///
    /// # Errors
    ///
    /// - `CheckoutError::SignInRequired` for a guest owner.
    /// - `CheckoutError::Validation` if the shipping address is blank.
    /// - `CheckoutError::EmptyCart` if the cart has no lines.
    /// - `CheckoutError::ProductUnavailable` if a product was withdrawn.
    /// - `CheckoutError::InsufficientStock` if a line asks for more than is left,
    ///   including when a concurrent checkout took the stock first.
    /// - `CheckoutError::PromotionUnavailable` if an applied promotion was used
    ///   up concurrently.
    #[instrument(skip(self, owner, request), fields(owner = %owner, method = %request.payment_method))]
    pub async fn checkout(
        &self,
        owner: &CartOwner,
        request: CheckoutRequest,
        now: DateTime<Utc>,
    ) -> Result<Order, CheckoutError> {
        let user_id = owner.user_id().ok_or(CheckoutError::SignInRequired)?;
        let shipping_address = request.shipping_address.trim().to_owned();
        if shipping_address.is_empty() {
            return Err(CheckoutError::Validation(
                "shipping address is required".to_owned(),
            ));
        }
        let billing_address = request
            .billing_address
            .map(|a| a.trim().to_owned())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| shipping_address.clone());
        let notes = request
            .notes
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty());

        let cart = self.carts.lines(owner).await?;

        let mut lines = Vec::with_capacity(cart.len());
        for line in &cart {
            let Some(product) = self.catalog.get(line.product_id).await? else {
                tracing::warn!(product_id = %line.product_id, "Skipping cart line for missing product");
                continue;
            };
            if !product.active {
                return Err(CheckoutError::ProductUnavailable(product.id));
            }
            if product.stock_quantity < line.quantity.as_i32() {
                return Err(CheckoutError::InsufficientStock(product.id));
            }

            let priced = price_unit(line.unit_price, &product, now);
            lines.push(NewOrderLine {
                product_id: product.id,
                product_name: product.name,
                quantity: line.quantity,
                unit_price: priced.effective(),
                original_unit_price: line.unit_price,
                promotion_id: priced.promotion_id,
                line_total: line_total(priced.effective(), line.quantity),
            });
        }
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let subtotal: Decimal = lines.iter().map(|l| l.line_total).sum();
        let tax_amount = Decimal::ZERO;
        let order = NewOrder {
            order_number: order_number(now),
            user_id,
            lines,
            cart_lines: cart,
            subtotal,
            shipping_cost: self.charges.shipping_cost,
            tax_amount,
            total_amount: subtotal + self.charges.shipping_cost + tax_amount,
            currency: self.charges.currency,
            payment_method: request.payment_method,
            shipping_address,
            billing_address,
            notes,
            created_at: now,
        };

        let order = self.orders.place(order).await?;

        tracing::info!(
            order_number = %order.order_number,
            total = %order.total_amount,
            "Order placed"
        );

        self.notify(&order).await;

        Ok(order)
    }

    /// Fire-and-forget notifications for a placed order.
    async fn notify(&self, order: &Order) {
        if let Err(e) = self.notifier.order_created(order).await {
            tracing::warn!(order_number = %order.order_number, "Order notification failed: {e}");
        }

        for line in &order.items {
            match self.catalog.get(line.product_id).await {
                Ok(Some(product)) if product.is_low_on_stock() => {
                    if let Err(e) = self.notifier.low_stock(&product).await {
                        tracing::warn!(product_id = %product.id, "Low-stock notification failed: {e}");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(product_id = %line.product_id, "Low-stock check failed: {e}");
                }
            }
        }
    }
}

impl std::fmt::Debug for CheckoutService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutService")
            .field("charges", &self.charges)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use storefront_core::{
        CategoryId, DiscountType, GuestKey, OrderId, OrderStatus, PaymentStatus, Product,
        ProductId, Promotion, PromotionId, PromotionStatus, UserId,
    };

    use super::*;
    use crate::db::{
        CartStore, MemoryCatalog, MemoryOrderStore, PlaceOrderError, RepositoryError,
        SessionCartStore,
    };
    use crate::models::{PageRequest, StatusChange};
    use crate::services::notifications::NotificationError;

    #[derive(Default)]
    struct Recorder {
        orders: Mutex<Vec<String>>,
        low_stock: Mutex<Vec<ProductId>>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationSink for Recorder {
        async fn order_created(&self, order: &Order) -> Result<(), NotificationError> {
            self.orders.lock().unwrap().push(order.order_number.clone());
            if self.fail {
                return Err(NotificationError("mailer down".to_string()));
            }
            Ok(())
        }

        async fn low_stock(&self, product: &Product) -> Result<(), NotificationError> {
            self.low_stock.lock().unwrap().push(product.id);
            if self.fail {
                return Err(NotificationError("mailer down".to_string()));
            }
            Ok(())
        }
    }

    struct Fixture {
        catalog: Arc<MemoryCatalog>,
        orders: Arc<MemoryOrderStore>,
        carts: Arc<CartService>,
        checkout: CheckoutService,
        notifier: Arc<Recorder>,
    }

    fn product(id: i32, price: Decimal, stock: i32) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price,
            stock_quantity: stock,
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

    async fn fixture_with(notifier: Recorder) -> Fixture {
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.insert_product(product(1, dec!(10.00), 10)).await;
        catalog.insert_product(product(2, dec!(5.00), 1)).await;
        let user_carts: Arc<dyn CartStore> = Arc::new(SessionCartStore::unbounded());
        let orders = Arc::new(MemoryOrderStore::new(catalog.clone(), user_carts.clone()));
        let carts = Arc::new(CartService::new(
            catalog.clone(),
            Arc::new(SessionCartStore::unbounded()),
            user_carts,
            CurrencyCode::EUR,
        ));
        let notifier = Arc::new(notifier);
        let checkout = CheckoutService::new(
            catalog.clone(),
            carts.clone(),
            orders.clone(),
            notifier.clone(),
            OrderCharges {
                shipping_cost: dec!(15.00),
                currency: CurrencyCode::EUR,
            },
        );
        Fixture {
            catalog,
            orders,
            carts,
            checkout,
            notifier,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(Recorder::default()).await
    }

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            shipping_address: "1 Main St".to_string(),
            billing_address: None,
            payment_method: PaymentMethod::Card,
            notes: None,
        }
    }

    fn user() -> CartOwner {
        CartOwner::user(UserId::new(1))
    }

    #[tokio::test]
    async fn test_empty_cart_creates_no_order() {
        let f = fixture().await;
        let result = f.checkout.checkout(&user(), request(), Utc::now()).await;
        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
        assert!(f.orders.is_empty().await);
    }

    #[tokio::test]
    async fn test_totals_for_single_line() {
        let f = fixture().await;
        let now = Utc::now();
        f.carts.add_item(&user(), ProductId::new(1), 3, now).await.unwrap();

        let order = f.checkout.checkout(&user(), request(), now).await.unwrap();
        assert_eq!(order.subtotal, dec!(30.00));
        assert_eq!(order.shipping_cost, dec!(15.00));
        assert_eq!(order.tax_amount, Decimal::ZERO);
        assert_eq!(order.total_amount, dec!(45.00));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.billing_address, "1 Main St");
        assert_eq!(order.user_id, UserId::new(1));
        assert!(order.order_number.starts_with("ORD-"));

        assert_eq!(f.catalog.stock(ProductId::new(1)).await, Some(7));
        assert_eq!(f.carts.count(&user()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_discounted_price_is_frozen_into_order() {
        let f = fixture().await;
        f.catalog.insert_promotion(twenty_off(1)).await;
        let now = Utc::now();
        f.carts.add_item(&user(), ProductId::new(1), 2, now).await.unwrap();

        let order = f.checkout.checkout(&user(), request(), now).await.unwrap();
        let line = &order.items[0];
        assert_eq!(line.unit_price, dec!(8.00));
        assert_eq!(line.original_unit_price, dec!(10.00));
        assert_eq!(line.line_total, dec!(16.00));
        assert_eq!(line.promotion_id, Some(PromotionId::new(1)));
        assert_eq!(
            f.catalog.promotion(PromotionId::new(1)).await.unwrap().current_uses,
            1
        );
    }

    #[tokio::test]
    async fn test_exhausted_promotion_charges_full_price() {
        let f = fixture().await;
        let mut promo = twenty_off(1);
        promo.max_uses = Some(2);
        promo.current_uses = 2;
        f.catalog.insert_promotion(promo).await;
        let now = Utc::now();
        f.carts.add_item(&user(), ProductId::new(1), 1, now).await.unwrap();

        let order = f.checkout.checkout(&user(), request(), now).await.unwrap();
        assert_eq!(order.items[0].unit_price, dec!(10.00));
        assert_eq!(order.items[0].promotion_id, None);
    }

    #[tokio::test]
    async fn test_insufficient_stock_is_all_or_nothing() {
        let f = fixture().await;
        let now = Utc::now();
        f.carts.add_item(&user(), ProductId::new(1), 2, now).await.unwrap();
        f.carts.add_item(&user(), ProductId::new(2), 3, now).await.unwrap();

        let result = f.checkout.checkout(&user(), request(), now).await;
        assert!(matches!(result, Err(CheckoutError::InsufficientStock(id)) if id == ProductId::new(2)));
        assert_eq!(f.catalog.stock(ProductId::new(1)).await, Some(10));
        assert_eq!(f.catalog.stock(ProductId::new(2)).await, Some(1));
        assert!(f.orders.is_empty().await);
        assert_eq!(f.carts.count(&user()).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_inactive_product_blocks_checkout() {
        let f = fixture().await;
        let now = Utc::now();
        f.carts.add_item(&user(), ProductId::new(1), 1, now).await.unwrap();
        let mut withdrawn = product(1, dec!(10.00), 10);
        withdrawn.active = false;
        f.catalog.insert_product(withdrawn).await;

        let result = f.checkout.checkout(&user(), request(), now).await;
        assert!(matches!(result, Err(CheckoutError::ProductUnavailable(_))));
        assert!(f.orders.is_empty().await);
    }

    #[tokio::test]
    async fn test_blank_shipping_address_is_rejected() {
        let f = fixture().await;
        let now = Utc::now();
        f.carts.add_item(&user(), ProductId::new(1), 1, now).await.unwrap();
        let mut req = request();
        req.shipping_address = "   ".to_string();
        assert!(matches!(
            f.checkout.checkout(&user(), req, now).await,
            Err(CheckoutError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_guest_cannot_check_out() {
        let f = fixture().await;
        let now = Utc::now();
        let guest = CartOwner::guest(GuestKey::generate());
        f.carts.add_item(&guest, ProductId::new(1), 1, now).await.unwrap();

        let result = f.checkout.checkout(&guest, request(), now).await;
        assert!(matches!(result, Err(CheckoutError::SignInRequired)));
        assert!(f.orders.is_empty().await);
        assert_eq!(f.catalog.stock(ProductId::new(1)).await, Some(10));
        assert_eq!(f.carts.count(&guest).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_billing_address_and_notes_are_trimmed() {
        let f = fixture().await;
        let now = Utc::now();
        f.carts.add_item(&user(), ProductId::new(1), 1, now).await.unwrap();
        let mut req = request();
        req.billing_address = Some("2 Side St".to_string());
        req.notes = Some("  leave at door ".to_string());

        let order = f.checkout.checkout(&user(), req, now).await.unwrap();
        assert_eq!(order.billing_address, "2 Side St");
        assert_eq!(order.notes.as_deref(), Some("leave at door"));
    }

    /// Adds product 2 to the user's cart while the order is being placed.
    struct AddDuringPlace {
        inner: Arc<MemoryOrderStore>,
        carts: Arc<CartService>,
    }

    #[async_trait]
    impl OrderStore for AddDuringPlace {
        async fn place(&self, order: NewOrder) -> Result<Order, PlaceOrderError> {
            self.carts
                .add_item(&user(), ProductId::new(2), 1, Utc::now())
                .await
                .unwrap();
            self.inner.place(order).await
        }

        async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
            self.inner.get(id).await
        }

        async fn list_for_user(
            &self,
            user_id: UserId,
            page: PageRequest,
        ) -> Result<Vec<Order>, RepositoryError> {
            self.inner.list_for_user(user_id, page).await
        }

        async fn apply(
            &self,
            id: OrderId,
            change: &StatusChange,
        ) -> Result<Order, RepositoryError> {
            self.inner.apply(id, change).await
        }
    }

    #[tokio::test]
    async fn test_line_added_during_checkout_stays_in_cart() {
        let f = fixture().await;
        let checkout = CheckoutService::new(
            f.catalog.clone(),
            f.carts.clone(),
            Arc::new(AddDuringPlace {
                inner: f.orders.clone(),
                carts: f.carts.clone(),
            }),
            f.notifier.clone(),
            OrderCharges {
                shipping_cost: dec!(15.00),
                currency: CurrencyCode::EUR,
            },
        );
        let now = Utc::now();
        f.carts.add_item(&user(), ProductId::new(1), 2, now).await.unwrap();

        let order = checkout.checkout(&user(), request(), now).await.unwrap();
        let ordered: Vec<ProductId> = order.items.iter().map(|l| l.product_id).collect();
        assert_eq!(ordered, vec![ProductId::new(1)]);

        let left = f.carts.lines(&user()).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].product_id, ProductId::new(2));
        assert_eq!(left[0].quantity.get(), 1);
    }

    #[tokio::test]
    async fn test_low_stock_notification() {
        let f = fixture().await;
        let now = Utc::now();
        f.carts.add_item(&user(), ProductId::new(1), 8, now).await.unwrap();

        let order = f.checkout.checkout(&user(), request(), now).await.unwrap();
        assert_eq!(*f.notifier.orders.lock().unwrap(), vec![order.order_number]);
        assert_eq!(*f.notifier.low_stock.lock().unwrap(), vec![ProductId::new(1)]);
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_checkout() {
        let f = fixture_with(Recorder {
            fail: true,
            ..Recorder::default()
        })
        .await;
        let now = Utc::now();
        f.carts.add_item(&user(), ProductId::new(1), 9, now).await.unwrap();

        assert!(f.checkout.checkout(&user(), request(), now).await.is_ok());
        assert_eq!(f.notifier.low_stock.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_order_number_format() {
        let now = Utc::now();
        let number = order_number(now);
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1], now.format("%Y%m%d").to_string());
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }
}
