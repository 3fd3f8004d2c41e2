//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use storefront_core::{
    CurrencyCode, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, PromotionId,
    Quantity, UserId,
};

use super::CartLine;

/// A line frozen into an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Quantity,
    /// Price charged per unit, after any promotion.
    pub unit_price: Decimal,
    /// The cart snapshot price before the promotion.
    pub original_unit_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_id: Option<PromotionId>,
    pub line_total: Decimal,
}

/// A placed order.
///
/// Only `status`, `payment_status`, `transaction_id` and `updated_at` change
/// after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub items: Vec<OrderLine>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub currency: CurrencyCode,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    pub shipping_address: String,
    pub billing_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Materialize a new order as stored, in `PENDING`/`PENDING`.
    #[must_use]
    pub fn from_new(id: OrderId, new: NewOrder) -> Self {
        Self {
            id,
            order_number: new.order_number,
            user_id: new.user_id,
            items: new
                .lines
                .into_iter()
                .map(|line| OrderLine {
                    product_id: line.product_id,
                    product_name: line.product_name,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    original_unit_price: line.original_unit_price,
                    promotion_id: line.promotion_id,
                    line_total: line.line_total,
                })
                .collect(),
            subtotal: new.subtotal,
            shipping_cost: new.shipping_cost,
            tax_amount: new.tax_amount,
            total_amount: new.total_amount,
            currency: new.currency,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: new.payment_method,
            transaction_id: None,
            shipping_address: new.shipping_address,
            billing_address: new.billing_address,
            notes: new.notes,
            created_at: new.created_at,
            updated_at: new.created_at,
        }
    }

    /// Apply an accepted status change.
    pub fn apply(&mut self, change: &StatusChange, at: DateTime<Utc>) {
        self.status = change.status;
        self.payment_status = change.payment_status;
        if let Some(transaction_id) = &change.transaction_id {
            self.transaction_id = Some(transaction_id.clone());
        }
        self.updated_at = at;
    }
}

/// A line of an order about to be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Quantity,
    pub unit_price: Decimal,
    pub original_unit_price: Decimal,
    pub promotion_id: Option<PromotionId>,
    pub line_total: Decimal,
}

/// An assembled order, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: UserId,
    pub lines: Vec<NewOrderLine>,
    /// The user's cart lines as read at checkout. Placing the order takes
    /// these quantities out of the cart and nothing else.
    pub cart_lines: Vec<CartLine>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub currency: CurrencyCode,
    pub payment_method: PaymentMethod,
    pub shipping_address: String,
    pub billing_address: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    /// Promotions applied by at least one line, each listed once.
    #[must_use]
    pub fn applied_promotions(&self) -> Vec<PromotionId> {
        let mut ids: Vec<PromotionId> = self.lines.iter().filter_map(|l| l.promotion_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// A compare-and-set status change.
///
/// Stores apply it only if the order is still in the `expected_*` states, so a
/// concurrent transition makes the second writer fail instead of overwriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub expected_status: OrderStatus,
    pub expected_payment: PaymentStatus,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub transaction_id: Option<String>,
    /// Return every line's quantity to stock in the same write.
    pub restock: bool,
}

impl StatusChange {
    /// A change that keeps both states as they are, for building on.
    #[must_use]
    pub const fn from_current(order: &Order) -> Self {
        Self {
            expected_status: order.status,
            expected_payment: order.payment_status,
            status: order.status,
            payment_status: order.payment_status,
            transaction_id: None,
            restock: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn new_line(product: i32, promotion: Option<i32>) -> NewOrderLine {
        NewOrderLine {
            product_id: ProductId::new(product),
            product_name: format!("P{product}"),
            quantity: Quantity::ONE,
            unit_price: dec!(8),
            original_unit_price: dec!(10),
            promotion_id: promotion.map(PromotionId::new),
            line_total: dec!(8),
        }
    }

    fn new_order(lines: Vec<NewOrderLine>) -> NewOrder {
        NewOrder {
            order_number: "ORD-20260101-ABCDEF12".to_string(),
            user_id: UserId::new(1),
            lines,
            cart_lines: Vec::new(),
            subtotal: dec!(8),
            shipping_cost: dec!(15),
            tax_amount: Decimal::ZERO,
            total_amount: dec!(23),
            currency: CurrencyCode::EUR,
            payment_method: PaymentMethod::Card,
            shipping_address: "1 Main St".to_string(),
            billing_address: "1 Main St".to_string(),
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_applied_promotions_are_deduplicated() {
        let order = new_order(vec![
            new_line(1, Some(4)),
            new_line(2, None),
            new_line(3, Some(4)),
            new_line(4, Some(2)),
        ]);
        assert_eq!(
            order.applied_promotions(),
            vec![PromotionId::new(2), PromotionId::new(4)]
        );
    }

    #[test]
    fn test_new_order_starts_pending() {
        let order = Order::from_new(OrderId::new(1), new_order(vec![new_line(1, None)]));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.created_at, order.updated_at);
    }

    #[test]
    fn test_apply_keeps_existing_transaction_id() {
        let mut order = Order::from_new(OrderId::new(1), new_order(vec![new_line(1, None)]));
        let mut change = StatusChange::from_current(&order);
        change.status = OrderStatus::Confirmed;
        change.payment_status = PaymentStatus::Paid;
        change.transaction_id = Some("TXN-1".to_string());
        order.apply(&change, Utc::now());

        let mut refund = StatusChange::from_current(&order);
        refund.status = OrderStatus::Cancelled;
        refund.payment_status = PaymentStatus::Refunded;
        order.apply(&refund, Utc::now());

        assert_eq!(order.transaction_id.as_deref(), Some("TXN-1"));
        assert_eq!(order.payment_status, PaymentStatus::Refunded);
    }
}
