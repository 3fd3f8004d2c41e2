//! Cart domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use storefront_core::pricing::PricedUnit;
use storefront_core::{CartLineId, CurrencyCode, ProductId, PromotionId, Quantity, line_total};

/// A stored cart line.
///
/// Only the unit price snapshot is stored; discounts are resolved on read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub id: CartLineId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    /// Catalog price when the line was first added.
    pub unit_price: Decimal,
    pub added_at: DateTime<Utc>,
}

/// A cart line priced at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    pub id: CartLineId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Quantity,
    pub unit_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_id: Option<PromotionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discounted_price: Option<Decimal>,
    pub line_total: Decimal,
}

impl CartLineView {
    /// Price a stored line.
    #[must_use]
    pub fn new(line: &CartLine, product_name: String, priced: PricedUnit) -> Self {
        Self {
            id: line.id,
            product_id: line.product_id,
            product_name,
            quantity: line.quantity,
            unit_price: line.unit_price,
            promotion_id: priced.promotion_id,
            discounted_price: priced.discounted_price,
            line_total: line_total(priced.effective(), line.quantity),
        }
    }

    /// The price charged per unit.
    #[must_use]
    pub fn effective_price(&self) -> Decimal {
        self.discounted_price.unwrap_or(self.unit_price)
    }
}

/// The cart as returned to clients. Totals are always derived from the lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub total_amount: Decimal,
    pub total_items: u32,
    pub currency: CurrencyCode,
}

impl CartView {
    /// Build a view, computing the totals.
    #[must_use]
    pub fn new(items: Vec<CartLineView>, currency: CurrencyCode) -> Self {
        let total_amount = items.iter().map(|item| item.line_total).sum();
        let total_items = items.iter().map(|item| item.quantity.get()).sum();
        Self {
            items,
            total_amount,
            total_items,
            currency,
        }
    }

    /// An empty cart.
    #[must_use]
    pub fn empty(currency: CurrencyCode) -> Self {
        Self::new(Vec::new(), currency)
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn line(id: i32, qty: i64, price: Decimal) -> CartLine {
        CartLine {
            id: CartLineId::new(id),
            product_id: ProductId::new(id),
            quantity: Quantity::saturating(qty),
            unit_price: price,
            added_at: Utc::now(),
        }
    }

    #[test]
    fn test_totals_are_derived_from_lines() {
        let a = line(1, 2, dec!(10.00));
        let b = line(2, 1, dec!(5.50));
        let items = vec![
            CartLineView::new(
                &a,
                "A".to_string(),
                PricedUnit {
                    unit_price: a.unit_price,
                    promotion_id: Some(PromotionId::new(1)),
                    discounted_price: Some(dec!(8.00)),
                },
            ),
            CartLineView::new(
                &b,
                "B".to_string(),
                PricedUnit {
                    unit_price: b.unit_price,
                    promotion_id: None,
                    discounted_price: None,
                },
            ),
        ];
        let view = CartView::new(items, CurrencyCode::EUR);
        assert_eq!(view.total_items, 3);
        assert_eq!(view.total_amount, dec!(21.50));
        assert_eq!(view.items[0].line_total, dec!(16.00));
    }

    #[test]
    fn test_empty_cart() {
        let view = CartView::empty(CurrencyCode::EUR);
        assert!(view.is_empty());
        assert_eq!(view.total_items, 0);
        assert_eq!(view.total_amount, Decimal::ZERO);
    }

    #[test]
    fn test_view_serializes_camel_case() {
        let view = CartView::empty(CurrencyCode::USD);
        let json = serde_json::to_value(&view).unwrap_or_default();
        assert_eq!(json["totalItems"], 0);
        assert_eq!(json["totalAmount"], "0");
        assert_eq!(json["currency"], "USD");
    }
}
