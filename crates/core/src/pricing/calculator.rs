//! Turn a unit price and a promotion into a discounted price.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::resolve;
use crate::catalog::{Discount, Product, Promotion};
use crate::types::{DISCOUNT_SCALE, PromotionId, round_half_up};

/// Discounted price of one unit.
///
/// - Percentage: `unit - round_half_up(unit * pct / 100, 4)`.
/// - Fixed amount: `unit - amount`.
/// - Never below zero.
///
/// Returns `unit_price` unchanged when there is no promotion, when it is not
/// usable at `now`, or when its discount definition is malformed (logged).
#[must_use]
pub fn discounted_price(
    unit_price: Decimal,
    promotion: Option<&Promotion>,
    now: DateTime<Utc>,
) -> Decimal {
    let Some(promotion) = promotion else {
        return unit_price;
    };
    if !promotion.is_active_at(now) {
        return unit_price;
    }
    let discount = match promotion.discount() {
        Ok(discount) => discount,
        Err(e) => {
            tracing::warn!(promotion_id = %promotion.id, "Ignoring malformed promotion: {e}");
            return unit_price;
        }
    };

    let price = match discount {
        Discount::Percentage(pct) => {
            let Some(discount) = unit_price
                .checked_mul(pct)
                .and_then(|d| d.checked_div(Decimal::ONE_HUNDRED))
            else {
                tracing::warn!(promotion_id = %promotion.id, %unit_price, "Discount overflowed");
                return unit_price;
            };
            unit_price - round_half_up(discount, DISCOUNT_SCALE)
        }
        Discount::FixedAmount(amount) => unit_price - amount,
    };

    price.max(Decimal::ZERO)
}

/// A unit price with its resolved promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedUnit {
    /// The snapshot price the discount is computed from.
    pub unit_price: Decimal,
    /// The promotion that applied, if any.
    pub promotion_id: Option<PromotionId>,
    /// Price after the promotion, present only when one applied.
    pub discounted_price: Option<Decimal>,
}

impl PricedUnit {
    /// The price actually charged per unit.
    #[must_use]
    pub fn effective(&self) -> Decimal {
        self.discounted_price.unwrap_or(self.unit_price)
    }
}

/// Resolve the promotion for `product` at `now` and price a `unit_price`
/// snapshot with it.
///
/// The catalog price of `product` is deliberately ignored: a cart line keeps
/// the price it was added at.
#[must_use]
pub fn price_unit(unit_price: Decimal, product: &Product, now: DateTime<Utc>) -> PricedUnit {
    match resolve(product, now) {
        Some(promotion) => PricedUnit {
            unit_price,
            promotion_id: Some(promotion.id),
            discounted_price: Some(discounted_price(unit_price, Some(promotion), now)),
        },
        None => PricedUnit {
            unit_price,
            promotion_id: None,
            discounted_price: None,
        },
    }
}
