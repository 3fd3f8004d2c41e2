//! Catalog entities as seen by the cart and checkout.
//!
//! A [`Product`] is loaded together with every promotion that *could* apply to
//! it (product-level, category-level or catalog-wide). Whether one of them
//! actually applies is decided by [`crate::pricing::resolve`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CategoryId, DiscountType, ProductId, PromotionId, PromotionStatus};

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Current catalog price. Cart lines snapshot this when added.
    pub price: Decimal,
    pub stock_quantity: i32,
    /// Remaining stock at or below which a low-stock alert is raised.
    pub min_stock_threshold: i32,
    pub category_id: Option<CategoryId>,
    /// Inactive products cannot be bought.
    pub active: bool,
    /// Promotions associated with this product, usable or not.
    #[serde(default)]
    pub promotions: Vec<Promotion>,
}

impl Product {
    /// Whether the remaining stock has reached the alert threshold.
    #[must_use]
    pub const fn is_low_on_stock(&self) -> bool {
        self.stock_quantity <= self.min_stock_threshold
    }
}

/// Reasons a promotion's discount definition cannot be used.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedPromotion {
    #[error("percentage promotion {0} has no percentage")]
    MissingPercentage(PromotionId),
    #[error("percentage promotion {id} has percentage {value} outside (0, 100]")]
    PercentageOutOfRange { id: PromotionId, value: Decimal },
    #[error("fixed-amount promotion {0} has no amount")]
    MissingAmount(PromotionId),
    #[error("fixed-amount promotion {id} has negative amount {value}")]
    NegativeAmount { id: PromotionId, value: Decimal },
}

/// A validated discount definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discount {
    /// Percentage off, in `(0, 100]`.
    Percentage(Decimal),
    /// Fixed amount off.
    FixedAmount(Decimal),
}

/// How specifically a promotion targets a product. Higher wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier {
    /// No product or category restriction.
    CatalogWide,
    /// The product's category is listed.
    Category,
    /// The product itself is listed.
    Product,
}

/// A promotion as stored.
///
/// The discount fields are kept raw so malformed rows can be represented and
/// priced fail-safe; [`Promotion::discount`] validates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: PromotionId,
    pub name: String,
    pub discount_type: DiscountType,
    pub discount_percentage: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub status: PromotionStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub max_uses: Option<i32>,
    #[serde(default)]
    pub current_uses: i32,
    #[serde(default)]
    pub applicable_products: BTreeSet<ProductId>,
    #[serde(default)]
    pub applicable_categories: BTreeSet<CategoryId>,
}

impl Promotion {
    /// Validate the discount definition against the declared mode.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedPromotion`] when the value matching the mode is
    /// missing or out of range.
    pub fn discount(&self) -> Result<Discount, MalformedPromotion> {
        match self.discount_type {
            DiscountType::Percentage => {
                let value = self
                    .discount_percentage
                    .ok_or(MalformedPromotion::MissingPercentage(self.id))?;
                if value <= Decimal::ZERO || value > Decimal::ONE_HUNDRED {
                    return Err(MalformedPromotion::PercentageOutOfRange { id: self.id, value });
                }
                Ok(Discount::Percentage(value))
            }
            DiscountType::FixedAmount => {
                let value = self
                    .discount_amount
                    .ok_or(MalformedPromotion::MissingAmount(self.id))?;
                if value < Decimal::ZERO {
                    return Err(MalformedPromotion::NegativeAmount { id: self.id, value });
                }
                Ok(Discount::FixedAmount(value))
            }
        }
    }

    /// Whether the status, date window and usage limit allow use at `now`.
    ///
    /// Missing start or end dates are unbounded on that side.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        if self.status != PromotionStatus::Active {
            return false;
        }
        if self.start_date.is_some_and(|start| now < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| now > end) {
            return false;
        }
        self.max_uses.is_none_or(|max| self.current_uses < max)
    }

    /// Whether the promotion can be applied at `now`: active and well-formed.
    #[must_use]
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active_at(now) && self.discount().is_ok()
    }

    /// How this promotion targets `product`, or `None` if it does not apply.
    ///
    /// A product list, when present, is exclusive: a category match does not
    /// widen a promotion that names specific products.
    #[must_use]
    pub fn match_tier(&self, product: &Product) -> Option<MatchTier> {
        if !self.applicable_products.is_empty() {
            return self
                .applicable_products
                .contains(&product.id)
                .then_some(MatchTier::Product);
        }
        if !self.applicable_categories.is_empty() {
            return product
                .category_id
                .filter(|category| self.applicable_categories.contains(category))
                .map(|_| MatchTier::Category);
        }
        Some(MatchTier::CatalogWide)
    }
}
