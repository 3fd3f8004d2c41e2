//! Pick the promotion that applies to a product.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::catalog::{MatchTier, Product, Promotion};

/// Resolve the promotion applying to `product` at `now`.
///
/// Only usable promotions are considered. Precedence:
/// 1. product-level match, then category-level, then catalog-wide;
/// 2. within a tier, the latest `start_date` (an open start sorts earliest);
/// 3. then the lowest id.
#[must_use]
pub fn resolve(product: &Product, now: DateTime<Utc>) -> Option<&Promotion> {
    product
        .promotions
        .iter()
        .filter(|promotion| promotion.is_usable(now))
        .filter_map(|promotion| promotion.match_tier(product).map(|tier| (tier, promotion)))
        .max_by(|a, b| precedence(*a, *b))
        .map(|(_, promotion)| promotion)
}

/// `Greater` means `a` wins.
fn precedence(a: (MatchTier, &Promotion), b: (MatchTier, &Promotion)) -> Ordering {
    a.0.cmp(&b.0)
        .then_with(|| a.1.start_date.cmp(&b.1.start_date))
        // Lower id wins, so reverse.
        .then_with(|| b.1.id.cmp(&a.1.id))
}
