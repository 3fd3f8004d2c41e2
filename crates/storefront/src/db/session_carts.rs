//! In-memory cart storage.
//!
//! Guest carts always live here, keyed by the session's guest key, and expire
//! after the same idle period as the session. In development mode a second,
//! non-expiring instance also holds user carts.

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use storefront_core::{CartLineId, CartOwner, ProductId, Quantity};

use super::{CartStore, RepositoryError};
use crate::models::CartLine;

type Lines = Arc<Mutex<Vec<CartLine>>>;

/// Carts held in a `moka` cache, one mutex-guarded line list per owner.
pub struct SessionCartStore {
    carts: Cache<CartOwner, Lines>,
    next_line_id: AtomicI32,
}

impl SessionCartStore {
    /// Store for guest carts: at most `capacity` carts, each dropped after
    /// `idle` without access.
    #[must_use]
    pub fn new(capacity: u64, idle: Duration) -> Self {
        let carts = Cache::builder()
            .max_capacity(capacity)
            .time_to_idle(idle)
            .build();
        Self {
            carts,
            next_line_id: AtomicI32::new(0),
        }
    }

    /// Store without expiry or capacity limit.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            carts: Cache::builder().build(),
            next_line_id: AtomicI32::new(0),
        }
    }

    async fn existing(&self, owner: &CartOwner) -> Option<Lines> {
        self.carts.get(owner).await
    }

    async fn entry(&self, owner: &CartOwner) -> Lines {
        self.carts
            .get_with(*owner, async { Arc::new(Mutex::new(Vec::new())) })
            .await
    }

    fn next_id(&self) -> CartLineId {
        CartLineId::new(self.next_line_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

impl std::fmt::Debug for SessionCartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCartStore")
            .field("carts", &self.carts.entry_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CartStore for SessionCartStore {
    async fn lines(&self, owner: &CartOwner) -> Result<Vec<CartLine>, RepositoryError> {
        match self.existing(owner).await {
            Some(lines) => Ok(lines.lock().await.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn add_or_increment(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        quantity: Quantity,
        unit_price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<CartLine, RepositoryError> {
        let lines = self.entry(owner).await;
        let mut lines = lines.lock().await;

        if let Some(line) = lines.iter_mut().find(|l| l.product_id == product_id) {
            line.quantity = line.quantity.saturating_add(quantity);
            return Ok(line.clone());
        }

        let line = CartLine {
            id: self.next_id(),
            product_id,
            quantity,
            unit_price,
            added_at: now,
        };
        lines.push(line.clone());
        Ok(line)
    }

    async fn set_quantity(
        &self,
        owner: &CartOwner,
        line_id: CartLineId,
        quantity: Quantity,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let Some(lines) = self.existing(owner).await else {
            return Ok(None);
        };
        let mut lines = lines.lock().await;
        Ok(lines.iter_mut().find(|l| l.id == line_id).map(|line| {
            line.quantity = quantity;
            line.clone()
        }))
    }

    async fn remove_line(
        &self,
        owner: &CartOwner,
        line_id: CartLineId,
    ) -> Result<bool, RepositoryError> {
        let Some(lines) = self.existing(owner).await else {
            return Ok(false);
        };
        let mut lines = lines.lock().await;
        let before = lines.len();
        lines.retain(|l| l.id != line_id);
        Ok(lines.len() != before)
    }

    async fn clear(&self, owner: &CartOwner) -> Result<(), RepositoryError> {
        // Emptied in place: an add already holding this entry must land in
        // the cart that stays cached.
        if let Some(lines) = self.existing(owner).await {
            lines.lock().await.clear();
        }
        Ok(())
    }

    async fn consume(
        &self,
        owner: &CartOwner,
        consumed: &[CartLine],
    ) -> Result<(), RepositoryError> {
        let Some(lines) = self.existing(owner).await else {
            return Ok(());
        };
        let mut lines = lines.lock().await;
        for taken in consumed {
            let Some(pos) = lines.iter().position(|l| l.id == taken.id) else {
                continue;
            };
            let left = lines[pos].quantity.get().saturating_sub(taken.quantity.get());
            if left == 0 {
                lines.remove(pos);
            } else {
                lines[pos].quantity = Quantity::saturating(i64::from(left));
            }
        }
        Ok(())
    }
}
