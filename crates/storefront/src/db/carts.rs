//! Persistent carts for signed-in users.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use storefront_core::{CartLineId, CartOwner, ProductId, Quantity, UserId};

use super::{CartStore, RepositoryError};
use crate::models::CartLine;

#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: i32,
    product_id: i32,
    quantity: i32,
    unit_price: Decimal,
    added_at: DateTime<Utc>,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let quantity = Quantity::new(i64::from(row.quantity)).map_err(|e| {
            RepositoryError::DataCorruption(format!("cart line {}: {e}", row.id))
        })?;
        Ok(Self {
            id: CartLineId::new(row.id),
            product_id: ProductId::new(row.product_id),
            quantity,
            unit_price: row.unit_price,
            added_at: row.added_at,
        })
    }
}

fn user_of(owner: &CartOwner) -> Result<UserId, RepositoryError> {
    owner
        .user_id()
        .ok_or_else(|| RepositoryError::Conflict("guest carts are not persisted".to_owned()))
}

/// Take each line's quantity out of the user's cart within `conn`'s
/// transaction, deleting lines that reach zero.
pub(super) async fn consume_lines_in(
    conn: &mut PgConnection,
    user_id: UserId,
    lines: &[CartLine],
) -> Result<(), sqlx::Error> {
    for line in lines {
        sqlx::query(
            r"
            DELETE FROM storefront.cart_line l
            USING storefront.cart c
            WHERE l.id = $2 AND l.cart_id = c.id AND c.user_id = $1 AND l.quantity <= $3
            ",
        )
        .bind(user_id)
        .bind(line.id)
        .bind(line.quantity.as_i32())
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r"
            UPDATE storefront.cart_line l
            SET quantity = l.quantity - $3
            FROM storefront.cart c
            WHERE l.id = $2 AND l.cart_id = c.id AND c.user_id = $1 AND l.quantity > $3
            ",
        )
        .bind(user_id)
        .bind(line.id)
        .bind(line.quantity.as_i32())
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Cart storage in `storefront.cart` / `storefront.cart_line`.
///
/// The `cart` row is created on the first add for a user and never deleted;
/// clearing removes its lines.
#[derive(Debug, Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn lines(&self, owner: &CartOwner) -> Result<Vec<CartLine>, RepositoryError> {
        let user_id = user_of(owner)?;
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT l.id, l.product_id, l.quantity, l.unit_price, l.added_at
            FROM storefront.cart_line l
            JOIN storefront.cart c ON c.id = l.cart_id
            WHERE c.user_id = $1
            ORDER BY l.id
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CartLine::try_from).collect()
    }

    async fn add_or_increment(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        quantity: Quantity,
        unit_price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<CartLine, RepositoryError> {
        let user_id = user_of(owner)?;
        // One statement, so concurrent adds for the same product serialise on
        // the (cart_id, product_id) unique index.
        let row = sqlx::query_as::<_, CartLineRow>(
            r"
            WITH c AS (
                INSERT INTO storefront.cart (user_id)
                VALUES ($1)
                ON CONFLICT (user_id) DO UPDATE SET updated_at = NOW()
                RETURNING id
            )
            INSERT INTO storefront.cart_line AS l (cart_id, product_id, quantity, unit_price, added_at)
            SELECT c.id, $2, $3, $4, $5 FROM c
            ON CONFLICT (cart_id, product_id) DO UPDATE
            SET quantity = LEAST(l.quantity + excluded.quantity, $6)
            RETURNING id, product_id, quantity, unit_price, added_at
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity.as_i32())
        .bind(unit_price)
        .bind(now)
        .bind(i32::try_from(Quantity::MAX).unwrap_or(i32::MAX))
        .fetch_one(&self.pool)
        .await?;

        CartLine::try_from(row)
    }

    async fn set_quantity(
        &self,
        owner: &CartOwner,
        line_id: CartLineId,
        quantity: Quantity,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let user_id = user_of(owner)?;
        let row = sqlx::query_as::<_, CartLineRow>(
            r"
            UPDATE storefront.cart_line l
            SET quantity = $3
            FROM storefront.cart c
            WHERE l.id = $2 AND l.cart_id = c.id AND c.user_id = $1
            RETURNING l.id, l.product_id, l.quantity, l.unit_price, l.added_at
            ",
        )
        .bind(user_id)
        .bind(line_id)
        .bind(quantity.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        row.map(CartLine::try_from).transpose()
    }

    async fn remove_line(
        &self,
        owner: &CartOwner,
        line_id: CartLineId,
    ) -> Result<bool, RepositoryError> {
        let user_id = user_of(owner)?;
        let result = sqlx::query(
            r"
            DELETE FROM storefront.cart_line l
            USING storefront.cart c
            WHERE l.id = $2 AND l.cart_id = c.id AND c.user_id = $1
            ",
        )
        .bind(user_id)
        .bind(line_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self, owner: &CartOwner) -> Result<(), RepositoryError> {
        let user_id = user_of(owner)?;
        sqlx::query(
            r"
            DELETE FROM storefront.cart_line l
            USING storefront.cart c
            WHERE l.cart_id = c.id AND c.user_id = $1
            ",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn consume(&self, owner: &CartOwner, lines: &[CartLine]) -> Result<(), RepositoryError> {
        let user_id = user_of(owner)?;
        let mut tx = self.pool.begin().await?;
        consume_lines_in(&mut tx, user_id, lines).await?;
        tx.commit().await?;
        Ok(())
    }
}
