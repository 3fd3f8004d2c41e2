//! Postgres-backed order storage.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use storefront_core::{OrderId, ProductId, PromotionId, Quantity, UserId};

use super::carts::consume_lines_in;
use super::catalog::{decrement_stock_in, restock_in};
use super::{OrderStore, PlaceOrderError, RepositoryError};
use crate::models::{NewOrder, Order, OrderLine, PageRequest, StatusChange};

const ORDER_COLUMNS: &str = "id, order_number, user_id, subtotal, shipping_cost, tax_amount, \
     total_amount, currency, status, payment_status, payment_method, transaction_id, \
     shipping_address, billing_address, notes, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i32,
    order_number: String,
    user_id: i32,
    subtotal: Decimal,
    shipping_cost: Decimal,
    tax_amount: Decimal,
    total_amount: Decimal,
    currency: String,
    status: String,
    payment_status: String,
    payment_method: String,
    transaction_id: Option<String>,
    shipping_address: String,
    billing_address: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    order_id: i32,
    product_id: i32,
    product_name: String,
    quantity: i32,
    unit_price: Decimal,
    original_unit_price: Decimal,
    promotion_id: Option<i32>,
    line_total: Decimal,
}

fn corrupt(order_id: i32, e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::DataCorruption(format!("order {order_id}: {e}"))
}

impl TryFrom<OrderLineRow> for OrderLine {
    type Error = RepositoryError;

    fn try_from(row: OrderLineRow) -> Result<Self, Self::Error> {
        let quantity =
            Quantity::new(i64::from(row.quantity)).map_err(|e| corrupt(row.order_id, e))?;
        Ok(Self {
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            quantity,
            unit_price: row.unit_price,
            original_unit_price: row.original_unit_price,
            promotion_id: row.promotion_id.map(PromotionId::new),
            line_total: row.line_total,
        })
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderLine>) -> Result<Order, RepositoryError> {
        let id = self.id;
        Ok(Order {
            id: OrderId::new(id),
            order_number: self.order_number,
            user_id: UserId::new(self.user_id),
            items,
            subtotal: self.subtotal,
            shipping_cost: self.shipping_cost,
            tax_amount: self.tax_amount,
            total_amount: self.total_amount,
            currency: self.currency.parse().map_err(|e| corrupt(id, e))?,
            status: self.status.parse().map_err(|e| corrupt(id, e))?,
            payment_status: self.payment_status.parse().map_err(|e| corrupt(id, e))?,
            payment_method: self.payment_method.parse().map_err(|e| corrupt(id, e))?,
            transaction_id: self.transaction_id,
            shipping_address: self.shipping_address,
            billing_address: self.billing_address,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Order storage in `storefront.customer_order` / `storefront.order_line`.
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Lines of the given orders, grouped by order id, each in line order.
async fn load_lines(
    conn: &mut PgConnection,
    order_ids: &[i32],
) -> Result<HashMap<i32, Vec<OrderLine>>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderLineRow>(
        r"
        SELECT order_id, product_id, product_name, quantity, unit_price,
               original_unit_price, promotion_id, line_total
        FROM storefront.order_line
        WHERE order_id = ANY($1)
        ORDER BY order_id, position
        ",
    )
    .bind(order_ids)
    .fetch_all(conn)
    .await?;

    let mut lines: HashMap<i32, Vec<OrderLine>> = HashMap::new();
    for row in rows {
        let order_id = row.order_id;
        lines
            .entry(order_id)
            .or_default()
            .push(OrderLine::try_from(row)?);
    }
    Ok(lines)
}

async fn load_order(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM storefront.customer_order WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut lines = load_lines(conn, &[row.id]).await?;
    let items = lines.remove(&row.id).unwrap_or_default();
    row.into_order(items).map(Some)
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn place(&self, order: NewOrder) -> Result<Order, PlaceOrderError> {
        let mut tx = self.pool.begin().await?;

        // Conditional decrements: a concurrent checkout that took the stock
        // first makes this one match zero rows. Dropping `tx` rolls back.
        for line in &order.lines {
            if !decrement_stock_in(&mut tx, line.product_id, line.quantity).await? {
                return Err(PlaceOrderError::InsufficientStock(line.product_id));
            }
        }

        for promotion_id in order.applied_promotions() {
            let result = sqlx::query(
                r"
                UPDATE storefront.promotion
                SET current_uses = current_uses + 1, updated_at = NOW()
                WHERE id = $1
                  AND status = 'ACTIVE'
                  AND (max_uses IS NULL OR current_uses < max_uses)
                ",
            )
            .bind(promotion_id)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                return Err(PlaceOrderError::PromotionUnavailable(promotion_id));
            }
        }

        let (id,): (i32,) = sqlx::query_as(
            r"
            INSERT INTO storefront.customer_order
                (order_number, user_id, subtotal, shipping_cost, tax_amount, total_amount,
                 currency, status, payment_status, payment_method, shipping_address,
                 billing_address, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'PENDING', 'PENDING', $8, $9, $10, $11, $12, $12)
            RETURNING id
            ",
        )
        .bind(&order.order_number)
        .bind(order.user_id)
        .bind(order.subtotal)
        .bind(order.shipping_cost)
        .bind(order.tax_amount)
        .bind(order.total_amount)
        .bind(order.currency.code())
        .bind(order.payment_method.as_str())
        .bind(&order.shipping_address)
        .bind(&order.billing_address)
        .bind(&order.notes)
        .bind(order.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("order number already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        for (position, line) in (0_i32..).zip(&order.lines) {
            sqlx::query(
                r"
                INSERT INTO storefront.order_line
                    (order_id, position, product_id, product_name, quantity, unit_price,
                     original_unit_price, promotion_id, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ",
            )
            .bind(id)
            .bind(position)
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(line.quantity.as_i32())
            .bind(line.unit_price)
            .bind(line.original_unit_price)
            .bind(line.promotion_id)
            .bind(line.line_total)
            .execute(&mut *tx)
            .await?;
        }

        // Only what this order was built from; lines added meanwhile stay.
        consume_lines_in(&mut tx, order.user_id, &order.cart_lines).await?;

        tx.commit().await?;

        Ok(Order::from_new(OrderId::new(id), order))
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_order(&mut conn, id).await
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Vec<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.customer_order \
             WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(i64::from(page.limit()))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&mut *conn)
        .await?;

        let ids: Vec<i32> = rows.iter().map(|row| row.id).collect();
        let mut lines = load_lines(&mut conn, &ids).await?;
        rows.into_iter()
            .map(|row| {
                let items = lines.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect()
    }

    async fn apply(&self, id: OrderId, change: &StatusChange) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE storefront.customer_order
            SET status = $4,
                payment_status = $5,
                transaction_id = COALESCE($6, transaction_id),
                updated_at = NOW()
            WHERE id = $1 AND status = $2 AND payment_status = $3
            ",
        )
        .bind(id)
        .bind(change.expected_status.as_str())
        .bind(change.expected_payment.as_str())
        .bind(change.status.as_str())
        .bind(change.payment_status.as_str())
        .bind(&change.transaction_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<(i32,)> =
                sqlx::query_as("SELECT id FROM storefront.customer_order WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match exists {
                Some(_) => RepositoryError::Conflict(format!("order {id} changed concurrently")),
                None => RepositoryError::NotFound,
            });
        }

        let order = load_order(&mut tx, id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        if change.restock {
            for line in &order.items {
                restock_in(&mut tx, line.product_id, line.quantity).await?;
            }
        }

        tx.commit().await?;
        Ok(order)
    }
}
