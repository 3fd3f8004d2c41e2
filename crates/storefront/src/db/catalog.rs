//! Postgres-backed product catalog.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use storefront_core::{
    CategoryId, Product, ProductId, Promotion, PromotionId, Quantity,
};

use super::{ProductCatalog, RepositoryError};

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    price: Decimal,
    stock_quantity: i32,
    min_stock_threshold: i32,
    category_id: Option<i32>,
    active: bool,
}

#[derive(sqlx::FromRow)]
struct PromotionRow {
    id: i32,
    name: String,
    discount_type: String,
    discount_percentage: Option<Decimal>,
    discount_amount: Option<Decimal>,
    status: String,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    max_uses: Option<i32>,
    current_uses: i32,
    product_ids: Vec<i32>,
    category_ids: Vec<i32>,
}

impl TryFrom<PromotionRow> for Promotion {
    type Error = RepositoryError;

    fn try_from(row: PromotionRow) -> Result<Self, Self::Error> {
        let discount_type = row.discount_type.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("promotion {}: {e}", row.id))
        })?;
        let status = row.status.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("promotion {}: {e}", row.id))
        })?;

        Ok(Self {
            id: PromotionId::new(row.id),
            name: row.name,
            discount_type,
            discount_percentage: row.discount_percentage,
            discount_amount: row.discount_amount,
            status,
            start_date: row.start_date,
            end_date: row.end_date,
            max_uses: row.max_uses,
            current_uses: row.current_uses,
            applicable_products: row.product_ids.into_iter().map(ProductId::new).collect(),
            applicable_categories: row.category_ids.into_iter().map(CategoryId::new).collect(),
        })
    }
}

/// Catalog reads and stock updates against `storefront.product`.
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Promotions that could apply to a product: those naming it, those naming
    /// its category, and catalog-wide ones.
    async fn candidate_promotions(
        &self,
        product_id: ProductId,
        category_id: Option<CategoryId>,
    ) -> Result<Vec<Promotion>, RepositoryError> {
        let rows = sqlx::query_as::<_, PromotionRow>(
            r"
            WITH targets AS (
                SELECT p.*,
                       COALESCE((SELECT array_agg(pp.product_id ORDER BY pp.product_id)
                                 FROM storefront.promotion_product pp
                                 WHERE pp.promotion_id = p.id), '{}'::int4[]) AS product_ids,
                       COALESCE((SELECT array_agg(pc.category_id ORDER BY pc.category_id)
                                 FROM storefront.promotion_category pc
                                 WHERE pc.promotion_id = p.id), '{}'::int4[]) AS category_ids
                FROM storefront.promotion p
            )
            SELECT id, name, discount_type, discount_percentage, discount_amount, status,
                   start_date, end_date, max_uses, current_uses, product_ids, category_ids
            FROM targets
            WHERE $1 = ANY(product_ids)
               OR $2 = ANY(category_ids)
               OR (cardinality(product_ids) = 0 AND cardinality(category_ids) = 0)
            ORDER BY id
            ",
        )
        .bind(product_id)
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Promotion::try_from).collect()
    }
}

/// Decrement stock if enough remains. Usable inside a transaction.
pub(super) async fn decrement_stock_in(
    conn: &mut PgConnection,
    id: ProductId,
    quantity: Quantity,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r"
        UPDATE storefront.product
        SET stock_quantity = stock_quantity - $2, updated_at = NOW()
        WHERE id = $1 AND stock_quantity >= $2
        ",
    )
    .bind(id)
    .bind(quantity.as_i32())
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Return stock. Usable inside a transaction.
pub(super) async fn restock_in(
    conn: &mut PgConnection,
    id: ProductId,
    quantity: Quantity,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        UPDATE storefront.product
        SET stock_quantity = stock_quantity + $2, updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(quantity.as_i32())
    .execute(conn)
    .await?;

    Ok(())
}

#[async_trait]
impl ProductCatalog for PgCatalog {
    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, price, stock_quantity, min_stock_threshold, category_id, active
            FROM storefront.product
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let category_id = row.category_id.map(CategoryId::new);
        let mut product = Product {
            id: ProductId::new(row.id),
            name: row.name,
            price: row.price,
            stock_quantity: row.stock_quantity,
            min_stock_threshold: row.min_stock_threshold,
            category_id,
            active: row.active,
            promotions: Vec::new(),
        };
        product.promotions = self
            .candidate_promotions(product.id, category_id)
            .await?
            .into_iter()
            .filter(|promotion| promotion.match_tier(&product).is_some())
            .collect();

        Ok(Some(product))
    }

    async fn decrement_stock(
        &self,
        id: ProductId,
        quantity: Quantity,
    ) -> Result<bool, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(decrement_stock_in(&mut conn, id, quantity).await?)
    }

    async fn restock(&self, id: ProductId, quantity: Quantity) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(restock_in(&mut conn, id, quantity).await?)
    }
}
