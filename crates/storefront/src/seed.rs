//! Catalog seed files.
//!
//! A seed is a YAML document listing categories, products and promotions:
//!
//! ```yaml
//! categories:
//!   - id: 1
//!     name: Fruit
//! products:
//!   - id: 1
//!     name: Pineapple
//!     price: "10.00"
//!     stockQuantity: 40
//!     minStockThreshold: 5
//!     categoryId: 1
//!     active: true
//! promotions:
//!   - id: 1
//!     name: Summer sale
//!     discountType: PERCENTAGE
//!     discountPercentage: "20"
//!     status: ACTIVE
//!     applicableProducts: [1]
//! ```
//!
//! It is loaded into Postgres by `sf-cli seed` and into the in-memory catalog
//! when `STOREFRONT_SEED_FILE` is set in development mode.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;
use sqlx::PgPool;
use tracing::instrument;

use storefront_core::{CategoryId, Product, Promotion};

use crate::db::RepositoryError;

/// Errors loading a seed file.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{} validation errors: {}", .0.len(), .0.join("; "))]
    Invalid(Vec<String>),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A category entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedCategory {
    pub id: CategoryId,
    pub name: String,
}

/// Full seed file structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogSeed {
    pub categories: Vec<SeedCategory>,
    pub products: Vec<Product>,
    pub promotions: Vec<Promotion>,
}

/// Result of seeding the database.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedResult {
    pub categories: usize,
    pub products: usize,
    pub promotions: usize,
}

impl CatalogSeed {
    /// Parse and validate a seed document.
    ///
    /// # Errors
    ///
    /// Returns `SeedError::Parse` for malformed YAML and `SeedError::Invalid`
    /// listing every validation failure.
    pub fn from_yaml(content: &str) -> Result<Self, SeedError> {
        let seed: Self = serde_yaml::from_str(content)?;
        let errors = seed.validate();
        if errors.is_empty() {
            Ok(seed)
        } else {
            Err(SeedError::Invalid(errors))
        }
    }

    /// Read, parse and validate a seed file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid seed.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SeedError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_yaml(&content)
    }

    /// Check references and value ranges. Returns one message per problem.
    ///
    /// Malformed discount definitions are reported here even though pricing
    /// tolerates them, so they never reach the catalog from a seed.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let categories: BTreeSet<CategoryId> = self.categories.iter().map(|c| c.id).collect();
        let mut products = BTreeSet::new();

        for product in &self.products {
            if !products.insert(product.id) {
                errors.push(format!("Duplicate product id {}", product.id));
            }
            if product.name.trim().is_empty() {
                errors.push(format!("Product {} has an empty name", product.id));
            }
            if product.price.is_sign_negative() {
                errors.push(format!("Product {} has a negative price", product.id));
            }
            if product.stock_quantity < 0 {
                errors.push(format!("Product {} has negative stock", product.id));
            }
            if let Some(category) = product.category_id
                && !categories.contains(&category)
            {
                errors.push(format!(
                    "Product {} references unknown category {category}",
                    product.id
                ));
            }
        }

        let mut promotions = BTreeSet::new();
        for promotion in &self.promotions {
            if !promotions.insert(promotion.id) {
                errors.push(format!("Duplicate promotion id {}", promotion.id));
            }
            if let Err(e) = promotion.discount() {
                errors.push(e.to_string());
            }
            if let (Some(start), Some(end)) = (promotion.start_date, promotion.end_date)
                && end < start
            {
                errors.push(format!("Promotion {} ends before it starts", promotion.id));
            }
            for product in &promotion.applicable_products {
                if !products.contains(product) {
                    errors.push(format!(
                        "Promotion {} references unknown product {product}",
                        promotion.id
                    ));
                }
            }
            for category in &promotion.applicable_categories {
                if !categories.contains(category) {
                    errors.push(format!(
                        "Promotion {} references unknown category {category}",
                        promotion.id
                    ));
                }
            }
        }

        errors
    }
}

/// Upsert a seed into Postgres in one transaction.
///
/// Existing rows with the same ids are overwritten; a promotion's targets are
/// replaced by the seed's.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if any statement fails; nothing is
/// written in that case.
#[instrument(skip_all, fields(products = seed.products.len(), promotions = seed.promotions.len()))]
pub async fn seed_database(pool: &PgPool, seed: &CatalogSeed) -> Result<SeedResult, RepositoryError> {
    let mut tx = pool.begin().await?;

    for category in &seed.categories {
        sqlx::query(
            r"
            INSERT INTO storefront.category (id, name)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET name = excluded.name
            ",
        )
        .bind(category.id)
        .bind(&category.name)
        .execute(&mut *tx)
        .await?;
    }

    for product in &seed.products {
        sqlx::query(
            r"
            INSERT INTO storefront.product
                (id, name, price, stock_quantity, min_stock_threshold, category_id, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                price = excluded.price,
                stock_quantity = excluded.stock_quantity,
                min_stock_threshold = excluded.min_stock_threshold,
                category_id = excluded.category_id,
                active = excluded.active
            ",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(product.price)
        .bind(product.stock_quantity)
        .bind(product.min_stock_threshold)
        .bind(product.category_id)
        .bind(product.active)
        .execute(&mut *tx)
        .await?;
    }

    for promotion in &seed.promotions {
        sqlx::query(
            r"
            INSERT INTO storefront.promotion
                (id, name, discount_type, discount_percentage, discount_amount, status,
                 start_date, end_date, max_uses, current_uses)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                discount_type = excluded.discount_type,
                discount_percentage = excluded.discount_percentage,
                discount_amount = excluded.discount_amount,
                status = excluded.status,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                max_uses = excluded.max_uses,
                current_uses = excluded.current_uses
            ",
        )
        .bind(promotion.id)
        .bind(&promotion.name)
        .bind(promotion.discount_type.as_str())
        .bind(promotion.discount_percentage)
        .bind(promotion.discount_amount)
        .bind(promotion.status.as_str())
        .bind(promotion.start_date)
        .bind(promotion.end_date)
        .bind(promotion.max_uses)
        .bind(promotion.current_uses)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM storefront.promotion_product WHERE promotion_id = $1")
            .bind(promotion.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM storefront.promotion_category WHERE promotion_id = $1")
            .bind(promotion.id)
            .execute(&mut *tx)
            .await?;

        let products: Vec<i32> = promotion
            .applicable_products
            .iter()
            .map(|id| id.as_i32())
            .collect();
        sqlx::query(
            r"
            INSERT INTO storefront.promotion_product (promotion_id, product_id)
            SELECT $1, unnest($2::int4[])
            ",
        )
        .bind(promotion.id)
        .bind(&products)
        .execute(&mut *tx)
        .await?;

        let categories: Vec<i32> = promotion
            .applicable_categories
            .iter()
            .map(|id| id.as_i32())
            .collect();
        sqlx::query(
            r"
            INSERT INTO storefront.promotion_category (promotion_id, category_id)
            SELECT $1, unnest($2::int4[])
            ",
        )
        .bind(promotion.id)
        .bind(&categories)
        .execute(&mut *tx)
        .await?;
    }

    // Keep the serial sequences ahead of seeded ids.
    for table in ["category", "product", "promotion"] {
        sqlx::query(&format!(
            "SELECT setval(pg_get_serial_sequence('storefront.{table}', 'id'), \
             GREATEST((SELECT MAX(id) FROM storefront.{table}), 1))"
        ))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(SeedResult {
        categories: seed.categories.len(),
        products: seed.products.len(),
        promotions: seed.promotions.len(),
    })
}
