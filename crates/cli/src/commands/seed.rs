//! Seed the catalog from a YAML file.
//!
//! The file lists `categories`, `products` and `promotions`; every entry is
//! upserted by id, so re-running a seed updates the catalog in place.
//!
//! ```yaml
//! categories:
//!   - { id: 1, name: Kitchen }
//! products:
//!   - { id: 1, name: Mug, price: "12.00", stockQuantity: 40, minStockThreshold: 5, categoryId: 1, active: true }
//! promotions:
//!   - id: 1
//!     name: Spring sale
//!     discountType: PERCENTAGE
//!     discountPercentage: "20"
//!     status: ACTIVE
//!     applicableCategories: [1]
//! ```

use std::path::Path;

use tracing::{error, info};

use storefront::seed::{CatalogSeed, SeedError, seed_database};

/// Seed the catalog from `file_path`.
///
/// With `check_only`, the file is parsed and validated without connecting
/// to the database.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is invalid, or if database
/// operations fail.
pub async fn catalog(file_path: &str, check_only: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    info!(path = %file_path, "Loading catalog from file");

    // Read and validate YAML before connecting to database
    let seed = match CatalogSeed::load(path).await {
        Ok(seed) => seed,
        Err(SeedError::Invalid(errors)) => {
            error!("Catalog validation failed:");
            for err in &errors {
                error!("  - {err}");
            }
            return Err(format!("{} validation errors found", errors.len()).into());
        }
        Err(e) => return Err(e.into()),
    };

    info!(
        categories = seed.categories.len(),
        products = seed.products.len(),
        promotions = seed.promotions.len(),
        "Catalog validated successfully"
    );
    if check_only {
        return Ok(());
    }

    let pool = super::connect().await?;
    let result = seed_database(&pool, &seed).await?;

    info!("Seeding complete!");
    info!("  Categories upserted: {}", result.categories);
    info!("  Products upserted: {}", result.products);
    info!("  Promotions upserted: {}", result.promotions);
    Ok(())
}
