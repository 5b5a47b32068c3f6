//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Full-text search using FTS5
//! - Lookup by id, SKU or barcode
//! - CRUD with soft delete
//!
//! ## FTS5 Search
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    How FTS5 Search Works                                │
//! │                                                                         │
//! │  Cashier types: "coke 330"                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  fts_query → "coke"* "330"*       (each token quoted, prefix match)    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │ products_fts (sku, name, barcode)       │                           │
//! │  │                                         │                           │
//! │  │ COKE-330  | Coca-Cola 330ml | 54490... │ ← MATCH!                  │
//! │  │ COKE-500  | Coca-Cola 500ml | 54490... │                           │
//! │  │ PEPSI-330 | Pepsi 330ml     | 12345... │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  JOIN products ON rowid, drop soft-deleted, ORDER BY rank              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::{fts_query, soft_delete};
use crate::error::{on_duplicate, DbError, DbResult};
use tillstone_core::validation::{
    validate_price_cents, validate_product_name, validate_search_query, validate_sku,
    validate_tax_rate_bps,
};
use tillstone_core::{CoreError, Product, ValidationError};

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let results = repo.search("coke", 20).await?;
/// let product = repo.get_by_barcode("5449000000996").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Searches active products using full-text search.
    ///
    /// ## Arguments
    /// * `query` - Search term (can be partial, several words narrow the match)
    /// * `limit` - Maximum results to return
    ///
    /// An empty query lists active products by name.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = validate_search_query(query)?;

        debug!(query = %query, limit = %limit, "Searching products");

        if query.is_empty() {
            return self.list(false, limit).await;
        }

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT p.*
            FROM products p
            INNER JOIN products_fts fts ON p.rowid = fts.rowid
            WHERE products_fts MATCH ?1
            AND p.deleted_at IS NULL
            ORDER BY rank
            LIMIT ?2
            "#,
        )
        .bind(fts_query(&query))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Lists products by name.
    pub async fn list(&self, include_deleted: bool, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE (?1 OR deleted_at IS NULL)
            ORDER BY name
            LIMIT ?2
            "#,
        )
        .bind(include_deleted)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Gets a product by its ID, deleted or not.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Gets an active product by SKU (case-sensitive).
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE sku = ?1 AND deleted_at IS NULL",
        )
        .bind(sku.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    /// Gets an active product by barcode.
    ///
    /// ## Usage
    /// Called when a barcode is scanned. Must be fast (indexed lookup).
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE barcode = ?1 AND deleted_at IS NULL",
        )
        .bind(barcode.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    /// Inserts a new product.
    ///
    /// ## Errors
    /// * Validation - bad SKU, name, price or tax rate
    /// * UniqueViolation - SKU or barcode already used
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        validate(product)?;

        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, barcode, name, description,
                category_id, brand_id, unit_id,
                price_cents, cost_cents, tax_rate_bps,
                track_inventory, allow_negative_stock, reorder_level,
                created_by, created_at, updated_by, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            "#,
        )
        .bind(&product.id)
        .bind(product.sku.trim())
        .bind(&product.barcode)
        .bind(product.name.trim())
        .bind(&product.description)
        .bind(&product.category_id)
        .bind(&product.brand_id)
        .bind(&product.unit_id)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.tax_rate_bps)
        .bind(product.track_inventory)
        .bind(product.allow_negative_stock)
        .bind(product.reorder_level)
        .bind(&product.audit.created_by)
        .bind(product.audit.created_at)
        .bind(&product.audit.updated_by)
        .bind(product.audit.updated_at)
        .execute(&self.pool)
        .await
        .map_err(on_duplicate("sku or barcode", &product.sku))?;

        Ok(())
    }

    /// Updates an existing product's editable fields and stamps the audit
    /// columns with `user_id`.
    pub async fn update(&self, product: &Product, user_id: &str) -> DbResult<Product> {
        validate(product)?;

        debug!(id = %product.id, sku = %product.sku, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                sku = ?1, barcode = ?2, name = ?3, description = ?4,
                category_id = ?5, brand_id = ?6, unit_id = ?7,
                price_cents = ?8, cost_cents = ?9, tax_rate_bps = ?10,
                track_inventory = ?11, allow_negative_stock = ?12, reorder_level = ?13,
                updated_by = ?14, updated_at = ?15
            WHERE id = ?16
            "#,
        )
        .bind(product.sku.trim())
        .bind(&product.barcode)
        .bind(product.name.trim())
        .bind(&product.description)
        .bind(&product.category_id)
        .bind(&product.brand_id)
        .bind(&product.unit_id)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.tax_rate_bps)
        .bind(product.track_inventory)
        .bind(product.allow_negative_stock)
        .bind(product.reorder_level)
        .bind(user_id)
        .bind(Utc::now())
        .bind(&product.id)
        .execute(&self.pool)
        .await
        .map_err(on_duplicate("sku or barcode", &product.sku))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        self.get_by_id(&product.id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", &product.id))
    }

    pub async fn soft_delete(&self, id: &str, user_id: &str) -> DbResult<()> {
        soft_delete::soft_delete(&self.pool, "products", "Product", id, user_id).await
    }

    pub async fn restore(&self, id: &str, user_id: &str) -> DbResult<()> {
        soft_delete::restore(&self.pool, "products", "Product", id, user_id).await
    }

    /// Active, stock-tracked products at or below their reorder level at
    /// a location. Products never stocked there count as zero on hand.
    pub async fn low_stock(&self, location_id: &str) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT p.*
            FROM products p
            LEFT JOIN stock_levels s ON s.product_id = p.id AND s.location_id = ?1
            WHERE p.deleted_at IS NULL
            AND p.track_inventory = 1
            AND COALESCE(s.quantity, 0) <= p.reorder_level
            ORDER BY p.name
            "#,
        )
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    /// Counts active products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

fn validate(product: &Product) -> DbResult<()> {
    validate_sku(&product.sku)?;
    validate_product_name(&product.name)?;
    validate_price_cents(product.price_cents)?;
    validate_price_cents(product.cost_cents)?;
    validate_tax_rate_bps(product.tax_rate_bps)?;
    if product.reorder_level < 0 {
        return Err(ValidationError::MustBePositive {
            field: "reorder_level".to_string(),
        }
        .into());
    }
    if let Some(barcode) = &product.barcode {
        if barcode.trim().is_empty() {
            return Err(ValidationError::invalid("barcode", "must not be blank").into());
        }
    }
    Ok(())
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Loads a product on a transaction's connection. Deleted products are
/// still returned; callers decide whether that matters.
pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Product> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
}

/// Loads a product that must still be active.
pub(crate) async fn fetch_active(conn: &mut SqliteConnection, id: &str) -> DbResult<Product> {
    let product = fetch(conn, id).await?;
    if !product.is_active() {
        return Err(CoreError::Deleted {
            entity: "Product".to_string(),
            id: product.sku,
        }
        .into());
    }
    Ok(product)
}

/// Records the latest purchase cost (GRN posting).
pub(crate) async fn set_cost(
    conn: &mut SqliteConnection,
    id: &str,
    cost_cents: i64,
    user_id: &str,
) -> DbResult<()> {
    sqlx::query("UPDATE products SET cost_cents = ?1, updated_by = ?2, updated_at = ?3 WHERE id = ?4")
        .bind(cost_cents)
        .bind(user_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::testing::{product, test_db};
    use crate::DbError;

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = test_db().await;
        let mut coke = product("COKE-330", 150);
        coke.barcode = Some("5449000000996".to_string());
        coke.name = "Coca-Cola 330ml".to_string();
        db.products().insert(&coke).await.unwrap();

        let by_sku = db.products().get_by_sku("COKE-330").await.unwrap().unwrap();
        assert_eq!(by_sku.id, coke.id);
        assert_eq!(by_sku.tax_rate_bps, coke.tax_rate_bps);

        let by_barcode = db.products().get_by_barcode("5449000000996").await.unwrap();
        assert!(by_barcode.is_some());
        assert_eq!(db.products().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_matches_prefix_and_skips_deleted() {
        let db = test_db().await;
        let mut a = product("COKE-330", 150);
        a.name = "Coca-Cola 330ml".to_string();
        let mut b = product("COKE-500", 220);
        b.name = "Coca-Cola 500ml".to_string();
        let mut c = product("PEPSI-330", 140);
        c.name = "Pepsi 330ml".to_string();
        for p in [&a, &b, &c] {
            db.products().insert(p).await.unwrap();
        }

        assert_eq!(db.products().search("coca", 20).await.unwrap().len(), 2);
        assert_eq!(db.products().search("coca 500", 20).await.unwrap().len(), 1);
        assert_eq!(db.products().search("COKE-3", 20).await.unwrap().len(), 1);

        db.products().soft_delete(&b.id, "admin").await.unwrap();
        assert_eq!(db.products().search("coca", 20).await.unwrap().len(), 1);

        // Empty query lists everything active
        assert_eq!(db.products().search("", 20).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = test_db().await;
        db.products().insert(&product("RICE-5KG", 899)).await.unwrap();
        let err = db
            .products()
            .insert(&product("RICE-5KG", 899))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_update_stamps_audit_and_reindexes() {
        let db = test_db().await;
        let mut p = product("TEA-100", 450);
        db.products().insert(&p).await.unwrap();

        p.name = "Green Tea 100g".to_string();
        p.price_cents = 500;
        let updated = db.products().update(&p, "manager").await.unwrap();
        assert_eq!(updated.price_cents, 500);
        assert_eq!(updated.audit.updated_by.as_deref(), Some("manager"));

        assert_eq!(db.products().search("green", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_low_stock_uses_reorder_level() {
        let db = test_db().await;
        let loc = crate::testing::location(&db, "MAIN").await;
        let low = product("LOW-1", 100);
        let ok = product("OK-1", 100);
        db.products().insert(&low).await.unwrap();
        db.products().insert(&ok).await.unwrap();
        db.inventory()
            .set_opening_stock(&ok.id, &loc.id, 50, None, None, "admin")
            .await
            .unwrap();

        let rows = db.products().low_stock(&loc.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sku, "LOW-1");
    }

    #[tokio::test]
    async fn test_invalid_product_rejected() {
        let db = test_db().await;
        let mut p = product("BAD SKU", 100);
        assert!(db.products().insert(&p).await.is_err());

        p.sku = "OK-1".to_string();
        p.tax_rate_bps = 20_000;
        assert!(db.products().insert(&p).await.is_err());
    }
}
