//! # Catalog Repositories
//!
//! Categories, brands, units of measurement and stock locations.
//!
//! All four are plain master data with the same shape:
//! create, update, get, list (optionally including deleted), soft delete
//! and restore. Names are validated before any SQL runs.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use super::{new_id, soft_delete};
use crate::error::{on_duplicate, DbError, DbResult};
use tillstone_core::validation::{validate_code, validate_name};
use tillstone_core::{Audit, Brand, Category, Location, Unit, ValidationError};

const NAME_MAX: usize = 100;

// =============================================================================
// Categories
// =============================================================================

#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    /// Creates a category, optionally nested under `parent_id`.
    pub async fn create(
        &self,
        name: &str,
        parent_id: Option<&str>,
        user_id: &str,
    ) -> DbResult<Category> {
        validate_name("name", name, NAME_MAX)?;
        if let Some(parent) = parent_id {
            self.require_active(parent).await?;
        }

        let category = Category {
            id: new_id(),
            name: name.trim().to_string(),
            parent_id: parent_id.map(str::to_string),
            audit: Audit::new(user_id),
        };

        debug!(id = %category.id, name = %category.name, "Creating category");

        sqlx::query(
            r#"
            INSERT INTO categories (id, name, parent_id, created_by, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.parent_id)
        .bind(&category.audit.created_by)
        .bind(category.audit.created_at)
        .execute(&self.pool)
        .await?;

        Ok(category)
    }

    /// Renames or re-parents a category. A category cannot be its own parent.
    pub async fn update(
        &self,
        id: &str,
        name: &str,
        parent_id: Option<&str>,
        user_id: &str,
    ) -> DbResult<Category> {
        validate_name("name", name, NAME_MAX)?;
        if parent_id == Some(id) {
            return Err(ValidationError::invalid("parent_id", "a category cannot be its own parent").into());
        }
        if let Some(parent) = parent_id {
            self.require_active(parent).await?;
        }

        let result = sqlx::query(
            r#"
            UPDATE categories
            SET name = ?1, parent_id = ?2, updated_by = ?3, updated_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(name.trim())
        .bind(parent_id)
        .bind(user_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    pub async fn list(&self, include_deleted: bool) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE (?1 OR deleted_at IS NULL) ORDER BY name",
        )
        .bind(include_deleted)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    pub async fn soft_delete(&self, id: &str, user_id: &str) -> DbResult<()> {
        soft_delete::soft_delete(&self.pool, "categories", "Category", id, user_id).await
    }

    pub async fn restore(&self, id: &str, user_id: &str) -> DbResult<()> {
        soft_delete::restore(&self.pool, "categories", "Category", id, user_id).await
    }

    async fn require_active(&self, id: &str) -> DbResult<()> {
        match self.get_by_id(id).await? {
            Some(c) if c.audit.is_active() => Ok(()),
            _ => Err(DbError::not_found("Category", id)),
        }
    }
}

// =============================================================================
// Brands
// =============================================================================

#[derive(Debug, Clone)]
pub struct BrandRepository {
    pool: SqlitePool,
}

impl BrandRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BrandRepository { pool }
    }

    pub async fn create(&self, name: &str, user_id: &str) -> DbResult<Brand> {
        validate_name("name", name, NAME_MAX)?;
        let brand = Brand {
            id: new_id(),
            name: name.trim().to_string(),
            audit: Audit::new(user_id),
        };

        debug!(id = %brand.id, name = %brand.name, "Creating brand");

        sqlx::query(
            "INSERT INTO brands (id, name, created_by, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
        )
        .bind(&brand.id)
        .bind(&brand.name)
        .bind(&brand.audit.created_by)
        .bind(brand.audit.created_at)
        .execute(&self.pool)
        .await
        .map_err(on_duplicate("brand name", &brand.name))?;

        Ok(brand)
    }

    pub async fn update(&self, id: &str, name: &str, user_id: &str) -> DbResult<Brand> {
        validate_name("name", name, NAME_MAX)?;
        let result = sqlx::query(
            "UPDATE brands SET name = ?1, updated_by = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(name.trim())
        .bind(user_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(on_duplicate("brand name", name.trim()))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Brand", id));
        }
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Brand", id))
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Brand>> {
        let brand = sqlx::query_as::<_, Brand>("SELECT * FROM brands WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(brand)
    }

    pub async fn list(&self, include_deleted: bool) -> DbResult<Vec<Brand>> {
        let brands = sqlx::query_as::<_, Brand>(
            "SELECT * FROM brands WHERE (?1 OR deleted_at IS NULL) ORDER BY name",
        )
        .bind(include_deleted)
        .fetch_all(&self.pool)
        .await?;
        Ok(brands)
    }

    pub async fn soft_delete(&self, id: &str, user_id: &str) -> DbResult<()> {
        soft_delete::soft_delete(&self.pool, "brands", "Brand", id, user_id).await
    }

    pub async fn restore(&self, id: &str, user_id: &str) -> DbResult<()> {
        soft_delete::restore(&self.pool, "brands", "Brand", id, user_id).await
    }
}

// =============================================================================
// Units
// =============================================================================

#[derive(Debug, Clone)]
pub struct UnitRepository {
    pool: SqlitePool,
}

impl UnitRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UnitRepository { pool }
    }

    /// Creates a unit such as ("Kilogram", "kg").
    pub async fn create(&self, name: &str, symbol: &str, user_id: &str) -> DbResult<Unit> {
        validate_name("name", name, NAME_MAX)?;
        validate_name("symbol", symbol, 10)?;
        let unit = Unit {
            id: new_id(),
            name: name.trim().to_string(),
            symbol: symbol.trim().to_string(),
            audit: Audit::new(user_id),
        };

        debug!(id = %unit.id, name = %unit.name, "Creating unit");

        sqlx::query(
            r#"
            INSERT INTO units (id, name, symbol, created_by, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(&unit.id)
        .bind(&unit.name)
        .bind(&unit.symbol)
        .bind(&unit.audit.created_by)
        .bind(unit.audit.created_at)
        .execute(&self.pool)
        .await
        .map_err(on_duplicate("unit name", &unit.name))?;

        Ok(unit)
    }

    pub async fn update(&self, id: &str, name: &str, symbol: &str, user_id: &str) -> DbResult<Unit> {
        validate_name("name", name, NAME_MAX)?;
        validate_name("symbol", symbol, 10)?;
        let result = sqlx::query(
            "UPDATE units SET name = ?1, symbol = ?2, updated_by = ?3, updated_at = ?4 WHERE id = ?5",
        )
        .bind(name.trim())
        .bind(symbol.trim())
        .bind(user_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(on_duplicate("unit name", name.trim()))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Unit", id));
        }
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Unit", id))
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Unit>> {
        let unit = sqlx::query_as::<_, Unit>("SELECT * FROM units WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(unit)
    }

    pub async fn list(&self, include_deleted: bool) -> DbResult<Vec<Unit>> {
        let units = sqlx::query_as::<_, Unit>(
            "SELECT * FROM units WHERE (?1 OR deleted_at IS NULL) ORDER BY name",
        )
        .bind(include_deleted)
        .fetch_all(&self.pool)
        .await?;
        Ok(units)
    }

    pub async fn soft_delete(&self, id: &str, user_id: &str) -> DbResult<()> {
        soft_delete::soft_delete(&self.pool, "units", "Unit", id, user_id).await
    }

    pub async fn restore(&self, id: &str, user_id: &str) -> DbResult<()> {
        soft_delete::restore(&self.pool, "units", "Unit", id, user_id).await
    }
}

// =============================================================================
// Locations
// =============================================================================

#[derive(Debug, Clone)]
pub struct LocationRepository {
    pool: SqlitePool,
}

impl LocationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LocationRepository { pool }
    }

    /// Creates a stock location. Codes are stored upper-case.
    pub async fn create(&self, code: &str, name: &str, user_id: &str) -> DbResult<Location> {
        validate_code("code", code)?;
        validate_name("name", name, NAME_MAX)?;
        let location = Location {
            id: new_id(),
            code: code.trim().to_uppercase(),
            name: name.trim().to_string(),
            audit: Audit::new(user_id),
        };

        debug!(id = %location.id, code = %location.code, "Creating location");

        sqlx::query(
            r#"
            INSERT INTO locations (id, code, name, created_by, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(&location.id)
        .bind(&location.code)
        .bind(&location.name)
        .bind(&location.audit.created_by)
        .bind(location.audit.created_at)
        .execute(&self.pool)
        .await
        .map_err(on_duplicate("location code", &location.code))?;

        Ok(location)
    }

    /// Renames a location. The code is immutable.
    pub async fn update(&self, id: &str, name: &str, user_id: &str) -> DbResult<Location> {
        validate_name("name", name, NAME_MAX)?;
        let result = sqlx::query(
            "UPDATE locations SET name = ?1, updated_by = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(name.trim())
        .bind(user_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Location", id));
        }
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Location", id))
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Location>> {
        let location = sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(location)
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Location>> {
        let location = sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE code = ?1")
            .bind(code.trim().to_uppercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(location)
    }

    pub async fn list(&self, include_deleted: bool) -> DbResult<Vec<Location>> {
        let locations = sqlx::query_as::<_, Location>(
            "SELECT * FROM locations WHERE (?1 OR deleted_at IS NULL) ORDER BY code",
        )
        .bind(include_deleted)
        .fetch_all(&self.pool)
        .await?;
        Ok(locations)
    }

    pub async fn soft_delete(&self, id: &str, user_id: &str) -> DbResult<()> {
        soft_delete::soft_delete(&self.pool, "locations", "Location", id, user_id).await
    }

    pub async fn restore(&self, id: &str, user_id: &str) -> DbResult<()> {
        soft_delete::restore(&self.pool, "locations", "Location", id, user_id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::testing::test_db;

    #[tokio::test]
    async fn test_category_nesting_and_self_parent() {
        let db = test_db().await;
        let food = db.categories().create("Food", None, "admin").await.unwrap();
        let snacks = db
            .categories()
            .create("Snacks", Some(&food.id), "admin")
            .await
            .unwrap();
        assert_eq!(snacks.parent_id.as_deref(), Some(food.id.as_str()));

        let err = db
            .categories()
            .update(&food.id, "Food", Some(&food.id), "admin")
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_soft_delete_hides_from_list_until_restored() {
        let db = test_db().await;
        let brand = db.brands().create("Acme", "admin").await.unwrap();

        db.brands().soft_delete(&brand.id, "manager").await.unwrap();
        assert!(db.brands().list(false).await.unwrap().is_empty());

        let all = db.brands().list(true).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].audit.deleted_by.as_deref(), Some("manager"));

        // Deleting twice is NotFound
        assert!(db.brands().soft_delete(&brand.id, "manager").await.is_err());

        db.brands().restore(&brand.id, "admin").await.unwrap();
        assert_eq!(db.brands().list(false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_location_code_rejected() {
        let db = test_db().await;
        db.locations().create("main", "Shop floor", "admin").await.unwrap();
        let err = db
            .locations()
            .create("MAIN", "Another", "admin")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::DbError::UniqueViolation { .. }));

        let found = db.locations().get_by_code("Main").await.unwrap().unwrap();
        assert_eq!(found.name, "Shop floor");
    }

    #[tokio::test]
    async fn test_unit_update() {
        let db = test_db().await;
        let unit = db.units().create("Kilo", "kg", "admin").await.unwrap();
        let unit = db
            .units()
            .update(&unit.id, "Kilogram", "kg", "manager")
            .await
            .unwrap();
        assert_eq!(unit.name, "Kilogram");
        assert_eq!(unit.audit.updated_by.as_deref(), Some("manager"));
    }
}
