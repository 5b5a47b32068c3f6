//! # Supplier & Customer Repositories
//!
//! Both are master data identified by a short business code. Customers
//! also carry a loyalty balance that sales add to and refunds take from.

use chrono::Utc;
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::{like_pattern, new_id, soft_delete};
use crate::error::{on_duplicate, DbError, DbResult};
use tillstone_core::validation::{validate_code, validate_email, validate_name, validate_phone};
use tillstone_core::{Audit, Customer, Supplier};

/// Input for creating or updating a supplier.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSupplier {
    pub code: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl NewSupplier {
    fn validate(&self) -> DbResult<()> {
        validate_code("code", &self.code)?;
        validate_name("name", &self.name, 150)?;
        validate_phone(self.phone.as_deref().unwrap_or(""))?;
        validate_email(self.email.as_deref().unwrap_or(""))?;
        Ok(())
    }
}

/// Input for creating or updating a customer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomer {
    pub code: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl NewCustomer {
    fn validate(&self) -> DbResult<()> {
        validate_code("code", &self.code)?;
        validate_name("name", &self.name, 150)?;
        validate_phone(self.phone.as_deref().unwrap_or(""))?;
        validate_email(self.email.as_deref().unwrap_or(""))?;
        Ok(())
    }
}

fn blank_to_none(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Suppliers
// =============================================================================

#[derive(Debug, Clone)]
pub struct SupplierRepository {
    pool: SqlitePool,
}

impl SupplierRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SupplierRepository { pool }
    }

    pub async fn create(&self, input: &NewSupplier, user_id: &str) -> DbResult<Supplier> {
        input.validate()?;
        let supplier = Supplier {
            id: new_id(),
            code: input.code.trim().to_uppercase(),
            name: input.name.trim().to_string(),
            contact_person: blank_to_none(&input.contact_person),
            phone: blank_to_none(&input.phone),
            email: blank_to_none(&input.email),
            address: blank_to_none(&input.address),
            audit: Audit::new(user_id),
        };

        debug!(id = %supplier.id, code = %supplier.code, "Creating supplier");

        sqlx::query(
            r#"
            INSERT INTO suppliers (
                id, code, name, contact_person, phone, email, address,
                created_by, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            "#,
        )
        .bind(&supplier.id)
        .bind(&supplier.code)
        .bind(&supplier.name)
        .bind(&supplier.contact_person)
        .bind(&supplier.phone)
        .bind(&supplier.email)
        .bind(&supplier.address)
        .bind(&supplier.audit.created_by)
        .bind(supplier.audit.created_at)
        .execute(&self.pool)
        .await
        .map_err(on_duplicate("supplier code", &supplier.code))?;

        Ok(supplier)
    }

    pub async fn update(&self, id: &str, input: &NewSupplier, user_id: &str) -> DbResult<Supplier> {
        input.validate()?;
        let code = input.code.trim().to_uppercase();
        let result = sqlx::query(
            r#"
            UPDATE suppliers SET
                code = ?1, name = ?2, contact_person = ?3, phone = ?4, email = ?5, address = ?6,
                updated_by = ?7, updated_at = ?8
            WHERE id = ?9
            "#,
        )
        .bind(&code)
        .bind(input.name.trim())
        .bind(blank_to_none(&input.contact_person))
        .bind(blank_to_none(&input.phone))
        .bind(blank_to_none(&input.email))
        .bind(blank_to_none(&input.address))
        .bind(user_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(on_duplicate("supplier code", &code))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Supplier", id));
        }
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Supplier", id))
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(supplier)
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE code = ?1")
            .bind(code.trim().to_uppercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(supplier)
    }

    /// Active suppliers whose code, name or contact contains `query`.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Supplier>> {
        let suppliers = sqlx::query_as::<_, Supplier>(
            r#"
            SELECT * FROM suppliers
            WHERE deleted_at IS NULL
            AND (code LIKE ?1 ESCAPE '\' OR name LIKE ?1 ESCAPE '\' OR contact_person LIKE ?1 ESCAPE '\')
            ORDER BY name
            LIMIT ?2
            "#,
        )
        .bind(like_pattern(query))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(suppliers)
    }

    pub async fn list(&self, include_deleted: bool) -> DbResult<Vec<Supplier>> {
        let suppliers = sqlx::query_as::<_, Supplier>(
            "SELECT * FROM suppliers WHERE (?1 OR deleted_at IS NULL) ORDER BY name",
        )
        .bind(include_deleted)
        .fetch_all(&self.pool)
        .await?;
        Ok(suppliers)
    }

    pub async fn soft_delete(&self, id: &str, user_id: &str) -> DbResult<()> {
        soft_delete::soft_delete(&self.pool, "suppliers", "Supplier", id, user_id).await
    }

    pub async fn restore(&self, id: &str, user_id: &str) -> DbResult<()> {
        soft_delete::restore(&self.pool, "suppliers", "Supplier", id, user_id).await
    }
}

// =============================================================================
// Customers
// =============================================================================

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn create(&self, input: &NewCustomer, user_id: &str) -> DbResult<Customer> {
        input.validate()?;
        let customer = Customer {
            id: new_id(),
            code: input.code.trim().to_uppercase(),
            name: input.name.trim().to_string(),
            phone: blank_to_none(&input.phone),
            email: blank_to_none(&input.email),
            address: blank_to_none(&input.address),
            loyalty_points: 0,
            audit: Audit::new(user_id),
        };

        debug!(id = %customer.id, code = %customer.code, "Creating customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, code, name, phone, email, address, loyalty_points,
                created_by, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?8)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.code)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.address)
        .bind(&customer.audit.created_by)
        .bind(customer.audit.created_at)
        .execute(&self.pool)
        .await
        .map_err(on_duplicate("customer code", &customer.code))?;

        Ok(customer)
    }

    /// Updates contact details. The loyalty balance is not editable here.
    pub async fn update(&self, id: &str, input: &NewCustomer, user_id: &str) -> DbResult<Customer> {
        input.validate()?;
        let code = input.code.trim().to_uppercase();
        let result = sqlx::query(
            r#"
            UPDATE customers SET
                code = ?1, name = ?2, phone = ?3, email = ?4, address = ?5,
                updated_by = ?6, updated_at = ?7
            WHERE id = ?8
            "#,
        )
        .bind(&code)
        .bind(input.name.trim())
        .bind(blank_to_none(&input.phone))
        .bind(blank_to_none(&input.email))
        .bind(blank_to_none(&input.address))
        .bind(user_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(on_duplicate("customer code", &code))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE code = ?1")
            .bind(code.trim().to_uppercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    /// Active customers whose code, name or phone contains `query`.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT * FROM customers
            WHERE deleted_at IS NULL
            AND (code LIKE ?1 ESCAPE '\' OR name LIKE ?1 ESCAPE '\' OR phone LIKE ?1 ESCAPE '\')
            ORDER BY name
            LIMIT ?2
            "#,
        )
        .bind(like_pattern(query))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(customers)
    }

    pub async fn list(&self, include_deleted: bool) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            "SELECT * FROM customers WHERE (?1 OR deleted_at IS NULL) ORDER BY name",
        )
        .bind(include_deleted)
        .fetch_all(&self.pool)
        .await?;
        Ok(customers)
    }

    /// Adds (or removes, with negative `points`) loyalty points outside a
    /// sale, e.g. a manual correction.
    pub async fn add_loyalty_points(&self, id: &str, points: i64) -> DbResult<Customer> {
        let mut conn = self.pool.acquire().await?;
        add_loyalty_points(&mut conn, id, points).await?;
        drop(conn);
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    pub async fn soft_delete(&self, id: &str, user_id: &str) -> DbResult<()> {
        soft_delete::soft_delete(&self.pool, "customers", "Customer", id, user_id).await
    }

    pub async fn restore(&self, id: &str, user_id: &str) -> DbResult<()> {
        soft_delete::restore(&self.pool, "customers", "Customer", id, user_id).await
    }
}

/// Adds (or with a negative `points`, removes) loyalty points. The balance
/// never drops below zero.
pub(crate) async fn add_loyalty_points(
    conn: &mut SqliteConnection,
    customer_id: &str,
    points: i64,
) -> DbResult<()> {
    debug!(customer = %customer_id, points, "Adjusting loyalty points");
    sqlx::query(
        r#"
        UPDATE customers
        SET loyalty_points = MAX(loyalty_points + ?1, 0), updated_at = ?2
        WHERE id = ?3
        "#,
    )
    .bind(points)
    .bind(Utc::now())
    .bind(customer_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_db;

    fn jane() -> NewCustomer {
        NewCustomer {
            code: "c-001".to_string(),
            name: "Jane Perera".to_string(),
            phone: Some("+94 77 123 4567".to_string()),
            email: Some("".to_string()),
            address: None,
        }
    }

    #[tokio::test]
    async fn test_customer_create_normalizes_input() {
        let db = test_db().await;
        let customer = db.customers().create(&jane(), "admin").await.unwrap();
        assert_eq!(customer.code, "C-001");
        assert_eq!(customer.email, None);
        assert_eq!(customer.loyalty_points, 0);

        let found = db.customers().get_by_code("c-001").await.unwrap().unwrap();
        assert_eq!(found.id, customer.id);
    }

    #[tokio::test]
    async fn test_customer_search_by_phone_and_name() {
        let db = test_db().await;
        db.customers().create(&jane(), "admin").await.unwrap();

        assert_eq!(db.customers().search("perera", 10).await.unwrap().len(), 1);
        assert_eq!(db.customers().search("4567", 10).await.unwrap().len(), 1);
        assert!(db.customers().search("silva", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_loyalty_never_negative() {
        let db = test_db().await;
        let customer = db.customers().create(&jane(), "admin").await.unwrap();

        let customer = db.customers().add_loyalty_points(&customer.id, 12).await.unwrap();
        assert_eq!(customer.loyalty_points, 12);
        let customer = db.customers().add_loyalty_points(&customer.id, -20).await.unwrap();
        assert_eq!(customer.loyalty_points, 0);
    }

    #[tokio::test]
    async fn test_supplier_duplicate_code_and_bad_email() {
        let db = test_db().await;
        let input = NewSupplier {
            code: "SUP-1".to_string(),
            name: "Lanka Foods".to_string(),
            ..Default::default()
        };
        db.suppliers().create(&input, "admin").await.unwrap();
        assert!(matches!(
            db.suppliers().create(&input, "admin").await.unwrap_err(),
            DbError::UniqueViolation { .. }
        ));

        let bad = NewSupplier {
            code: "SUP-2".to_string(),
            name: "Other".to_string(),
            email: Some("not-an-email".to_string()),
            ..Default::default()
        };
        assert!(db.suppliers().create(&bad, "admin").await.is_err());
    }
}
