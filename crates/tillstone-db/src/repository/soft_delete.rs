//! Soft delete and restore shared by every master-data table.
//!
//! ```text
//! soft_delete:  deleted_at NULL      → deleted_at = now, deleted_by = user
//! restore:      deleted_at NOT NULL  → deleted_at = NULL, deleted_by = NULL
//! ```
//! Both also stamp `updated_by` / `updated_at`.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};

/// Marks the row deleted. Fails with `NotFound` when the row does not
/// exist or is already deleted.
pub(crate) async fn soft_delete(
    pool: &SqlitePool,
    table: &'static str,
    entity: &'static str,
    id: &str,
    user_id: &str,
) -> DbResult<()> {
    debug!(table, id = %id, user = %user_id, "Soft-deleting");

    let sql = format!(
        "UPDATE {table} SET deleted_by = ?1, deleted_at = ?2, updated_by = ?1, updated_at = ?2 \
         WHERE id = ?3 AND deleted_at IS NULL"
    );
    let result = sqlx::query(&sql)
        .bind(user_id)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found(entity, id));
    }
    Ok(())
}

/// Clears the deleted marker. Fails with `NotFound` when the row does not
/// exist or is not deleted.
pub(crate) async fn restore(
    pool: &SqlitePool,
    table: &'static str,
    entity: &'static str,
    id: &str,
    user_id: &str,
) -> DbResult<()> {
    debug!(table, id = %id, user = %user_id, "Restoring");

    let sql = format!(
        "UPDATE {table} SET deleted_by = NULL, deleted_at = NULL, updated_by = ?1, updated_at = ?2 \
         WHERE id = ?3 AND deleted_at IS NOT NULL"
    );
    let result = sqlx::query(&sql)
        .bind(user_id)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found(entity, id));
    }
    Ok(())
}
