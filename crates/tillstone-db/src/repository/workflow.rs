//! Status writes and checks shared by the stock documents.
//!
//! ```text
//! ┌──────────────┬──────────────────────────────────────────────────────┐
//! │ new status   │ columns stamped                                      │
//! ├──────────────┼──────────────────────────────────────────────────────┤
//! │ Posted       │ status, posted_by, posted_at, updated_at             │
//! │ Cancelled    │ status, cancelled_by, cancelled_at, updated_at       │
//! └──────────────┴──────────────────────────────────────────────────────┘
//! ```
//! Table names are compile-time constants of the calling repository, never
//! user input.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{info, warn};

use super::inventory;
use crate::error::{DbError, DbResult};
use tillstone_core::document::{transition, DocumentAction, DocumentStatus, StockEffect};
use tillstone_core::{CoreError, MovementReason, ValidationError};

/// Writes a posted or cancelled status with its trail columns.
pub(crate) async fn set_status(
    conn: &mut SqliteConnection,
    table: &'static str,
    id: &str,
    status: DocumentStatus,
    user_id: &str,
) -> DbResult<()> {
    let (by, at) = match status {
        DocumentStatus::Posted => ("posted_by", "posted_at"),
        DocumentStatus::Cancelled => ("cancelled_by", "cancelled_at"),
        DocumentStatus::Pending => {
            return Err(ValidationError::invalid("status", "documents never return to pending").into())
        }
    };
    let sql = format!("UPDATE {table} SET status = ?1, {by} = ?2, {at} = ?3, updated_at = ?3 WHERE id = ?4");

    sqlx::query(&sql)
        .bind(status)
        .bind(user_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Bumps `updated_at` after a line edit.
pub(crate) async fn touch(conn: &mut SqliteConnection, table: &'static str, id: &str) -> DbResult<()> {
    let sql = format!("UPDATE {table} SET updated_at = ?1 WHERE id = ?2");
    sqlx::query(&sql)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Fails unless `id` names an active row of a master-data table.
pub(crate) async fn ensure_active(
    conn: &mut SqliteConnection,
    table: &'static str,
    entity: &'static str,
    id: &str,
) -> DbResult<()> {
    let sql = format!("SELECT deleted_at IS NULL FROM {table} WHERE id = ?1");
    let active: Option<bool> = sqlx::query_scalar(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match active {
        Some(true) => Ok(()),
        Some(false) => Err(CoreError::Deleted {
            entity: entity.to_string(),
            id: id.to_string(),
        }
        .into()),
        None => Err(DbError::not_found(entity, id)),
    }
}

/// Checks that a document can be posted: the transition is allowed and it
/// has at least one line.
pub(crate) fn ensure_postable(
    number: &str,
    status: DocumentStatus,
    line_count: usize,
) -> DbResult<()> {
    transition(number, status, DocumentAction::Post).inspect_err(|err| {
        warn!(document = %number, error = %err, "Post rejected");
    })?;

    if line_count == 0 {
        warn!(document = %number, "Post rejected: no lines");
        return Err(CoreError::EmptyDocument {
            document: number.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Cancels a document: Pending only changes status, Posted also reverses
/// every movement recorded under `reference_type`.
pub(crate) async fn cancel(
    conn: &mut SqliteConnection,
    table: &'static str,
    reference_type: &'static str,
    number: &str,
    id: &str,
    status: DocumentStatus,
    user_id: &str,
) -> DbResult<()> {
    let next = transition(number, status, DocumentAction::Cancel).inspect_err(|err| {
        warn!(document = %number, error = %err, "Cancel rejected");
    })?;

    if next.effect == StockEffect::Reverse {
        inventory::reverse_movements(conn, reference_type, id, MovementReason::Reversal, user_id)
            .await?;
    }
    set_status(conn, table, id, next.to, user_id).await?;

    info!(document = %number, from = %status, reversed = next.effect == StockEffect::Reverse, "Document cancelled");
    Ok(())
}
