//! Daily document counters.
//!
//! One row per `(prefix, day)` in `document_sequences`. The counter is
//! bumped with an upsert inside the caller's transaction, so a rolled-back
//! posting does not burn a number.

use chrono::{NaiveDate, Utc};
use sqlx::SqliteConnection;
use tillstone_core::document::{device_code, document_number, receipt_number, DocumentKind};

use crate::error::DbResult;

async fn next_value(conn: &mut SqliteConnection, prefix: &str, day: NaiveDate) -> DbResult<u32> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO document_sequences (prefix, day, last_value)
        VALUES (?1, ?2, 1)
        ON CONFLICT (prefix, day) DO UPDATE SET last_value = last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(prefix)
    .bind(day)
    .fetch_one(&mut *conn)
    .await?;

    Ok(value as u32)
}

/// Next `PREFIX-YYYYMMDD-NNNN` number for `kind`, dated today (UTC).
pub(crate) async fn next_document_number(
    conn: &mut SqliteConnection,
    kind: DocumentKind,
) -> DbResult<String> {
    let today = Utc::now().date_naive();
    let seq = next_value(conn, kind.prefix(), today).await?;
    Ok(document_number(kind, today, seq))
}

/// Next receipt number for `device_id`, dated today (UTC).
///
/// The counter is keyed on the printed device code, so two devices whose
/// ids end alike draw from one sequence instead of colliding.
pub(crate) async fn next_receipt_number(
    conn: &mut SqliteConnection,
    device_id: &str,
) -> DbResult<String> {
    let today = Utc::now().date_naive();
    let prefix = format!("RCP:{}", device_code(device_id));
    let seq = next_value(conn, &prefix, today).await?;
    Ok(receipt_number(device_id, today, seq))
}
