//! # Stock Transfers
//!
//! Moves stock between locations.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  post(transfer)                                                         │
//! │                                                                         │
//! │   from location                          to location                    │
//! │   ┌───────────────┐   TransferOut        ┌───────────────┐              │
//! │   │ batch LOT-7   │ ────────────────────►│ batch LOT-7   │ TransferIn   │
//! │   │ exp 2027-01   │                      │ exp 2027-01   │ (created if  │
//! │   │ cost 1.20     │                      │ cost 1.20     │  missing)    │
//! │   └───────────────┘                      └───────────────┘              │
//! │                                                                         │
//! │   Lines without a batch leave FEFO; each allocated batch arrives as    │
//! │   its namesake, the unbatched remainder arrives level-only.            │
//! │                                                                         │
//! │  cancel(posted) reverses both sides, newest first.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use super::inventory::{self, reference, BatchAllocation, StockChange};
use super::{new_id, product, sequence, workflow};
use crate::error::{DbError, DbResult};
use tillstone_core::document::DocumentKind;
use tillstone_core::validation::validate_document_quantity;
use tillstone_core::{
    CoreError, DocumentStatus, DocumentTrail, MovementReason, StockTransfer, StockTransferItem,
    ValidationError,
};

const TABLE: &str = "stock_transfers";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransferLine {
    pub product_id: String,
    pub batch_id: Option<String>,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct TransferRepository {
    pool: SqlitePool,
}

impl TransferRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TransferRepository { pool }
    }

    /// Creates a pending transfer.
    pub async fn create(
        &self,
        from_location_id: &str,
        to_location_id: &str,
        lines: &[NewTransferLine],
        notes: Option<&str>,
        user_id: &str,
    ) -> DbResult<StockTransfer> {
        if from_location_id == to_location_id {
            warn!(location_id = %from_location_id, "Transfer to the same location rejected");
            return Err(CoreError::SameLocationTransfer.into());
        }

        let mut tx = self.pool.begin().await?;
        workflow::ensure_active(&mut tx, "locations", "Location", from_location_id).await?;
        workflow::ensure_active(&mut tx, "locations", "Location", to_location_id).await?;

        for line in lines {
            product::fetch_active(&mut tx, &line.product_id).await?.ensure_tracked()?;
            validate_document_quantity("quantity", line.quantity)?;
            if let Some(batch_id) = &line.batch_id {
                let batch = inventory::fetch_batch(&mut tx, batch_id).await?;
                if batch.product_id != line.product_id || batch.location_id != from_location_id {
                    return Err(ValidationError::invalid(
                        "batch",
                        format!("{} is not held at the source location", batch.batch_number),
                    )
                    .into());
                }
            }
        }

        let transfer = StockTransfer {
            id: new_id(),
            transfer_number: sequence::next_document_number(&mut tx, DocumentKind::Transfer).await?,
            from_location_id: from_location_id.to_string(),
            to_location_id: to_location_id.to_string(),
            status: DocumentStatus::Pending,
            notes: notes.map(str::to_string),
            trail: DocumentTrail::new(user_id),
        };

        debug!(number = %transfer.transfer_number, lines = lines.len(), "Creating transfer");

        sqlx::query(
            r#"
            INSERT INTO stock_transfers (
                id, transfer_number, from_location_id, to_location_id, status, notes,
                created_by, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            "#,
        )
        .bind(&transfer.id)
        .bind(&transfer.transfer_number)
        .bind(&transfer.from_location_id)
        .bind(&transfer.to_location_id)
        .bind(transfer.status)
        .bind(&transfer.notes)
        .bind(&transfer.trail.created_by)
        .bind(transfer.trail.created_at)
        .execute(&mut *tx)
        .await?;

        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO stock_transfer_items (id, transfer_id, product_id, batch_id, quantity)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(new_id())
            .bind(&transfer.id)
            .bind(&line.product_id)
            .bind(&line.batch_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(transfer)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<StockTransfer>> {
        let transfer = sqlx::query_as::<_, StockTransfer>("SELECT * FROM stock_transfers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(transfer)
    }

    pub async fn get_items(&self, transfer_id: &str) -> DbResult<Vec<StockTransferItem>> {
        let mut conn = self.pool.acquire().await?;
        items(&mut conn, transfer_id).await
    }

    pub async fn list(&self, status: Option<DocumentStatus>) -> DbResult<Vec<StockTransfer>> {
        let transfers = sqlx::query_as::<_, StockTransfer>(
            r#"
            SELECT * FROM stock_transfers
            WHERE ?1 IS NULL OR status = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(transfers)
    }

    pub async fn post(&self, id: &str, user_id: &str) -> DbResult<StockTransfer> {
        let mut tx = self.pool.begin().await?;
        let transfer = fetch(&mut tx, id).await?;
        let lines = items(&mut tx, id).await?;
        workflow::ensure_postable(&transfer.transfer_number, transfer.status, lines.len())?;

        for line in &lines {
            let out = StockChange {
                product_id: &line.product_id,
                location_id: &transfer.from_location_id,
                batch_id: line.batch_id.as_deref(),
                delta: -line.quantity,
                reason: MovementReason::TransferOut,
                reference_type: reference::TRANSFER,
                reference_id: &transfer.id,
                user_id,
            };

            let allocations = match &line.batch_id {
                Some(batch_id) => {
                    inventory::apply_delta(&mut tx, out).await?;
                    vec![BatchAllocation {
                        batch_id: Some(batch_id.clone()),
                        quantity: line.quantity,
                    }]
                }
                None => inventory::consume(&mut tx, out, line.quantity).await?,
            };

            for allocation in &allocations {
                receive(&mut tx, &transfer, &line.product_id, allocation, user_id).await?;
            }
        }

        workflow::set_status(&mut tx, TABLE, id, DocumentStatus::Posted, user_id).await?;
        let transfer = fetch(&mut tx, id).await?;
        tx.commit().await?;

        info!(
            number = %transfer.transfer_number,
            from = %transfer.from_location_id,
            to = %transfer.to_location_id,
            lines = lines.len(),
            "Transfer posted"
        );
        Ok(transfer)
    }

    pub async fn cancel(&self, id: &str, user_id: &str) -> DbResult<StockTransfer> {
        let mut tx = self.pool.begin().await?;
        let transfer = fetch(&mut tx, id).await?;

        workflow::cancel(
            &mut tx,
            TABLE,
            reference::TRANSFER,
            &transfer.transfer_number,
            id,
            transfer.status,
            user_id,
        )
        .await?;

        let transfer = fetch(&mut tx, id).await?;
        tx.commit().await?;
        Ok(transfer)
    }
}

/// Books one allocation into the destination, mirroring the source batch.
async fn receive(
    conn: &mut SqliteConnection,
    transfer: &StockTransfer,
    product_id: &str,
    allocation: &BatchAllocation,
    user_id: &str,
) -> DbResult<()> {
    let destination = match &allocation.batch_id {
        Some(source_id) => {
            let source = inventory::fetch_batch(conn, source_id).await?;
            let batch = inventory::find_or_create_batch(
                conn,
                product_id,
                &transfer.to_location_id,
                &source.batch_number,
                source.expiry_date,
                source.cost_cents,
            )
            .await?;
            Some(batch.id)
        }
        None => None,
    };

    inventory::apply_delta(
        conn,
        StockChange {
            product_id,
            location_id: &transfer.to_location_id,
            batch_id: destination.as_deref(),
            delta: allocation.quantity,
            reason: MovementReason::TransferIn,
            reference_type: reference::TRANSFER,
            reference_id: &transfer.id,
            user_id,
        },
    )
    .await?;
    Ok(())
}

async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<StockTransfer> {
    sqlx::query_as::<_, StockTransfer>("SELECT * FROM stock_transfers WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Transfer", id))
}

async fn items(conn: &mut SqliteConnection, transfer_id: &str) -> DbResult<Vec<StockTransferItem>> {
    let items = sqlx::query_as::<_, StockTransferItem>(
        "SELECT * FROM stock_transfer_items WHERE transfer_id = ?1 ORDER BY rowid",
    )
    .bind(transfer_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{insert_product, location, stocked_product, test_db};
    use chrono::NaiveDate;

    fn line(product_id: &str, batch_id: Option<&str>, quantity: i64) -> NewTransferLine {
        NewTransferLine {
            product_id: product_id.to_string(),
            batch_id: batch_id.map(str::to_string),
            quantity,
        }
    }

    #[tokio::test]
    async fn test_lines_must_be_tracked_and_in_range() {
        let db = test_db().await;
        let main = location(&db, "MAIN").await;
        let branch = location(&db, "BRANCH").await;
        let soap = stocked_product(&db, "SOAP", 120, &main, 10).await;
        let mut service = insert_product(&db, "ASSEMBLY", 2_000).await;
        service.track_inventory = false;
        let service = db.products().update(&service, "admin").await.unwrap();

        let transfers = db.transfers();
        let err = transfers
            .create(&main.id, &branch.id, &[line(&soap.id, None, i64::MAX)], None, "clerk")
            .await
            .unwrap_err();
        assert!(err.is_rule(|e| matches!(e, CoreError::Validation(ValidationError::OutOfRange { .. }))));

        let err = transfers
            .create(&main.id, &branch.id, &[line(&service.id, None, 1)], None, "clerk")
            .await
            .unwrap_err();
        assert!(err.is_rule(|e| matches!(e, CoreError::Validation(ValidationError::InvalidFormat { .. }))));
        assert!(transfers.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_location_rejected() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let p = stocked_product(&db, "MUG", 800, &loc, 5).await;

        let err = db
            .transfers()
            .create(&loc.id, &loc.id, &[line(&p.id, None, 1)], None, "clerk")
            .await
            .unwrap_err();
        assert!(err.is_rule(|e| matches!(e, CoreError::SameLocationTransfer)));
    }

    #[tokio::test]
    async fn test_batch_arrives_with_number_expiry_and_cost() {
        let db = test_db().await;
        let main = location(&db, "MAIN").await;
        let branch = location(&db, "BRANCH").await;
        let p = insert_product(&db, "YOGURT", 150).await;

        let expiry = NaiveDate::from_ymd_opt(2027, 1, 15);
        db.inventory()
            .set_opening_stock(&p.id, &main.id, 8, Some("Y-42"), expiry, "admin")
            .await
            .unwrap();
        let source = db.inventory().batches(&p.id, &main.id, false).await.unwrap().remove(0);

        let repo = db.transfers();
        let transfer = repo
            .create(&main.id, &branch.id, &[line(&p.id, Some(&source.id), 5)], Some("restock branch"), "clerk")
            .await
            .unwrap();
        repo.post(&transfer.id, "clerk").await.unwrap();

        let inv = db.inventory();
        assert_eq!(inv.stock_level(&p.id, &main.id).await.unwrap(), 3);
        assert_eq!(inv.stock_level(&p.id, &branch.id).await.unwrap(), 5);

        let arrived = inv.batches(&p.id, &branch.id, false).await.unwrap().remove(0);
        assert_eq!(arrived.batch_number, "Y-42");
        assert_eq!(arrived.expiry_date, expiry);
        assert_eq!(arrived.cost_cents, source.cost_cents);
        assert_eq!(arrived.quantity, 5);
    }

    #[tokio::test]
    async fn test_unbatched_line_moves_level_only_stock() {
        let db = test_db().await;
        let main = location(&db, "MAIN").await;
        let branch = location(&db, "BRANCH").await;
        let p = stocked_product(&db, "PAPER", 600, &main, 10).await;

        let repo = db.transfers();
        let transfer = repo
            .create(&main.id, &branch.id, &[line(&p.id, None, 4)], None, "clerk")
            .await
            .unwrap();
        repo.post(&transfer.id, "clerk").await.unwrap();

        let inv = db.inventory();
        assert_eq!(inv.stock_level(&p.id, &main.id).await.unwrap(), 6);
        assert_eq!(inv.stock_level(&p.id, &branch.id).await.unwrap(), 4);
        assert!(inv.batches(&p.id, &branch.id, true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_posted_reverses_both_sides() {
        let db = test_db().await;
        let main = location(&db, "MAIN").await;
        let branch = location(&db, "BRANCH").await;
        let p = stocked_product(&db, "INK", 900, &main, 3).await;

        let repo = db.transfers();
        let transfer = repo
            .create(&main.id, &branch.id, &[line(&p.id, None, 3)], None, "clerk")
            .await
            .unwrap();
        repo.post(&transfer.id, "clerk").await.unwrap();
        let cancelled = repo.cancel(&transfer.id, "manager").await.unwrap();
        assert_eq!(cancelled.status, DocumentStatus::Cancelled);

        let inv = db.inventory();
        assert_eq!(inv.stock_level(&p.id, &main.id).await.unwrap(), 3);
        assert_eq!(inv.stock_level(&p.id, &branch.id).await.unwrap(), 0);
        assert!(inv.ledger_balances(&p.id, &main.id).await.unwrap());
        assert!(inv.ledger_balances(&p.id, &branch.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_insufficient_source_stock_leaves_pending() {
        let db = test_db().await;
        let main = location(&db, "MAIN").await;
        let branch = location(&db, "BRANCH").await;
        let p = stocked_product(&db, "GLUE", 200, &main, 1).await;

        let repo = db.transfers();
        let transfer = repo
            .create(&main.id, &branch.id, &[line(&p.id, None, 2)], None, "clerk")
            .await
            .unwrap();
        assert!(repo.post(&transfer.id, "clerk").await.is_err());
        assert_eq!(repo.get(&transfer.id).await.unwrap().unwrap().status, DocumentStatus::Pending);
        assert_eq!(db.inventory().stock_level(&p.id, &branch.id).await.unwrap(), 0);
    }
}
