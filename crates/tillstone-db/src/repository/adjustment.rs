//! # Stock Adjustments
//!
//! Immediate corrections for damage, expiry, theft and count differences.
//! An adjustment has no pending state: `create` applies every line in one
//! transaction or none of them.
//!
//! Negative lines without a batch are taken FEFO so batch quantities keep
//! adding up to the level.

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::inventory::{self, reference, StockChange};
use super::{new_id, product, sequence, workflow};
use crate::error::DbResult;
use tillstone_core::document::DocumentKind;
use tillstone_core::validation::validate_stock_delta;
use tillstone_core::{AdjustmentReason, MovementReason, StockAdjustment, StockAdjustmentItem, ValidationError};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAdjustmentLine {
    pub product_id: String,
    pub batch_id: Option<String>,
    /// Signed change.
    pub delta: i64,
}

#[derive(Debug, Clone)]
pub struct AdjustmentRepository {
    pool: SqlitePool,
}

impl AdjustmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AdjustmentRepository { pool }
    }

    pub async fn create(
        &self,
        location_id: &str,
        reason: AdjustmentReason,
        lines: &[NewAdjustmentLine],
        notes: Option<&str>,
        user_id: &str,
    ) -> DbResult<StockAdjustment> {
        if lines.is_empty() {
            return Err(ValidationError::required("lines").into());
        }

        let mut tx = self.pool.begin().await?;
        workflow::ensure_active(&mut tx, "locations", "Location", location_id).await?;

        let adjustment = StockAdjustment {
            id: new_id(),
            adjustment_number: sequence::next_document_number(&mut tx, DocumentKind::Adjustment).await?,
            location_id: location_id.to_string(),
            reason,
            notes: notes.map(str::to_string),
            created_by: user_id.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO stock_adjustments (id, adjustment_number, location_id, reason, notes, created_by, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&adjustment.id)
        .bind(&adjustment.adjustment_number)
        .bind(&adjustment.location_id)
        .bind(adjustment.reason)
        .bind(&adjustment.notes)
        .bind(&adjustment.created_by)
        .bind(adjustment.created_at)
        .execute(&mut *tx)
        .await?;

        for line in lines {
            validate_stock_delta(line.delta)?;
            product::fetch(&mut tx, &line.product_id).await?.ensure_tracked()?;
            debug!(number = %adjustment.adjustment_number, product_id = %line.product_id, delta = line.delta, "Adjusting stock");

            sqlx::query(
                r#"
                INSERT INTO stock_adjustment_items (id, adjustment_id, product_id, batch_id, delta)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(new_id())
            .bind(&adjustment.id)
            .bind(&line.product_id)
            .bind(&line.batch_id)
            .bind(line.delta)
            .execute(&mut *tx)
            .await?;

            let change = StockChange {
                product_id: &line.product_id,
                location_id,
                batch_id: line.batch_id.as_deref(),
                delta: line.delta,
                reason: MovementReason::Adjustment,
                reference_type: reference::ADJUSTMENT,
                reference_id: &adjustment.id,
                user_id,
            };
            if line.delta < 0 && line.batch_id.is_none() {
                inventory::consume(&mut tx, change, -line.delta).await?;
            } else {
                inventory::apply_delta(&mut tx, change).await?;
            }
        }

        tx.commit().await?;

        info!(number = %adjustment.adjustment_number, reason = ?reason, lines = lines.len(), "Stock adjusted");
        Ok(adjustment)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<StockAdjustment>> {
        let adjustment = sqlx::query_as::<_, StockAdjustment>("SELECT * FROM stock_adjustments WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(adjustment)
    }

    pub async fn get_items(&self, adjustment_id: &str) -> DbResult<Vec<StockAdjustmentItem>> {
        let items = sqlx::query_as::<_, StockAdjustmentItem>(
            "SELECT * FROM stock_adjustment_items WHERE adjustment_id = ?1 ORDER BY rowid",
        )
        .bind(adjustment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Adjustments newest first, optionally for one location.
    pub async fn list(&self, location_id: Option<&str>, limit: u32) -> DbResult<Vec<StockAdjustment>> {
        let adjustments = sqlx::query_as::<_, StockAdjustment>(
            r#"
            SELECT * FROM stock_adjustments
            WHERE ?1 IS NULL OR location_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(location_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(adjustments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{location, stocked_product, test_db};
    use tillstone_core::CoreError;

    fn adjust(product_id: &str, delta: i64) -> NewAdjustmentLine {
        NewAdjustmentLine {
            product_id: product_id.to_string(),
            batch_id: None,
            delta,
        }
    }

    #[tokio::test]
    async fn test_adjustment_applies_immediately() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let a = stocked_product(&db, "CUP", 300, &loc, 10).await;
        let b = stocked_product(&db, "PLATE", 500, &loc, 4).await;

        let adj = db
            .adjustments()
            .create(
                &loc.id,
                AdjustmentReason::Count,
                &[adjust(&a.id, -3), adjust(&b.id, 2)],
                Some("weekly count"),
                "manager",
            )
            .await
            .unwrap();
        assert!(adj.adjustment_number.starts_with("ADJ-"));

        let inv = db.inventory();
        assert_eq!(inv.stock_level(&a.id, &loc.id).await.unwrap(), 7);
        assert_eq!(inv.stock_level(&b.id, &loc.id).await.unwrap(), 6);
        assert_eq!(db.adjustments().get_items(&adj.id).await.unwrap().len(), 2);
        assert_eq!(db.adjustments().list(Some(&loc.id), 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_line_rolls_back_whole_adjustment() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let a = stocked_product(&db, "CUP", 300, &loc, 10).await;
        let b = stocked_product(&db, "PLATE", 500, &loc, 1).await;

        let err = db
            .adjustments()
            .create(
                &loc.id,
                AdjustmentReason::Damage,
                &[adjust(&a.id, -2), adjust(&b.id, -5)],
                None,
                "manager",
            )
            .await
            .unwrap_err();
        assert!(err.is_rule(|e| matches!(e, CoreError::InsufficientStock { .. })));

        assert_eq!(db.inventory().stock_level(&a.id, &loc.id).await.unwrap(), 10);
        assert!(db.adjustments().list(None, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_delta_rejected() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let a = stocked_product(&db, "CUP", 300, &loc, 10).await;

        let err = db
            .adjustments()
            .create(&loc.id, AdjustmentReason::Other, &[adjust(&a.id, 0)], None, "manager")
            .await
            .unwrap_err();
        assert!(err.is_rule(|e| matches!(e, CoreError::Validation(_))));
    }
}
