//! # Inventory Repository
//!
//! Stock levels, batches and the movement ledger, plus the transaction
//! helpers every stock-changing repository posts through.
//!
//! ## One Change, Three Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply_delta(conn, StockChange { product, location, batch, delta })    │
//! │       │                                                                 │
//! │       ├── load product, current level                                  │
//! │       ├── !product.track_inventory → InvalidFormat                     │
//! │       ├── delta < 0 && !product.can_remove(level, -delta)              │
//! │       │        → InsufficientStock                                     │
//! │       ├── batch given && batch.quantity + delta < 0                    │
//! │       │        → InsufficientBatchQuantity                             │
//! │       │                                                                 │
//! │       ├── UPDATE batches        (if batch given)                       │
//! │       ├── UPSERT stock_levels                                          │
//! │       └── INSERT stock_movements                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! All three run on the caller's connection, normally inside a
//! transaction, so a failed posting leaves nothing behind.
//!
//! ## FEFO
//! Sales and level-only removals use [`consume`], which takes stock from
//! batches in first-expired-first-out order (no expiry last, then oldest
//! receipt first). Whatever the batches cannot cover comes off the level
//! alone. Untracked products consume nothing and leave no movement.
//!
//! ## Reversals
//! Cancelling a posting replays its movements with the opposite sign. When
//! a batch no longer holds what the posting put into it and the product
//! allows negative stock, the batch is emptied and the rest comes off the
//! level alone.

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::{new_id, product};
use crate::error::{DbError, DbResult};
use tillstone_core::validation::validate_stock_delta;
use tillstone_core::{Batch, CoreError, MovementReason, StockLevel, StockMovement, ValidationError};

/// `reference_type` values written to the ledger.
pub mod reference {
    pub const OPENING: &str = "opening";
    pub const SALE: &str = "sale";
    pub const REFUND: &str = "refund";
    pub const GOODS_RECEIVED: &str = "grn";
    pub const GOODS_RETURN: &str = "goods_return";
    pub const GOODS_REPLACE: &str = "goods_replace";
    pub const ADJUSTMENT: &str = "adjustment";
    pub const TRANSFER: &str = "transfer";
}

/// One signed stock change.
#[derive(Debug, Clone, Copy)]
pub struct StockChange<'a> {
    pub product_id: &'a str,
    pub location_id: &'a str,
    /// Batch to move with the level. `None` changes the level only.
    pub batch_id: Option<&'a str>,
    pub delta: i64,
    pub reason: MovementReason,
    pub reference_type: &'a str,
    pub reference_id: &'a str,
    pub user_id: &'a str,
}

/// Units taken from one batch by [`consume`]. `batch_id` is `None` for the
/// part no batch could cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAllocation {
    pub batch_id: Option<String>,
    pub quantity: i64,
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Current level of a product at a location (0 when never stocked).
pub(crate) async fn level(
    conn: &mut SqliteConnection,
    product_id: &str,
    location_id: &str,
) -> DbResult<i64> {
    let quantity: Option<i64> = sqlx::query_scalar(
        "SELECT quantity FROM stock_levels WHERE product_id = ?1 AND location_id = ?2",
    )
    .bind(product_id)
    .bind(location_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(quantity.unwrap_or(0))
}

pub(crate) async fn fetch_batch(conn: &mut SqliteConnection, id: &str) -> DbResult<Batch> {
    sqlx::query_as::<_, Batch>("SELECT * FROM batches WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Batch", id))
}

/// Applies one stock change: batch, level and ledger together.
pub(crate) async fn apply_delta(
    conn: &mut SqliteConnection,
    change: StockChange<'_>,
) -> DbResult<StockMovement> {
    validate_stock_delta(change.delta)?;

    let product = product::fetch(conn, change.product_id).await?;
    product.ensure_tracked()?;
    let current = level(conn, change.product_id, change.location_id).await?;

    if change.delta < 0 && !product.can_remove(current, -change.delta) {
        return Err(CoreError::InsufficientStock {
            sku: product.sku,
            available: current,
            requested: -change.delta,
        }
        .into());
    }

    let now = Utc::now();

    if let Some(batch_id) = change.batch_id {
        let batch = fetch_batch(conn, batch_id).await?;
        if batch.product_id != change.product_id || batch.location_id != change.location_id {
            return Err(ValidationError::invalid(
                "batch",
                format!("{} does not belong to this product and location", batch.batch_number),
            )
            .into());
        }
        if batch.quantity + change.delta < 0 {
            return Err(CoreError::InsufficientBatchQuantity {
                batch_number: batch.batch_number,
                available: batch.quantity,
                requested: -change.delta,
            }
            .into());
        }

        sqlx::query("UPDATE batches SET quantity = quantity + ?1 WHERE id = ?2")
            .bind(change.delta)
            .bind(batch_id)
            .execute(&mut *conn)
            .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO stock_levels (product_id, location_id, quantity, updated_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT (product_id, location_id)
        DO UPDATE SET quantity = quantity + excluded.quantity, updated_at = excluded.updated_at
        "#,
    )
    .bind(change.product_id)
    .bind(change.location_id)
    .bind(change.delta)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let movement = StockMovement {
        id: new_id(),
        product_id: change.product_id.to_string(),
        location_id: change.location_id.to_string(),
        batch_id: change.batch_id.map(str::to_string),
        delta: change.delta,
        reason: change.reason,
        reference_type: Some(change.reference_type.to_string()),
        reference_id: Some(change.reference_id.to_string()),
        created_by: change.user_id.to_string(),
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, product_id, location_id, batch_id, delta, reason,
            reference_type, reference_id, created_by, created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.product_id)
    .bind(&movement.location_id)
    .bind(&movement.batch_id)
    .bind(movement.delta)
    .bind(movement.reason)
    .bind(&movement.reference_type)
    .bind(&movement.reference_id)
    .bind(&movement.created_by)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    debug!(
        sku = %product.sku,
        location = %change.location_id,
        delta = change.delta,
        reason = %change.reason,
        "Stock moved"
    );

    Ok(movement)
}

/// Removes `quantity` units in FEFO order.
///
/// `base` supplies everything but the batch and delta.
pub(crate) async fn consume(
    conn: &mut SqliteConnection,
    base: StockChange<'_>,
    quantity: i64,
) -> DbResult<Vec<BatchAllocation>> {
    let product = product::fetch(conn, base.product_id).await?;
    if !product.track_inventory {
        debug!(sku = %product.sku, "Untracked product, no stock consumed");
        return Ok(Vec::new());
    }
    let current = level(conn, base.product_id, base.location_id).await?;
    if !product.can_remove(current, quantity) {
        return Err(CoreError::InsufficientStock {
            sku: product.sku,
            available: current,
            requested: quantity,
        }
        .into());
    }

    let batches = sqlx::query_as::<_, Batch>(
        r#"
        SELECT * FROM batches
        WHERE product_id = ?1 AND location_id = ?2 AND quantity > 0
        ORDER BY expiry_date IS NULL, expiry_date, received_at
        "#,
    )
    .bind(base.product_id)
    .bind(base.location_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut remaining = quantity;
    let mut allocations = Vec::new();

    for batch in batches {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(batch.quantity);
        apply_delta(
            conn,
            StockChange {
                batch_id: Some(&batch.id),
                delta: -take,
                ..base
            },
        )
        .await?;
        allocations.push(BatchAllocation {
            batch_id: Some(batch.id),
            quantity: take,
        });
        remaining -= take;
    }

    if remaining > 0 {
        apply_delta(
            conn,
            StockChange {
                batch_id: None,
                delta: -remaining,
                ..base
            },
        )
        .await?;
        allocations.push(BatchAllocation {
            batch_id: None,
            quantity: remaining,
        });
    }

    Ok(allocations)
}

/// Returns the batch `batch_number` of a product at a location, creating
/// an empty one if needed.
pub(crate) async fn find_or_create_batch(
    conn: &mut SqliteConnection,
    product_id: &str,
    location_id: &str,
    batch_number: &str,
    expiry_date: Option<NaiveDate>,
    cost_cents: i64,
) -> DbResult<Batch> {
    let existing = sqlx::query_as::<_, Batch>(
        "SELECT * FROM batches WHERE product_id = ?1 AND location_id = ?2 AND batch_number = ?3",
    )
    .bind(product_id)
    .bind(location_id)
    .bind(batch_number)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(batch) = existing {
        return Ok(batch);
    }

    let batch = Batch {
        id: new_id(),
        product_id: product_id.to_string(),
        location_id: location_id.to_string(),
        batch_number: batch_number.to_string(),
        expiry_date,
        cost_cents,
        quantity: 0,
        received_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO batches (
            id, product_id, location_id, batch_number, expiry_date, cost_cents, quantity, received_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)
        "#,
    )
    .bind(&batch.id)
    .bind(&batch.product_id)
    .bind(&batch.location_id)
    .bind(&batch.batch_number)
    .bind(batch.expiry_date)
    .bind(batch.cost_cents)
    .bind(batch.received_at)
    .execute(&mut *conn)
    .await?;

    Ok(batch)
}

/// Undoes every movement recorded for a reference, newest first.
pub(crate) async fn reverse_movements(
    conn: &mut SqliteConnection,
    reference_type: &str,
    reference_id: &str,
    reason: MovementReason,
    user_id: &str,
) -> DbResult<Vec<StockMovement>> {
    let originals = movements_for_reference(conn, reference_type, reference_id).await?;

    let mut reversed = Vec::with_capacity(originals.len());
    for movement in originals.iter().rev() {
        let undo = StockChange {
            product_id: &movement.product_id,
            location_id: &movement.location_id,
            batch_id: movement.batch_id.as_deref(),
            delta: -movement.delta,
            reason,
            reference_type,
            reference_id,
            user_id,
        };
        match undo.batch_id {
            Some(batch_id) if undo.delta < 0 => {
                reversed.extend(remove_from_batch(conn, undo, batch_id).await?);
            }
            _ => reversed.push(apply_delta(conn, undo).await?),
        }
    }

    debug!(reference_type, reference_id, count = reversed.len(), "Movements reversed");
    Ok(reversed)
}

/// Takes a reversal out of its batch. A short batch fails unless the
/// product allows negative stock, in which case the shortfall comes off
/// the level alone.
async fn remove_from_batch(
    conn: &mut SqliteConnection,
    change: StockChange<'_>,
    batch_id: &str,
) -> DbResult<Vec<StockMovement>> {
    let batch = fetch_batch(conn, batch_id).await?;
    let requested = -change.delta;
    let product = product::fetch(conn, change.product_id).await?;
    if batch.quantity >= requested || !product.allow_negative_stock {
        return Ok(vec![apply_delta(conn, change).await?]);
    }

    let mut movements = Vec::with_capacity(2);
    let from_batch = batch.quantity.max(0);
    if from_batch > 0 {
        movements.push(apply_delta(conn, StockChange { delta: -from_batch, ..change }).await?);
    }
    movements.push(
        apply_delta(
            conn,
            StockChange {
                batch_id: None,
                delta: -(requested - from_batch),
                ..change
            },
        )
        .await?,
    );
    debug!(batch = %batch.batch_number, shortfall = requested - from_batch, "Reversal exceeds batch, rest taken from level");
    Ok(movements)
}

/// Movements written for a reference, oldest first, excluding reversals.
pub(crate) async fn movements_for_reference(
    conn: &mut SqliteConnection,
    reference_type: &str,
    reference_id: &str,
) -> DbResult<Vec<StockMovement>> {
    let movements = sqlx::query_as::<_, StockMovement>(
        r#"
        SELECT * FROM stock_movements
        WHERE reference_type = ?1 AND reference_id = ?2
        AND reason NOT IN ('reversal', 'sale_void')
        ORDER BY rowid
        "#,
    )
    .bind(reference_type)
    .bind(reference_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(movements)
}

// =============================================================================
// Repository
// =============================================================================

/// Read access to stock, plus opening balances.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Units of a product on hand at a location.
    pub async fn stock_level(&self, product_id: &str, location_id: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        level(&mut conn, product_id, location_id).await
    }

    /// A product's level at every location that ever held it.
    pub async fn levels_for_product(&self, product_id: &str) -> DbResult<Vec<StockLevel>> {
        let levels = sqlx::query_as::<_, StockLevel>(
            "SELECT * FROM stock_levels WHERE product_id = ?1 ORDER BY location_id",
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(levels)
    }

    /// Every product level at one location.
    pub async fn stock_levels(&self, location_id: &str) -> DbResult<Vec<StockLevel>> {
        let levels = sqlx::query_as::<_, StockLevel>(
            "SELECT * FROM stock_levels WHERE location_id = ?1 ORDER BY product_id",
        )
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(levels)
    }

    /// Batches of a product at a location in FEFO order.
    pub async fn batches(
        &self,
        product_id: &str,
        location_id: &str,
        include_empty: bool,
    ) -> DbResult<Vec<Batch>> {
        let batches = sqlx::query_as::<_, Batch>(
            r#"
            SELECT * FROM batches
            WHERE product_id = ?1 AND location_id = ?2 AND (?3 OR quantity > 0)
            ORDER BY expiry_date IS NULL, expiry_date, received_at
            "#,
        )
        .bind(product_id)
        .bind(location_id)
        .bind(include_empty)
        .fetch_all(&self.pool)
        .await?;
        Ok(batches)
    }

    /// Non-empty batches expiring within `days` from today, soonest first.
    /// Already expired batches are included.
    pub async fn expiring_batches(&self, days: i64) -> DbResult<Vec<Batch>> {
        let horizon = Utc::now().date_naive() + Duration::days(days);
        let batches = sqlx::query_as::<_, Batch>(
            r#"
            SELECT * FROM batches
            WHERE quantity > 0 AND expiry_date IS NOT NULL AND expiry_date <= ?1
            ORDER BY expiry_date
            "#,
        )
        .bind(horizon)
        .fetch_all(&self.pool)
        .await?;
        Ok(batches)
    }

    /// Latest movements of a product, newest first.
    pub async fn movements(
        &self,
        product_id: &str,
        location_id: Option<&str>,
        limit: u32,
    ) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT * FROM stock_movements
            WHERE product_id = ?1 AND (?2 IS NULL OR location_id = ?2)
            ORDER BY rowid DESC
            LIMIT ?3
            "#,
        )
        .bind(product_id)
        .bind(location_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(movements)
    }

    /// Every movement caused by one document or sale, reversals included.
    pub async fn movements_for(
        &self,
        reference_type: &str,
        reference_id: &str,
    ) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT * FROM stock_movements
            WHERE reference_type = ?1 AND reference_id = ?2
            ORDER BY rowid
            "#,
        )
        .bind(reference_type)
        .bind(reference_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(movements)
    }

    /// Whether the ledger sums to the stored level for a product at a
    /// location.
    pub async fn ledger_balances(&self, product_id: &str, location_id: &str) -> DbResult<bool> {
        let ledger: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(delta), 0) FROM stock_movements WHERE product_id = ?1 AND location_id = ?2",
        )
        .bind(product_id)
        .bind(location_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(ledger == self.stock_level(product_id, location_id).await?)
    }

    /// Records an opening balance, optionally into a named batch.
    pub async fn set_opening_stock(
        &self,
        product_id: &str,
        location_id: &str,
        quantity: i64,
        batch_number: Option<&str>,
        expiry_date: Option<NaiveDate>,
        user_id: &str,
    ) -> DbResult<StockMovement> {
        if quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;
        let product = product::fetch_active(&mut tx, product_id).await?;

        let batch = match batch_number {
            Some(number) => Some(
                find_or_create_batch(
                    &mut tx,
                    product_id,
                    location_id,
                    number,
                    expiry_date,
                    product.cost_cents,
                )
                .await?,
            ),
            None => None,
        };

        let movement = apply_delta(
            &mut tx,
            StockChange {
                product_id,
                location_id,
                batch_id: batch.as_ref().map(|b| b.id.as_str()),
                delta: quantity,
                reason: MovementReason::Opening,
                reference_type: reference::OPENING,
                reference_id: product_id,
                user_id,
            },
        )
        .await?;

        tx.commit().await?;
        Ok(movement)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{insert_product, location, test_db};

    #[tokio::test]
    async fn test_opening_stock_writes_level_batch_and_ledger() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let p = insert_product(&db, "RICE-5KG", 899).await;

        db.inventory()
            .set_opening_stock(&p.id, &loc.id, 12, Some("LOT-1"), None, "admin")
            .await
            .unwrap();

        assert_eq!(db.inventory().stock_level(&p.id, &loc.id).await.unwrap(), 12);
        let batches = db.inventory().batches(&p.id, &loc.id, false).await.unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].quantity, 12);
        assert!(db.inventory().ledger_balances(&p.id, &loc.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_removal_below_zero_rejected() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let p = insert_product(&db, "RICE-5KG", 899).await;
        db.inventory()
            .set_opening_stock(&p.id, &loc.id, 3, None, None, "admin")
            .await
            .unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let err = apply_delta(
            &mut conn,
            StockChange {
                product_id: &p.id,
                location_id: &loc.id,
                batch_id: None,
                delta: -5,
                reason: MovementReason::Adjustment,
                reference_type: reference::ADJUSTMENT,
                reference_id: "x",
                user_id: "admin",
            },
        )
        .await
        .unwrap_err();
        assert!(err.is_rule(|e| matches!(e, CoreError::InsufficientStock { available: 3, .. })));
    }

    #[tokio::test]
    async fn test_consume_is_fefo_then_level() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let p = insert_product(&db, "MILK-1L", 320).await;
        let soon = NaiveDate::from_ymd_opt(2030, 1, 10);
        let later = NaiveDate::from_ymd_opt(2030, 2, 10);

        let inv = db.inventory();
        inv.set_opening_stock(&p.id, &loc.id, 4, Some("LATE"), later, "admin").await.unwrap();
        inv.set_opening_stock(&p.id, &loc.id, 3, Some("SOON"), soon, "admin").await.unwrap();
        inv.set_opening_stock(&p.id, &loc.id, 2, None, None, "admin").await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let allocations = consume(
            &mut tx,
            StockChange {
                product_id: &p.id,
                location_id: &loc.id,
                batch_id: None,
                delta: 0,
                reason: MovementReason::Sale,
                reference_type: reference::SALE,
                reference_id: "sale-1",
                user_id: "cashier",
            },
            9,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let quantities: Vec<i64> = allocations.iter().map(|a| a.quantity).collect();
        assert_eq!(quantities, vec![3, 4, 2]);
        assert!(allocations[2].batch_id.is_none());
        assert_eq!(inv.stock_level(&p.id, &loc.id).await.unwrap(), 0);
        assert!(inv.ledger_balances(&p.id, &loc.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_reverse_movements_restores_everything() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let p = insert_product(&db, "SOAP", 120).await;
        db.inventory()
            .set_opening_stock(&p.id, &loc.id, 10, Some("B1"), None, "admin")
            .await
            .unwrap();

        let mut tx = db.begin().await.unwrap();
        let base = StockChange {
            product_id: &p.id,
            location_id: &loc.id,
            batch_id: None,
            delta: 0,
            reason: MovementReason::Sale,
            reference_type: reference::SALE,
            reference_id: "sale-9",
            user_id: "cashier",
        };
        consume(&mut tx, base, 6).await.unwrap();
        let undone = reverse_movements(&mut tx, reference::SALE, "sale-9", MovementReason::SaleVoid, "manager")
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(undone.len(), 1);
        assert_eq!(undone[0].delta, 6);
        assert_eq!(db.inventory().stock_level(&p.id, &loc.id).await.unwrap(), 10);
        let batches = db.inventory().batches(&p.id, &loc.id, false).await.unwrap();
        assert_eq!(batches[0].quantity, 10);
    }

    #[tokio::test]
    async fn test_negative_stock_allowed_when_product_permits() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let mut p = insert_product(&db, "SERVICE", 500).await;
        p.allow_negative_stock = true;
        let p = db.products().update(&p, "admin").await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let allocations = consume(
            &mut conn,
            StockChange {
                product_id: &p.id,
                location_id: &loc.id,
                batch_id: None,
                delta: 0,
                reason: MovementReason::Sale,
                reference_type: reference::SALE,
                reference_id: "s",
                user_id: "cashier",
            },
            2,
        )
        .await
        .unwrap();
        drop(conn);

        assert_eq!(allocations, vec![BatchAllocation { batch_id: None, quantity: 2 }]);
        assert_eq!(db.inventory().stock_level(&p.id, &loc.id).await.unwrap(), -2);
    }
}
