//! # Goods Replacements
//!
//! Replacement stock a supplier sends for a posted goods return. Posting
//! receives it into batches like a GRN (`SupplierReplace` movements).
//!
//! ```text
//! per product:  replaced (all non-cancelled replaces of the return)
//!               + requested  <=  returned
//! ```

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use super::inventory::{self, reference, StockChange};
use super::{goods_return, new_id, product, sequence, workflow};
use crate::error::{DbError, DbResult};
use tillstone_core::document::DocumentKind;
use tillstone_core::validation::validate_document_quantity;
use tillstone_core::{
    CoreError, DocumentStatus, DocumentTrail, GoodsReplace, GoodsReplaceItem, MovementReason,
    ValidationError,
};

const TABLE: &str = "goods_replaces";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGoodsReplace {
    pub goods_return_id: String,
    pub notes: Option<String>,
    pub lines: Vec<NewReplaceLine>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReplaceLine {
    pub product_id: String,
    pub batch_number: String,
    pub expiry_date: Option<NaiveDate>,
    pub quantity: i64,
    pub unit_cost_cents: i64,
}

#[derive(Debug, Clone)]
pub struct GoodsReplaceRepository {
    pool: SqlitePool,
}

impl GoodsReplaceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        GoodsReplaceRepository { pool }
    }

    /// Creates a pending replacement for a posted return.
    pub async fn create(&self, input: &NewGoodsReplace, user_id: &str) -> DbResult<GoodsReplace> {
        let mut tx = self.pool.begin().await?;

        let goods_return = goods_return::fetch(&mut tx, &input.goods_return_id).await?;
        if goods_return.status != DocumentStatus::Posted {
            return Err(ValidationError::invalid(
                "goods_return",
                format!("{} is {}, only posted returns can be replaced", goods_return.return_number, goods_return.status),
            )
            .into());
        }

        let mut requested: BTreeMap<&str, i64> = BTreeMap::new();
        for line in &input.lines {
            product::fetch(&mut tx, &line.product_id).await?.ensure_tracked()?;
            if line.batch_number.trim().is_empty() {
                return Err(ValidationError::required("batch_number").into());
            }
            validate_document_quantity("quantity", line.quantity)?;
            if line.unit_cost_cents < 0 {
                return Err(ValidationError::MustBePositive {
                    field: "unit_cost".to_string(),
                }
                .into());
            }
            *requested.entry(line.product_id.as_str()).or_default() += line.quantity;
        }

        for (product_id, quantity) in &requested {
            let returned = returned_quantity(&mut tx, &goods_return.id, product_id).await?;
            let replaced = replaced_quantity(&mut tx, &goods_return.id, product_id).await?;
            if replaced + quantity > returned {
                warn!(return_number = %goods_return.return_number, product_id, returned, replaced, quantity, "Replacement exceeds return");
                return Err(CoreError::ReplaceExceedsReturned {
                    product_id: product_id.to_string(),
                    returned: returned - replaced,
                    requested: *quantity,
                }
                .into());
            }
        }

        let replace = GoodsReplace {
            id: new_id(),
            replace_number: sequence::next_document_number(&mut tx, DocumentKind::GoodsReplace).await?,
            goods_return_id: goods_return.id.clone(),
            supplier_id: goods_return.supplier_id.clone(),
            location_id: goods_return.location_id.clone(),
            status: DocumentStatus::Pending,
            notes: input.notes.clone(),
            trail: DocumentTrail::new(user_id),
        };

        debug!(number = %replace.replace_number, return_number = %goods_return.return_number, "Creating goods replacement");

        sqlx::query(
            r#"
            INSERT INTO goods_replaces (
                id, replace_number, goods_return_id, supplier_id, location_id,
                status, notes, created_by, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            "#,
        )
        .bind(&replace.id)
        .bind(&replace.replace_number)
        .bind(&replace.goods_return_id)
        .bind(&replace.supplier_id)
        .bind(&replace.location_id)
        .bind(replace.status)
        .bind(&replace.notes)
        .bind(&replace.trail.created_by)
        .bind(replace.trail.created_at)
        .execute(&mut *tx)
        .await?;

        for line in &input.lines {
            sqlx::query(
                r#"
                INSERT INTO goods_replace_items (
                    id, replace_id, product_id, batch_number, expiry_date, quantity, unit_cost_cents
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(new_id())
            .bind(&replace.id)
            .bind(&line.product_id)
            .bind(line.batch_number.trim())
            .bind(line.expiry_date)
            .bind(line.quantity)
            .bind(line.unit_cost_cents)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(replace)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<GoodsReplace>> {
        let replace = sqlx::query_as::<_, GoodsReplace>("SELECT * FROM goods_replaces WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(replace)
    }

    pub async fn get_items(&self, replace_id: &str) -> DbResult<Vec<GoodsReplaceItem>> {
        let mut conn = self.pool.acquire().await?;
        items(&mut conn, replace_id).await
    }

    pub async fn list(&self, status: Option<DocumentStatus>) -> DbResult<Vec<GoodsReplace>> {
        let replaces = sqlx::query_as::<_, GoodsReplace>(
            r#"
            SELECT * FROM goods_replaces
            WHERE ?1 IS NULL OR status = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(replaces)
    }

    /// Replacements recorded against one goods return.
    pub async fn for_return(&self, goods_return_id: &str) -> DbResult<Vec<GoodsReplace>> {
        let replaces = sqlx::query_as::<_, GoodsReplace>(
            "SELECT * FROM goods_replaces WHERE goods_return_id = ?1 ORDER BY rowid",
        )
        .bind(goods_return_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(replaces)
    }

    /// Receives the replacement goods into batches and marks it posted.
    pub async fn post(&self, id: &str, user_id: &str) -> DbResult<GoodsReplace> {
        let mut tx = self.pool.begin().await?;
        let replace = fetch(&mut tx, id).await?;
        let lines = items(&mut tx, id).await?;
        workflow::ensure_postable(&replace.replace_number, replace.status, lines.len())?;

        for line in &lines {
            let batch = inventory::find_or_create_batch(
                &mut tx,
                &line.product_id,
                &replace.location_id,
                &line.batch_number,
                line.expiry_date,
                line.unit_cost_cents,
            )
            .await?;

            inventory::apply_delta(
                &mut tx,
                StockChange {
                    product_id: &line.product_id,
                    location_id: &replace.location_id,
                    batch_id: Some(&batch.id),
                    delta: line.quantity,
                    reason: MovementReason::SupplierReplace,
                    reference_type: reference::GOODS_REPLACE,
                    reference_id: &replace.id,
                    user_id,
                },
            )
            .await?;

            sqlx::query("UPDATE goods_replace_items SET batch_id = ?1 WHERE id = ?2")
                .bind(&batch.id)
                .bind(&line.id)
                .execute(&mut *tx)
                .await?;
        }

        workflow::set_status(&mut tx, TABLE, id, DocumentStatus::Posted, user_id).await?;
        let replace = fetch(&mut tx, id).await?;
        tx.commit().await?;

        info!(number = %replace.replace_number, lines = lines.len(), "Goods replacement posted");
        Ok(replace)
    }

    pub async fn cancel(&self, id: &str, user_id: &str) -> DbResult<GoodsReplace> {
        let mut tx = self.pool.begin().await?;
        let replace = fetch(&mut tx, id).await?;

        workflow::cancel(
            &mut tx,
            TABLE,
            reference::GOODS_REPLACE,
            &replace.replace_number,
            id,
            replace.status,
            user_id,
        )
        .await?;

        let replace = fetch(&mut tx, id).await?;
        tx.commit().await?;
        Ok(replace)
    }
}

async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<GoodsReplace> {
    sqlx::query_as::<_, GoodsReplace>("SELECT * FROM goods_replaces WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Goods replacement", id))
}

async fn items(conn: &mut SqliteConnection, replace_id: &str) -> DbResult<Vec<GoodsReplaceItem>> {
    let items = sqlx::query_as::<_, GoodsReplaceItem>(
        "SELECT * FROM goods_replace_items WHERE replace_id = ?1 ORDER BY rowid",
    )
    .bind(replace_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

async fn returned_quantity(conn: &mut SqliteConnection, return_id: &str, product_id: &str) -> DbResult<i64> {
    let quantity: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(quantity), 0) FROM goods_return_items WHERE return_id = ?1 AND product_id = ?2",
    )
    .bind(return_id)
    .bind(product_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(quantity)
}

async fn replaced_quantity(conn: &mut SqliteConnection, return_id: &str, product_id: &str) -> DbResult<i64> {
    let quantity: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(i.quantity), 0)
        FROM goods_replace_items i
        JOIN goods_replaces r ON r.id = i.replace_id
        WHERE r.goods_return_id = ?1 AND r.status != 'cancelled' AND i.product_id = ?2
        "#,
    )
    .bind(return_id)
    .bind(product_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(quantity)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{NewGoodsReturn, NewReturnLine};
    use crate::testing::{location, stocked_product, supplier, test_db};
    use crate::Database;
    use tillstone_core::{GoodsReturn, Product};

    struct Fixture {
        db: Database,
        product: Product,
        location_id: String,
        goods_return: GoodsReturn,
    }

    /// Posted return of 4 units out of 10 on hand.
    async fn posted_return() -> Fixture {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let sup = supplier(&db, "ACME").await;
        let product = stocked_product(&db, "LAMP", 2500, &loc, 10).await;

        let repo = db.goods_returns();
        let goods_return = repo
            .create(
                &NewGoodsReturn {
                    supplier_id: sup.id.clone(),
                    location_id: loc.id.clone(),
                    grn_id: None,
                    reason: Some("faulty".to_string()),
                    lines: vec![NewReturnLine {
                        product_id: product.id.clone(),
                        batch_id: None,
                        quantity: 4,
                        unit_cost_cents: Some(1200),
                    }],
                },
                "clerk",
            )
            .await
            .unwrap();
        let goods_return = repo.post(&goods_return.id, "clerk").await.unwrap();

        Fixture {
            db,
            product,
            location_id: loc.id,
            goods_return,
        }
    }

    fn replacement(f: &Fixture, quantity: i64) -> NewGoodsReplace {
        NewGoodsReplace {
            goods_return_id: f.goods_return.id.clone(),
            notes: None,
            lines: vec![NewReplaceLine {
                product_id: f.product.id.clone(),
                batch_number: "RPL-1".to_string(),
                expiry_date: None,
                quantity,
                unit_cost_cents: 1200,
            }],
        }
    }

    #[tokio::test]
    async fn test_post_receives_replacement_into_batch() {
        let f = posted_return().await;
        let repo = f.db.goods_replaces();

        let replace = repo.create(&replacement(&f, 4), "clerk").await.unwrap();
        assert_eq!(replace.supplier_id, f.goods_return.supplier_id);

        let posted = repo.post(&replace.id, "clerk").await.unwrap();
        assert_eq!(posted.status, DocumentStatus::Posted);

        let inv = f.db.inventory();
        assert_eq!(inv.stock_level(&f.product.id, &f.location_id).await.unwrap(), 10);
        let batches = inv.batches(&f.product.id, &f.location_id, false).await.unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].batch_number, "RPL-1");
        assert_eq!(batches[0].quantity, 4);
    }

    #[tokio::test]
    async fn test_replacements_cannot_exceed_returned() {
        let f = posted_return().await;
        let repo = f.db.goods_replaces();

        repo.create(&replacement(&f, 3), "clerk").await.unwrap();
        let err = repo.create(&replacement(&f, 2), "clerk").await.unwrap_err();
        assert!(err.is_rule(|e| matches!(
            e,
            CoreError::ReplaceExceedsReturned { returned: 1, requested: 2, .. }
        )));
    }

    #[tokio::test]
    async fn test_cancelled_replacement_frees_quantity() {
        let f = posted_return().await;
        let repo = f.db.goods_replaces();

        let first = repo.create(&replacement(&f, 4), "clerk").await.unwrap();
        repo.post(&first.id, "clerk").await.unwrap();
        repo.cancel(&first.id, "manager").await.unwrap();
        assert_eq!(f.db.inventory().stock_level(&f.product.id, &f.location_id).await.unwrap(), 6);

        repo.create(&replacement(&f, 4), "clerk").await.unwrap();
        assert_eq!(repo.for_return(&f.goods_return.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_return_must_be_posted() {
        let f = posted_return().await;
        f.db.goods_returns().cancel(&f.goods_return.id, "manager").await.unwrap();

        let err = f.db.goods_replaces().create(&replacement(&f, 1), "clerk").await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::Validation(_))));
    }
}
