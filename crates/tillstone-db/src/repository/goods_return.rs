//! # Goods Returns
//!
//! Stock sent back to a supplier, optionally against the GRN it arrived
//! on. Posting removes the goods (`SupplierReturn` movements); a posted
//! return can later be replaced by the supplier (see `goods_replace`).
//!
//! Lines naming a batch leave from that batch. Lines without one are
//! taken FEFO like a sale.

use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::inventory::{self, reference, StockChange};
use super::{goods_received, new_id, product, sequence, workflow};
use crate::error::{DbError, DbResult};
use tillstone_core::document::DocumentKind;
use tillstone_core::pricing::{document_total, line_gross};
use tillstone_core::validation::validate_document_quantity;
use tillstone_core::{
    DocumentStatus, DocumentTrail, GoodsReturn, GoodsReturnItem, Money, MovementReason, ValidationError,
};

const TABLE: &str = "goods_returns";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGoodsReturn {
    pub supplier_id: String,
    pub location_id: String,
    /// Posted GRN of the same supplier the goods came in on.
    pub grn_id: Option<String>,
    pub reason: Option<String>,
    pub lines: Vec<NewReturnLine>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReturnLine {
    pub product_id: String,
    pub batch_id: Option<String>,
    pub quantity: i64,
    /// Defaults to the batch cost, or the product cost without a batch.
    pub unit_cost_cents: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct GoodsReturnRepository {
    pool: SqlitePool,
}

impl GoodsReturnRepository {
    pub fn new(pool: SqlitePool) -> Self {
        GoodsReturnRepository { pool }
    }

    pub async fn create(&self, input: &NewGoodsReturn, user_id: &str) -> DbResult<GoodsReturn> {
        let mut tx = self.pool.begin().await?;

        workflow::ensure_active(&mut tx, "suppliers", "Supplier", &input.supplier_id).await?;
        workflow::ensure_active(&mut tx, "locations", "Location", &input.location_id).await?;

        if let Some(grn_id) = &input.grn_id {
            let grn = goods_received::fetch(&mut tx, grn_id).await?;
            if grn.status != DocumentStatus::Posted {
                return Err(ValidationError::invalid("grn_id", format!("{} is not posted", grn.grn_number)).into());
            }
            if grn.supplier_id != input.supplier_id {
                return Err(ValidationError::invalid(
                    "grn_id",
                    format!("{} belongs to another supplier", grn.grn_number),
                )
                .into());
            }
        }

        let mut items = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            items.push(build_item(&mut tx, &input.location_id, line).await?);
        }

        let goods_return = GoodsReturn {
            id: new_id(),
            return_number: sequence::next_document_number(&mut tx, DocumentKind::GoodsReturn).await?,
            supplier_id: input.supplier_id.clone(),
            location_id: input.location_id.clone(),
            grn_id: input.grn_id.clone(),
            reason: input.reason.clone(),
            status: DocumentStatus::Pending,
            total_cents: document_total(items.iter().map(|i| Money::from_cents(i.line_total_cents)))?.cents(),
            trail: DocumentTrail::new(user_id),
        };

        debug!(number = %goods_return.return_number, lines = items.len(), "Creating goods return");

        sqlx::query(
            r#"
            INSERT INTO goods_returns (
                id, return_number, supplier_id, location_id, grn_id, reason,
                status, total_cents, created_by, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
            "#,
        )
        .bind(&goods_return.id)
        .bind(&goods_return.return_number)
        .bind(&goods_return.supplier_id)
        .bind(&goods_return.location_id)
        .bind(&goods_return.grn_id)
        .bind(&goods_return.reason)
        .bind(goods_return.status)
        .bind(goods_return.total_cents)
        .bind(&goods_return.trail.created_by)
        .bind(goods_return.trail.created_at)
        .execute(&mut *tx)
        .await?;

        for item in &mut items {
            item.return_id = goods_return.id.clone();
            sqlx::query(
                r#"
                INSERT INTO goods_return_items (
                    id, return_id, product_id, batch_id, quantity, unit_cost_cents, line_total_cents
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&item.id)
            .bind(&item.return_id)
            .bind(&item.product_id)
            .bind(&item.batch_id)
            .bind(item.quantity)
            .bind(item.unit_cost_cents)
            .bind(item.line_total_cents)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(goods_return)
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<GoodsReturn>> {
        let goods_return = sqlx::query_as::<_, GoodsReturn>("SELECT * FROM goods_returns WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(goods_return)
    }

    pub async fn get_items(&self, return_id: &str) -> DbResult<Vec<GoodsReturnItem>> {
        let mut conn = self.pool.acquire().await?;
        items(&mut conn, return_id).await
    }

    pub async fn list(&self, status: Option<DocumentStatus>) -> DbResult<Vec<GoodsReturn>> {
        let returns = sqlx::query_as::<_, GoodsReturn>(
            r#"
            SELECT * FROM goods_returns
            WHERE ?1 IS NULL OR status = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(returns)
    }

    /// Takes the returned goods out of stock and marks the return posted.
    pub async fn post(&self, id: &str, user_id: &str) -> DbResult<GoodsReturn> {
        let mut tx = self.pool.begin().await?;
        let goods_return = fetch(&mut tx, id).await?;
        let lines = items(&mut tx, id).await?;
        workflow::ensure_postable(&goods_return.return_number, goods_return.status, lines.len())?;

        for line in &lines {
            let change = StockChange {
                product_id: &line.product_id,
                location_id: &goods_return.location_id,
                batch_id: line.batch_id.as_deref(),
                delta: -line.quantity,
                reason: MovementReason::SupplierReturn,
                reference_type: reference::GOODS_RETURN,
                reference_id: &goods_return.id,
                user_id,
            };
            match line.batch_id {
                Some(_) => {
                    inventory::apply_delta(&mut tx, change).await?;
                }
                None => {
                    inventory::consume(&mut tx, change, line.quantity).await?;
                }
            }
        }

        workflow::set_status(&mut tx, TABLE, id, DocumentStatus::Posted, user_id).await?;
        let goods_return = fetch(&mut tx, id).await?;
        tx.commit().await?;

        info!(number = %goods_return.return_number, lines = lines.len(), "Goods return posted");
        Ok(goods_return)
    }

    pub async fn cancel(&self, id: &str, user_id: &str) -> DbResult<GoodsReturn> {
        let mut tx = self.pool.begin().await?;
        let goods_return = fetch(&mut tx, id).await?;

        let replaced: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM goods_replaces WHERE goods_return_id = ?1 AND status != 'cancelled'",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if replaced > 0 {
            return Err(ValidationError::invalid(
                "goods_return",
                format!("{} has replacements; cancel them first", goods_return.return_number),
            )
            .into());
        }

        workflow::cancel(
            &mut tx,
            TABLE,
            reference::GOODS_RETURN,
            &goods_return.return_number,
            id,
            goods_return.status,
            user_id,
        )
        .await?;

        let goods_return = fetch(&mut tx, id).await?;
        tx.commit().await?;
        Ok(goods_return)
    }
}

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<GoodsReturn> {
    sqlx::query_as::<_, GoodsReturn>("SELECT * FROM goods_returns WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Goods return", id))
}

pub(crate) async fn items(conn: &mut SqliteConnection, return_id: &str) -> DbResult<Vec<GoodsReturnItem>> {
    let items = sqlx::query_as::<_, GoodsReturnItem>(
        "SELECT * FROM goods_return_items WHERE return_id = ?1 ORDER BY rowid",
    )
    .bind(return_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

async fn build_item(
    conn: &mut SqliteConnection,
    location_id: &str,
    line: &NewReturnLine,
) -> DbResult<GoodsReturnItem> {
    let product = product::fetch(conn, &line.product_id).await?;
    product.ensure_tracked()?;
    validate_document_quantity("quantity", line.quantity)?;

    let default_cost = match &line.batch_id {
        Some(batch_id) => {
            let batch = inventory::fetch_batch(conn, batch_id).await?;
            if batch.product_id != product.id || batch.location_id != location_id {
                return Err(ValidationError::invalid(
                    "batch",
                    format!("{} does not belong to this product and location", batch.batch_number),
                )
                .into());
            }
            batch.cost_cents
        }
        None => product.cost_cents,
    };
    let unit_cost_cents = line.unit_cost_cents.unwrap_or(default_cost);
    if unit_cost_cents < 0 {
        return Err(ValidationError::MustBePositive {
            field: "unit_cost".to_string(),
        }
        .into());
    }

    Ok(GoodsReturnItem {
        id: new_id(),
        return_id: String::new(),
        product_id: product.id,
        batch_id: line.batch_id.clone(),
        quantity: line.quantity,
        unit_cost_cents,
        line_total_cents: line_gross(Money::from_cents(unit_cost_cents), line.quantity)?.cents(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{NewGrn, NewGrnLine};
    use crate::testing::{insert_product, location, supplier, test_db};
    use crate::Database;
    use tillstone_core::{CoreError, Location, Product, Supplier};

    /// Posts a GRN of `quantity` units in batch `batch` and returns its id.
    async fn received(db: &Database, sup: &Supplier, loc: &Location, p: &Product, batch: &str, quantity: i64) -> String {
        let repo = db.goods_received();
        let grn = repo
            .create(
                &NewGrn {
                    supplier_id: sup.id.clone(),
                    location_id: loc.id.clone(),
                    supplier_invoice: None,
                    received_date: None,
                    notes: None,
                    lines: vec![NewGrnLine {
                        product_id: p.id.clone(),
                        batch_number: batch.to_string(),
                        expiry_date: None,
                        quantity,
                        free_quantity: 0,
                        unit_cost_cents: 120,
                        discount_cents: 0,
                    }],
                },
                "clerk",
            )
            .await
            .unwrap();
        repo.post(&grn.id, "clerk").await.unwrap();
        grn.id
    }

    fn request(sup: &Supplier, loc: &Location, grn_id: Option<String>, lines: Vec<NewReturnLine>) -> NewGoodsReturn {
        NewGoodsReturn {
            supplier_id: sup.id.clone(),
            location_id: loc.id.clone(),
            grn_id,
            reason: Some("damaged in transit".to_string()),
            lines,
        }
    }

    #[tokio::test]
    async fn test_post_removes_from_chosen_batch() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let sup = supplier(&db, "ACME").await;
        let p = insert_product(&db, "EGGS", 300).await;
        let grn_id = received(&db, &sup, &loc, &p, "E-1", 10).await;
        let batch = db.inventory().batches(&p.id, &loc.id, false).await.unwrap().remove(0);

        let repo = db.goods_returns();
        let ret = repo
            .create(
                &request(
                    &sup,
                    &loc,
                    Some(grn_id),
                    vec![NewReturnLine {
                        product_id: p.id.clone(),
                        batch_id: Some(batch.id.clone()),
                        quantity: 4,
                        unit_cost_cents: None,
                    }],
                ),
                "clerk",
            )
            .await
            .unwrap();
        assert_eq!(ret.total_cents, 480);

        repo.post(&ret.id, "clerk").await.unwrap();
        let inv = db.inventory();
        assert_eq!(inv.stock_level(&p.id, &loc.id).await.unwrap(), 6);
        assert_eq!(inv.batches(&p.id, &loc.id, false).await.unwrap()[0].quantity, 6);

        let movements = inv.movements_for(reference::GOODS_RETURN, &ret.id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].reason, MovementReason::SupplierReturn);
    }

    #[tokio::test]
    async fn test_cannot_return_more_than_on_hand() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let sup = supplier(&db, "ACME").await;
        let p = insert_product(&db, "FLOUR", 500).await;
        received(&db, &sup, &loc, &p, "F-1", 2).await;

        let repo = db.goods_returns();
        let ret = repo
            .create(
                &request(
                    &sup,
                    &loc,
                    None,
                    vec![NewReturnLine {
                        product_id: p.id.clone(),
                        batch_id: None,
                        quantity: 3,
                        unit_cost_cents: Some(100),
                    }],
                ),
                "clerk",
            )
            .await
            .unwrap();

        let err = repo.post(&ret.id, "clerk").await.unwrap_err();
        assert!(err.is_rule(|e| matches!(e, CoreError::InsufficientStock { .. })));
        assert_eq!(repo.get(&ret.id).await.unwrap().unwrap().status, DocumentStatus::Pending);
    }

    #[tokio::test]
    async fn test_cancel_posted_restores_stock() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let sup = supplier(&db, "ACME").await;
        let p = insert_product(&db, "SUGAR", 400).await;
        received(&db, &sup, &loc, &p, "S-1", 5).await;

        let repo = db.goods_returns();
        let ret = repo
            .create(
                &request(
                    &sup,
                    &loc,
                    None,
                    vec![NewReturnLine {
                        product_id: p.id.clone(),
                        batch_id: None,
                        quantity: 5,
                        unit_cost_cents: None,
                    }],
                ),
                "clerk",
            )
            .await
            .unwrap();
        repo.post(&ret.id, "clerk").await.unwrap();
        assert_eq!(db.inventory().stock_level(&p.id, &loc.id).await.unwrap(), 0);

        let cancelled = repo.cancel(&ret.id, "manager").await.unwrap();
        assert_eq!(cancelled.status, DocumentStatus::Cancelled);
        assert_eq!(db.inventory().stock_level(&p.id, &loc.id).await.unwrap(), 5);
        assert_eq!(db.inventory().batches(&p.id, &loc.id, false).await.unwrap()[0].quantity, 5);
    }

    #[tokio::test]
    async fn test_source_grn_must_be_posted() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let sup = supplier(&db, "ACME").await;
        let p = insert_product(&db, "SALT", 100).await;

        let pending = db
            .goods_received()
            .create(
                &NewGrn {
                    supplier_id: sup.id.clone(),
                    location_id: loc.id.clone(),
                    supplier_invoice: None,
                    received_date: None,
                    notes: None,
                    lines: vec![],
                },
                "clerk",
            )
            .await
            .unwrap();

        let result = db
            .goods_returns()
            .create(
                &request(
                    &sup,
                    &loc,
                    Some(pending.id),
                    vec![NewReturnLine {
                        product_id: p.id.clone(),
                        batch_id: None,
                        quantity: 1,
                        unit_cost_cents: None,
                    }],
                ),
                "clerk",
            )
            .await;
        assert!(result.is_err());
    }
}
