//! # Goods Received Notes
//!
//! Supplier deliveries. A GRN is built up while Pending and only touches
//! stock when posted.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  post(grn)                                   one transaction           │
//! │    for each line:                                                       │
//! │      batch  = find_or_create(product, location, batch_number)          │
//! │      stock += quantity + free_quantity     (GoodsReceived movement)    │
//! │      product.cost = unit_cost                                          │
//! │    status = Posted                                                      │
//! │                                                                         │
//! │  cancel(grn)                                                            │
//! │    Pending → Cancelled                                                 │
//! │    Posted  → every GoodsReceived movement reversed, then Cancelled     │
//! │              (fails once the received goods have been sold)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::inventory::{self, reference, StockChange};
use super::{new_id, product, sequence, workflow};
use crate::error::{DbError, DbResult};
use tillstone_core::document::{ensure_editable, DocumentKind};
use tillstone_core::pricing::grn_line_total;
use tillstone_core::validation::validate_document_quantity;
use tillstone_core::{
    DocumentStatus, DocumentTrail, GoodsReceivedNote, GrnItem, Money, MovementReason, MAX_DOCUMENT_QUANTITY,
    ValidationError,
};

const TABLE: &str = "goods_received_notes";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGrn {
    pub supplier_id: String,
    pub location_id: String,
    pub supplier_invoice: Option<String>,
    /// Defaults to today.
    pub received_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[serde(default)]
    pub lines: Vec<NewGrnLine>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGrnLine {
    pub product_id: String,
    pub batch_number: String,
    pub expiry_date: Option<NaiveDate>,
    pub quantity: i64,
    #[serde(default)]
    pub free_quantity: i64,
    pub unit_cost_cents: i64,
    #[serde(default)]
    pub discount_cents: i64,
}

#[derive(Debug, Clone)]
pub struct GoodsReceivedRepository {
    pool: SqlitePool,
}

impl GoodsReceivedRepository {
    pub fn new(pool: SqlitePool) -> Self {
        GoodsReceivedRepository { pool }
    }

    /// Creates a pending GRN with its initial lines.
    pub async fn create(&self, input: &NewGrn, user_id: &str) -> DbResult<GoodsReceivedNote> {
        let mut tx = self.pool.begin().await?;

        workflow::ensure_active(&mut tx, "suppliers", "Supplier", &input.supplier_id).await?;
        workflow::ensure_active(&mut tx, "locations", "Location", &input.location_id).await?;

        let grn = GoodsReceivedNote {
            id: new_id(),
            grn_number: sequence::next_document_number(&mut tx, DocumentKind::GoodsReceived).await?,
            supplier_id: input.supplier_id.clone(),
            location_id: input.location_id.clone(),
            supplier_invoice: input.supplier_invoice.clone(),
            received_date: input.received_date.unwrap_or_else(|| Utc::now().date_naive()),
            status: DocumentStatus::Pending,
            total_cents: 0,
            notes: input.notes.clone(),
            trail: DocumentTrail::new(user_id),
        };

        debug!(grn = %grn.grn_number, supplier_id = %grn.supplier_id, "Creating GRN");

        sqlx::query(
            r#"
            INSERT INTO goods_received_notes (
                id, grn_number, supplier_id, location_id, supplier_invoice, received_date,
                status, total_cents, notes, created_by, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9, ?10, ?10)
            "#,
        )
        .bind(&grn.id)
        .bind(&grn.grn_number)
        .bind(&grn.supplier_id)
        .bind(&grn.location_id)
        .bind(&grn.supplier_invoice)
        .bind(grn.received_date)
        .bind(grn.status)
        .bind(&grn.notes)
        .bind(&grn.trail.created_by)
        .bind(grn.trail.created_at)
        .execute(&mut *tx)
        .await?;

        for line in &input.lines {
            insert_item(&mut tx, &grn.id, line).await?;
        }
        refresh_total(&mut tx, &grn.id).await?;

        let grn = fetch(&mut tx, &grn.id).await?;
        tx.commit().await?;
        Ok(grn)
    }

    /// Adds a line to a pending GRN.
    pub async fn add_item(&self, grn_id: &str, line: &NewGrnLine) -> DbResult<GrnItem> {
        let mut tx = self.pool.begin().await?;
        let grn = fetch(&mut tx, grn_id).await?;
        ensure_editable(&grn.grn_number, grn.status)?;

        let item = insert_item(&mut tx, grn_id, line).await?;
        refresh_total(&mut tx, grn_id).await?;
        workflow::touch(&mut tx, TABLE, grn_id).await?;
        tx.commit().await?;
        Ok(item)
    }

    /// Removes a line from a pending GRN.
    pub async fn remove_item(&self, grn_id: &str, item_id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let grn = fetch(&mut tx, grn_id).await?;
        ensure_editable(&grn.grn_number, grn.status)?;

        let result = sqlx::query("DELETE FROM grn_items WHERE id = ?1 AND grn_id = ?2")
            .bind(item_id)
            .bind(grn_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::not_found("GRN item", item_id));
        }

        refresh_total(&mut tx, grn_id).await?;
        workflow::touch(&mut tx, TABLE, grn_id).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<GoodsReceivedNote>> {
        let grn = sqlx::query_as::<_, GoodsReceivedNote>(
            "SELECT * FROM goods_received_notes WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(grn)
    }

    pub async fn get_by_number(&self, grn_number: &str) -> DbResult<Option<GoodsReceivedNote>> {
        let grn = sqlx::query_as::<_, GoodsReceivedNote>(
            "SELECT * FROM goods_received_notes WHERE grn_number = ?1",
        )
        .bind(grn_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(grn)
    }

    pub async fn get_items(&self, grn_id: &str) -> DbResult<Vec<GrnItem>> {
        let mut conn = self.pool.acquire().await?;
        items(&mut conn, grn_id).await
    }

    /// GRNs newest first, optionally filtered by status.
    pub async fn list(&self, status: Option<DocumentStatus>) -> DbResult<Vec<GoodsReceivedNote>> {
        let grns = sqlx::query_as::<_, GoodsReceivedNote>(
            r#"
            SELECT * FROM goods_received_notes
            WHERE ?1 IS NULL OR status = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(grns)
    }

    /// Receives every line into stock and marks the GRN posted.
    pub async fn post(&self, id: &str, user_id: &str) -> DbResult<GoodsReceivedNote> {
        let mut tx = self.pool.begin().await?;
        let grn = fetch(&mut tx, id).await?;
        let lines = items(&mut tx, id).await?;
        workflow::ensure_postable(&grn.grn_number, grn.status, lines.len())?;

        for line in &lines {
            let batch = inventory::find_or_create_batch(
                &mut tx,
                &line.product_id,
                &grn.location_id,
                &line.batch_number,
                line.expiry_date,
                line.unit_cost_cents,
            )
            .await?;

            inventory::apply_delta(
                &mut tx,
                StockChange {
                    product_id: &line.product_id,
                    location_id: &grn.location_id,
                    batch_id: Some(&batch.id),
                    delta: line.received_quantity(),
                    reason: MovementReason::GoodsReceived,
                    reference_type: reference::GOODS_RECEIVED,
                    reference_id: &grn.id,
                    user_id,
                },
            )
            .await?;

            sqlx::query("UPDATE grn_items SET batch_id = ?1 WHERE id = ?2")
                .bind(&batch.id)
                .bind(&line.id)
                .execute(&mut *tx)
                .await?;

            product::set_cost(&mut tx, &line.product_id, line.unit_cost_cents, user_id).await?;
        }

        workflow::set_status(&mut tx, TABLE, id, DocumentStatus::Posted, user_id).await?;
        let grn = fetch(&mut tx, id).await?;
        tx.commit().await?;

        info!(grn = %grn.grn_number, lines = lines.len(), total = grn.total_cents, "GRN posted");
        Ok(grn)
    }

    pub async fn cancel(&self, id: &str, user_id: &str) -> DbResult<GoodsReceivedNote> {
        let mut tx = self.pool.begin().await?;
        let grn = fetch(&mut tx, id).await?;

        workflow::cancel(
            &mut tx,
            TABLE,
            reference::GOODS_RECEIVED,
            &grn.grn_number,
            id,
            grn.status,
            user_id,
        )
        .await?;

        let grn = fetch(&mut tx, id).await?;
        tx.commit().await?;
        Ok(grn)
    }
}

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<GoodsReceivedNote> {
    sqlx::query_as::<_, GoodsReceivedNote>("SELECT * FROM goods_received_notes WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("GRN", id))
}

async fn items(conn: &mut SqliteConnection, grn_id: &str) -> DbResult<Vec<GrnItem>> {
    let items = sqlx::query_as::<_, GrnItem>("SELECT * FROM grn_items WHERE grn_id = ?1 ORDER BY rowid")
        .bind(grn_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(items)
}

async fn insert_item(conn: &mut SqliteConnection, grn_id: &str, line: &NewGrnLine) -> DbResult<GrnItem> {
    product::fetch_active(conn, &line.product_id).await?.ensure_tracked()?;

    let batch_number = line.batch_number.trim();
    if batch_number.is_empty() {
        return Err(ValidationError::required("batch_number").into());
    }
    validate_document_quantity("quantity", line.quantity)?;
    if !(0..=MAX_DOCUMENT_QUANTITY).contains(&line.free_quantity) {
        return Err(ValidationError::OutOfRange {
            field: "free_quantity".to_string(),
            min: 0,
            max: MAX_DOCUMENT_QUANTITY,
        }
        .into());
    }
    validate_document_quantity("received_quantity", line.quantity + line.free_quantity)?;
    let line_total = grn_line_total(
        line.quantity,
        Money::from_cents(line.unit_cost_cents),
        Money::from_cents(line.discount_cents),
    )?;

    let item = GrnItem {
        id: new_id(),
        grn_id: grn_id.to_string(),
        product_id: line.product_id.clone(),
        batch_number: batch_number.to_string(),
        expiry_date: line.expiry_date,
        quantity: line.quantity,
        free_quantity: line.free_quantity,
        unit_cost_cents: line.unit_cost_cents,
        discount_cents: line.discount_cents,
        line_total_cents: line_total.cents(),
        batch_id: None,
    };

    debug!(grn_id = %grn_id, product_id = %item.product_id, quantity = item.quantity, "Adding GRN line");

    sqlx::query(
        r#"
        INSERT INTO grn_items (
            id, grn_id, product_id, batch_number, expiry_date, quantity, free_quantity,
            unit_cost_cents, discount_cents, line_total_cents
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&item.id)
    .bind(&item.grn_id)
    .bind(&item.product_id)
    .bind(&item.batch_number)
    .bind(item.expiry_date)
    .bind(item.quantity)
    .bind(item.free_quantity)
    .bind(item.unit_cost_cents)
    .bind(item.discount_cents)
    .bind(item.line_total_cents)
    .execute(&mut *conn)
    .await?;

    Ok(item)
}

async fn refresh_total(conn: &mut SqliteConnection, grn_id: &str) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE goods_received_notes
        SET total_cents = (SELECT COALESCE(SUM(line_total_cents), 0) FROM grn_items WHERE grn_id = ?1)
        WHERE id = ?1
        "#,
    )
    .bind(grn_id)
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
    use crate::repository::NewPayment;
    use crate::testing::{insert_product, location, product, supplier, test_db};
    use crate::Database;
    use tillstone_core::{Cart, CoreError, Location, PaymentMethod, Product, TaxMode};

    fn line(product_id: &str, batch: &str, quantity: i64, free: i64, cost: i64) -> NewGrnLine {
        NewGrnLine {
            product_id: product_id.to_string(),
            batch_number: batch.to_string(),
            expiry_date: NaiveDate::from_ymd_opt(2027, 6, 30),
            quantity,
            free_quantity: free,
            unit_cost_cents: cost,
            discount_cents: 0,
        }
    }

    async fn sell(db: &Database, loc: &Location, product: &Product, qty: i64) {
        let mut cart = Cart::new();
        cart.add_item(product, qty).unwrap();
        let sale = db
            .sales()
            .create_from_cart(&cart, &loc.id, TaxMode::Exclusive, "cashier", "till-01")
            .await
            .unwrap();
        db.sales()
            .add_payment(
                &sale.id,
                &NewPayment {
                    method: PaymentMethod::Card,
                    amount_cents: sale.total_cents,
                    tendered_cents: None,
                    reference: None,
                },
            )
            .await
            .unwrap();
        db.sales().finalize(&sale.id, "cashier").await.unwrap();
    }

    fn grn(supplier_id: &str, location_id: &str, lines: Vec<NewGrnLine>) -> NewGrn {
        NewGrn {
            supplier_id: supplier_id.to_string(),
            location_id: location_id.to_string(),
            supplier_invoice: Some("INV-778".to_string()),
            received_date: None,
            notes: None,
            lines,
        }
    }

    #[tokio::test]
    async fn test_post_receives_free_units_and_updates_cost() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let sup = supplier(&db, "ACME").await;
        let milk = insert_product(&db, "MILK-1L", 250).await;

        let repo = db.goods_received();
        let created = repo
            .create(&grn(&sup.id, &loc.id, vec![line(&milk.id, "B-100", 10, 2, 110)]), "clerk")
            .await
            .unwrap();
        assert_eq!(created.status, DocumentStatus::Pending);
        assert_eq!(created.total_cents, 1100);
        assert!(created.grn_number.starts_with("GRN-"));

        let posted = repo.post(&created.id, "manager").await.unwrap();
        assert_eq!(posted.status, DocumentStatus::Posted);
        assert_eq!(posted.trail.posted_by.as_deref(), Some("manager"));

        let inv = db.inventory();
        assert_eq!(inv.stock_level(&milk.id, &loc.id).await.unwrap(), 12);
        let batches = inv.batches(&milk.id, &loc.id, false).await.unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].quantity, 12);
        assert_eq!(batches[0].batch_number, "B-100");

        let product = db.products().get_by_id(&milk.id).await.unwrap().unwrap();
        assert_eq!(product.cost_cents, 110);

        let items = repo.get_items(&created.id).await.unwrap();
        assert_eq!(items[0].batch_id.as_deref(), Some(batches[0].id.as_str()));
    }

    #[tokio::test]
    async fn test_same_batch_number_tops_up_existing_batch() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let sup = supplier(&db, "ACME").await;
        let p = insert_product(&db, "RICE-5KG", 900).await;

        let repo = db.goods_received();
        for _ in 0..2 {
            let g = repo
                .create(&grn(&sup.id, &loc.id, vec![line(&p.id, "LOT-7", 5, 0, 600)]), "clerk")
                .await
                .unwrap();
            repo.post(&g.id, "clerk").await.unwrap();
        }

        let batches = db.inventory().batches(&p.id, &loc.id, false).await.unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].quantity, 10);
    }

    #[tokio::test]
    async fn test_lines_locked_after_post() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let sup = supplier(&db, "ACME").await;
        let p = insert_product(&db, "SOAP", 150).await;

        let repo = db.goods_received();
        let g = repo.create(&grn(&sup.id, &loc.id, vec![]), "clerk").await.unwrap();

        // Nothing to post yet
        let err = repo.post(&g.id, "clerk").await.unwrap_err();
        assert!(err.is_rule(|e| matches!(e, CoreError::EmptyDocument { .. })));

        let item = repo.add_item(&g.id, &line(&p.id, "S1", 4, 0, 80)).await.unwrap();
        repo.remove_item(&g.id, &item.id).await.unwrap();
        repo.add_item(&g.id, &line(&p.id, "S1", 4, 0, 80)).await.unwrap();
        assert_eq!(repo.get(&g.id).await.unwrap().unwrap().total_cents, 320);

        repo.post(&g.id, "clerk").await.unwrap();
        let err = repo.add_item(&g.id, &line(&p.id, "S2", 1, 0, 80)).await.unwrap_err();
        assert!(err.is_rule(|e| matches!(e, CoreError::DocumentLocked { .. })));

        let err = repo.post(&g.id, "clerk").await.unwrap_err();
        assert!(err.is_rule(|e| matches!(e, CoreError::InvalidDocumentTransition { .. })));
    }

    #[tokio::test]
    async fn test_cancel_posted_reverses_stock() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let sup = supplier(&db, "ACME").await;
        let p = insert_product(&db, "OIL", 700).await;

        let repo = db.goods_received();
        let g = repo
            .create(&grn(&sup.id, &loc.id, vec![line(&p.id, "O-1", 6, 0, 400)]), "clerk")
            .await
            .unwrap();
        repo.post(&g.id, "clerk").await.unwrap();

        let cancelled = repo.cancel(&g.id, "manager").await.unwrap();
        assert_eq!(cancelled.status, DocumentStatus::Cancelled);
        assert_eq!(cancelled.trail.cancelled_by.as_deref(), Some("manager"));

        let inv = db.inventory();
        assert_eq!(inv.stock_level(&p.id, &loc.id).await.unwrap(), 0);
        assert!(inv.ledger_balances(&p.id, &loc.id).await.unwrap());

        // Cancelled is terminal
        assert!(repo.cancel(&g.id, "manager").await.is_err());
        assert!(repo.post(&g.id, "manager").await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_fails_once_goods_are_sold() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let sup = supplier(&db, "ACME").await;
        let p = insert_product(&db, "JUICE", 300).await;

        let repo = db.goods_received();
        let g = repo
            .create(&grn(&sup.id, &loc.id, vec![line(&p.id, "J-1", 3, 0, 150)]), "clerk")
            .await
            .unwrap();
        repo.post(&g.id, "clerk").await.unwrap();
        sell(&db, &loc, &p, 2).await;

        let err = repo.cancel(&g.id, "manager").await.unwrap_err();
        assert!(err.is_rule(|e| matches!(e, CoreError::InsufficientStock { .. })));

        // Rolled back: still posted, stock untouched
        let g = repo.get(&g.id).await.unwrap().unwrap();
        assert_eq!(g.status, DocumentStatus::Posted);
        assert_eq!(db.inventory().stock_level(&p.id, &loc.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cancel_after_sale_goes_negative_when_allowed() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let sup = supplier(&db, "ACME").await;
        let mut p = insert_product(&db, "JUICE", 300).await;
        p.allow_negative_stock = true;
        let p = db.products().update(&p, "admin").await.unwrap();

        let repo = db.goods_received();
        let g = repo
            .create(&grn(&sup.id, &loc.id, vec![line(&p.id, "J-1", 3, 0, 150)]), "clerk")
            .await
            .unwrap();
        repo.post(&g.id, "clerk").await.unwrap();
        sell(&db, &loc, &p, 2).await;

        let cancelled = repo.cancel(&g.id, "manager").await.unwrap();
        assert_eq!(cancelled.status, DocumentStatus::Cancelled);

        // The one unit left in J-1 comes out of the batch, the other two off the level
        let inv = db.inventory();
        assert_eq!(inv.stock_level(&p.id, &loc.id).await.unwrap(), -2);
        let batches = inv.batches(&p.id, &loc.id, true).await.unwrap();
        assert_eq!(batches[0].quantity, 0);
        assert!(inv.ledger_balances(&p.id, &loc.id).await.unwrap());

        let reversal: Vec<i64> = inv
            .movements_for(reference::GOODS_RECEIVED, &g.id)
            .await
            .unwrap()
            .iter()
            .filter(|m| m.reason == MovementReason::Reversal)
            .map(|m| m.delta)
            .collect();
        assert_eq!(reversal, vec![-1, -2]);
    }

    #[tokio::test]
    async fn test_line_quantities_are_bounded() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let sup = supplier(&db, "ACME").await;
        let p = insert_product(&db, "FLOUR", 200).await;

        let repo = db.goods_received();
        let err = repo
            .create(&grn(&sup.id, &loc.id, vec![line(&p.id, "F-1", i64::MAX / 10, 0, 100)]), "clerk")
            .await
            .unwrap_err();
        assert!(err.is_rule(|e| matches!(
            e,
            CoreError::Validation(ValidationError::OutOfRange { max: MAX_DOCUMENT_QUANTITY, .. })
        )));

        // Paid and free units together stay under the cap
        let err = repo
            .create(
                &grn(&sup.id, &loc.id, vec![line(&p.id, "F-1", MAX_DOCUMENT_QUANTITY, 1, 100)]),
                "clerk",
            )
            .await
            .unwrap_err();
        assert!(err.is_rule(|e| matches!(e, CoreError::Validation(ValidationError::OutOfRange { .. }))));

        // In range but the charged amount does not fit
        let err = repo
            .create(&grn(&sup.id, &loc.id, vec![line(&p.id, "F-1", 1_000, 0, i64::MAX / 10)]), "clerk")
            .await
            .unwrap_err();
        assert!(err.is_rule(|e| matches!(e, CoreError::Validation(ValidationError::OutOfRange { .. }))));

        assert!(repo.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_untracked_product_cannot_be_received() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let sup = supplier(&db, "ACME").await;
        let mut delivery = product("DELIVERY", 500);
        delivery.track_inventory = false;
        db.products().insert(&delivery).await.unwrap();

        let err = db
            .goods_received()
            .create(&grn(&sup.id, &loc.id, vec![line(&delivery.id, "D-1", 1, 0, 100)]), "clerk")
            .await
            .unwrap_err();
        assert!(err.is_rule(|e| matches!(e, CoreError::Validation(ValidationError::InvalidFormat { .. }))));
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let sup = supplier(&db, "ACME").await;
        let p = insert_product(&db, "TEA", 450).await;

        let repo = db.goods_received();
        let a = repo
            .create(&grn(&sup.id, &loc.id, vec![line(&p.id, "T1", 1, 0, 200)]), "clerk")
            .await
            .unwrap();
        repo.create(&grn(&sup.id, &loc.id, vec![]), "clerk").await.unwrap();
        repo.post(&a.id, "clerk").await.unwrap();

        assert_eq!(repo.list(None).await.unwrap().len(), 2);
        let posted = repo.list(Some(DocumentStatus::Posted)).await.unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].id, a.id);
    }
}
