//! # Reports
//!
//! Read-only aggregates for the back office.
//!
//! ```text
//! ┌──────────────────┬──────────────────────────────────────────────────┐
//! │ daily_summary    │ completed sales of one UTC day, refunds issued   │
//! │                  │ that day, takings per payment method             │
//! │ stock_valuation  │ batch quantity × batch cost, plus unbatched      │
//! │                  │ units at the product's current cost              │
//! │ low_stock        │ tracked products at or below reorder level       │
//! └──────────────────┴──────────────────────────────────────────────────┘
//! ```

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use super::sale::day_start;
use crate::error::DbResult;
use tillstone_core::PaymentMethod;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub date: NaiveDate,
    pub sale_count: i64,
    pub gross_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub refund_count: i64,
    pub refunds_cents: i64,
    /// Gross takings minus refunds.
    pub net_cents: i64,
    pub voided_count: i64,
    pub by_method: Vec<MethodTotal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MethodTotal {
    pub method: PaymentMethod,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StockValuationRow {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub value_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LowStockRow {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub reorder_level: i64,
}

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    pub async fn daily_summary(&self, date: NaiveDate) -> DbResult<DailySummary> {
        daily_summary(&self.pool, date).await
    }

    /// Value of the stock held at a location, highest first.
    pub async fn stock_valuation(&self, location_id: &str) -> DbResult<Vec<StockValuationRow>> {
        let rows = sqlx::query_as::<_, StockValuationRow>(
            r#"
            SELECT
                p.id AS product_id,
                p.sku,
                p.name,
                s.quantity,
                COALESCE(b.batch_value, 0)
                    + MAX(s.quantity - COALESCE(b.batch_quantity, 0), 0) * p.cost_cents AS value_cents
            FROM stock_levels s
            JOIN products p ON p.id = s.product_id
            LEFT JOIN (
                SELECT product_id, SUM(quantity) AS batch_quantity, SUM(quantity * cost_cents) AS batch_value
                FROM batches
                WHERE location_id = ?1
                GROUP BY product_id
            ) b ON b.product_id = s.product_id
            WHERE s.location_id = ?1 AND s.quantity > 0
            ORDER BY value_cents DESC, p.name
            "#,
        )
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn low_stock(&self, location_id: &str) -> DbResult<Vec<LowStockRow>> {
        let rows = sqlx::query_as::<_, LowStockRow>(
            r#"
            SELECT
                p.id AS product_id,
                p.sku,
                p.name,
                COALESCE(s.quantity, 0) AS quantity,
                p.reorder_level
            FROM products p
            LEFT JOIN stock_levels s ON s.product_id = p.id AND s.location_id = ?1
            WHERE p.deleted_at IS NULL
            AND p.track_inventory = 1
            AND COALESCE(s.quantity, 0) <= p.reorder_level
            ORDER BY quantity, p.name
            "#,
        )
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// Totals for one UTC day.
async fn daily_summary(pool: &SqlitePool, date: NaiveDate) -> DbResult<DailySummary> {
    let from = day_start(date);
    let to = day_start(date + Duration::days(1));

    let (sale_count, gross_cents, tax_cents, discount_cents): (i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(SUM(total_cents), 0), COALESCE(SUM(tax_cents), 0),
               COALESCE(SUM(discount_cents), 0)
        FROM sales
        WHERE status = 'completed' AND completed_at >= ?1 AND completed_at < ?2
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await?;

    let voided_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sales WHERE status = 'voided' AND updated_at >= ?1 AND updated_at < ?2",
    )
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await?;

    let (refund_count, refunds_cents): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(total_cents), 0) FROM refunds WHERE created_at >= ?1 AND created_at < ?2",
    )
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await?;

    let by_method = sqlx::query_as::<_, MethodTotal>(
        r#"
        SELECT p.method, SUM(p.amount_cents) AS amount_cents
        FROM payments p
        JOIN sales s ON s.id = p.sale_id
        WHERE s.status = 'completed' AND s.completed_at >= ?1 AND s.completed_at < ?2
        GROUP BY p.method
        ORDER BY p.method
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    Ok(DailySummary {
        date,
        sale_count,
        gross_cents,
        tax_cents,
        discount_cents,
        refund_count,
        refunds_cents,
        net_cents: gross_cents - refunds_cents,
        voided_count,
        by_method,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{NewGrn, NewGrnLine, NewPayment, RefundLine, RefundRequest};
    use crate::testing::{insert_product, location, stocked_product, supplier, test_db};
    use chrono::Utc;
    use tillstone_core::{Cart, TaxMode};

    #[tokio::test]
    async fn test_daily_summary_nets_refunds() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let p = stocked_product(&db, "COLA", 200, &loc, 20).await;

        let mut cart = Cart::new();
        cart.add_item(&p, 5).unwrap();
        let sales = db.sales();
        let sale = sales
            .create_from_cart(&cart, &loc.id, TaxMode::Exclusive, "cashier", "till-01")
            .await
            .unwrap();
        sales
            .add_payment(
                &sale.id,
                &NewPayment {
                    method: PaymentMethod::Cash,
                    amount_cents: 1000,
                    tendered_cents: Some(1000),
                    reference: None,
                },
            )
            .await
            .unwrap();
        sales.finalize(&sale.id, "cashier").await.unwrap();

        let item = &sales.get_items(&sale.id).await.unwrap()[0];
        db.refunds()
            .refund(
                &RefundRequest {
                    sale_id: sale.id.clone(),
                    lines: vec![RefundLine {
                        sale_item_id: item.id.clone(),
                        quantity: 1,
                        restock: true,
                    }],
                    reason: None,
                    method: PaymentMethod::Cash,
                },
                "cashier",
            )
            .await
            .unwrap();

        let summary = db.reports().daily_summary(Utc::now().date_naive()).await.unwrap();
        assert_eq!(summary.sale_count, 1);
        assert_eq!(summary.gross_cents, 1000);
        assert_eq!(summary.refunds_cents, 200);
        assert_eq!(summary.net_cents, 800);
        assert_eq!(
            summary.by_method,
            vec![MethodTotal {
                method: PaymentMethod::Cash,
                amount_cents: 1000
            }]
        );

        let yesterday = db
            .reports()
            .daily_summary(Utc::now().date_naive() - Duration::days(1))
            .await
            .unwrap();
        assert_eq!(yesterday.sale_count, 0);
    }

    #[tokio::test]
    async fn test_valuation_uses_batch_cost() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        let sup = supplier(&db, "ACME").await;
        // cost 250 from the fixture, 10 level-only units
        let p = stocked_product(&db, "BREAD", 500, &loc, 10).await;

        let grn = db
            .goods_received()
            .create(
                &NewGrn {
                    supplier_id: sup.id.clone(),
                    location_id: loc.id.clone(),
                    supplier_invoice: None,
                    received_date: None,
                    notes: None,
                    lines: vec![NewGrnLine {
                        product_id: p.id.clone(),
                        batch_number: "BR-1".to_string(),
                        expiry_date: None,
                        quantity: 4,
                        free_quantity: 0,
                        unit_cost_cents: 300,
                        discount_cents: 0,
                    }],
                },
                "clerk",
            )
            .await
            .unwrap();
        db.goods_received().post(&grn.id, "clerk").await.unwrap();

        // 4 × 300 in the batch; 10 unbatched at the new product cost 300
        let rows = db.reports().stock_valuation(&loc.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, 14);
        assert_eq!(rows[0].value_cents, 4 * 300 + 10 * 300);
    }

    #[tokio::test]
    async fn test_low_stock_includes_never_stocked() {
        let db = test_db().await;
        let loc = location(&db, "MAIN").await;
        stocked_product(&db, "PLENTY", 100, &loc, 50).await;
        stocked_product(&db, "FEW", 100, &loc, 3).await;
        insert_product(&db, "NONE", 100).await;

        let rows = db.reports().low_stock(&loc.id).await.unwrap();
        let skus: Vec<_> = rows.iter().map(|r| r.sku.as_str()).collect();
        assert_eq!(skus, vec!["NONE", "FEW"]);
    }
}
