//! # Refund Repository
//!
//! Refunds and exchanges against completed sales.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  refund(sale, lines)                         one transaction           │
//! │    ├── sale must be Completed                                          │
//! │    ├── per line: quantity <= sold − already refunded                   │
//! │    ├── amount pro-rated from what the line charged                     │
//! │    │   (the last unit refunds whatever is left of the line)            │
//! │    ├── restock lines → Refund movement into the batch the sale used   │
//! │    └── loyalty points for the refunded amount taken back              │
//! │                                                                         │
//! │  exchange(sale, return lines, new cart)      one transaction           │
//! │    ├── refund (store credit)                                           │
//! │    ├── new sale from the cart                                          │
//! │    ├── store credit payment = min(refund, new total)                   │
//! │    ├── balance payment if the new goods cost more                      │
//! │    ├── finalize the new sale                                           │
//! │    └── Exchange { balance = new total − refund }                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::inventory::{self, reference, StockChange};
use super::party::add_loyalty_points;
use super::sale::{self, loyalty_points, NewPayment};
use super::{new_id, product, sequence};
use crate::error::{DbError, DbResult};
use tillstone_core::document::DocumentKind;
use tillstone_core::pricing::{exchange_balance, refund_line_amount, refundable_quantity};
use tillstone_core::{
    Cart, CoreError, Exchange, Money, MovementReason, PaymentMethod, Refund, RefundItem,
    SaleStatus, ValidationError,
};

fn default_restock() -> bool {
    true
}

/// Units of one sale line being returned.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundLine {
    pub sale_item_id: String,
    pub quantity: i64,
    /// Put the goods back on the shelf. Damaged goods are not restocked.
    #[serde(default = "default_restock")]
    pub restock: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub sale_id: String,
    pub lines: Vec<RefundLine>,
    pub reason: Option<String>,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRequest {
    pub sale_id: String,
    pub return_lines: Vec<RefundLine>,
    pub reason: Option<String>,
    /// Goods the customer takes instead.
    pub new_cart: Cart,
    /// How the customer pays a positive balance.
    pub balance_method: PaymentMethod,
    /// Cash handed over for the balance.
    pub tendered_cents: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct RefundRepository {
    pool: SqlitePool,
}

impl RefundRepository {
    pub fn new(pool: SqlitePool) -> Self {
        RefundRepository { pool }
    }

    /// Refunds part or all of a completed sale.
    pub async fn refund(&self, request: &RefundRequest, user_id: &str) -> DbResult<Refund> {
        let mut tx = self.pool.begin().await?;
        let refund = refund_in(&mut tx, request, user_id).await?;
        tx.commit().await?;

        info!(refund = %refund.refund_number, sale_id = %refund.sale_id, total = refund.total_cents, "Refund issued");
        Ok(refund)
    }

    /// Swaps returned goods for new ones in a single transaction.
    pub async fn exchange(
        &self,
        request: &ExchangeRequest,
        user_id: &str,
        device_id: &str,
    ) -> DbResult<Exchange> {
        let mut tx = self.pool.begin().await?;

        let original = sale::fetch(&mut tx, &request.sale_id).await?;
        let refund = refund_in(
            &mut tx,
            &RefundRequest {
                sale_id: request.sale_id.clone(),
                lines: request.return_lines.clone(),
                reason: request.reason.clone(),
                method: PaymentMethod::StoreCredit,
            },
            user_id,
        )
        .await?;

        let mut cart = request.new_cart.clone();
        if cart.customer_id.is_none() {
            cart.customer_id = original.customer_id.clone();
        }
        let new_sale = sale::insert_draft(
            &mut tx,
            &cart,
            &original.location_id,
            original.tax_mode,
            user_id,
            device_id,
        )
        .await?;

        let credit = refund.total_cents.min(new_sale.total_cents);
        if credit > 0 {
            sale::insert_payment(
                &mut tx,
                &new_sale,
                &NewPayment {
                    method: PaymentMethod::StoreCredit,
                    amount_cents: credit,
                    tendered_cents: None,
                    reference: Some(refund.refund_number.clone()),
                },
            )
            .await?;
        }

        let balance = exchange_balance(refund_total(&refund), new_sale.total());
        if balance.is_positive() {
            sale::insert_payment(
                &mut tx,
                &new_sale,
                &NewPayment {
                    method: request.balance_method,
                    amount_cents: balance.cents(),
                    tendered_cents: request.tendered_cents,
                    reference: None,
                },
            )
            .await?;
        }

        let new_sale = sale::finalize_in(&mut tx, &new_sale.id, user_id).await?;

        let exchange = Exchange {
            id: new_id(),
            exchange_number: sequence::next_document_number(&mut tx, DocumentKind::Exchange).await?,
            original_sale_id: original.id.clone(),
            refund_id: refund.id.clone(),
            new_sale_id: new_sale.id.clone(),
            balance_cents: balance.cents(),
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO exchanges (
                id, exchange_number, original_sale_id, refund_id, new_sale_id,
                balance_cents, user_id, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&exchange.id)
        .bind(&exchange.exchange_number)
        .bind(&exchange.original_sale_id)
        .bind(&exchange.refund_id)
        .bind(&exchange.new_sale_id)
        .bind(exchange.balance_cents)
        .bind(&exchange.user_id)
        .bind(exchange.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            exchange = %exchange.exchange_number,
            new_receipt = %new_sale.receipt_number,
            balance = exchange.balance_cents,
            "Exchange completed"
        );
        Ok(exchange)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Refund>> {
        let refund = sqlx::query_as::<_, Refund>("SELECT * FROM refunds WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(refund)
    }

    pub async fn refunds_for_sale(&self, sale_id: &str) -> DbResult<Vec<Refund>> {
        let refunds = sqlx::query_as::<_, Refund>(
            "SELECT * FROM refunds WHERE sale_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(refunds)
    }

    pub async fn refund_items(&self, refund_id: &str) -> DbResult<Vec<RefundItem>> {
        let items = sqlx::query_as::<_, RefundItem>(
            "SELECT * FROM refund_items WHERE refund_id = ?1 ORDER BY rowid",
        )
        .bind(refund_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    pub async fn get_exchange(&self, id: &str) -> DbResult<Option<Exchange>> {
        let exchange = sqlx::query_as::<_, Exchange>("SELECT * FROM exchanges WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(exchange)
    }
}

fn refund_total(refund: &Refund) -> Money {
    Money::from_cents(refund.total_cents)
}

/// Already refunded (quantity, amount) for a sale line.
async fn refunded_so_far(conn: &mut SqliteConnection, sale_item_id: &str) -> DbResult<(i64, i64)> {
    let row: (i64, i64) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(quantity), 0), COALESCE(SUM(amount_cents), 0)
        FROM refund_items WHERE sale_item_id = ?1
        "#,
    )
    .bind(sale_item_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row)
}

/// Batch the sale last took this product from, if any.
async fn sold_from_batch(
    conn: &mut SqliteConnection,
    sale_id: &str,
    product_id: &str,
) -> DbResult<Option<String>> {
    let batch: Option<Option<String>> = sqlx::query_scalar(
        r#"
        SELECT batch_id FROM stock_movements
        WHERE reference_type = ?1 AND reference_id = ?2 AND product_id = ?3 AND reason = 'sale'
        ORDER BY rowid DESC
        LIMIT 1
        "#,
    )
    .bind(reference::SALE)
    .bind(sale_id)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(batch.flatten())
}

pub(crate) async fn refund_in(
    conn: &mut SqliteConnection,
    request: &RefundRequest,
    user_id: &str,
) -> DbResult<Refund> {
    let sale = sale::fetch(conn, &request.sale_id).await?;
    if sale.status != SaleStatus::Completed {
        return Err(CoreError::InvalidSaleStatus {
            sale_id: sale.receipt_number.clone(),
            current_status: sale.status.to_string(),
        }
        .into());
    }
    if request.lines.is_empty() {
        return Err(ValidationError::required("lines").into());
    }

    let sale_items = sale::items(conn, &sale.id).await?;

    // (quantity, amount) already claimed per sale line, including earlier
    // lines of this request
    let mut claimed: HashMap<String, (i64, i64)> = HashMap::new();
    let mut items = Vec::with_capacity(request.lines.len());

    for line in &request.lines {
        if line.quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }
        let item = sale_items
            .iter()
            .find(|i| i.id == line.sale_item_id)
            .ok_or_else(|| DbError::not_found("Sale item", &line.sale_item_id))?;

        let (done_qty, done_amount) = match claimed.get(&item.id) {
            Some(c) => *c,
            None => refunded_so_far(conn, &item.id).await?,
        };

        let refundable = refundable_quantity(item.quantity, done_qty);
        if line.quantity > refundable {
            return Err(CoreError::RefundExceedsSold {
                sku: item.sku_snapshot.clone(),
                refundable,
                requested: line.quantity,
            }
            .into());
        }

        let amount = refund_line_amount(
            item.charged(sale.tax_mode),
            Money::from_cents(done_amount),
            line.quantity,
            item.quantity,
            done_qty,
        );
        claimed.insert(
            item.id.clone(),
            (done_qty + line.quantity, done_amount + amount.cents()),
        );

        items.push(RefundItem {
            id: new_id(),
            refund_id: String::new(),
            sale_item_id: item.id.clone(),
            product_id: item.product_id.clone(),
            quantity: line.quantity,
            amount_cents: amount.cents(),
            restock: line.restock && product::fetch(conn, &item.product_id).await?.track_inventory,
        });
    }

    let refund = Refund {
        id: new_id(),
        refund_number: sequence::next_document_number(conn, DocumentKind::Refund).await?,
        sale_id: sale.id.clone(),
        reason: request.reason.clone(),
        method: request.method,
        total_cents: items.iter().map(|i| i.amount_cents).sum(),
        user_id: user_id.to_string(),
        created_at: Utc::now(),
    };

    debug!(refund = %refund.refund_number, lines = items.len(), "Inserting refund");

    sqlx::query(
        r#"
        INSERT INTO refunds (id, refund_number, sale_id, reason, method, total_cents, user_id, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&refund.id)
    .bind(&refund.refund_number)
    .bind(&refund.sale_id)
    .bind(&refund.reason)
    .bind(refund.method)
    .bind(refund.total_cents)
    .bind(&refund.user_id)
    .bind(refund.created_at)
    .execute(&mut *conn)
    .await?;

    for item in &mut items {
        item.refund_id = refund.id.clone();
        sqlx::query(
            r#"
            INSERT INTO refund_items (id, refund_id, sale_item_id, product_id, quantity, amount_cents, restock)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&item.id)
        .bind(&item.refund_id)
        .bind(&item.sale_item_id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.amount_cents)
        .bind(item.restock)
        .execute(&mut *conn)
        .await?;

        if item.restock {
            let batch = sold_from_batch(conn, &sale.id, &item.product_id).await?;
            inventory::apply_delta(
                conn,
                StockChange {
                    product_id: &item.product_id,
                    location_id: &sale.location_id,
                    batch_id: batch.as_deref(),
                    delta: item.quantity,
                    reason: MovementReason::Refund,
                    reference_type: reference::REFUND,
                    reference_id: &refund.id,
                    user_id,
                },
            )
            .await?;
        }
    }

    if let Some(customer_id) = &sale.customer_id {
        add_loyalty_points(conn, customer_id, -loyalty_points(refund_total(&refund))).await?;
    }

    Ok(refund)
}

// =============================================================================
// Unit Tests
// =============================================================================
