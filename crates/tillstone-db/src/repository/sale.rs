//! # Sale Repository
//!
//! Database operations for sales, sale items and payments.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CREATE DRAFT                                                       │
//! │     └── create_from_cart() → Sale { status: Draft } + SaleItems        │
//! │         (sku, name, price, tax rate snapshotted per line)              │
//! │                                                                         │
//! │  2. TAKE PAYMENT                                                       │
//! │     └── add_payment() → Payment   (split tender: call again)           │
//! │         cash: change = tendered − amount                               │
//! │                                                                         │
//! │  3. FINALIZE  (one transaction)                                        │
//! │     └── paid >= total?                                                 │
//! │     └── consume stock per line (FEFO)                                  │
//! │     └── loyalty points to the customer                                 │
//! │     └── Sale { status: Completed }                                     │
//! │                                                                         │
//! │  4. (OPTIONAL) VOID                                                    │
//! │     └── Draft: status only                                             │
//! │     └── Completed (no refunds yet): stock back, points back            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::inventory::{self, reference, StockChange};
use super::party::add_loyalty_points;
use super::{new_id, product, sequence};
use crate::error::{DbError, DbResult};
use tillstone_core::pricing::change_due;
use tillstone_core::validation::validate_payment_amount;
use tillstone_core::{
    Cart, CartTotals, CoreError, Money, MovementReason, Payment, PaymentMethod, Sale, SaleItem, SaleStatus,
    TaxMode, LOYALTY_POINTS_PER_UNIT,
};

/// A payment to record against a draft sale.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    pub method: PaymentMethod,
    /// Amount applied to the sale.
    pub amount_cents: i64,
    /// Cash handed over. Only meaningful for cash.
    pub tendered_cents: Option<i64>,
    pub reference: Option<String>,
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sale)
    }

    /// Gets a sale by its printed receipt number.
    pub async fn get_by_receipt(&self, receipt_number: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE receipt_number = ?1")
            .bind(receipt_number.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(sale)
    }

    /// Creates a draft sale from the cart.
    ///
    /// ## Arguments
    /// * `cart` - Lines, customer and cart discount
    /// * `location_id` - Location the stock will come from
    /// * `tax_mode` - Whether cart prices include tax
    /// * `user_id` - Cashier
    /// * `device_id` - POS terminal (drives the receipt number)
    ///
    /// ## Returns
    /// The draft sale with its receipt number.
    pub async fn create_from_cart(
        &self,
        cart: &Cart,
        location_id: &str,
        tax_mode: TaxMode,
        user_id: &str,
        device_id: &str,
    ) -> DbResult<Sale> {
        let mut tx = self.pool.begin().await?;
        let sale = insert_draft(&mut tx, cart, location_id, tax_mode, user_id, device_id).await?;
        tx.commit().await?;

        info!(sale_id = %sale.id, receipt = %sale.receipt_number, total = sale.total_cents, "Draft sale created");
        Ok(sale)
    }

    /// Gets all items for a sale.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let mut conn = self.pool.acquire().await?;
        items(&mut conn, sale_id).await
    }

    /// Records a payment for a draft sale.
    ///
    /// ## Rules
    /// - Sale must be Draft
    /// - Amount must be positive and at most the amount still due
    /// - Cash with a tendered amount gets its change computed
    pub async fn add_payment(&self, sale_id: &str, payment: &NewPayment) -> DbResult<Payment> {
        let mut tx = self.pool.begin().await?;
        let sale = fetch(&mut tx, sale_id).await?;
        let recorded = insert_payment(&mut tx, &sale, payment).await?;
        tx.commit().await?;
        Ok(recorded)
    }

    /// Gets all payments for a sale.
    pub async fn get_payments(&self, sale_id: &str) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE sale_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }

    /// Gets total amount paid for a sale.
    pub async fn get_total_paid(&self, sale_id: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        total_paid(&mut conn, sale_id).await
    }

    /// Completes a fully paid draft sale.
    ///
    /// ## What This Does (one transaction)
    /// 1. Checks the sale is Draft and paid in full
    /// 2. Deducts stock for each line, batches first-expired-first-out
    /// 3. Awards loyalty points to the customer
    /// 4. Marks the sale Completed
    pub async fn finalize(&self, sale_id: &str, user_id: &str) -> DbResult<Sale> {
        let mut tx = self.pool.begin().await?;
        let sale = finalize_in(&mut tx, sale_id, user_id).await?;
        tx.commit().await?;

        info!(sale_id = %sale.id, receipt = %sale.receipt_number, "Sale completed");
        Ok(sale)
    }

    /// Voids a sale.
    ///
    /// A draft just changes status. A completed sale puts every unit back
    /// where it came from and takes back its loyalty points; it cannot be
    /// voided once a refund was issued against it.
    pub async fn void(&self, sale_id: &str, user_id: &str) -> DbResult<Sale> {
        let mut tx = self.pool.begin().await?;
        let sale = fetch(&mut tx, sale_id).await?;

        match sale.status {
            SaleStatus::Draft => {}
            SaleStatus::Completed => {
                let refunds: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM refunds WHERE sale_id = ?1")
                        .bind(sale_id)
                        .fetch_one(&mut *tx)
                        .await?;
                if refunds > 0 {
                    return Err(invalid_status(&sale));
                }

                inventory::reverse_movements(
                    &mut tx,
                    reference::SALE,
                    sale_id,
                    MovementReason::SaleVoid,
                    user_id,
                )
                .await?;

                if let Some(customer_id) = &sale.customer_id {
                    add_loyalty_points(&mut tx, customer_id, -loyalty_points(sale.total())).await?;
                }
            }
            SaleStatus::Voided => return Err(invalid_status(&sale)),
        }

        set_status(&mut tx, sale_id, SaleStatus::Voided).await?;
        let sale = fetch(&mut tx, sale_id).await?;
        tx.commit().await?;

        info!(sale_id = %sale.id, user = %user_id, "Sale voided");
        Ok(sale)
    }

    /// Sales created between `from` and `to` (both inclusive, UTC days).
    pub async fn list_by_date(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT * FROM sales
            WHERE created_at >= ?1 AND created_at < ?2
            ORDER BY created_at
            "#,
        )
        .bind(day_start(from))
        .bind(day_start(to + Duration::days(1)))
        .fetch_all(&self.pool)
        .await?;
        Ok(sales)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

pub(crate) fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::default()).and_utc()
}

/// Points earned (or given back) for an amount.
pub(crate) fn loyalty_points(amount: Money) -> i64 {
    amount.cents().max(0) / 100 * LOYALTY_POINTS_PER_UNIT
}

fn invalid_status(sale: &Sale) -> DbError {
    CoreError::InvalidSaleStatus {
        sale_id: sale.receipt_number.clone(),
        current_status: sale.status.to_string(),
    }
    .into()
}

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Sale> {
    sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| CoreError::SaleNotFound(id.to_string()).into())
}

pub(crate) async fn items(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleItem>> {
    let items = sqlx::query_as::<_, SaleItem>(
        "SELECT * FROM sale_items WHERE sale_id = ?1 ORDER BY created_at, rowid",
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

async fn total_paid(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<i64> {
    let total: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(amount_cents), 0) FROM payments WHERE sale_id = ?1")
            .bind(sale_id)
            .fetch_one(&mut *conn)
            .await?;
    Ok(total)
}

async fn set_status(conn: &mut SqliteConnection, sale_id: &str, status: SaleStatus) -> DbResult<()> {
    sqlx::query("UPDATE sales SET status = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(status)
        .bind(Utc::now())
        .bind(sale_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Writes a draft sale and its snapshotted lines.
pub(crate) async fn insert_draft(
    conn: &mut SqliteConnection,
    cart: &Cart,
    location_id: &str,
    tax_mode: TaxMode,
    user_id: &str,
    device_id: &str,
) -> DbResult<Sale> {
    if cart.is_empty() {
        return Err(CoreError::EmptyCart.into());
    }

    let location_active: Option<bool> =
        sqlx::query_scalar("SELECT deleted_at IS NULL FROM locations WHERE id = ?1")
            .bind(location_id)
            .fetch_optional(&mut *conn)
            .await?;
    if location_active != Some(true) {
        return Err(DbError::not_found("Location", location_id));
    }

    if let Some(customer_id) = &cart.customer_id {
        let active: Option<bool> =
            sqlx::query_scalar("SELECT deleted_at IS NULL FROM customers WHERE id = ?1")
                .bind(customer_id)
                .fetch_optional(&mut *conn)
                .await?;
        if active != Some(true) {
            return Err(DbError::not_found("Customer", customer_id));
        }
    }

    for item in &cart.items {
        product::fetch_active(conn, &item.product_id).await?;
    }

    let lines = cart.priced_lines(tax_mode)?;
    let totals = CartTotals::from_lines(cart, &lines);
    let now = Utc::now();

    let sale = Sale {
        id: new_id(),
        receipt_number: sequence::next_receipt_number(conn, device_id).await?,
        customer_id: cart.customer_id.clone(),
        location_id: location_id.to_string(),
        status: SaleStatus::Draft,
        tax_mode,
        subtotal_cents: totals.subtotal_cents,
        tax_cents: totals.tax_cents,
        discount_cents: totals.discount_cents,
        total_cents: totals.total_cents,
        user_id: user_id.to_string(),
        device_id: device_id.to_string(),
        notes: None,
        created_at: now,
        updated_at: now,
        completed_at: None,
    };

    debug!(sale_id = %sale.id, receipt = %sale.receipt_number, "Inserting draft sale");

    sqlx::query(
        r#"
        INSERT INTO sales (
            id, receipt_number, customer_id, location_id, status, tax_mode,
            subtotal_cents, tax_cents, discount_cents, total_cents,
            user_id, device_id, notes, created_at, updated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.receipt_number)
    .bind(&sale.customer_id)
    .bind(&sale.location_id)
    .bind(sale.status)
    .bind(sale.tax_mode)
    .bind(sale.subtotal_cents)
    .bind(sale.tax_cents)
    .bind(sale.discount_cents)
    .bind(sale.total_cents)
    .bind(&sale.user_id)
    .bind(&sale.device_id)
    .bind(&sale.notes)
    .bind(sale.created_at)
    .execute(&mut *conn)
    .await?;

    for line in &lines {
        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, sale_id, product_id, sku_snapshot, name_snapshot,
                unit_price_cents, quantity, discount_cents, tax_rate_bps,
                tax_cents, line_total_cents, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(new_id())
        .bind(&sale.id)
        .bind(&line.item.product_id)
        .bind(&line.item.sku)
        .bind(&line.item.name)
        .bind(line.item.unit_price_cents)
        .bind(line.item.quantity)
        .bind(line.amounts.discount.cents())
        .bind(line.item.tax_rate_bps)
        .bind(line.amounts.tax.cents())
        .bind(line.amounts.net.cents())
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }

    Ok(sale)
}

/// Records one payment against a draft sale.
pub(crate) async fn insert_payment(
    conn: &mut SqliteConnection,
    sale: &Sale,
    payment: &NewPayment,
) -> DbResult<Payment> {
    if sale.status != SaleStatus::Draft {
        return Err(invalid_status(sale));
    }
    validate_payment_amount(payment.amount_cents)?;

    let due = sale.total_cents - total_paid(conn, &sale.id).await?;
    if payment.amount_cents > due {
        return Err(CoreError::InvalidPaymentAmount {
            reason: format!(
                "{} exceeds amount due {}",
                Money::from_cents(payment.amount_cents),
                Money::from_cents(due)
            ),
        }
        .into());
    }

    let (tendered_cents, change_cents) = match (payment.method, payment.tendered_cents) {
        (PaymentMethod::Cash, Some(tendered)) => {
            let change = change_due(Money::from_cents(payment.amount_cents), Money::from_cents(tendered))?;
            (Some(tendered), Some(change.cents()))
        }
        _ => (None, None),
    };

    let recorded = Payment {
        id: new_id(),
        sale_id: sale.id.clone(),
        method: payment.method,
        amount_cents: payment.amount_cents,
        tendered_cents,
        change_cents,
        reference: payment.reference.clone(),
        created_at: Utc::now(),
    };

    debug!(sale_id = %sale.id, method = ?recorded.method, amount = recorded.amount_cents, "Recording payment");

    sqlx::query(
        r#"
        INSERT INTO payments (
            id, sale_id, method, amount_cents, tendered_cents, change_cents, reference, created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&recorded.id)
    .bind(&recorded.sale_id)
    .bind(recorded.method)
    .bind(recorded.amount_cents)
    .bind(recorded.tendered_cents)
    .bind(recorded.change_cents)
    .bind(&recorded.reference)
    .bind(recorded.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(recorded)
}

/// Completes a draft sale on the caller's transaction.
pub(crate) async fn finalize_in(
    conn: &mut SqliteConnection,
    sale_id: &str,
    user_id: &str,
) -> DbResult<Sale> {
    let sale = fetch(conn, sale_id).await?;
    if sale.status != SaleStatus::Draft {
        return Err(invalid_status(&sale));
    }

    let paid = total_paid(conn, sale_id).await?;
    if paid < sale.total_cents {
        return Err(CoreError::InvalidPaymentAmount {
            reason: format!(
                "paid {} of {}",
                Money::from_cents(paid),
                Money::from_cents(sale.total_cents)
            ),
        }
        .into());
    }

    for item in items(conn, sale_id).await? {
        inventory::consume(
            conn,
            StockChange {
                product_id: &item.product_id,
                location_id: &sale.location_id,
                batch_id: None,
                delta: 0,
                reason: MovementReason::Sale,
                reference_type: reference::SALE,
                reference_id: sale_id,
                user_id,
            },
            item.quantity,
        )
        .await?;
    }

    if let Some(customer_id) = &sale.customer_id {
        add_loyalty_points(conn, customer_id, loyalty_points(sale.total())).await?;
    }

    let now = Utc::now();
    sqlx::query("UPDATE sales SET status = ?1, completed_at = ?2, updated_at = ?2 WHERE id = ?3")
        .bind(SaleStatus::Completed)
        .bind(now)
        .bind(sale_id)
        .execute(&mut *conn)
        .await?;

    fetch(conn, sale_id).await
}

// =============================================================================
// Unit Tests
// =============================================================================
