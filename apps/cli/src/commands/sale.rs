//! # Sale Commands
//!
//! Checkout, payment, completion and voiding.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   cart ──checkout──► Draft ──add_payment (×n)──► paid in full          │
//! │                        │                              │                 │
//! │                        │                          finalize              │
//! │                        │                              ▼                 │
//! │                        │                         Completed ──► receipt  │
//! │                        │                              │                 │
//! │                        └────────── void ──────────────┴──► Voided       │
//! │                                                                         │
//! │   Stock leaves the shelf only at finalize; void of a completed sale    │
//! │   puts it back.                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use tillstone_core::{Payment, PaymentMethod, Sale, SaleItem, SaleStatus};
use tillstone_db::NewPayment;
use tracing::{debug, info};

use crate::commands::user::ensure_supervisor;
use crate::commands::{found, parse_date, parse_method};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleResponse {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub payments: Vec<Payment>,
    pub paid_cents: i64,
    pub remaining_cents: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPaymentRequest {
    pub sale_id: String,
    /// cash, card, voucher or store_credit
    pub method: String,
    /// Defaults to the amount still due
    pub amount_cents: Option<i64>,
    /// Cash handed over
    pub tendered_cents: Option<i64>,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPaymentResponse {
    pub payment: Payment,
    pub total_paid_cents: i64,
    pub remaining_cents: i64,
    pub change_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptResponse {
    pub sale_id: String,
    pub receipt_number: String,
    pub status: String,
    pub store_name: String,
    pub store_address: Vec<String>,
    pub timestamp: String,
    pub items: Vec<ReceiptItem>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub payments: Vec<ReceiptPayment>,
    pub change_cents: i64,
    /// Receipt rendered for a text printer
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptItem {
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_cents: i64,
    pub line_total_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptPayment {
    pub method: String,
    pub amount_cents: i64,
}

/// Finds a sale by id or receipt number.
pub(crate) async fn find_sale(state: &AppState, key: &str) -> ApiResult<Sale> {
    let sales = state.database().sales();
    if let Some(sale) = sales.get_by_id(key).await? {
        return Ok(sale);
    }
    found(sales.get_by_receipt(key).await?, "Sale", key)
}

pub(crate) async fn sale_response(state: &AppState, sale: Sale) -> ApiResult<SaleResponse> {
    let sales = state.database().sales();
    let items = sales.get_items(&sale.id).await?;
    let payments = sales.get_payments(&sale.id).await?;
    let paid_cents: i64 = payments.iter().map(|p| p.amount_cents).sum();
    Ok(SaleResponse {
        remaining_cents: (sale.total_cents - paid_cents).max(0),
        sale,
        items,
        payments,
        paid_cents,
    })
}

pub async fn get_sale(state: &AppState, key: &str) -> ApiResult<SaleResponse> {
    debug!(key = %key, "get_sale command");
    let sale = find_sale(state, key).await?;
    sale_response(state, sale).await
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSalesRequest {
    /// First day, YYYY-MM-DD. Defaults to today (UTC).
    pub from: Option<String>,
    /// Last day, inclusive. Defaults to `from`.
    pub to: Option<String>,
}

/// Sales of every status created in a day range.
pub async fn list_sales(state: &AppState, request: ListSalesRequest) -> ApiResult<Vec<Sale>> {
    let from = match request.from.as_deref() {
        Some(value) => parse_date("from", value)?,
        None => chrono::Utc::now().date_naive(),
    };
    let to = match request.to.as_deref() {
        Some(value) => parse_date("to", value)?,
        None => from,
    };
    if to < from {
        return Err(ApiError::validation("to must not be before from"));
    }
    debug!(%from, %to, "list_sales command");

    Ok(state.database().sales().list_by_date(from, to).await?)
}

/// Turns the cart into a draft sale and empties the cart.
pub async fn checkout(state: &AppState) -> ApiResult<SaleResponse> {
    debug!("checkout command");

    let cart = state.cart.snapshot().await;
    if cart.is_empty() {
        return Err(ApiError::cart("Cart is empty"));
    }

    let sale = state
        .database()
        .sales()
        .create_from_cart(
            &cart,
            &state.location_id,
            state.config.tax_mode,
            &state.user_id,
            &state.config.device_id,
        )
        .await?;

    state.cart.clear().await?;
    info!(sale_id = %sale.id, receipt = %sale.receipt_number, total = sale.total_cents, "Checked out");

    sale_response(state, sale).await
}

/// Records a payment. Without an amount, pays whatever is still due.
pub async fn add_payment(state: &AppState, request: AddPaymentRequest) -> ApiResult<AddPaymentResponse> {
    debug!(sale_id = %request.sale_id, method = %request.method, "add_payment command");

    let method = parse_method(&request.method)?;
    let sale = find_sale(state, &request.sale_id).await?;
    let sales = state.database().sales();

    let paid = sales.get_total_paid(&sale.id).await?;
    let amount_cents = request
        .amount_cents
        .unwrap_or(sale.total_cents - paid);

    let payment = sales
        .add_payment(
            &sale.id,
            &NewPayment {
                method,
                amount_cents,
                tendered_cents: request.tendered_cents,
                reference: request.reference,
            },
        )
        .await?;

    let total_paid_cents = paid + payment.amount_cents;
    Ok(AddPaymentResponse {
        change_cents: payment.change_cents.unwrap_or(0),
        remaining_cents: (sale.total_cents - total_paid_cents).max(0),
        total_paid_cents,
        payment,
    })
}

/// Takes `offered_cents` in `method` the way a cashier does: cash above
/// the amount due is tendered and the difference handed back as change;
/// anything else pays up to what is due. Without an amount, pays it all.
pub async fn tender(
    state: &AppState,
    sale_id: &str,
    method: &str,
    offered_cents: Option<i64>,
) -> ApiResult<AddPaymentResponse> {
    let payment_method = parse_method(method)?;
    let sale = find_sale(state, sale_id).await?;
    let due = sale.total_cents - state.database().sales().get_total_paid(&sale.id).await?;

    let (amount_cents, tendered_cents) = match offered_cents {
        None => (due, None),
        Some(offered) if payment_method == PaymentMethod::Cash => (offered.min(due), Some(offered)),
        Some(offered) => (offered.min(due), None),
    };

    add_payment(
        state,
        AddPaymentRequest {
            sale_id: sale.id,
            method: method.to_string(),
            amount_cents: Some(amount_cents),
            tendered_cents,
            reference: None,
        },
    )
    .await
}

/// Completes a paid draft sale and returns its receipt.
pub async fn finalize_sale(state: &AppState, sale_id: &str) -> ApiResult<ReceiptResponse> {
    debug!(sale_id = %sale_id, "finalize_sale command");
    let sale = find_sale(state, sale_id).await?;
    let sale = state
        .database()
        .sales()
        .finalize(&sale.id, &state.user_id)
        .await?;
    receipt(state, sale).await
}

/// Receipt of any sale, looked up by id or receipt number.
pub async fn get_receipt(state: &AppState, key: &str) -> ApiResult<ReceiptResponse> {
    debug!(key = %key, "get_receipt command");
    let sale = find_sale(state, key).await?;
    receipt(state, sale).await
}

/// Voids a sale. A completed sale can only be voided by a supervisor.
pub async fn void_sale(state: &AppState, key: &str) -> ApiResult<SaleResponse> {
    debug!(key = %key, "void_sale command");
    let sale = find_sale(state, key).await?;
    if sale.status == SaleStatus::Completed {
        ensure_supervisor(state).await?;
    }
    let sale = state
        .database()
        .sales()
        .void(&sale.id, &state.user_id)
        .await?;
    sale_response(state, sale).await
}

async fn receipt(state: &AppState, sale: Sale) -> ApiResult<ReceiptResponse> {
    let SaleResponse { sale, items, payments, .. } = sale_response(state, sale).await?;
    let config = &state.config;

    let items: Vec<ReceiptItem> = items
        .into_iter()
        .map(|item| ReceiptItem {
            name: item.name_snapshot,
            quantity: item.quantity,
            unit_price_cents: item.unit_price_cents,
            discount_cents: item.discount_cents,
            line_total_cents: item.line_total_cents,
        })
        .collect();
    let change_cents: i64 = payments.iter().filter_map(|p| p.change_cents).sum();
    let payments: Vec<ReceiptPayment> = payments
        .into_iter()
        .map(|p| ReceiptPayment {
            method: format!("{:?}", p.method),
            amount_cents: p.amount_cents,
        })
        .collect();

    let timestamp = sale
        .completed_at
        .unwrap_or(sale.created_at)
        .format("%Y-%m-%d %H:%M")
        .to_string();

    let mut lines = vec![config.store_name.clone()];
    lines.extend(config.store_address.iter().cloned());
    lines.push(format!("Receipt {}  {}", sale.receipt_number, timestamp));
    for item in &items {
        lines.push(format!(
            "{} x{}  {}",
            item.name,
            item.quantity,
            config.format_currency(item.line_total_cents)
        ));
    }
    lines.push(format!("Subtotal  {}", config.format_currency(sale.subtotal_cents)));
    if sale.discount_cents > 0 {
        lines.push(format!("Discount  -{}", config.format_currency(sale.discount_cents)));
    }
    lines.push(format!("Tax  {}", config.format_currency(sale.tax_cents)));
    lines.push(format!("TOTAL  {}", config.format_currency(sale.total_cents)));
    for payment in &payments {
        lines.push(format!("{}  {}", payment.method, config.format_currency(payment.amount_cents)));
    }
    if change_cents > 0 {
        lines.push(format!("Change  {}", config.format_currency(change_cents)));
    }

    Ok(ReceiptResponse {
        sale_id: sale.id,
        receipt_number: sale.receipt_number,
        status: sale.status.as_str().to_string(),
        store_name: config.store_name.clone(),
        store_address: config.store_address.clone(),
        timestamp,
        items,
        subtotal_cents: sale.subtotal_cents,
        discount_cents: sale.discount_cents,
        tax_cents: sale.tax_cents,
        total_cents: sale.total_cents,
        payments,
        change_cents,
        lines,
    })
}
