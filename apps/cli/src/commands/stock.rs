//! # Stock Commands
//!
//! Adjustments, transfers between locations and stock enquiries.
//!
//! ```text
//! adjust     location ──► signed deltas (immediate, no pending state)
//! transfer   from ──► Pending ──post──► to      (batch mirrored at `to`)
//! levels     per location, or per product across locations
//! movements  ledger of a product, or of one document
//! batches    FEFO order; `expiring` looks ahead N days
//! ```

use serde::{Deserialize, Serialize};
use tillstone_core::{
    AdjustmentReason, Batch, StockAdjustment, StockAdjustmentItem, StockLevel, StockMovement,
    StockTransfer, StockTransferItem,
};
use tillstone_db::{NewAdjustmentLine, NewTransferLine};
use tracing::{debug, info};

use crate::commands::product::find_product;
use crate::commands::user::ensure_supervisor;
use crate::commands::{found, parse_status, resolve_location};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Batch id for a batch named by id or batch number, at a location.
pub(crate) async fn resolve_batch(
    state: &AppState,
    product_id: &str,
    location_id: &str,
    key: Option<&str>,
) -> ApiResult<Option<String>> {
    let Some(key) = key.map(str::trim) else {
        return Ok(None);
    };

    let batches = state
        .database()
        .inventory()
        .batches(product_id, location_id, true)
        .await?;
    batches
        .into_iter()
        .find(|b| b.id == key || b.batch_number.eq_ignore_ascii_case(key))
        .map(|b| Some(b.id))
        .ok_or_else(|| ApiError::not_found("Batch", key))
}

fn parse_reason(input: &str) -> ApiResult<AdjustmentReason> {
    match input.trim().to_ascii_lowercase().as_str() {
        "damage" => Ok(AdjustmentReason::Damage),
        "expiry" => Ok(AdjustmentReason::Expiry),
        "theft" => Ok(AdjustmentReason::Theft),
        "count" => Ok(AdjustmentReason::Count),
        "other" => Ok(AdjustmentReason::Other),
        _ => Err(ApiError::validation(
            "reason must be one of: damage, expiry, theft, count, other",
        )),
    }
}

// =============================================================================
// Adjustments
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentLineRequest {
    pub product: String,
    pub batch: Option<String>,
    /// Signed change: negative takes stock away
    pub delta: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustStockRequest {
    pub location: Option<String>,
    /// damage, expiry, theft, count or other
    pub reason: String,
    pub notes: Option<String>,
    pub lines: Vec<AdjustmentLineRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentResponse {
    pub adjustment: StockAdjustment,
    pub items: Vec<StockAdjustmentItem>,
}

/// Corrects stock immediately. Supervisors only.
pub async fn adjust_stock(state: &AppState, request: AdjustStockRequest) -> ApiResult<AdjustmentResponse> {
    debug!(reason = %request.reason, lines = request.lines.len(), "adjust_stock command");

    ensure_supervisor(state).await?;
    let reason = parse_reason(&request.reason)?;
    let location_id = resolve_location(state, request.location.as_deref()).await?;

    let mut lines = Vec::with_capacity(request.lines.len());
    for line in request.lines {
        let product = find_product(state, &line.product).await?;
        let batch_id = resolve_batch(state, &product.id, &location_id, line.batch.as_deref()).await?;
        lines.push(NewAdjustmentLine {
            product_id: product.id,
            batch_id,
            delta: line.delta,
        });
    }

    let adjustments = state.database().adjustments();
    let adjustment = adjustments
        .create(&location_id, reason, &lines, request.notes.as_deref(), &state.user_id)
        .await?;
    let items = adjustments.get_items(&adjustment.id).await?;

    info!(number = %adjustment.adjustment_number, lines = items.len(), "Stock adjusted");
    Ok(AdjustmentResponse { adjustment, items })
}

pub async fn get_adjustment(state: &AppState, id: &str) -> ApiResult<AdjustmentResponse> {
    let adjustments = state.database().adjustments();
    let adjustment = found(adjustments.get(id).await?, "Adjustment", id)?;
    let items = adjustments.get_items(&adjustment.id).await?;
    Ok(AdjustmentResponse { adjustment, items })
}

pub async fn list_adjustments(
    state: &AppState,
    location: Option<&str>,
    limit: Option<u32>,
) -> ApiResult<Vec<StockAdjustment>> {
    let location_id = match location {
        Some(code) => Some(resolve_location(state, Some(code)).await?),
        None => None,
    };
    Ok(state
        .database()
        .adjustments()
        .list(location_id.as_deref(), limit.unwrap_or(50).min(500))
        .await?)
}

// =============================================================================
// Transfers
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferLineRequest {
    pub product: String,
    /// Source batch id or number
    pub batch: Option<String>,
    pub quantity: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferRequest {
    /// Source location; the terminal's location when omitted
    pub from: Option<String>,
    pub to: String,
    pub notes: Option<String>,
    pub lines: Vec<TransferLineRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub transfer: StockTransfer,
    pub items: Vec<StockTransferItem>,
}

async fn transfer_response(state: &AppState, transfer: StockTransfer) -> ApiResult<TransferResponse> {
    let items = state.database().transfers().get_items(&transfer.id).await?;
    Ok(TransferResponse { transfer, items })
}

pub async fn create_transfer(state: &AppState, request: CreateTransferRequest) -> ApiResult<TransferResponse> {
    debug!(from = ?request.from, to = %request.to, "create_transfer command");

    let from_id = resolve_location(state, request.from.as_deref()).await?;
    let to_id = resolve_location(state, Some(&request.to)).await?;

    let mut lines = Vec::with_capacity(request.lines.len());
    for line in request.lines {
        let product = find_product(state, &line.product).await?;
        let batch_id = resolve_batch(state, &product.id, &from_id, line.batch.as_deref()).await?;
        lines.push(NewTransferLine {
            product_id: product.id,
            batch_id,
            quantity: line.quantity,
        });
    }

    let transfer = state
        .database()
        .transfers()
        .create(&from_id, &to_id, &lines, request.notes.as_deref(), &state.user_id)
        .await?;
    transfer_response(state, transfer).await
}

pub async fn get_transfer(state: &AppState, id: &str) -> ApiResult<TransferResponse> {
    let transfer = found(state.database().transfers().get(id).await?, "Transfer", id)?;
    transfer_response(state, transfer).await
}

pub async fn list_transfers(state: &AppState, status: Option<&str>) -> ApiResult<Vec<StockTransfer>> {
    let status = parse_status(status)?;
    Ok(state.database().transfers().list(status).await?)
}

pub async fn post_transfer(state: &AppState, id: &str) -> ApiResult<TransferResponse> {
    let transfer = state.database().transfers().post(id, &state.user_id).await?;
    info!(number = %transfer.transfer_number, "Transfer posted");
    transfer_response(state, transfer).await
}

/// Cancels a transfer. Supervisors only.
pub async fn cancel_transfer(state: &AppState, id: &str) -> ApiResult<TransferResponse> {
    ensure_supervisor(state).await?;
    let transfer = state.database().transfers().cancel(id, &state.user_id).await?;
    transfer_response(state, transfer).await
}

// =============================================================================
// Enquiries
// =============================================================================

/// Stock levels at a location, or of one product across every location.
pub async fn stock_levels(
    state: &AppState,
    location: Option<&str>,
    product: Option<&str>,
) -> ApiResult<Vec<StockLevel>> {
    let inventory = state.database().inventory();
    match product {
        Some(key) => {
            let product = find_product(state, key).await?;
            Ok(inventory.levels_for_product(&product.id).await?)
        }
        None => {
            let location_id = resolve_location(state, location).await?;
            Ok(inventory.stock_levels(&location_id).await?)
        }
    }
}

pub async fn stock_movements(
    state: &AppState,
    product: &str,
    location: Option<&str>,
    limit: Option<u32>,
) -> ApiResult<Vec<StockMovement>> {
    let product = find_product(state, product).await?;
    let location_id = match location {
        Some(code) => Some(resolve_location(state, Some(code)).await?),
        None => None,
    };
    Ok(state
        .database()
        .inventory()
        .movements(&product.id, location_id.as_deref(), limit.unwrap_or(50).min(500))
        .await?)
}

/// Every movement one document or sale caused, reversals included.
pub async fn document_movements(
    state: &AppState,
    reference_type: &str,
    reference_id: &str,
) -> ApiResult<Vec<StockMovement>> {
    Ok(state
        .database()
        .inventory()
        .movements_for(reference_type, reference_id)
        .await?)
}

pub async fn product_batches(
    state: &AppState,
    product: &str,
    location: Option<&str>,
    include_empty: bool,
) -> ApiResult<Vec<Batch>> {
    let product = find_product(state, product).await?;
    let location_id = resolve_location(state, location).await?;
    Ok(state
        .database()
        .inventory()
        .batches(&product.id, &location_id, include_empty)
        .await?)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiringBatch {
    #[serde(flatten)]
    pub batch: Batch,
    /// Already past its expiry date today
    pub expired: bool,
    /// Quantity on hand at cost
    pub value_cents: i64,
}

/// Batches with stock that expire within `days`, expired ones included.
pub async fn expiring_batches(state: &AppState, days: i64) -> ApiResult<Vec<ExpiringBatch>> {
    if days < 0 {
        return Err(ApiError::validation("days cannot be negative"));
    }
    let today = chrono::Utc::now().date_naive();
    let batches = state.database().inventory().expiring_batches(days).await?;

    Ok(batches
        .into_iter()
        .map(|batch| ExpiringBatch {
            expired: batch.is_expired(today),
            value_cents: batch.value().cents(),
            batch,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reason() {
        assert_eq!(parse_reason("Damage").unwrap(), AdjustmentReason::Damage);
        assert_eq!(parse_reason(" count ").unwrap(), AdjustmentReason::Count);
        assert!(parse_reason("lost").is_err());
    }
}
