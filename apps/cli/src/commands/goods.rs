//! # Supplier Document Commands
//!
//! Goods received notes, goods returns to the supplier and the
//! replacements the supplier sends back.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GRN            create ──► add/remove lines ──► post  (stock in)        │
//! │  Goods return   create ──► post  (stock out)                            │
//! │  Goods replace  create against a posted return ──► post  (stock in)     │
//! │                                                                         │
//! │  Every document: Pending ──post──► Posted                               │
//! │                     │                │                                  │
//! │                     └────cancel──────┴──► Cancelled                      │
//! │  Cancelling a posted document reverses its stock.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Products are named by id, SKU or barcode; suppliers by id or code;
//! dates as `YYYY-MM-DD`.

use serde::{Deserialize, Serialize};
use tillstone_core::{
    GoodsReceivedNote, GoodsReplace, GoodsReplaceItem, GoodsReturn, GoodsReturnItem, GrnItem,
};
use tillstone_db::{
    NewGoodsReplace, NewGoodsReturn, NewGrn, NewGrnLine, NewReplaceLine, NewReturnLine,
};
use tracing::{debug, info};

use crate::commands::party::find_supplier;
use crate::commands::product::find_product;
use crate::commands::stock::resolve_batch;
use crate::commands::user::ensure_supervisor;
use crate::commands::{found, parse_optional_date, parse_status, resolve_location};
use crate::error::ApiResult;
use crate::state::AppState;

// =============================================================================
// Goods Received Notes
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrnLineRequest {
    pub product: String,
    pub batch_number: String,
    pub expiry_date: Option<String>,
    pub quantity: i64,
    #[serde(default)]
    pub free_quantity: i64,
    pub unit_cost_cents: i64,
    #[serde(default)]
    pub discount_cents: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGrnRequest {
    /// Supplier id or code
    pub supplier: String,
    /// Location code; the terminal's location when omitted
    pub location: Option<String>,
    pub supplier_invoice: Option<String>,
    pub received_date: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub lines: Vec<GrnLineRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrnResponse {
    pub grn: GoodsReceivedNote,
    pub items: Vec<GrnItem>,
}

async fn grn_line(state: &AppState, line: GrnLineRequest) -> ApiResult<NewGrnLine> {
    Ok(NewGrnLine {
        product_id: find_product(state, &line.product).await?.id,
        expiry_date: parse_optional_date("expiryDate", line.expiry_date.as_deref())?,
        batch_number: line.batch_number,
        quantity: line.quantity,
        free_quantity: line.free_quantity,
        unit_cost_cents: line.unit_cost_cents,
        discount_cents: line.discount_cents,
    })
}

async fn grn_response(state: &AppState, grn: GoodsReceivedNote) -> ApiResult<GrnResponse> {
    let items = state.database().goods_received().get_items(&grn.id).await?;
    Ok(GrnResponse { grn, items })
}

/// GRN by id or GRN number.
async fn find_grn(state: &AppState, key: &str) -> ApiResult<GoodsReceivedNote> {
    let grns = state.database().goods_received();
    if let Some(grn) = grns.get(key).await? {
        return Ok(grn);
    }
    found(grns.get_by_number(key).await?, "Goods received note", key)
}

pub async fn create_grn(state: &AppState, request: CreateGrnRequest) -> ApiResult<GrnResponse> {
    debug!(supplier = %request.supplier, lines = request.lines.len(), "create_grn command");

    let supplier = find_supplier(state, &request.supplier).await?;
    let location_id = resolve_location(state, request.location.as_deref()).await?;
    let received_date = parse_optional_date("receivedDate", request.received_date.as_deref())?;

    let mut lines = Vec::with_capacity(request.lines.len());
    for line in request.lines {
        lines.push(grn_line(state, line).await?);
    }

    let grn = state
        .database()
        .goods_received()
        .create(
            &NewGrn {
                supplier_id: supplier.id,
                location_id,
                supplier_invoice: request.supplier_invoice,
                received_date,
                notes: request.notes,
                lines,
            },
            &state.user_id,
        )
        .await?;
    grn_response(state, grn).await
}

pub async fn add_grn_item(state: &AppState, grn: &str, line: GrnLineRequest) -> ApiResult<GrnResponse> {
    debug!(grn = %grn, product = %line.product, "add_grn_item command");
    let grn = find_grn(state, grn).await?;
    let line = grn_line(state, line).await?;
    state.database().goods_received().add_item(&grn.id, &line).await?;
    let grn = find_grn(state, &grn.id).await?;
    grn_response(state, grn).await
}

pub async fn remove_grn_item(state: &AppState, grn: &str, item_id: &str) -> ApiResult<GrnResponse> {
    debug!(grn = %grn, item_id = %item_id, "remove_grn_item command");
    let grn = find_grn(state, grn).await?;
    state.database().goods_received().remove_item(&grn.id, item_id).await?;
    let grn = find_grn(state, &grn.id).await?;
    grn_response(state, grn).await
}

pub async fn get_grn(state: &AppState, key: &str) -> ApiResult<GrnResponse> {
    let grn = find_grn(state, key).await?;
    grn_response(state, grn).await
}

pub async fn list_grns(state: &AppState, status: Option<&str>) -> ApiResult<Vec<GoodsReceivedNote>> {
    let status = parse_status(status)?;
    Ok(state.database().goods_received().list(status).await?)
}

/// Posts a GRN: its lines become batches and stock.
pub async fn post_grn(state: &AppState, key: &str) -> ApiResult<GrnResponse> {
    let grn = find_grn(state, key).await?;
    let grn = state
        .database()
        .goods_received()
        .post(&grn.id, &state.user_id)
        .await?;
    info!(grn = %grn.grn_number, total = grn.total_cents, "GRN posted");
    grn_response(state, grn).await
}

/// Cancels a GRN. Supervisors only.
pub async fn cancel_grn(state: &AppState, key: &str) -> ApiResult<GrnResponse> {
    ensure_supervisor(state).await?;
    let grn = find_grn(state, key).await?;
    let grn = state
        .database()
        .goods_received()
        .cancel(&grn.id, &state.user_id)
        .await?;
    grn_response(state, grn).await
}

// =============================================================================
// Goods Returns
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnToSupplierLine {
    pub product: String,
    /// Batch id or batch number at the return location
    pub batch: Option<String>,
    pub quantity: i64,
    pub unit_cost_cents: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGoodsReturnRequest {
    pub supplier: String,
    pub location: Option<String>,
    /// GRN id or number the goods arrived on
    pub grn: Option<String>,
    pub reason: Option<String>,
    pub lines: Vec<ReturnToSupplierLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoodsReturnResponse {
    pub goods_return: GoodsReturn,
    pub items: Vec<GoodsReturnItem>,
}

async fn goods_return_response(state: &AppState, goods_return: GoodsReturn) -> ApiResult<GoodsReturnResponse> {
    let items = state.database().goods_returns().get_items(&goods_return.id).await?;
    Ok(GoodsReturnResponse { goods_return, items })
}

async fn find_goods_return(state: &AppState, id: &str) -> ApiResult<GoodsReturn> {
    found(state.database().goods_returns().get(id).await?, "Goods return", id)
}

pub async fn create_goods_return(
    state: &AppState,
    request: CreateGoodsReturnRequest,
) -> ApiResult<GoodsReturnResponse> {
    debug!(supplier = %request.supplier, lines = request.lines.len(), "create_goods_return command");

    let supplier = find_supplier(state, &request.supplier).await?;
    let location_id = resolve_location(state, request.location.as_deref()).await?;
    let grn_id = match request.grn.as_deref() {
        Some(key) => Some(find_grn(state, key).await?.id),
        None => None,
    };

    let mut lines = Vec::with_capacity(request.lines.len());
    for line in request.lines {
        let product = find_product(state, &line.product).await?;
        let batch_id = resolve_batch(state, &product.id, &location_id, line.batch.as_deref()).await?;
        lines.push(NewReturnLine {
            product_id: product.id,
            batch_id,
            quantity: line.quantity,
            unit_cost_cents: line.unit_cost_cents,
        });
    }

    let goods_return = state
        .database()
        .goods_returns()
        .create(
            &NewGoodsReturn {
                supplier_id: supplier.id,
                location_id,
                grn_id,
                reason: request.reason,
                lines,
            },
            &state.user_id,
        )
        .await?;
    goods_return_response(state, goods_return).await
}

pub async fn get_goods_return(state: &AppState, id: &str) -> ApiResult<GoodsReturnResponse> {
    let goods_return = find_goods_return(state, id).await?;
    goods_return_response(state, goods_return).await
}

pub async fn list_goods_returns(state: &AppState, status: Option<&str>) -> ApiResult<Vec<GoodsReturn>> {
    let status = parse_status(status)?;
    Ok(state.database().goods_returns().list(status).await?)
}

pub async fn post_goods_return(state: &AppState, id: &str) -> ApiResult<GoodsReturnResponse> {
    let goods_return = state
        .database()
        .goods_returns()
        .post(id, &state.user_id)
        .await?;
    info!(number = %goods_return.return_number, "Goods return posted");
    goods_return_response(state, goods_return).await
}

pub async fn cancel_goods_return(state: &AppState, id: &str) -> ApiResult<GoodsReturnResponse> {
    ensure_supervisor(state).await?;
    let goods_return = state
        .database()
        .goods_returns()
        .cancel(id, &state.user_id)
        .await?;
    goods_return_response(state, goods_return).await
}

// =============================================================================
// Goods Replaces
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceLineRequest {
    pub product: String,
    pub batch_number: String,
    pub expiry_date: Option<String>,
    pub quantity: i64,
    pub unit_cost_cents: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGoodsReplaceRequest {
    pub goods_return_id: String,
    pub notes: Option<String>,
    pub lines: Vec<ReplaceLineRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoodsReplaceResponse {
    pub goods_replace: GoodsReplace,
    pub items: Vec<GoodsReplaceItem>,
}

async fn goods_replace_response(state: &AppState, goods_replace: GoodsReplace) -> ApiResult<GoodsReplaceResponse> {
    let items = state.database().goods_replaces().get_items(&goods_replace.id).await?;
    Ok(GoodsReplaceResponse { goods_replace, items })
}

pub async fn create_goods_replace(
    state: &AppState,
    request: CreateGoodsReplaceRequest,
) -> ApiResult<GoodsReplaceResponse> {
    debug!(goods_return_id = %request.goods_return_id, lines = request.lines.len(), "create_goods_replace command");

    let mut lines = Vec::with_capacity(request.lines.len());
    for line in request.lines {
        lines.push(NewReplaceLine {
            product_id: find_product(state, &line.product).await?.id,
            expiry_date: parse_optional_date("expiryDate", line.expiry_date.as_deref())?,
            batch_number: line.batch_number,
            quantity: line.quantity,
            unit_cost_cents: line.unit_cost_cents,
        });
    }

    let goods_replace = state
        .database()
        .goods_replaces()
        .create(
            &NewGoodsReplace {
                goods_return_id: request.goods_return_id,
                notes: request.notes,
                lines,
            },
            &state.user_id,
        )
        .await?;
    goods_replace_response(state, goods_replace).await
}

pub async fn get_goods_replace(state: &AppState, id: &str) -> ApiResult<GoodsReplaceResponse> {
    let goods_replace = found(state.database().goods_replaces().get(id).await?, "Goods replace", id)?;
    goods_replace_response(state, goods_replace).await
}

/// Lists replaces, either all (optionally by status) or those of one return.
pub async fn list_goods_replaces(
    state: &AppState,
    status: Option<&str>,
    goods_return_id: Option<&str>,
) -> ApiResult<Vec<GoodsReplace>> {
    let replaces = state.database().goods_replaces();
    match goods_return_id {
        Some(id) => Ok(replaces.for_return(id).await?),
        None => Ok(replaces.list(parse_status(status)?).await?),
    }
}

pub async fn post_goods_replace(state: &AppState, id: &str) -> ApiResult<GoodsReplaceResponse> {
    let goods_replace = state
        .database()
        .goods_replaces()
        .post(id, &state.user_id)
        .await?;
    info!(number = %goods_replace.replace_number, "Goods replace posted");
    goods_replace_response(state, goods_replace).await
}

pub async fn cancel_goods_replace(state: &AppState, id: &str) -> ApiResult<GoodsReplaceResponse> {
    ensure_supervisor(state).await?;
    let goods_replace = state
        .database()
        .goods_replaces()
        .cancel(id, &state.user_id)
        .await?;
    goods_replace_response(state, goods_replace).await
}
