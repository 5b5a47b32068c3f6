//! # Refund & Exchange Commands
//!
//! ```text
//! refund:    completed sale ──► refund lines ──► money back (+ restock)
//! exchange:  completed sale ──► refund lines ──► store credit ──► new sale
//!                                                    from the current cart
//! ```
//!
//! Lines name the sold item by sale item id or by SKU.

use serde::{Deserialize, Serialize};
use tillstone_core::{Exchange, Refund, RefundItem, SaleItem};
use tillstone_db::{ExchangeRequest, RefundLine, RefundRequest};
use tracing::{debug, info};

use crate::commands::{found, parse_method};
use crate::commands::sale::{find_sale, sale_response, SaleResponse};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnLineRequest {
    /// Sale item id or SKU
    pub item: String,
    pub quantity: i64,
    /// Put the goods back on the shelf
    #[serde(default = "default_restock")]
    pub restock: bool,
}

fn default_restock() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundSaleRequest {
    /// Sale id or receipt number
    pub sale: String,
    pub lines: Vec<ReturnLineRequest>,
    pub reason: Option<String>,
    /// How the money goes back; cash when omitted
    pub method: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeSaleRequest {
    /// Sale id or receipt number
    pub sale: String,
    pub lines: Vec<ReturnLineRequest>,
    pub reason: Option<String>,
    /// How the customer pays a positive balance; cash when omitted
    pub balance_method: Option<String>,
    pub tendered_cents: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundResponse {
    pub refund: Refund,
    pub items: Vec<RefundItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeResponse {
    pub exchange: Exchange,
    pub refund: RefundResponse,
    pub new_sale: SaleResponse,
}

fn resolve_lines(items: &[SaleItem], lines: Vec<ReturnLineRequest>) -> ApiResult<Vec<RefundLine>> {
    if lines.is_empty() {
        return Err(ApiError::validation("At least one line is required"));
    }

    lines
        .into_iter()
        .map(|line| {
            let key = line.item.trim();
            let item = items
                .iter()
                .find(|i| i.id == key)
                .or_else(|| items.iter().find(|i| i.sku_snapshot.eq_ignore_ascii_case(key)))
                .ok_or_else(|| ApiError::not_found("Sale item", key))?;
            Ok(RefundLine {
                sale_item_id: item.id.clone(),
                quantity: line.quantity,
                restock: line.restock,
            })
        })
        .collect()
}

async fn refund_response(state: &AppState, refund: Refund) -> ApiResult<RefundResponse> {
    let items = state.database().refunds().refund_items(&refund.id).await?;
    Ok(RefundResponse { refund, items })
}

pub async fn refund_sale(state: &AppState, request: RefundSaleRequest) -> ApiResult<RefundResponse> {
    debug!(sale = %request.sale, lines = request.lines.len(), "refund_sale command");

    let method = parse_method(request.method.as_deref().unwrap_or("cash"))?;
    let sale = find_sale(state, &request.sale).await?;
    let items = state.database().sales().get_items(&sale.id).await?;

    let refund = state
        .database()
        .refunds()
        .refund(
            &RefundRequest {
                sale_id: sale.id.clone(),
                lines: resolve_lines(&items, request.lines)?,
                reason: request.reason,
                method,
            },
            &state.user_id,
        )
        .await?;

    info!(refund = %refund.refund_number, sale = %sale.receipt_number, total = refund.total_cents, "Refund issued");
    refund_response(state, refund).await
}

/// Refunds the listed lines and sells the current cart in their place.
pub async fn exchange_sale(state: &AppState, request: ExchangeSaleRequest) -> ApiResult<ExchangeResponse> {
    debug!(sale = %request.sale, lines = request.lines.len(), "exchange_sale command");

    let balance_method = parse_method(request.balance_method.as_deref().unwrap_or("cash"))?;
    let new_cart = state.cart.snapshot().await;
    if new_cart.is_empty() {
        return Err(ApiError::cart("Ring up the replacement goods before the exchange"));
    }

    let sale = find_sale(state, &request.sale).await?;
    let items = state.database().sales().get_items(&sale.id).await?;

    let refunds = state.database().refunds();
    let exchange = refunds
        .exchange(
            &ExchangeRequest {
                sale_id: sale.id.clone(),
                return_lines: resolve_lines(&items, request.lines)?,
                reason: request.reason,
                new_cart,
                balance_method,
                tendered_cents: request.tendered_cents,
            },
            &state.user_id,
            &state.config.device_id,
        )
        .await?;

    state.cart.clear().await?;

    let refund = refunds
        .get_by_id(&exchange.refund_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Refund", &exchange.refund_id))?;
    let new_sale = find_sale(state, &exchange.new_sale_id).await?;

    Ok(ExchangeResponse {
        refund: refund_response(state, refund).await?,
        new_sale: sale_response(state, new_sale).await?,
        exchange,
    })
}

/// Refunds already issued against a sale.
pub async fn refunds_for_sale(state: &AppState, sale: &str) -> ApiResult<Vec<RefundResponse>> {
    let sale = find_sale(state, sale).await?;
    let mut responses = Vec::new();
    for refund in state.database().refunds().refunds_for_sale(&sale.id).await? {
        responses.push(refund_response(state, refund).await?);
    }
    Ok(responses)
}

/// An exchange with the refund and replacement sale it links.
pub async fn get_exchange(state: &AppState, id: &str) -> ApiResult<ExchangeResponse> {
    let refunds = state.database().refunds();
    let exchange = found(refunds.get_exchange(id).await?, "Exchange", id)?;
    let refund = found(refunds.get_by_id(&exchange.refund_id).await?, "Refund", &exchange.refund_id)?;
    let new_sale = find_sale(state, &exchange.new_sale_id).await?;

    Ok(ExchangeResponse {
        refund: refund_response(state, refund).await?,
        new_sale: sale_response(state, new_sale).await?,
        exchange,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(id: &str, sku: &str) -> SaleItem {
        SaleItem {
            id: id.to_string(),
            sale_id: "s1".to_string(),
            product_id: format!("p-{}", id),
            sku_snapshot: sku.to_string(),
            name_snapshot: sku.to_string(),
            unit_price_cents: 100,
            quantity: 2,
            discount_cents: 0,
            tax_rate_bps: 0,
            tax_cents: 0,
            line_total_cents: 200,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_lines_resolve_by_id_or_sku() {
        let items = vec![item("i1", "COKE-330"), item("i2", "CHIPS")];
        let lines = resolve_lines(
            &items,
            vec![
                ReturnLineRequest {
                    item: "chips".to_string(),
                    quantity: 1,
                    restock: true,
                },
                ReturnLineRequest {
                    item: "i1".to_string(),
                    quantity: 2,
                    restock: false,
                },
            ],
        )
        .unwrap();

        assert_eq!(lines[0].sale_item_id, "i2");
        assert_eq!(lines[1].sale_item_id, "i1");
        assert!(!lines[1].restock);
    }

    #[test]
    fn test_unknown_line_is_not_found() {
        let items = vec![item("i1", "COKE-330")];
        let err = resolve_lines(
            &items,
            vec![ReturnLineRequest {
                item: "FANTA".to_string(),
                quantity: 1,
                restock: true,
            }],
        )
        .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::NotFound);
    }
}
