//! # Report Commands
//!
//! ```text
//! daily      takings for one UTC day: gross, tax, refunds, net, by method
//! valuation  on-hand stock at cost for a location
//! low-stock  products at or under their reorder level
//! ```

use serde::{Deserialize, Serialize};
use tillstone_db::{DailySummary, LowStockRow, StockValuationRow};
use tracing::debug;

use crate::commands::{parse_date, resolve_location};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    #[serde(flatten)]
    pub summary: DailySummary,
    pub gross_display: String,
    pub net_display: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationReport {
    pub location_id: String,
    pub rows: Vec<StockValuationRow>,
    pub total_cents: i64,
    pub total_display: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReportRequest {
    /// `YYYY-MM-DD`; today (UTC) when omitted
    pub date: Option<String>,
}

pub async fn daily_report(state: &AppState, request: DailyReportRequest) -> ApiResult<DailyReport> {
    let date = match request.date.as_deref() {
        Some(value) => parse_date("date", value)?,
        None => chrono::Utc::now().date_naive(),
    };
    debug!(date = %date, "daily_report command");

    let summary = state.database().reports().daily_summary(date).await?;
    Ok(DailyReport {
        gross_display: state.config.format_currency(summary.gross_cents),
        net_display: state.config.format_currency(summary.net_cents),
        summary,
    })
}

pub async fn stock_valuation(state: &AppState, location: Option<&str>) -> ApiResult<ValuationReport> {
    let location_id = resolve_location(state, location).await?;
    debug!(location_id = %location_id, "stock_valuation command");

    let rows = state.database().reports().stock_valuation(&location_id).await?;
    let total_cents: i64 = rows.iter().map(|row| row.value_cents).sum();
    Ok(ValuationReport {
        location_id,
        rows,
        total_cents,
        total_display: state.config.format_currency(total_cents),
    })
}

pub async fn low_stock(state: &AppState, location: Option<&str>) -> ApiResult<Vec<LowStockRow>> {
    let location_id = resolve_location(state, location).await?;
    Ok(state.database().reports().low_stock(&location_id).await?)
}
