//! Stock documents: goods received, goods return, goods replace,
//! adjustments and transfers.
//!
//! All except adjustments go through [`DocumentStatus`]:
//! `Pending → Posted → Cancelled` (or `Pending → Cancelled`).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::DocumentTrail;
use crate::document::DocumentStatus;
use crate::money::Money;

// =============================================================================
// Goods Received Note
// =============================================================================

/// A supplier delivery.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct GoodsReceivedNote {
    pub id: String,
    pub grn_number: String,
    pub supplier_id: String,
    pub location_id: String,
    /// Supplier's own invoice / delivery note number.
    pub supplier_invoice: Option<String>,
    #[ts(as = "String")]
    pub received_date: NaiveDate,
    pub status: DocumentStatus,
    pub total_cents: i64,
    pub notes: Option<String>,
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub trail: DocumentTrail,
}

/// One delivered product on a GRN.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct GrnItem {
    pub id: String,
    pub grn_id: String,
    pub product_id: String,
    pub batch_number: String,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    /// Charged quantity.
    pub quantity: i64,
    /// Bonus units delivered free of charge.
    pub free_quantity: i64,
    pub unit_cost_cents: i64,
    pub discount_cents: i64,
    pub line_total_cents: i64,
    /// Batch the line was posted into. Set on post.
    pub batch_id: Option<String>,
}

impl GrnItem {
    /// Units that enter stock: charged plus free.
    #[inline]
    pub fn received_quantity(&self) -> i64 {
        self.quantity + self.free_quantity
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Goods Return (to supplier)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct GoodsReturn {
    pub id: String,
    pub return_number: String,
    pub supplier_id: String,
    pub location_id: String,
    /// GRN the goods originally arrived on, if known.
    pub grn_id: Option<String>,
    pub reason: Option<String>,
    pub status: DocumentStatus,
    pub total_cents: i64,
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub trail: DocumentTrail,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct GoodsReturnItem {
    pub id: String,
    pub return_id: String,
    pub product_id: String,
    /// Batch the goods are taken from. `None` touches only the level.
    pub batch_id: Option<String>,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    pub line_total_cents: i64,
}

// =============================================================================
// Goods Replace (supplier replaces returned goods)
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct GoodsReplace {
    pub id: String,
    pub replace_number: String,
    pub goods_return_id: String,
    pub supplier_id: String,
    pub location_id: String,
    pub status: DocumentStatus,
    pub notes: Option<String>,
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub trail: DocumentTrail,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct GoodsReplaceItem {
    pub id: String,
    pub replace_id: String,
    pub product_id: String,
    pub batch_number: String,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    pub batch_id: Option<String>,
}

// =============================================================================
// Stock Adjustment
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentReason {
    Damage,
    Expiry,
    Theft,
    /// Physical count differs from the system.
    Count,
    Other,
}

/// Immediate stock correction. Has no pending state.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockAdjustment {
    pub id: String,
    pub adjustment_number: String,
    pub location_id: String,
    pub reason: AdjustmentReason,
    pub notes: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockAdjustmentItem {
    pub id: String,
    pub adjustment_id: String,
    pub product_id: String,
    pub batch_id: Option<String>,
    /// Signed change; never zero.
    pub delta: i64,
}

// =============================================================================
// Stock Transfer
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockTransfer {
    pub id: String,
    pub transfer_number: String,
    pub from_location_id: String,
    pub to_location_id: String,
    pub status: DocumentStatus,
    pub notes: Option<String>,
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub trail: DocumentTrail,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockTransferItem {
    pub id: String,
    pub transfer_id: String,
    pub product_id: String,
    /// Source batch. The destination gets a batch with the same number.
    pub batch_id: Option<String>,
    pub quantity: i64,
}
