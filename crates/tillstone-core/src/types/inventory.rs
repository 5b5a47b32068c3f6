//! Stock on hand, batches and the movement ledger.
//!
//! ```text
//! stock_levels   (product, location) → quantity     fast "how many here?"
//! batches        (product, location, batch_number)  cost and expiry per delivery
//! stock_movements append-only ledger                 every change with a reason
//! ```
//! The three are written together inside one database transaction, so the
//! sum of a product's movements at a location always equals its level.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockLevel {
    pub product_id: String,
    pub location_id: String,
    pub quantity: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Units of one product received in one delivery at one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Batch {
    pub id: String,
    pub product_id: String,
    pub location_id: String,
    pub batch_number: String,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    pub cost_cents: i64,
    pub quantity: i64,
    #[ts(as = "String")]
    pub received_at: DateTime<Utc>,
}

impl Batch {
    /// Whether the batch has expired on `today`.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date.map_or(false, |d| d < today)
    }

    /// Stock value of the batch at cost.
    pub fn value(&self) -> Money {
        Money::from_cents(self.cost_cents) * self.quantity
    }
}

/// Why stock changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementReason {
    /// Opening balance entered at setup.
    Opening,
    /// Goods received from a supplier (GRN posted).
    GoodsReceived,
    /// Goods sent back to a supplier.
    SupplierReturn,
    /// Replacement goods received from a supplier.
    SupplierReplace,
    /// Sold to a customer.
    Sale,
    /// Completed sale voided; goods back on the shelf.
    SaleVoid,
    /// Customer refund with restock.
    Refund,
    /// Manual stock adjustment.
    Adjustment,
    /// Left a location by transfer.
    TransferOut,
    /// Arrived at a location by transfer.
    TransferIn,
    /// Undo of a posted document's effect (document cancelled).
    Reversal,
}

impl MovementReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementReason::Opening => "opening",
            MovementReason::GoodsReceived => "goods_received",
            MovementReason::SupplierReturn => "supplier_return",
            MovementReason::SupplierReplace => "supplier_replace",
            MovementReason::Sale => "sale",
            MovementReason::SaleVoid => "sale_void",
            MovementReason::Refund => "refund",
            MovementReason::Adjustment => "adjustment",
            MovementReason::TransferOut => "transfer_out",
            MovementReason::TransferIn => "transfer_in",
            MovementReason::Reversal => "reversal",
        }
    }
}

impl fmt::Display for MovementReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the stock ledger.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub location_id: String,
    pub batch_id: Option<String>,
    /// Positive for stock in, negative for stock out.
    pub delta: i64,
    pub reason: MovementReason,
    /// Document kind that caused the change: "sale", "grn", "transfer", ...
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_expiry_and_value() {
        let batch = Batch {
            id: "b1".to_string(),
            product_id: "p1".to_string(),
            location_id: "l1".to_string(),
            batch_number: "LOT-7".to_string(),
            expiry_date: NaiveDate::from_ymd_opt(2026, 3, 31),
            cost_cents: 250,
            quantity: 12,
            received_at: Utc::now(),
        };
        let before = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        let after = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        assert!(!batch.is_expired(before));
        assert!(batch.is_expired(after));
        assert_eq!(batch.value().cents(), 3000);
    }

    #[test]
    fn test_reason_serializes_snake_case() {
        let json = serde_json::to_string(&MovementReason::GoodsReceived).unwrap();
        assert_eq!(json, "\"goods_received\"");
        assert_eq!(MovementReason::TransferOut.as_str(), "transfer_out");
    }
}
