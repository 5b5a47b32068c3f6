//! # Domain Types
//!
//! Entities and value types used throughout Tillstone POS.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  catalog     Category, Brand, Unit, Location, Product                  │
//! │  party       Supplier, Customer, User                                  │
//! │  sale        Sale, SaleItem, Payment, Refund, RefundItem, Exchange     │
//! │  inventory   StockLevel, Batch, StockMovement                          │
//! │  documents   GoodsReceivedNote, GoodsReturn, GoodsReplace,             │
//! │              StockAdjustment, StockTransfer (+ line types)             │
//! │                                                                         │
//! │  shared      TaxRate, TaxMode, Audit, DocumentTrail                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, code, receipt/document number) - human-readable
//!
//! ## Soft Delete
//! Master data is never removed. [`Audit`] carries `deleted_by` /
//! `deleted_at`; a row is active while `deleted_at` is `None`.

pub mod catalog;
pub mod documents;
pub mod inventory;
pub mod party;
pub mod sale;

pub use catalog::*;
pub use documents::*;
pub use inventory::*;
pub use party::*;
pub use sale::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 825 bps = 8.25%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Tax Mode
// =============================================================================

/// How shelf prices relate to tax.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TaxMode {
    /// Price + tax shown separately.
    #[default]
    Exclusive,
    /// Price already includes tax.
    Inclusive,
}

impl TaxMode {
    /// Parses configuration input such as "inclusive".
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "exclusive" => Some(TaxMode::Exclusive),
            "inclusive" => Some(TaxMode::Inclusive),
            _ => None,
        }
    }
}

// =============================================================================
// Audit
// =============================================================================

/// Audit columns shared by every master-data table.
///
/// Flattened into the owning struct for both JSON and SQL rows, so a
/// `Product` row has `created_by`, `created_at`, ... as plain columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Audit {
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub updated_by: Option<String>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub deleted_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Audit {
    /// Audit block for a row created now by `user_id`.
    pub fn new(user_id: &str) -> Self {
        let now = Utc::now();
        Audit {
            created_by: user_id.to_string(),
            created_at: now,
            updated_by: None,
            updated_at: now,
            deleted_by: None,
            deleted_at: None,
        }
    }

    /// Whether the row is still active (not soft-deleted).
    #[inline]
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Records an update by `user_id`.
    pub fn touch(&mut self, user_id: &str) {
        self.updated_by = Some(user_id.to_string());
        self.updated_at = Utc::now();
    }

    /// Marks the row soft-deleted by `user_id`.
    pub fn mark_deleted(&mut self, user_id: &str) {
        let now = Utc::now();
        self.deleted_by = Some(user_id.to_string());
        self.deleted_at = Some(now);
        self.updated_by = Some(user_id.to_string());
        self.updated_at = now;
    }

    /// Clears the soft-delete marker.
    pub fn restore(&mut self, user_id: &str) {
        self.deleted_by = None;
        self.deleted_at = None;
        self.touch(user_id);
    }
}

// =============================================================================
// Document Trail
// =============================================================================

/// Who created, posted and cancelled a stock document, and when.
///
/// Stock documents are never soft-deleted; they are cancelled. The trail
/// replaces [`Audit`] for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DocumentTrail {
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub posted_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub posted_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl DocumentTrail {
    pub fn new(user_id: &str) -> Self {
        let now = Utc::now();
        DocumentTrail {
            created_by: user_id.to_string(),
            created_at: now,
            updated_at: now,
            posted_by: None,
            posted_at: None,
            cancelled_by: None,
            cancelled_at: None,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_from_bps() {
        let rate = TaxRate::from_bps(825);
        assert_eq!(rate.bps(), 825);
        assert!((rate.percentage() - 8.25).abs() < 0.001);
    }

    #[test]
    fn test_tax_mode_default() {
        assert_eq!(TaxMode::default(), TaxMode::Exclusive);
    }

    #[test]
    fn test_audit_soft_delete_and_restore() {
        let mut audit = Audit::new("admin");
        assert!(audit.is_active());

        audit.mark_deleted("manager");
        assert!(!audit.is_active());
        assert_eq!(audit.deleted_by.as_deref(), Some("manager"));

        audit.restore("admin");
        assert!(audit.is_active());
        assert_eq!(audit.updated_by.as_deref(), Some("admin"));
    }
}
