//! # Repository Module
//!
//! Database repository implementations for Tillstone POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Command function                                                      │
//! │       │                                                                 │
//! │       │  db.goods_received().post(&grn_id, user)                       │
//! │       ▼                                                                 │
//! │  GoodsReceivedRepository                                               │
//! │  ├── create / add_item / remove_item   (pending only)                  │
//! │  ├── post     ──► one transaction:                                     │
//! │  │                 status + batches + levels + movements               │
//! │  └── cancel   ──► one transaction: status + reversing movements        │
//! │       │                                                                 │
//! │       │  SQL                                                            │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Every stock change goes through inventory::apply_delta, which         │
//! │  enforces the product's negative-stock policy and keeps batches,       │
//! │  levels and the movement ledger in step.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CategoryRepository`], [`BrandRepository`], [`UnitRepository`],
//!   [`LocationRepository`] - Catalog master data
//! - [`ProductRepository`] - Product CRUD and search
//! - [`SupplierRepository`], [`CustomerRepository`] - Parties
//! - [`UserRepository`] - Till users and password checks
//! - [`InventoryRepository`] - Stock levels, batches, movement ledger
//! - [`SaleRepository`] - Sales, items and payments
//! - [`RefundRepository`] - Refunds and exchanges
//! - [`GoodsReceivedRepository`], [`GoodsReturnRepository`],
//!   [`GoodsReplaceRepository`] - Supplier documents
//! - [`AdjustmentRepository`], [`TransferRepository`] - Stock documents
//! - [`LabelRepository`] - UI languages and labels
//! - [`ReportRepository`] - Read-only summaries

pub mod adjustment;
pub mod catalog;
pub mod goods_received;
pub mod goods_replace;
pub mod goods_return;
pub mod inventory;
pub mod label;
pub mod party;
pub mod product;
pub mod refund;
pub mod report;
pub mod sale;
pub mod transfer;
pub mod user;

pub(crate) mod sequence;
pub(crate) mod soft_delete;
pub(crate) mod workflow;

pub use adjustment::{AdjustmentRepository, NewAdjustmentLine};
pub use catalog::{BrandRepository, CategoryRepository, LocationRepository, UnitRepository};
pub use goods_received::{GoodsReceivedRepository, NewGrn, NewGrnLine};
pub use goods_replace::{GoodsReplaceRepository, NewGoodsReplace, NewReplaceLine};
pub use goods_return::{GoodsReturnRepository, NewGoodsReturn, NewReturnLine};
pub use inventory::{BatchAllocation, InventoryRepository, StockChange};
pub use label::LabelRepository;
pub use party::{CustomerRepository, NewCustomer, NewSupplier, SupplierRepository};
pub use product::ProductRepository;
pub use refund::{ExchangeRequest, RefundLine, RefundRepository, RefundRequest};
pub use report::{DailySummary, LowStockRow, MethodTotal, ReportRepository, StockValuationRow};
pub use sale::{NewPayment, SaleRepository};
pub use transfer::{NewTransferLine, TransferRepository};
pub use user::UserRepository;

// =============================================================================
// Shared Helpers
// =============================================================================

/// Turns operator input into an FTS5 prefix query.
///
/// Each whitespace-separated token is quoted (so `-` and `:` are literal)
/// and given a `*` suffix: `coke 330` → `"coke"* "330"*`.
pub(crate) fn fts_query(input: &str) -> String {
    input
        .split_whitespace()
        .map(|token| format!("\"{}\"*", token.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `%term%` pattern for LIKE searches, with LIKE wildcards escaped.
pub(crate) fn like_pattern(input: &str) -> String {
    let escaped = input
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// New UUID v4 as a string.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fts_query_quotes_tokens() {
        assert_eq!(fts_query("coke"), "\"coke\"*");
        assert_eq!(fts_query("  coke  330 "), "\"coke\"* \"330\"*");
        assert_eq!(fts_query("COKE-330"), "\"COKE-330\"*");
        assert_eq!(fts_query("say \"hi\""), "\"say\"* \"\"\"hi\"\"\"*");
        assert_eq!(fts_query("   "), "");
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ann"), "%ann%");
        assert_eq!(like_pattern("50%"), "%50\\%%");
    }
}
