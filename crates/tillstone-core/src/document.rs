//! # Stock Document Workflow
//!
//! Goods received notes, goods returns, goods replacements and stock
//! transfers share one lifecycle.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Document State Machine                              │
//! │                                                                         │
//! │              post                      cancel                           │
//! │   Pending ──────────► Posted ──────────────────► Cancelled              │
//! │      │               (stock applied)          (stock reversed)          │
//! │      │                                              ▲                   │
//! │      └──────────────────── cancel ──────────────────┘                   │
//! │                       (no stock effect)                                 │
//! │                                                                         │
//! │   Lines may only be edited while Pending.                              │
//! │   Cancelled is terminal.                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The transition itself is pure and lives here; the stock effects are
//! applied by `tillstone-db` in the same transaction that writes the new
//! status.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Status & Action
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[default]
    Pending,
    Posted,
    Cancelled,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Posted => "posted",
            DocumentStatus::Cancelled => "cancelled",
        }
    }

    /// Parses a status filter such as "posted".
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "pending" => Some(DocumentStatus::Pending),
            "posted" => Some(DocumentStatus::Posted),
            "cancelled" | "canceled" => Some(DocumentStatus::Cancelled),
            _ => None,
        }
    }

    /// Status after `action`, or an error naming `document`.
    pub fn transition(self, document: &str, action: DocumentAction) -> CoreResult<DocumentStatus> {
        transition(document, self, action).map(|t| t.to)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentAction {
    Post,
    Cancel,
}

impl fmt::Display for DocumentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentAction::Post => f.write_str("post"),
            DocumentAction::Cancel => f.write_str("cancel"),
        }
    }
}

/// What a successful transition requires of the stock layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    /// Nothing to do (pending document cancelled).
    None,
    /// Apply the document's lines.
    Apply,
    /// Undo the document's lines.
    Reverse,
}

/// Result of a permitted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub to: DocumentStatus,
    pub effect: StockEffect,
}

/// Computes the transition for `action` on a document currently in
/// `status`.
///
/// ## Example
/// ```rust
/// use tillstone_core::document::{transition, DocumentAction, DocumentStatus, StockEffect};
///
/// let t = transition("GRN-1", DocumentStatus::Posted, DocumentAction::Cancel).unwrap();
/// assert_eq!(t.to, DocumentStatus::Cancelled);
/// assert_eq!(t.effect, StockEffect::Reverse);
///
/// assert!(transition("GRN-1", DocumentStatus::Posted, DocumentAction::Post).is_err());
/// ```
pub fn transition(
    document: &str,
    status: DocumentStatus,
    action: DocumentAction,
) -> CoreResult<Transition> {
    use DocumentAction::*;
    use DocumentStatus::*;

    let next = match (status, action) {
        (Pending, Post) => Transition {
            to: Posted,
            effect: StockEffect::Apply,
        },
        (Pending, Cancel) => Transition {
            to: Cancelled,
            effect: StockEffect::None,
        },
        (Posted, Cancel) => Transition {
            to: Cancelled,
            effect: StockEffect::Reverse,
        },
        (Posted, Post) | (Cancelled, _) => {
            return Err(CoreError::InvalidDocumentTransition {
                document: document.to_string(),
                status,
                action,
            })
        }
    };

    Ok(next)
}

/// Fails unless the document's lines may still be edited.
pub fn ensure_editable(document: &str, status: DocumentStatus) -> CoreResult<()> {
    if status != DocumentStatus::Pending {
        return Err(CoreError::DocumentLocked {
            document: document.to_string(),
            status,
        });
    }
    Ok(())
}

// =============================================================================
// Document Numbers
// =============================================================================

/// Kinds of numbered business documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    GoodsReceived,
    GoodsReturn,
    GoodsReplace,
    Adjustment,
    Transfer,
    Refund,
    Exchange,
}

impl DocumentKind {
    /// Number prefix printed on the document.
    pub const fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::GoodsReceived => "GRN",
            DocumentKind::GoodsReturn => "GRT",
            DocumentKind::GoodsReplace => "GRP",
            DocumentKind::Adjustment => "ADJ",
            DocumentKind::Transfer => "TRF",
            DocumentKind::Refund => "RFD",
            DocumentKind::Exchange => "EXC",
        }
    }
}

/// Formats a document number: `PREFIX-YYYYMMDD-NNNN`.
///
/// ```rust
/// use chrono::NaiveDate;
/// use tillstone_core::document::{document_number, DocumentKind};
///
/// let date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
/// assert_eq!(document_number(DocumentKind::GoodsReceived, date, 3), "GRN-20260105-0003");
/// ```
pub fn document_number(kind: DocumentKind, date: NaiveDate, sequence: u32) -> String {
    format!("{}-{}-{:04}", kind.prefix(), date.format("%Y%m%d"), sequence)
}

/// Two-character device code printed on receipts: the last two
/// characters of the device id, or "00" when it is shorter.
///
/// Terminals sharing a code share one receipt counter.
pub fn device_code(device_id: &str) -> String {
    let chars: Vec<char> = device_id.chars().collect();
    if chars.len() < 2 {
        "00".to_string()
    } else {
        chars[chars.len() - 2..].iter().collect()
    }
}

/// Formats a receipt number: `YYYYMMDD-DD-NNNN`, `DD` being the
/// [`device_code`].
///
/// ```rust
/// use chrono::NaiveDate;
/// use tillstone_core::document::receipt_number;
///
/// let date = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
/// assert_eq!(receipt_number("pos-01", date, 1), "20260131-01-0001");
/// assert_eq!(receipt_number("x", date, 12), "20260131-00-0012");
/// ```
pub fn receipt_number(device_id: &str, date: NaiveDate, sequence: u32) -> String {
    format!("{}-{}-{:04}", date.format("%Y%m%d"), device_code(device_id), sequence)
}

// =============================================================================
// Unit Tests
// =============================================================================
