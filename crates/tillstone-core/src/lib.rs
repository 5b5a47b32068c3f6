//! # tillstone-core: Pure Business Logic for Tillstone POS
//!
//! This crate holds the domain of Tillstone POS as plain data and pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Tillstone POS Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 tillstone (CLI, apps/cli)                       │   │
//! │  │    product / cart / sale / goods / stock / label subcommands    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ command functions                      │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ tillstone-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌────────┐  │   │
//! │  │   │  types  │ │  money  │ │  cart   │ │ document │ │ labels │  │   │
//! │  │   │ Product │ │  Money  │ │ pricing │ │  status  │ │ en/es/ │  │   │
//! │  │   │  Sale   │ │ TaxRate │ │ refunds │ │ numbers  │ │   fr   │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └──────────┘ └────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                tillstone-db (Database Layer)                    │   │
//! │  │     SQLite, migrations, repositories, stock posting in tx      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities (Product, Sale, GoodsReceivedNote, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Line amounts, change, refund pro-rating
//! - [`cart`] - The draft sale being rung up
//! - [`document`] - Pending / Posted / Cancelled workflow and numbering
//! - [`labels`] - Built-in UI translations with fallback
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use tillstone_core::money::Money;
//! use tillstone_core::types::TaxRate;
//!
//! let price = Money::from_cents(1099); // 10.99
//!
//! let tax_rate = TaxRate::from_bps(825); // 8.25%
//! let tax = price.calculate_tax(tax_rate);
//!
//! // 10.99 at 8.25% = 0.9067 → 0.91
//! assert_eq!(tax.cents(), 91);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod document;
pub mod error;
pub mod labels;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartItem, CartTotals, PricedLine};
pub use document::{DocumentAction, DocumentKind, DocumentStatus};
pub use error::{CoreError, CoreResult, ValidationError};
pub use labels::{Label, LabelSet, Language};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single cart line.
///
/// Catches typing 1000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum units on one supplier, transfer or adjustment line, free units
/// included. Also bounds a single stock movement.
pub const MAX_DOCUMENT_QUANTITY: i64 = 1_000_000;

/// Language used when a label is missing in the requested one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// User id recorded on rows written by migrations, seeding and setup.
pub const SYSTEM_USER: &str = "system";

/// Points awarded per whole currency unit of a completed sale.
pub const LOYALTY_POINTS_PER_UNIT: i64 = 1;
