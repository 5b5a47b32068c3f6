//! # tillstone-db: Database Layer for Tillstone POS
//!
//! SQLite storage for Tillstone POS through sqlx: the pool, embedded
//! migrations and one repository per aggregate. Every operation that
//! changes stock runs in a single transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Tillstone POS Data Flow                            │
//! │                                                                         │
//! │  Command function (post_grn)                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  tillstone-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │   │  (embedded)  │  │   │
//! │  │   │               │    │ ProductRepo    │   │ 001 master   │  │   │
//! │  │   │ SqlitePool    │◄───│ SaleRepo       │   │ 002 fts      │  │   │
//! │  │   │ transactions  │    │ GoodsReceived  │   │ 003 stock    │  │   │
//! │  │   │               │    │ Inventory ...  │   │ ...          │  │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   <data dir>/tillstone/tillstone.db (WAL)                      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tillstone_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/tillstone.db")).await?;
//!
//! let products = db.products().search("milk", 20).await?;
//! let grn = db.goods_received().post(&grn_id, "manager").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use migrations::MigrationStatus;
pub use pool::{Database, DbConfig, DbStatus};

pub use repository::*;
