//! # Schema Migrations
//!
//! The SQL files under `migrations/sqlite/` are compiled into the binary and
//! applied when a [`Database`](crate::Database) opens.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  migrations/sqlite/              _sqlx_migrations                       │
//! │  ┌───────────────────────┐       ┌───────────────────────┐              │
//! │  │ 001_master_data.sql   │──────►│ 1  checksum  ok       │              │
//! │  │ 002_products_fts.sql  │──────►│ 2  checksum  ok       │              │
//! │  │ 003_inventory.sql     │──────►│ 3  checksum  ok       │              │
//! │  │ 004_sales.sql         │──────►│ 4  checksum  ok       │              │
//! │  │ 005_labels.sql        │──────►│ 5  checksum  ok       │              │
//! │  └───────────────────────┘       └───────────────────────┘              │
//! │                                                                         │
//! │  A file whose checksum no longer matches the recorded one aborts       │
//! │  startup with DbError::Migration.                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! New schema goes in a new `NNN_description.sql` file. Applied files are
//! never edited.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Embedded versus applied schema versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStatus {
    pub embedded: usize,
    pub applied: usize,
    /// Versions compiled in but not yet recorded as applied
    pub pending: Vec<i64>,
}

impl MigrationStatus {
    pub fn is_current(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Applies every pending migration, each in its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    debug!(embedded = MIGRATOR.migrations.len(), "Applying migrations");
    MIGRATOR.run(pool).await?;
    info!("Schema is current");
    Ok(())
}

/// Reads `_sqlx_migrations` and compares it with the embedded set.
///
/// A database that was never migrated reports every version as pending.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<MigrationStatus> {
    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;

    let applied: Vec<i64> = if table_exists {
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success = 1 ORDER BY version")
            .fetch_all(pool)
            .await?
    } else {
        Vec::new()
    };

    let pending = MIGRATOR
        .iter()
        .map(|m| m.version)
        .filter(|version| !applied.contains(version))
        .collect();

    Ok(MigrationStatus {
        embedded: MIGRATOR.migrations.len(),
        applied: applied.len(),
        pending,
    })
}
