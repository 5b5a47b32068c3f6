//! # Connection Pool
//!
//! Opens the SQLite file a till works against and hands out repositories.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig::new(path).max_connections(n)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new ── open file (created on first run)                      │
//! │       │           journal_mode=WAL  synchronous=NORMAL  foreign_keys=ON │
//! │       │                                                                 │
//! │       ├── migrations::run_migrations   (unless disabled)                │
//! │       ▼                                                                 │
//! │  db.products()  db.sales()  db.goods_received()  ...                    │
//! │       each repository owns a clone of the SqlitePool                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `:memory:` databases are private to one connection, so
//! [`DbConfig::in_memory`] pins the pool to a single connection.

use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations::{self, MigrationStatus};
use crate::repository::{
    AdjustmentRepository, BrandRepository, CategoryRepository, CustomerRepository,
    GoodsReceivedRepository, GoodsReplaceRepository, GoodsReturnRepository,
    InventoryRepository, LabelRepository, LocationRepository, ProductRepository,
    RefundRepository, ReportRepository, SaleRepository, SupplierRepository,
    TransferRepository, UnitRepository, UserRepository,
};

const MEMORY: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// How to open the database.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/tillstone/tillstone.db").max_connections(4);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,
    /// Default 5. A single terminal rarely needs more.
    pub max_connections: u32,
    /// Connections kept open while idle. Default 1.
    pub min_connections: u32,
    /// How long a command waits for a free connection. Default 30s.
    pub acquire_timeout: Duration,
    /// Default true.
    pub run_migrations: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            run_migrations: true,
        }
    }

    /// Fresh private database for tests, migrated on open.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(MEMORY),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Clamped to at least one connection; an in-memory database stays at one.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = if self.is_memory() { 1 } else { max.max(1) };
        self
    }

    /// Never above `max_connections`.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min.min(self.max_connections);
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    fn is_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };
        Ok(options
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true))
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to an open database; repositories are created on demand.
///
/// ```text
/// Database
/// ├── categories() brands() units() locations() products()   master data
/// ├── suppliers() customers() users()                        parties
/// ├── inventory() adjustments() transfers()                  stock
/// ├── goods_received() goods_returns() goods_replaces()      purchasing
/// ├── sales() refunds()                                      till
/// └── labels() reports()                                     back office
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    path: PathBuf,
}

/// Where the database lives and how current its schema is.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbStatus {
    pub path: String,
    pub healthy: bool,
    pub schema: MigrationStatus,
}

impl Database {
    /// Opens (creating if needed) the database and applies pending migrations.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening database");

        if !config.is_memory() {
            if let Some(dir) = config.database_path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir).map_err(|e| {
                    DbError::ConnectionFailed(format!("cannot create {}: {e}", dir.display()))
                })?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections.min(config.max_connections))
            .acquire_timeout(config.acquire_timeout)
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        debug!(max_connections = config.max_connections, "Pool ready");

        let db = Database {
            pool,
            path: config.database_path,
        };
        if config.run_migrations {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    /// Raw pool, for repository internals and tests.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Transaction for callers that combine writes across repositories.
    pub async fn begin(&self) -> DbResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Applies pending migrations; `new` already does this unless disabled.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub async fn migration_status(&self) -> DbResult<MigrationStatus> {
        migrations::migration_status(&self.pool).await
    }

    /// Whether the database still answers a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    pub async fn status(&self) -> DbResult<DbStatus> {
        Ok(DbStatus {
            path: self.path.display().to_string(),
            healthy: self.health_check().await,
            schema: self.migration_status().await?,
        })
    }

    /// Waits for open connections to finish and checkpoints the WAL.
    /// Every later call fails with `DbError::ConnectionFailed`.
    pub async fn close(&self) {
        self.pool.close().await;
        debug!("Database closed");
    }

    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository::new(self.pool.clone())
    }

    pub fn brands(&self) -> BrandRepository {
        BrandRepository::new(self.pool.clone())
    }

    pub fn units(&self) -> UnitRepository {
        UnitRepository::new(self.pool.clone())
    }

    pub fn locations(&self) -> LocationRepository {
        LocationRepository::new(self.pool.clone())
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    pub fn suppliers(&self) -> SupplierRepository {
        SupplierRepository::new(self.pool.clone())
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone())
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    /// Stock levels, batches and the movement ledger.
    pub fn inventory(&self) -> InventoryRepository {
        InventoryRepository::new(self.pool.clone())
    }

    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    /// Refunds and exchanges against completed sales.
    pub fn refunds(&self) -> RefundRepository {
        RefundRepository::new(self.pool.clone())
    }

    pub fn goods_received(&self) -> GoodsReceivedRepository {
        GoodsReceivedRepository::new(self.pool.clone())
    }

    pub fn goods_returns(&self) -> GoodsReturnRepository {
        GoodsReturnRepository::new(self.pool.clone())
    }

    pub fn goods_replaces(&self) -> GoodsReplaceRepository {
        GoodsReplaceRepository::new(self.pool.clone())
    }

    pub fn adjustments(&self) -> AdjustmentRepository {
        AdjustmentRepository::new(self.pool.clone())
    }

    pub fn transfers(&self) -> TransferRepository {
        TransferRepository::new(self.pool.clone())
    }

    pub fn labels(&self) -> LabelRepository {
        LabelRepository::new(self.pool.clone())
    }

    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.pool.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let status = db.status().await.unwrap();

        assert_eq!(status.path, ":memory:");
        assert!(status.healthy);
        assert!(status.schema.is_current());
        assert_eq!(status.schema.applied, status.schema.embedded);
        assert_eq!(status.schema.embedded, 5);
    }

    #[tokio::test]
    async fn test_unmigrated_database_reports_pending() {
        let db = Database::new(DbConfig::in_memory().run_migrations(false))
            .await
            .unwrap();
        let schema = db.migration_status().await.unwrap();

        assert_eq!(schema.applied, 0);
        assert_eq!(schema.pending, vec![1, 2, 3, 4, 5]);
        assert!(!schema.is_current());

        db.run_migrations().await.unwrap();
        assert!(db.migration_status().await.unwrap().is_current());
    }

    #[tokio::test]
    async fn test_closed_database_is_unhealthy() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        db.close().await;
        assert!(!db.health_check().await);
        assert!(db.products().get_by_sku("ANY").await.is_err());
    }

    #[test]
    fn test_in_memory_stays_single_connection() {
        assert_eq!(DbConfig::in_memory().max_connections(8).max_connections, 1);
        assert_eq!(DbConfig::new("/tmp/t.db").max_connections(0).max_connections, 1);
        assert_eq!(DbConfig::new("/tmp/t.db").max_connections(4).max_connections, 4);
        assert_eq!(DbConfig::new("/tmp/t.db").max_connections(2).min_connections(3).min_connections, 2);
    }
}
