//! # Tillstone CLI
//!
//! Till and back-office front end over `tillstone-core` and `tillstone-db`.
//! The binary (`src/main.rs`) only parses arguments; every action is an
//! async function in [`commands`] so tests can drive it directly.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Application Startup                               │
//! │                                                                         │
//! │  1. Initialize Logging ───────────────────────────────────────────────► │
//! │     • tracing-subscriber with env filter, written to stderr             │
//! │     • Default: info, overridden with RUST_LOG                           │
//! │                                                                         │
//! │  2. Load Configuration ───────────────────────────────────────────────► │
//! │     • defaults ◄── tillstone.toml ◄── TILLSTONE_* environment          │
//! │                                                                         │
//! │  3. Connect to Database ──────────────────────────────────────────────► │
//! │     • db_path, or the platform data directory                           │
//! │     • SQLite with WAL mode, pending migrations applied                  │
//! │                                                                         │
//! │  4. Initialize State ─────────────────────────────────────────────────► │
//! │     • CartState backed by cart.json next to the database                │
//! │     • Default location created on first run                             │
//! │                                                                         │
//! │  5. Run one command, print JSON to stdout                               │
//! │                                                                         │
//! │  6. Close the pool so the WAL is checkpointed                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod state;

use tracing::info;
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use error::ApiResult;
use state::{AppState, CartState};
use tillstone_db::{Database, DbConfig};

/// File the open cart is kept in, beside the database.
pub const CART_FILE: &str = "cart.json";

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=tillstone=trace` - Show trace for tillstone crates only
/// - Default: info, debug for tillstone crates
///
/// Logs go to stderr so stdout stays parseable JSON.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tillstone=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Opens the database for `config` and builds the application state.
pub async fn bootstrap(config: AppConfig) -> ApiResult<AppState> {
    let db_path = config.database_path()?;
    info!(?db_path, "Database path determined");

    let db = Database::new(DbConfig::new(&db_path).max_connections(config.pool_size)).await?;
    info!("Database connected and migrations applied");

    let cart_file = db_path.with_file_name(CART_FILE);
    let cart = CartState::persistent(cart_file).await?;

    AppState::new(db, cart, config).await
}
