//! # Application State
//!
//! Everything a command function needs, bundled into one `AppState`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  AppState                                                               │
//! │  ├── db          DbState     database handle (pool + repositories)      │
//! │  ├── cart        CartState   cart being rung up on this terminal        │
//! │  ├── config      AppConfig   store, currency, tax, terminal settings    │
//! │  ├── user_id     String      operator recorded on every write           │
//! │  └── location_id String      location this terminal sells from         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod cart;
mod db;

pub use cart::CartState;
pub use db::DbState;

use tillstone_core::SYSTEM_USER;
use tillstone_db::Database;
use tracing::info;

use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult};

/// State shared by all command functions.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: DbState,
    pub cart: CartState,
    pub config: AppConfig,
    pub user_id: String,
    pub location_id: String,
}

impl AppState {
    /// Builds the state for `config`, creating the default location on
    /// first run.
    pub async fn new(db: Database, cart: CartState, config: AppConfig) -> ApiResult<Self> {
        let code = config.default_location.trim().to_uppercase();
        let location = match db.locations().get_by_code(&code).await? {
            Some(location) if location.audit.is_active() => location,
            Some(_) => {
                return Err(ApiError::validation(format!(
                    "Default location {} is deleted",
                    code
                )))
            }
            None => {
                info!(code = %code, "Creating default location");
                db.locations().create(&code, &code, SYSTEM_USER).await?
            }
        };

        Ok(AppState {
            db: DbState::new(db),
            cart,
            config,
            user_id: SYSTEM_USER.to_string(),
            location_id: location.id,
        })
    }

    /// Records subsequent writes against `user_id`.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn database(&self) -> &Database {
        self.db.inner()
    }
}
