//! Read-only view of the running configuration and database.

use serde::Serialize;
use tillstone_db::DbStatus;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub device_id: String,
    pub location_id: String,
    pub operator_id: String,
    pub database: DbStatus,
}

pub async fn get_config(state: &AppState) -> ApiResult<AppConfig> {
    debug!("get_config command");
    Ok(state.config.clone())
}

/// Terminal identity plus the database file and its schema version.
pub async fn get_status(state: &AppState) -> ApiResult<StatusResponse> {
    debug!("get_status command");
    let database = state.database().status().await?;
    if !database.schema.is_current() {
        warn!(pending = ?database.schema.pending, "Database schema is behind this build");
    }

    Ok(StatusResponse {
        device_id: state.config.device_id.clone(),
        location_id: state.location_id.clone(),
        operator_id: state.user_id.clone(),
        database,
    })
}
