//! User accounts, login and the supervisor check.

use serde::{Deserialize, Serialize};
use tillstone_core::{User, UserRole, SYSTEM_USER};
use tracing::{debug, info, warn};

use crate::commands::found;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub display_name: String,
    /// admin, manager or cashier
    pub role: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub username: String,
    pub current_password: String,
    pub new_password: String,
}

pub(crate) fn parse_role(input: &str) -> ApiResult<UserRole> {
    match input.trim().to_ascii_lowercase().as_str() {
        "admin" => Ok(UserRole::Admin),
        "manager" => Ok(UserRole::Manager),
        "cashier" => Ok(UserRole::Cashier),
        _ => Err(ApiError::validation("role must be one of: admin, manager, cashier")),
    }
}

/// Fails unless the operator may void sales, cancel documents and adjust
/// stock. The built-in system operator always may.
pub(crate) async fn ensure_supervisor(state: &AppState) -> ApiResult<()> {
    if state.user_id == SYSTEM_USER {
        return Ok(());
    }

    let user = state.database().users().get_by_id(&state.user_id).await?;
    match user {
        Some(user) if user.audit.is_active() && user.role.can_supervise() => Ok(()),
        _ => {
            warn!(user_id = %state.user_id, "Supervisor action refused");
            Err(ApiError::unauthorized("A manager or admin must do this"))
        }
    }
}

/// Id of an active user, for recording who operates the terminal.
pub async fn operator_id(state: &AppState, username: &str) -> ApiResult<String> {
    match state.database().users().get_by_username(username).await? {
        Some(user) if user.audit.is_active() => Ok(user.id),
        _ => Err(ApiError::unauthorized(format!("Unknown user {}", username.trim()))),
    }
}

async fn find_user(state: &AppState, username: &str) -> ApiResult<User> {
    found(
        state.database().users().get_by_username(username).await?,
        "User",
        username,
    )
}

pub async fn create_user(state: &AppState, request: CreateUserRequest) -> ApiResult<User> {
    debug!(username = %request.username, role = %request.role, "create_user command");

    ensure_supervisor(state).await?;
    let role = parse_role(&request.role)?;
    let user = state
        .database()
        .users()
        .create(
            &request.username,
            &request.display_name,
            role,
            &request.password,
            &state.user_id,
        )
        .await?;
    info!(username = %user.username, "User created");
    Ok(user)
}

/// Checks a username and password.
pub async fn login(state: &AppState, request: LoginRequest) -> ApiResult<User> {
    debug!(username = %request.username, "login command");
    state
        .database()
        .users()
        .authenticate(&request.username, &request.password)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid username or password"))
}

pub async fn change_password(state: &AppState, request: ChangePasswordRequest) -> ApiResult<User> {
    debug!(username = %request.username, "change_password command");
    let user = find_user(state, &request.username).await?;
    state
        .database()
        .users()
        .change_password(&user.id, &request.current_password, &request.new_password)
        .await?;
    Ok(user)
}

pub async fn set_user_role(state: &AppState, username: &str, role: &str) -> ApiResult<User> {
    debug!(username = %username, role = %role, "set_user_role command");
    ensure_supervisor(state).await?;
    let role = parse_role(role)?;
    let user = find_user(state, username).await?;
    Ok(state
        .database()
        .users()
        .set_role(&user.id, role, &state.user_id)
        .await?)
}

pub async fn list_users(state: &AppState, include_deleted: bool) -> ApiResult<Vec<User>> {
    Ok(state.database().users().list(include_deleted).await?)
}

pub async fn delete_user(state: &AppState, username: &str) -> ApiResult<User> {
    debug!(username = %username, "delete_user command");
    ensure_supervisor(state).await?;
    let user = find_user(state, username).await?;
    if user.id == state.user_id {
        return Err(ApiError::validation("You cannot delete yourself"));
    }

    let users = state.database().users();
    users.soft_delete(&user.id, &state.user_id).await?;
    found(users.get_by_id(&user.id).await?, "User", username)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role("Admin").unwrap(), UserRole::Admin);
        assert_eq!(parse_role("cashier").unwrap(), UserRole::Cashier);
        assert!(parse_role("owner").is_err());
    }
}
