//! # User Repository
//!
//! Till and back-office users. Passwords are stored as Argon2id PHC
//! strings; the plain text never reaches the database.

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use super::{new_id, soft_delete};
use crate::error::{on_duplicate, DbError, DbResult};
use tillstone_core::validation::{validate_name, validate_password, validate_username};
use tillstone_core::{Audit, User, UserRole, ValidationError};

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Creates a user with a freshly hashed password.
    pub async fn create(
        &self,
        username: &str,
        display_name: &str,
        role: UserRole,
        password: &str,
        created_by: &str,
    ) -> DbResult<User> {
        validate_username(username)?;
        validate_name("display_name", display_name, 100)?;
        validate_password(password)?;

        let user = User {
            id: new_id(),
            username: username.to_string(),
            display_name: display_name.trim().to_string(),
            role,
            password_hash: hash_password(password)?,
            audit: Audit::new(created_by),
        };

        debug!(id = %user.id, username = %user.username, "Creating user");

        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, display_name, role, password_hash,
                created_by, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.display_name)
        .bind(user.role)
        .bind(&user.password_hash)
        .bind(&user.audit.created_by)
        .bind(user.audit.created_at)
        .execute(&self.pool)
        .await
        .map_err(on_duplicate("username", &user.username))?;

        Ok(user)
    }

    /// Checks a username / password pair.
    ///
    /// ## Returns
    /// * `Ok(Some(User))` - credentials valid and user active
    /// * `Ok(None)` - unknown user, deleted user or wrong password
    pub async fn authenticate(&self, username: &str, password: &str) -> DbResult<Option<User>> {
        let Some(user) = self.get_by_username(username).await? else {
            debug!(username = %username, "Login for unknown user");
            return Ok(None);
        };

        if !user.audit.is_active() || !verify_password(password, &user.password_hash) {
            warn!(username = %username, "Login rejected");
            return Ok(None);
        }

        Ok(Some(user))
    }

    /// Replaces the password after checking the current one.
    pub async fn change_password(&self, id: &str, current: &str, new: &str) -> DbResult<()> {
        validate_password(new)?;
        let user = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))?;

        if !verify_password(current, &user.password_hash) {
            return Err(ValidationError::invalid("password", "current password is incorrect").into());
        }

        sqlx::query(
            "UPDATE users SET password_hash = ?1, updated_by = ?2, updated_at = ?3 WHERE id = ?2",
        )
        .bind(hash_password(new)?)
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn set_role(&self, id: &str, role: UserRole, user_id: &str) -> DbResult<User> {
        let result = sqlx::query(
            "UPDATE users SET role = ?1, updated_by = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(role)
        .bind(user_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?1")
            .bind(username.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn list(&self, include_deleted: bool) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE (?1 OR deleted_at IS NULL) ORDER BY username",
        )
        .bind(include_deleted)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    pub async fn soft_delete(&self, id: &str, user_id: &str) -> DbResult<()> {
        soft_delete::soft_delete(&self.pool, "users", "User", id, user_id).await
    }

    pub async fn restore(&self, id: &str, user_id: &str) -> DbResult<()> {
        soft_delete::restore(&self.pool, "users", "User", id, user_id).await
    }
}

/// Hash a password for storage.
fn hash_password(password: &str) -> DbResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbError::Internal(format!("Failed to hash password: {}", e)))?;

    Ok(hash.to_string())
}

/// Verify a password against its stored hash.
fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_db;

    #[tokio::test]
    async fn test_authenticate() {
        let db = test_db().await;
        let users = db.users();
        let created = users
            .create("jane", "Jane", UserRole::Cashier, "correct horse", "admin")
            .await
            .unwrap();
        assert!(created.password_hash.starts_with("$argon2"));

        assert!(users.authenticate("jane", "correct horse").await.unwrap().is_some());
        assert!(users.authenticate("jane", "wrong horse").await.unwrap().is_none());
        assert!(users.authenticate("nobody", "correct horse").await.unwrap().is_none());

        users.soft_delete(&created.id, "admin").await.unwrap();
        assert!(users.authenticate("jane", "correct horse").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_change_password_requires_current() {
        let db = test_db().await;
        let users = db.users();
        let user = users
            .create("sam", "Sam", UserRole::Manager, "first-pass", "admin")
            .await
            .unwrap();

        assert!(users.change_password(&user.id, "nope-nope", "second-pass").await.is_err());
        users.change_password(&user.id, "first-pass", "second-pass").await.unwrap();

        assert!(users.authenticate("sam", "second-pass").await.unwrap().is_some());
        assert!(users.authenticate("sam", "first-pass").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_username_rules() {
        let db = test_db().await;
        assert!(db
            .users()
            .create("Jane Doe", "Jane", UserRole::Cashier, "long enough", "admin")
            .await
            .is_err());
        assert!(db
            .users()
            .create("jd", "Jane", UserRole::Cashier, "short", "admin")
            .await
            .is_err());
    }
}
