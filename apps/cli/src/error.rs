//! # API Error Type
//!
//! Unified error type returned by every command function.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            Error Flow                                   │
//! │                                                                         │
//! │  tillstone-core           tillstone-db               tillstone-cli      │
//! │  ┌──────────────┐        ┌──────────────┐          ┌──────────────┐    │
//! │  │  CoreError   │──────► │   DbError    │────────► │   ApiError   │    │
//! │  │ (rules)      │ Rule() │ (storage)    │  From    │ code+message │    │
//! │  └──────┬───────┘        └──────────────┘          └──────┬───────┘    │
//! │         │                                                 │            │
//! │         └─────────────────── From ────────────────────────┘            │
//! │                                                           │            │
//! │                                                           ▼            │
//! │                                          {"code": "...", "message": ""}│
//! │                                                                         │
//! │  Storage failures are logged in full; the user sees a generic message. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use tillstone_core::CoreError;
use tillstone_db::DbError;

use crate::config::ConfigError;

/// Error returned from command functions.
///
/// ## Serialization
/// This is what the binary prints when a command fails:
/// ```json
/// {
///   "code": "INSUFFICIENT_STOCK",
///   "message": "Insufficient stock for COKE-330: available 2, requested 5"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

/// Error codes for command responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found
    NotFound,

    /// Input validation failed
    ValidationError,

    /// Database operation failed
    DatabaseError,

    /// Business rule rejected the operation
    BusinessLogic,

    /// Internal error
    Internal,

    /// Cart operation failed
    CartError,

    /// Insufficient stock
    InsufficientStock,

    /// Payment processing error
    PaymentError,

    /// Login failed
    Unauthorized,

    /// Configuration could not be loaded
    ConfigError,
}

/// Result alias for command functions.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    pub fn cart(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::CartError, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Unauthorized, message)
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::ValidationError,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::ValidationError, "Invalid reference")
            }
            DbError::Rule(core) => ApiError::from(core),
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::ProductNotFound(_) | CoreError::SaleNotFound(_) => ErrorCode::NotFound,
            CoreError::InsufficientStock { .. } | CoreError::InsufficientBatchQuantity { .. } => {
                ErrorCode::InsufficientStock
            }
            CoreError::CartTooLarge { .. } | CoreError::NotInCart(_) | CoreError::EmptyCart => {
                ErrorCode::CartError
            }
            CoreError::InvalidPaymentAmount { .. } => ErrorCode::PaymentError,
            CoreError::QuantityTooLarge { .. }
            | CoreError::DiscountTooLarge { .. }
            | CoreError::Validation(_) => ErrorCode::ValidationError,
            CoreError::InvalidSaleStatus { .. }
            | CoreError::InvalidDocumentTransition { .. }
            | CoreError::DocumentLocked { .. }
            | CoreError::EmptyDocument { .. }
            | CoreError::RefundExceedsSold { .. }
            | CoreError::ReplaceExceedsReturned { .. }
            | CoreError::SameLocationTransfer
            | CoreError::Deleted { .. } => ErrorCode::BusinessLogic,
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::new(ErrorCode::ConfigError, err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tillstone_core::ValidationError;

    #[test]
    fn test_rule_errors_keep_their_code() {
        let err = ApiError::from(DbError::Rule(CoreError::InsufficientStock {
            sku: "COKE-330".to_string(),
            available: 2,
            requested: 5,
        }));
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert!(err.message.contains("COKE-330"));
    }

    #[test]
    fn test_query_failure_is_generic() {
        let err = ApiError::from(DbError::QueryFailed("no such column: x".to_string()));
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("column"));
    }

    #[test]
    fn test_serializes_screaming_code() {
        let err = ApiError::from(CoreError::Validation(ValidationError::required("sku")));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert_eq!(json["message"], "Validation error: sku is required");
    }
}
