//! # Error Types
//!
//! Domain-specific error types for tillstone-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tillstone-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tillstone-db errors (separate crate)                                  │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  App errors (apps/cli)                                                 │
//! │  └── ApiError         - What the operator sees (serialized)            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Operator     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::document::{DocumentAction, DocumentStatus};

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent business rule violations. They are raised by the pure
/// functions in this crate and re-checked by repositories inside database
/// transactions.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found (or is soft-deleted).
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Insufficient stock to complete a sale, return or transfer.
    ///
    /// ## When This Occurs
    /// - Selling more than is on hand at the location
    /// - Returning to a supplier more than the batch holds
    /// - Cancelling a posted GRN whose stock was already sold
    ///
    /// Only raised when the product has `track_inventory = true` and
    /// `allow_negative_stock = false`.
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Batch does not hold enough units for the requested removal.
    #[error("Batch {batch_number} has {available} units, cannot remove {requested}")]
    InsufficientBatchQuantity {
        batch_number: String,
        available: i64,
        requested: i64,
    },

    /// Sale not found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Sale is not in a state that allows the requested operation.
    #[error("Sale {sale_id} is {current_status}, cannot perform operation")]
    InvalidSaleStatus {
        sale_id: String,
        current_status: String,
    },

    /// A stock document cannot move from its current status.
    ///
    /// ## User Workflow
    /// ```text
    /// GRN-20260105-0003 (Cancelled)
    ///      │
    ///      ▼
    /// post()
    ///      │
    ///      ▼
    /// InvalidDocumentTransition { status: Cancelled, action: Post }
    /// ```
    #[error("{document} is {status}, cannot {action}")]
    InvalidDocumentTransition {
        document: String,
        status: DocumentStatus,
        action: DocumentAction,
    },

    /// Document lines can only be changed while the document is pending.
    #[error("{document} is {status}, lines can no longer be edited")]
    DocumentLocked {
        document: String,
        status: DocumentStatus,
    },

    /// A document must contain at least one line before it is posted.
    #[error("{document} has no lines")]
    EmptyDocument { document: String },

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Product is not in the cart.
    #[error("Product {0} is not in the cart")]
    NotInCart(String),

    /// Cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// Item quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// A discount larger than the amount it applies to.
    #[error("Discount {discount_cents} exceeds line amount {amount_cents}")]
    DiscountTooLarge {
        discount_cents: i64,
        amount_cents: i64,
    },

    /// Payment amount is invalid or does not cover the sale.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    /// Refund quantity exceeds what is still refundable on a sale line.
    #[error("Cannot refund {requested} of {sku}: only {refundable} refundable")]
    RefundExceedsSold {
        sku: String,
        refundable: i64,
        requested: i64,
    },

    /// Replacement quantity exceeds what was returned to the supplier.
    #[error("Cannot replace {requested} of product {product_id}: only {returned} returned")]
    ReplaceExceedsReturned {
        product_id: String,
        returned: i64,
        requested: i64,
    },

    /// Transfer source and destination are the same location.
    #[error("Transfer source and destination must differ")]
    SameLocationTransfer,

    /// Record is soft-deleted and cannot be used.
    #[error("{entity} {id} is deleted")]
    Deleted { entity: String, id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be zero.
    #[error("{field} must not be zero")]
    MustBeNonZero { field: String },

    /// Invalid format (e.g., bad email, uppercase language code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::InvalidFormat`].
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            sku: "RICE-5KG".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for RICE-5KG: available 3, requested 5"
        );
    }

    #[test]
    fn test_transition_message() {
        let err = CoreError::InvalidDocumentTransition {
            document: "GRN-20260105-0003".to_string(),
            status: DocumentStatus::Cancelled,
            action: DocumentAction::Post,
        };
        assert_eq!(err.to_string(), "GRN-20260105-0003 is cancelled, cannot post");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::required("sku");
        assert_eq!(err.to_string(), "sku is required");

        let err = ValidationError::TooShort {
            field: "name".to_string(),
            min: 3,
        };
        assert_eq!(err.to_string(), "name must be at least 3 characters");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("sku").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
