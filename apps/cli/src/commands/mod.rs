//! # Command Functions
//!
//! One async function per till or back-office action. Each takes the
//! `AppState` plus a camelCase request DTO and returns `ApiResult`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  product   search / get / create / update / delete / restore            │
//! │  catalog   categories, brands, units, locations                         │
//! │  party     suppliers, customers                                         │
//! │  cart      add / update / discount / remove / clear / get               │
//! │  sale      checkout / pay / finalize + receipt / void                   │
//! │  refund    refund / exchange                                            │
//! │  goods     GRN, goods return, goods replace                             │
//! │  stock     adjust / transfer / levels / movements                       │
//! │  label     languages / labels / seed                                    │
//! │  user      create / login                                               │
//! │  report    daily summary / valuation / low stock                        │
//! │  config    get                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod cart;
pub mod catalog;
pub mod config;
pub mod goods;
pub mod label;
pub mod party;
pub mod product;
pub mod refund;
pub mod report;
pub mod sale;
pub mod stock;
pub mod user;

use chrono::NaiveDate;
use tillstone_core::{DocumentStatus, PaymentMethod};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub(crate) fn found<T>(value: Option<T>, resource: &str, id: &str) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::not_found(resource, id))
}

/// Location id for a code, or the terminal's own location.
pub(crate) async fn resolve_location(state: &AppState, code: Option<&str>) -> ApiResult<String> {
    let Some(code) = code else {
        return Ok(state.location_id.clone());
    };

    let locations = state.database().locations();
    let location = match locations.get_by_code(code).await? {
        Some(location) => location,
        None => found(locations.get_by_id(code).await?, "Location", code)?,
    };
    Ok(location.id)
}

pub(crate) fn parse_date(field: &str, input: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::validation(format!("{} must be a date like 2026-01-31", field)))
}

pub(crate) fn parse_optional_date(field: &str, input: Option<&str>) -> ApiResult<Option<NaiveDate>> {
    input.map(|value| parse_date(field, value)).transpose()
}

pub(crate) fn parse_status(input: Option<&str>) -> ApiResult<Option<DocumentStatus>> {
    input
        .map(|value| {
            DocumentStatus::parse(value).ok_or_else(|| {
                ApiError::validation("status must be one of: pending, posted, cancelled")
            })
        })
        .transpose()
}

pub(crate) fn parse_method(input: &str) -> ApiResult<PaymentMethod> {
    PaymentMethod::parse(input).ok_or_else(|| {
        ApiError::validation("payment method must be one of: cash, card, voucher, store_credit")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("date", "2026-01-31").unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()
        );
        assert!(parse_date("date", "31/01/2026").is_err());
        assert_eq!(parse_optional_date("expiry", None).unwrap(), None);
    }

    #[test]
    fn test_parse_status_and_method() {
        assert_eq!(parse_status(Some("posted")).unwrap(), Some(DocumentStatus::Posted));
        assert!(parse_status(Some("draft")).is_err());
        assert_eq!(parse_method("credit").unwrap(), PaymentMethod::StoreCredit);
        assert!(parse_method("cheque").is_err());
    }
}
