//! Supplier and customer maintenance.

use serde::{Deserialize, Serialize};
use tillstone_core::{Customer, Supplier};
use tillstone_db::{NewCustomer, NewSupplier};
use tracing::debug;

use crate::commands::found;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPartiesRequest {
    pub query: String,
    pub limit: Option<u32>,
}

// =============================================================================
// Suppliers
// =============================================================================

pub(crate) async fn find_supplier(state: &AppState, key: &str) -> ApiResult<Supplier> {
    let suppliers = state.database().suppliers();
    if let Some(supplier) = suppliers.get_by_id(key).await? {
        return Ok(supplier);
    }
    found(suppliers.get_by_code(key).await?, "Supplier", key)
}

pub async fn create_supplier(state: &AppState, request: NewSupplier) -> ApiResult<Supplier> {
    debug!(code = %request.code, "create_supplier command");
    Ok(state
        .database()
        .suppliers()
        .create(&request, &state.user_id)
        .await?)
}

pub async fn search_suppliers(
    state: &AppState,
    request: SearchPartiesRequest,
) -> ApiResult<Vec<Supplier>> {
    debug!(query = %request.query, "search_suppliers command");
    let limit = request.limit.unwrap_or(20).min(100);
    Ok(state
        .database()
        .suppliers()
        .search(&request.query, limit)
        .await?)
}

pub async fn get_supplier(state: &AppState, key: &str) -> ApiResult<Supplier> {
    find_supplier(state, key).await
}

/// Deletes a supplier by id or code.
pub async fn delete_supplier(state: &AppState, key: &str) -> ApiResult<Supplier> {
    debug!(key = %key, "delete_supplier command");
    let supplier = find_supplier(state, key).await?;
    let suppliers = state.database().suppliers();
    suppliers.soft_delete(&supplier.id, &state.user_id).await?;
    found(suppliers.get_by_id(&supplier.id).await?, "Supplier", key)
}

// =============================================================================
// Customers
// =============================================================================

pub(crate) async fn find_customer(state: &AppState, key: &str) -> ApiResult<Customer> {
    let customers = state.database().customers();
    if let Some(customer) = customers.get_by_id(key).await? {
        return Ok(customer);
    }
    found(customers.get_by_code(key).await?, "Customer", key)
}

pub async fn create_customer(state: &AppState, request: NewCustomer) -> ApiResult<Customer> {
    debug!(code = %request.code, "create_customer command");
    Ok(state
        .database()
        .customers()
        .create(&request, &state.user_id)
        .await?)
}

pub async fn search_customers(
    state: &AppState,
    request: SearchPartiesRequest,
) -> ApiResult<Vec<Customer>> {
    debug!(query = %request.query, "search_customers command");
    let limit = request.limit.unwrap_or(20).min(100);
    Ok(state
        .database()
        .customers()
        .search(&request.query, limit)
        .await?)
}

pub async fn get_customer(state: &AppState, key: &str) -> ApiResult<Customer> {
    find_customer(state, key).await
}

/// Deletes a customer by id or code.
pub async fn delete_customer(state: &AppState, key: &str) -> ApiResult<Customer> {
    debug!(key = %key, "delete_customer command");
    let customer = find_customer(state, key).await?;
    let customers = state.database().customers();
    customers.soft_delete(&customer.id, &state.user_id).await?;
    found(customers.get_by_id(&customer.id).await?, "Customer", key)
}
