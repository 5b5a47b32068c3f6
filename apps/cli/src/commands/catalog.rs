//! Category, brand, unit and location maintenance.

use serde::{Deserialize, Serialize};
use tillstone_core::{Brand, Category, Location, Unit};
use tracing::debug;

use crate::commands::{found, resolve_location};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    pub name: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBrandRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUnitRequest {
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLocationRequest {
    pub code: String,
    pub name: String,
}

// =============================================================================
// Categories
// =============================================================================

pub async fn create_category(state: &AppState, request: CreateCategoryRequest) -> ApiResult<Category> {
    debug!(name = %request.name, "create_category command");
    let category = state
        .database()
        .categories()
        .create(&request.name, request.parent_id.as_deref(), &state.user_id)
        .await?;
    Ok(category)
}

pub async fn list_categories(state: &AppState, include_deleted: bool) -> ApiResult<Vec<Category>> {
    Ok(state.database().categories().list(include_deleted).await?)
}

pub async fn delete_category(state: &AppState, id: &str) -> ApiResult<Category> {
    debug!(id = %id, "delete_category command");
    let categories = state.database().categories();
    categories.soft_delete(id, &state.user_id).await?;
    found(categories.get_by_id(id).await?, "Category", id)
}

// =============================================================================
// Brands
// =============================================================================

pub async fn create_brand(state: &AppState, request: CreateBrandRequest) -> ApiResult<Brand> {
    debug!(name = %request.name, "create_brand command");
    Ok(state
        .database()
        .brands()
        .create(&request.name, &state.user_id)
        .await?)
}

pub async fn list_brands(state: &AppState, include_deleted: bool) -> ApiResult<Vec<Brand>> {
    Ok(state.database().brands().list(include_deleted).await?)
}

pub async fn delete_brand(state: &AppState, id: &str) -> ApiResult<Brand> {
    debug!(id = %id, "delete_brand command");
    let brands = state.database().brands();
    brands.soft_delete(id, &state.user_id).await?;
    found(brands.get_by_id(id).await?, "Brand", id)
}

// =============================================================================
// Units
// =============================================================================

pub async fn create_unit(state: &AppState, request: CreateUnitRequest) -> ApiResult<Unit> {
    debug!(name = %request.name, symbol = %request.symbol, "create_unit command");
    Ok(state
        .database()
        .units()
        .create(&request.name, &request.symbol, &state.user_id)
        .await?)
}

pub async fn list_units(state: &AppState, include_deleted: bool) -> ApiResult<Vec<Unit>> {
    Ok(state.database().units().list(include_deleted).await?)
}

pub async fn delete_unit(state: &AppState, id: &str) -> ApiResult<Unit> {
    debug!(id = %id, "delete_unit command");
    let units = state.database().units();
    units.soft_delete(id, &state.user_id).await?;
    found(units.get_by_id(id).await?, "Unit", id)
}

// =============================================================================
// Locations
// =============================================================================

pub async fn create_location(state: &AppState, request: CreateLocationRequest) -> ApiResult<Location> {
    debug!(code = %request.code, "create_location command");
    Ok(state
        .database()
        .locations()
        .create(&request.code, &request.name, &state.user_id)
        .await?)
}

pub async fn list_locations(state: &AppState, include_deleted: bool) -> ApiResult<Vec<Location>> {
    Ok(state.database().locations().list(include_deleted).await?)
}

/// Deletes a location by code or id.
///
/// The terminal's own location cannot be deleted.
pub async fn delete_location(state: &AppState, key: &str) -> ApiResult<Location> {
    debug!(key = %key, "delete_location command");
    let id = resolve_location(state, Some(key)).await?;
    if id == state.location_id {
        return Err(ApiError::validation(
            "The location this terminal sells from cannot be deleted",
        ));
    }

    let locations = state.database().locations();
    locations.soft_delete(&id, &state.user_id).await?;
    found(locations.get_by_id(&id).await?, "Location", &id)
}
