//! # Product Commands
//!
//! Product lookup and maintenance.
//!
//! ## Lookup Keys
//! Every command that names a product accepts its id, SKU or barcode, in
//! that order, so a scanner and a keyboard work the same way.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tillstone_core::{Audit, Product};
use tracing::{debug, info};
use uuid::Uuid;

use crate::commands::{found, parse_optional_date};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Product as shown at the till, with stock at this terminal's location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    pub id: String,
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub brand_id: Option<String>,
    pub unit_id: Option<String>,
    pub price_cents: i64,
    pub cost_cents: i64,
    pub tax_rate_bps: u32,
    pub track_inventory: bool,
    pub allow_negative_stock: bool,
    pub reorder_level: i64,
    /// Gross margin on the current cost, None for free items
    pub margin_bps: Option<i64>,
    /// Units on hand at this terminal's location (None when not tracked)
    pub on_hand: Option<i64>,
    pub is_active: bool,
}

impl From<Product> for ProductDto {
    fn from(p: Product) -> Self {
        let is_active = p.is_active();
        let margin_bps = p.margin_bps();
        ProductDto {
            id: p.id,
            sku: p.sku,
            barcode: p.barcode,
            name: p.name,
            description: p.description,
            category_id: p.category_id,
            brand_id: p.brand_id,
            unit_id: p.unit_id,
            price_cents: p.price_cents,
            cost_cents: p.cost_cents,
            tax_rate_bps: p.tax_rate_bps,
            track_inventory: p.track_inventory,
            allow_negative_stock: p.allow_negative_stock,
            reorder_level: p.reorder_level,
            margin_bps,
            on_hand: None,
            is_active,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchProductsRequest {
    pub query: String,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    #[serde(default)]
    pub cost_cents: i64,
    pub barcode: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub brand_id: Option<String>,
    pub unit_id: Option<String>,
    /// Defaults to the configured tax rate
    pub tax_rate_bps: Option<u32>,
    pub track_inventory: Option<bool>,
    /// Defaults to the configured policy
    pub allow_negative_stock: Option<bool>,
    pub reorder_level: Option<i64>,
    /// Opening balance booked at this terminal's location
    pub opening_stock: Option<i64>,
    pub batch_number: Option<String>,
    /// `YYYY-MM-DD`
    pub expiry_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    /// Id, SKU or barcode of the product to change
    pub key: String,
    pub name: Option<String>,
    pub barcode: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub brand_id: Option<String>,
    pub unit_id: Option<String>,
    pub price_cents: Option<i64>,
    pub cost_cents: Option<i64>,
    pub tax_rate_bps: Option<u32>,
    pub track_inventory: Option<bool>,
    pub allow_negative_stock: Option<bool>,
    pub reorder_level: Option<i64>,
}

fn is_barcode_query(query: &str) -> bool {
    let len = query.len();
    (8..=13).contains(&len) && query.chars().all(|c| c.is_ascii_digit())
}

/// Finds a product by id, SKU or barcode. Deleted products are returned
/// too; callers decide whether that matters.
pub(crate) async fn find_product(state: &AppState, key: &str) -> ApiResult<Product> {
    let products = state.database().products();
    let key = key.trim();

    if let Some(product) = products.get_by_id(key).await? {
        return Ok(product);
    }
    if let Some(product) = products.get_by_sku(key).await? {
        return Ok(product);
    }
    found(products.get_by_barcode(key).await?, "Product", key)
}

async fn with_stock(state: &AppState, product: Product) -> ApiResult<ProductDto> {
    let on_hand = if product.track_inventory {
        Some(
            state
                .database()
                .inventory()
                .stock_level(&product.id, &state.location_id)
                .await?,
        )
    } else {
        None
    };
    Ok(ProductDto {
        on_hand,
        ..ProductDto::from(product)
    })
}

/// Searches products by barcode, then full text.
///
/// An 8 to 13 digit query is tried as a barcode first so a scan answers
/// with exactly one product.
pub async fn search_products(
    state: &AppState,
    request: SearchProductsRequest,
) -> ApiResult<Vec<ProductDto>> {
    let start = Instant::now();
    let query = request.query.trim();
    let limit = request.limit.unwrap_or(20).min(100);

    debug!(query = %query, limit = %limit, "search_products command");

    let products = state.database().products();

    if is_barcode_query(query) {
        if let Some(product) = products.get_by_barcode(query).await? {
            if product.is_active() {
                return Ok(vec![with_stock(state, product).await?]);
            }
        }
        debug!("Barcode not found, falling back to FTS search");
    }

    let mut dtos = Vec::new();
    for product in products.search(query, limit).await? {
        dtos.push(with_stock(state, product).await?);
    }

    info!(
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        count = dtos.len(),
        query = %query,
        "search_products complete"
    );

    Ok(dtos)
}

pub async fn get_product(state: &AppState, key: &str) -> ApiResult<ProductDto> {
    debug!(key = %key, "get_product command");
    let product = find_product(state, key).await?;
    with_stock(state, product).await
}

/// Creates a product, optionally with an opening stock balance.
pub async fn create_product(
    state: &AppState,
    request: CreateProductRequest,
) -> ApiResult<ProductDto> {
    debug!(sku = %request.sku, "create_product command");

    let expiry_date = parse_optional_date("expiryDate", request.expiry_date.as_deref())?;
    let db = state.database();

    let product = Product {
        id: Uuid::new_v4().to_string(),
        sku: request.sku.trim().to_string(),
        barcode: request.barcode.filter(|b| !b.trim().is_empty()),
        name: request.name,
        description: request.description,
        category_id: request.category_id,
        brand_id: request.brand_id,
        unit_id: request.unit_id,
        price_cents: request.price_cents,
        cost_cents: request.cost_cents,
        tax_rate_bps: request
            .tax_rate_bps
            .unwrap_or(state.config.default_tax_rate_bps),
        track_inventory: request.track_inventory.unwrap_or(true),
        allow_negative_stock: request
            .allow_negative_stock
            .unwrap_or(state.config.allow_negative_stock),
        reorder_level: request.reorder_level.unwrap_or(0),
        audit: Audit::new(&state.user_id),
    };

    let opening_stock = request.opening_stock.filter(|q| *q != 0);
    if opening_stock.is_some() && !product.track_inventory {
        return Err(ApiError::validation(
            "Opening stock needs a product that tracks inventory",
        ));
    }

    db.products().insert(&product).await?;
    info!(id = %product.id, sku = %product.sku, "Product created");

    if let Some(quantity) = opening_stock {
        db.inventory()
            .set_opening_stock(
                &product.id,
                &state.location_id,
                quantity,
                request.batch_number.as_deref(),
                expiry_date,
                &state.user_id,
            )
            .await?;
    }

    with_stock(state, product).await
}

/// Changes the fields given in the request and leaves the rest alone.
pub async fn update_product(
    state: &AppState,
    request: UpdateProductRequest,
) -> ApiResult<ProductDto> {
    debug!(key = %request.key, "update_product command");

    let mut product = find_product(state, &request.key).await?;

    if let Some(name) = request.name {
        product.name = name;
    }
    if let Some(barcode) = request.barcode {
        product.barcode = Some(barcode).filter(|b| !b.trim().is_empty());
    }
    if let Some(description) = request.description {
        product.description = Some(description).filter(|d| !d.trim().is_empty());
    }
    if let Some(category_id) = request.category_id {
        product.category_id = Some(category_id).filter(|c| !c.is_empty());
    }
    if let Some(brand_id) = request.brand_id {
        product.brand_id = Some(brand_id).filter(|b| !b.is_empty());
    }
    if let Some(unit_id) = request.unit_id {
        product.unit_id = Some(unit_id).filter(|u| !u.is_empty());
    }
    if let Some(price) = request.price_cents {
        product.price_cents = price;
    }
    if let Some(cost) = request.cost_cents {
        product.cost_cents = cost;
    }
    if let Some(bps) = request.tax_rate_bps {
        product.tax_rate_bps = bps;
    }
    if let Some(track) = request.track_inventory {
        product.track_inventory = track;
    }
    if let Some(allow) = request.allow_negative_stock {
        product.allow_negative_stock = allow;
    }
    if let Some(level) = request.reorder_level {
        product.reorder_level = level;
    }

    let updated = state
        .database()
        .products()
        .update(&product, &state.user_id)
        .await?;
    with_stock(state, updated).await
}

pub async fn delete_product(state: &AppState, key: &str) -> ApiResult<ProductDto> {
    debug!(key = %key, "delete_product command");
    let product = find_product(state, key).await?;
    state
        .database()
        .products()
        .soft_delete(&product.id, &state.user_id)
        .await?;
    get_product(state, &product.id).await
}

pub async fn restore_product(state: &AppState, key: &str) -> ApiResult<ProductDto> {
    debug!(key = %key, "restore_product command");
    let product = find_product(state, key).await?;
    state
        .database()
        .products()
        .restore(&product.id, &state.user_id)
        .await?;
    get_product(state, &product.id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barcode_detection() {
        assert!(is_barcode_query("5449000000996"));
        assert!(is_barcode_query("12345678"));
        assert!(!is_barcode_query("1234567"));
        assert!(!is_barcode_query("COKE-330"));
    }
}
