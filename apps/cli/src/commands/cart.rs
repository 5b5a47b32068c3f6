//! # Cart Commands
//!
//! Ringing up goods before checkout.
//!
//! ## User Workflow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tillstone cart add COKE-330 --qty 2                                    │
//! │                    │                                                    │
//! │                    ▼                                                    │
//! │  ┌────────────────────────────────────────────────────────────────┐    │
//! │  │  1. Look the product up by id, SKU or barcode                  │    │
//! │  │  2. Freeze its price and tax rate into the cart line           │    │
//! │  │  3. Price every line with the configured tax mode              │    │
//! │  │  4. Return items + totals                                      │    │
//! │  └────────────────────────────────────────────────────────────────┘    │
//! │                    │                                                    │
//! │                    ▼                                                    │
//! │  CART                                              2 items             │
//! │  Coca-Cola 330ml         x2              $3.98                         │
//! │  Subtotal $3.98   Tax $0.33   TOTAL $4.31                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use tillstone_core::{Cart, CartTotals, PricedLine};
use tracing::debug;

use crate::commands::party::find_customer;
use crate::commands::product::find_product;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Cart response including priced lines and totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub lines: Vec<PricedLine>,
    pub customer_id: Option<String>,
    pub discount_bps: u32,
    pub totals: CartTotals,
    /// Total formatted in the store currency
    pub total_display: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    /// Product id, SKU or barcode
    pub product: String,
    pub quantity: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartItemRequest {
    pub product: String,
    /// New quantity; 0 removes the line
    pub quantity: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineDiscountRequest {
    pub product: String,
    pub discount_cents: i64,
}

pub(crate) fn cart_response(state: &AppState, cart: &Cart) -> ApiResult<CartResponse> {
    let lines = cart.priced_lines(state.config.tax_mode)?;
    let totals = CartTotals::from_lines(cart, &lines);
    Ok(CartResponse {
        total_display: state.config.format_currency(totals.total_cents),
        lines,
        customer_id: cart.customer_id.clone(),
        discount_bps: cart.discount_bps,
        totals,
    })
}

/// Product id of a cart line named by id or SKU, falling back to a
/// catalogue lookup (barcode).
async fn cart_product_id(state: &AppState, key: &str) -> ApiResult<String> {
    let key = key.trim();
    let in_cart = state.cart.with_cart(|cart| {
        cart.items
            .iter()
            .find(|item| item.product_id == key || item.sku.eq_ignore_ascii_case(key))
            .map(|item| item.product_id.clone())
    })
    .await;

    match in_cart {
        Some(id) => Ok(id),
        None => Ok(find_product(state, key).await?.id),
    }
}

pub async fn get_cart(state: &AppState) -> ApiResult<CartResponse> {
    debug!("get_cart command");
    let cart = state.cart.snapshot().await;
    cart_response(state, &cart)
}

/// Adds a product to the cart or raises its quantity.
///
/// The price is frozen at this moment; later price changes do not touch
/// the cart.
pub async fn add_to_cart(state: &AppState, request: AddToCartRequest) -> ApiResult<CartResponse> {
    let quantity = request.quantity.unwrap_or(1);
    debug!(product = %request.product, quantity = %quantity, "add_to_cart command");

    let product = find_product(state, &request.product).await?;
    if !product.is_active() {
        return Err(ApiError::validation("Product is not available for sale"));
    }

    let cart = state.cart.with_cart_mut(|c| {
        c.add_item(&product, quantity)?;
        Ok(c.clone())
    })
    .await?;
    cart_response(state, &cart)
}

pub async fn update_cart_item(
    state: &AppState,
    request: UpdateCartItemRequest,
) -> ApiResult<CartResponse> {
    debug!(product = %request.product, quantity = %request.quantity, "update_cart_item command");

    let product_id = cart_product_id(state, &request.product).await?;
    let cart = state.cart.with_cart_mut(|c| {
        c.update_quantity(&product_id, request.quantity)?;
        Ok(c.clone())
    })
    .await?;
    cart_response(state, &cart)
}

pub async fn set_line_discount(
    state: &AppState,
    request: LineDiscountRequest,
) -> ApiResult<CartResponse> {
    debug!(product = %request.product, discount = %request.discount_cents, "set_line_discount command");

    let product_id = cart_product_id(state, &request.product).await?;
    let cart = state.cart.with_cart_mut(|c| {
        c.set_line_discount(&product_id, request.discount_cents)?;
        Ok(c.clone())
    })
    .await?;
    cart_response(state, &cart)
}

/// Sets the whole-cart percentage discount in basis points.
pub async fn set_cart_discount(state: &AppState, discount_bps: u32) -> ApiResult<CartResponse> {
    debug!(discount_bps = %discount_bps, "set_cart_discount command");
    let cart = state.cart.with_cart_mut(|c| {
        c.set_discount_bps(discount_bps)?;
        Ok(c.clone())
    })
    .await?;
    cart_response(state, &cart)
}

/// Books the sale to a customer (id or code), or to nobody with `None`.
pub async fn set_cart_customer(state: &AppState, customer: Option<&str>) -> ApiResult<CartResponse> {
    debug!(customer = ?customer, "set_cart_customer command");

    let customer_id = match customer {
        Some(key) => {
            let customer = find_customer(state, key).await?;
            if !customer.audit.is_active() {
                return Err(ApiError::validation("Customer is deleted"));
            }
            Some(customer.id)
        }
        None => None,
    };

    let cart = state.cart.with_cart_mut(|c| {
        c.customer_id = customer_id;
        Ok(c.clone())
    })
    .await?;
    cart_response(state, &cart)
}

pub async fn remove_from_cart(state: &AppState, product: &str) -> ApiResult<CartResponse> {
    debug!(product = %product, "remove_from_cart command");

    let product_id = cart_product_id(state, product).await?;
    let cart = state.cart.with_cart_mut(|c| {
        c.remove_item(&product_id)?;
        Ok(c.clone())
    })
    .await?;
    cart_response(state, &cart)
}

pub async fn clear_cart(state: &AppState) -> ApiResult<CartResponse> {
    debug!("clear_cart command");
    state.cart.clear().await?;
    get_cart(state).await
}
