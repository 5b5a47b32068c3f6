//! Shared setup for the command-layer tests.

#![allow(dead_code)]

use tillstone_cli::commands::party;
use tillstone_cli::commands::product::{self, CreateProductRequest, ProductDto};
use tillstone_cli::commands::user::{self, CreateUserRequest};
use tillstone_cli::config::AppConfig;
use tillstone_cli::state::{AppState, CartState};
use tillstone_core::Supplier;
use tillstone_db::{Database, DbConfig, NewSupplier};

/// Terminal on a fresh in-memory database, untaxed, operated by the
/// system user.
pub async fn till() -> AppState {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    AppState::new(db, CartState::new(), AppConfig::default())
        .await
        .unwrap()
}

/// Product with level-only opening stock at the terminal's location.
pub async fn stocked(state: &AppState, sku: &str, price_cents: i64, quantity: i64) -> ProductDto {
    product::create_product(
        state,
        CreateProductRequest {
            sku: sku.to_string(),
            name: format!("Product {}", sku),
            price_cents,
            cost_cents: price_cents / 2,
            opening_stock: Some(quantity),
            ..Default::default()
        },
    )
    .await
    .unwrap()
}

pub async fn supplier(state: &AppState, code: &str) -> Supplier {
    party::create_supplier(
        state,
        NewSupplier {
            code: code.to_string(),
            name: format!("Supplier {}", code),
            ..Default::default()
        },
    )
    .await
    .unwrap()
}

/// The same terminal operated by a freshly created user with `role`.
pub async fn as_user(state: &AppState, username: &str, role: &str) -> AppState {
    let created = user::create_user(
        state,
        CreateUserRequest {
            username: username.to_string(),
            display_name: username.to_string(),
            role: role.to_string(),
            password: "correct horse battery".to_string(),
        },
    )
    .await
    .unwrap();
    state.clone().with_user(created.id)
}

pub async fn on_hand(state: &AppState, sku: &str) -> i64 {
    product::get_product(state, sku)
        .await
        .unwrap()
        .on_hand
        .unwrap()
}
