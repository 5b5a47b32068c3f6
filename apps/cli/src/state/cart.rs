//! # Cart State
//!
//! The cart being rung up on this terminal.
//!
//! A one-shot CLI process ends between `cart add` and `sale checkout`, so
//! the binary keeps the cart in a JSON file next to the database. Tests
//! and embedders use the in-memory form.
//!
//! ```text
//! tillstone cart add COKE-330 ──► load cart.json ──► mutate ──► save
//! tillstone cart add CHIPS    ──► load cart.json ──► mutate ──► save
//! tillstone sale checkout     ──► load cart.json ──► draft sale ──► clear
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tillstone_core::{Cart, CoreResult};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::error::{ApiError, ApiResult};

/// Cart state guarded by a mutex.
#[derive(Debug, Clone)]
pub struct CartState {
    cart: Arc<Mutex<Cart>>,
    file: Option<PathBuf>,
}

impl CartState {
    /// Creates an empty cart that lives only as long as the process.
    pub fn new() -> Self {
        CartState {
            cart: Arc::new(Mutex::new(Cart::new())),
            file: None,
        }
    }

    /// Opens the cart stored in `file`, starting empty when the file does
    /// not exist yet.
    pub async fn persistent(file: impl Into<PathBuf>) -> ApiResult<Self> {
        let file = file.into();
        let cart = match tokio::fs::read(&file).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                error!(path = %file.display(), "Cart file is corrupt: {}", e);
                ApiError::cart("The held cart could not be read; clear it to continue")
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => Cart::new(),
            Err(e) => {
                error!(path = %file.display(), "Failed to read cart file: {}", e);
                return Err(ApiError::internal("Could not read the held cart"));
            }
        };

        debug!(path = %file.display(), items = cart.items.len(), "Cart loaded");

        Ok(CartState {
            cart: Arc::new(Mutex::new(cart)),
            file: Some(file),
        })
    }

    /// Runs `f` with read access to the cart.
    pub async fn with_cart<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Cart) -> R,
    {
        let cart = self.cart.lock().await;
        f(&cart)
    }

    /// Runs `f` with write access to the cart and saves the result.
    ///
    /// The cart is left untouched when `f` fails.
    pub async fn with_cart_mut<F, R>(&self, f: F) -> ApiResult<R>
    where
        F: FnOnce(&mut Cart) -> CoreResult<R>,
    {
        let mut cart = self.cart.lock().await;
        let mut draft = cart.clone();
        let result = f(&mut draft)?;
        self.save(&draft).await?;
        *cart = draft;
        Ok(result)
    }

    /// Copy of the current cart.
    pub async fn snapshot(&self) -> Cart {
        self.with_cart(Cart::clone).await
    }

    /// Empties the cart.
    pub async fn clear(&self) -> ApiResult<()> {
        self.with_cart_mut(|cart| {
            cart.clear();
            Ok(())
        })
        .await
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    async fn save(&self, cart: &Cart) -> ApiResult<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };

        let json = serde_json::to_vec_pretty(cart)
            .map_err(|e| ApiError::internal(format!("Could not encode cart: {}", e)))?;
        tokio::fs::write(file, json).await.map_err(|e| {
            error!(path = %file.display(), "Failed to write cart file: {}", e);
            ApiError::internal("Could not save the held cart")
        })
    }
}

impl Default for CartState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tillstone_core::{Audit, CoreError, Product};

    fn product(id: &str, price_cents: i64) -> Product {
        Product {
            id: id.to_string(),
            sku: format!("SKU-{}", id),
            barcode: None,
            name: format!("Product {}", id),
            description: None,
            category_id: None,
            brand_id: None,
            unit_id: None,
            price_cents,
            cost_cents: price_cents / 2,
            tax_rate_bps: 0,
            track_inventory: true,
            allow_negative_stock: false,
            reorder_level: 0,
            audit: Audit::new("tester"),
        }
    }

    async fn temp_file(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("tillstone-{}-{}.json", name, std::process::id()));
        remove(&path).await;
        path
    }

    async fn remove(path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            assert_eq!(e.kind(), ErrorKind::NotFound, "{}", e);
        }
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_cart_unchanged() {
        let state = CartState::new();
        state.with_cart_mut(|c| c.add_item(&product("1", 100), 2)).await.unwrap();

        let err = state
            .with_cart_mut(|c| {
                c.add_item(&product("2", 100), 1)?;
                Err::<(), _>(CoreError::EmptyCart)
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::CartError);
        assert_eq!(state.with_cart(|c| c.item_count()).await, 1);
    }

    #[tokio::test]
    async fn test_persistent_cart_survives_reopen() {
        let path = temp_file("reopen").await;

        let state = CartState::persistent(&path).await.unwrap();
        assert!(state.snapshot().await.is_empty());
        state.with_cart_mut(|c| c.add_item(&product("1", 250), 3)).await.unwrap();
        drop(state);

        let reopened = CartState::persistent(&path).await.unwrap();
        assert_eq!(reopened.with_cart(|c| c.total_quantity()).await, 3);

        reopened.clear().await.unwrap();
        let cleared = CartState::persistent(&path).await.unwrap();
        assert!(cleared.with_cart(|c| c.is_empty()).await);

        remove(&path).await;
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let path = temp_file("corrupt").await;
        tokio::fs::write(&path, b"not json").await.unwrap();

        let err = CartState::persistent(&path).await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::CartError);

        remove(&path).await;
    }
}
