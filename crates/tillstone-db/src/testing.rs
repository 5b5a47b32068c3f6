//! Fixtures shared by the repository tests.

use tillstone_core::{Audit, Location, Product, Supplier};

use crate::repository::NewSupplier;
use crate::{Database, DbConfig};

/// Fresh in-memory database with every migration applied.
pub async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

/// Untaxed, stock-tracked product that is not yet saved.
pub fn product(sku: &str, price_cents: i64) -> Product {
    Product {
        id: uuid::Uuid::new_v4().to_string(),
        sku: sku.to_string(),
        barcode: None,
        name: format!("Product {sku}"),
        description: None,
        category_id: None,
        brand_id: None,
        unit_id: None,
        price_cents,
        cost_cents: price_cents / 2,
        tax_rate_bps: 0,
        track_inventory: true,
        allow_negative_stock: false,
        reorder_level: 5,
        audit: Audit::new("admin"),
    }
}

pub async fn insert_product(db: &Database, sku: &str, price_cents: i64) -> Product {
    let p = product(sku, price_cents);
    db.products().insert(&p).await.unwrap();
    p
}

/// Product with `quantity` units of level-only opening stock at `location`.
pub async fn stocked_product(
    db: &Database,
    sku: &str,
    price_cents: i64,
    location: &Location,
    quantity: i64,
) -> Product {
    let p = insert_product(db, sku, price_cents).await;
    db.inventory()
        .set_opening_stock(&p.id, &location.id, quantity, None, None, "admin")
        .await
        .unwrap();
    p
}

pub async fn location(db: &Database, code: &str) -> Location {
    db.locations()
        .create(code, &format!("{code} store"), "admin")
        .await
        .unwrap()
}

pub async fn supplier(db: &Database, code: &str) -> Supplier {
    let input = NewSupplier {
        code: code.to_string(),
        name: format!("Supplier {code}"),
        ..Default::default()
    };
    db.suppliers().create(&input, "admin").await.unwrap()
}
