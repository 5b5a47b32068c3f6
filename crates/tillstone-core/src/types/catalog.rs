//! Catalog master data: categories, brands, units, locations, products.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{Audit, TaxRate};
use crate::error::ValidationError;
use crate::money::Money;

/// Product category. Categories nest through `parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub audit: Audit,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Brand {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub audit: Audit,
}

/// Unit of measurement (UOM): "Piece", "Kilogram", "Bottle", ...
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Unit {
    pub id: String,
    pub name: String,
    pub symbol: String,
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub audit: Audit,
}

/// A place that holds stock: shop floor, back store, kitchen, warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Location {
    pub id: String,
    /// Short business code, e.g. "MAIN" or "KITCHEN".
    pub code: String,
    pub name: String,
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub audit: Audit,
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale and stock keeping.
///
/// Stock is not stored on the product; it lives per location in
/// `stock_levels` and per delivery in `batches`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Barcode (EAN-13, UPC-A, etc.).
    pub barcode: Option<String>,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    pub description: Option<String>,

    pub category_id: Option<String>,

    pub brand_id: Option<String>,

    pub unit_id: Option<String>,

    /// Selling price in cents.
    pub price_cents: i64,

    /// Latest purchase cost in cents. Updated when a GRN is posted.
    pub cost_cents: i64,

    /// Tax rate in basis points (825 = 8.25%).
    pub tax_rate_bps: u32,

    /// Whether stock is tracked for this product.
    pub track_inventory: bool,

    /// Allow selling/removing below zero on hand.
    pub allow_negative_stock: bool,

    /// On-hand quantity at or below which the product is reported as low.
    pub reorder_level: i64,

    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub audit: Audit,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.audit.is_active()
    }

    /// Checks whether `quantity` can leave a location holding `on_hand`.
    pub fn can_remove(&self, on_hand: i64, quantity: i64) -> bool {
        !self.track_inventory || self.allow_negative_stock || on_hand >= quantity
    }

    /// Services and other untracked items cannot appear on stock documents.
    pub fn ensure_tracked(&self) -> Result<(), ValidationError> {
        if self.track_inventory {
            Ok(())
        } else {
            Err(ValidationError::invalid(
                "product",
                format!("{} does not track inventory", self.sku),
            ))
        }
    }

    /// Gross margin in basis points of the selling price.
    ///
    /// Returns `None` for free items.
    pub fn margin_bps(&self) -> Option<i64> {
        if self.price_cents <= 0 {
            return None;
        }
        Some((self.price_cents - self.cost_cents) * 10_000 / self.price_cents)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn product(id: &str, price_cents: i64) -> Product {
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
            tax_rate_bps: 825,
            track_inventory: true,
            allow_negative_stock: false,
            reorder_level: 5,
            audit: Audit::new("admin"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::product;

    #[test]
    fn test_can_remove_respects_stock_policy() {
        let mut p = product("1", 1000);
        assert!(p.can_remove(5, 5));
        assert!(!p.can_remove(4, 5));

        p.allow_negative_stock = true;
        assert!(p.can_remove(0, 5));

        p.allow_negative_stock = false;
        p.track_inventory = false;
        assert!(p.can_remove(0, 5));
        assert!(p.ensure_tracked().is_err());
    }

    #[test]
    fn test_margin() {
        let p = product("1", 1000);
        assert_eq!(p.margin_bps(), Some(5000));
        assert_eq!(product("2", 0).margin_bps(), None);
    }
}
