//! # Cart
//!
//! The in-memory draft of a sale, built up line by line at the till and
//! turned into a `Sale` at checkout.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Operator Action          Command                 Cart Change           │
//! │  ───────────────          ───────                 ───────────           │
//! │                                                                         │
//! │  Scan product ───────────► cart add ────────────► merge or push line   │
//! │  Change quantity ────────► cart update ─────────► qty = n (0 removes)  │
//! │  Line discount ──────────► cart discount ───────► line.discount = d    │
//! │  Cart discount ──────────► cart discount --all ─► discount_bps = b     │
//! │  Remove ─────────────────► cart remove ─────────► drop line            │
//! │  Clear ──────────────────► cart clear ──────────► empty                │
//! │  Checkout ───────────────► sale checkout ───────► priced_lines()       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - Lines are unique by `product_id` (adding the same product merges)
//! - Quantity is 1..=[`MAX_ITEM_QUANTITY`]
//! - At most [`MAX_CART_ITEMS`] lines
//! - A line discount never exceeds the line's gross amount

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::pricing::{line_amounts, line_gross, LineAmounts};
use crate::types::{Product, TaxMode, TaxRate};
use crate::validation::validate_quantity;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// A line in the cart.
///
/// Product data is frozen when the line is added, so a price change in
/// the back office does not alter a sale in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,

    /// SKU at time of adding (frozen)
    pub sku: String,

    /// Product name at time of adding (frozen)
    pub name: String,

    /// Price in cents at time of adding (frozen)
    pub unit_price_cents: i64,

    /// Tax rate in basis points at time of adding (frozen)
    pub tax_rate_bps: u32,

    pub quantity: i64,

    /// Fixed discount on this line.
    pub discount_cents: i64,

    pub added_at: DateTime<Utc>,
}

impl CartItem {
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        CartItem {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            unit_price_cents: product.price_cents,
            tax_rate_bps: product.tax_rate_bps,
            quantity,
            discount_cents: 0,
            added_at: Utc::now(),
        }
    }

    /// `unit_price × quantity`, before any discount.
    pub fn gross(&self) -> CoreResult<Money> {
        line_gross(Money::from_cents(self.unit_price_cents), self.quantity)
    }
}

/// A cart line with its computed amounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    pub item: CartItem,
    pub amounts: LineAmounts,
}

/// The shopping cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub items: Vec<CartItem>,

    /// Customer the sale will be booked to, if any.
    pub customer_id: Option<String>,

    /// Whole-cart percentage discount, applied to every line after its
    /// own discount.
    pub discount_bps: u32,

    /// When the cart was created/last cleared
    pub created_at: DateTime<Utc>,
}

impl Default for Cart {
    fn default() -> Self {
        Self::new()
    }
}

impl Cart {
    pub fn new() -> Self {
        Cart {
            items: Vec::new(),
            customer_id: None,
            discount_bps: 0,
            created_at: Utc::now(),
        }
    }

    /// Adds a product or increases its quantity if already present.
    pub fn add_item(&mut self, product: &Product, quantity: i64) -> CoreResult<()> {
        if !product.is_active() {
            return Err(CoreError::Deleted {
                entity: "Product".to_string(),
                id: product.sku.clone(),
            });
        }
        validate_quantity(quantity)?;

        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product.id) {
            let new_qty = item.quantity + quantity;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            item.quantity = new_qty;
            return Ok(());
        }

        if self.items.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            });
        }

        self.items.push(CartItem::from_product(product, quantity));
        Ok(())
    }

    /// Sets a line's quantity. Zero removes the line.
    ///
    /// An existing line discount that no longer fits the smaller line is
    /// capped at the new gross amount.
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_item(product_id);
        }
        validate_quantity(quantity)?;

        let item = self.find_mut(product_id)?;
        item.quantity = quantity;
        let gross = item.gross()?.cents();
        if item.discount_cents > gross {
            item.discount_cents = gross;
        }
        Ok(())
    }

    /// Sets a fixed discount on one line.
    pub fn set_line_discount(&mut self, product_id: &str, discount_cents: i64) -> CoreResult<()> {
        let item = self.find_mut(product_id)?;
        let gross = item.gross()?.cents();
        if discount_cents < 0 || discount_cents > gross {
            return Err(CoreError::DiscountTooLarge {
                discount_cents,
                amount_cents: gross,
            });
        }
        item.discount_cents = discount_cents;
        Ok(())
    }

    /// Sets the whole-cart percentage discount in basis points.
    pub fn set_discount_bps(&mut self, bps: u32) -> CoreResult<()> {
        if bps > 10_000 {
            return Err(ValidationError::OutOfRange {
                field: "discount".to_string(),
                min: 0,
                max: 10_000,
            }
            .into());
        }
        self.discount_bps = bps;
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: &str) -> CoreResult<()> {
        let initial_len = self.items.len();
        self.items.retain(|i| i.product_id != product_id);

        if self.items.len() == initial_len {
            Err(CoreError::NotInCart(product_id.to_string()))
        } else {
            Ok(())
        }
    }

    /// Empties the cart and forgets the customer and cart discount.
    pub fn clear(&mut self) {
        self.items.clear();
        self.customer_id = None;
        self.discount_bps = 0;
        self.created_at = Utc::now();
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Prices every line, folding the cart discount into each line's
    /// discount.
    pub fn priced_lines(&self, mode: TaxMode) -> CoreResult<Vec<PricedLine>> {
        self.items
            .iter()
            .map(|item| {
                let gross = item.gross()?;
                let line_discount = Money::from_cents(item.discount_cents);
                let cart_discount = (gross - line_discount).percentage(self.discount_bps);
                let amounts = line_amounts(
                    Money::from_cents(item.unit_price_cents),
                    item.quantity,
                    line_discount + cart_discount,
                    TaxRate::from_bps(item.tax_rate_bps),
                    mode,
                )?;
                Ok(PricedLine {
                    item: item.clone(),
                    amounts,
                })
            })
            .collect()
    }

    pub fn totals(&self, mode: TaxMode) -> CoreResult<CartTotals> {
        let lines = self.priced_lines(mode)?;
        Ok(CartTotals::from_lines(self, &lines))
    }

    fn find_mut(&mut self, product_id: &str) -> CoreResult<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|i| i.product_id == product_id)
            .ok_or_else(|| CoreError::NotInCart(product_id.to_string()))
    }
}

/// Cart totals summary for responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub item_count: usize,
    pub total_quantity: i64,
    pub gross_cents: i64,
    pub discount_cents: i64,
    /// Sum of net line amounts.
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

impl CartTotals {
    pub fn from_lines(cart: &Cart, lines: &[PricedLine]) -> Self {
        let sum = |f: fn(&LineAmounts) -> Money| -> i64 {
            lines.iter().map(|l| f(&l.amounts)).sum::<Money>().cents()
        };
        CartTotals {
            item_count: cart.item_count(),
            total_quantity: cart.total_quantity(),
            gross_cents: sum(|a| a.gross),
            discount_cents: sum(|a| a.discount),
            subtotal_cents: sum(|a| a.net),
            tax_cents: sum(|a| a.tax),
            total_cents: sum(|a| a.total),
        }
    }
}
