//! Sales, payments, refunds and exchanges.
//!
//! ## Sale Lifecycle
//! ```text
//! Draft ──finalize──► Completed ──void──► Voided
//!   │                     │
//!   └────────void─────────┘        Completed ──refund──► (Refund rows)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use super::TaxMode;
use crate::money::Money;

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Items captured, awaiting payment.
    #[default]
    Draft,
    /// Paid and finalized; stock deducted.
    Completed,
    /// Cancelled; stock restored if it had been deducted.
    Voided,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Draft => "draft",
            SaleStatus::Completed => "completed",
            SaleStatus::Voided => "voided",
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash; the only method that produces change.
    Cash,
    /// Card payment on an external terminal.
    Card,
    /// Gift voucher.
    Voucher,
    /// Credit issued by an earlier refund or exchange.
    StoreCredit,
}

impl PaymentMethod {
    /// Parses operator input such as "cash", "card", "credit".
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "cash" => Some(PaymentMethod::Cash),
            "card" | "credit_card" | "debit" | "debit_card" => Some(PaymentMethod::Card),
            "voucher" | "gift" => Some(PaymentMethod::Voucher),
            "store_credit" | "credit" => Some(PaymentMethod::StoreCredit),
            _ => None,
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A completed or in-progress sale transaction.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub receipt_number: String,
    pub customer_id: Option<String>,
    /// Location whose stock the sale draws from.
    pub location_id: String,
    pub status: SaleStatus,
    /// Whether item prices included tax when the sale was rung up.
    pub tax_mode: TaxMode,
    /// Sum of line totals (after line discounts, before exclusive tax).
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    /// Sum of line discounts, for reporting.
    pub discount_cents: i64,
    pub total_cents: i64,
    pub user_id: String,
    pub device_id: String,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// SKU at time of sale (frozen).
    pub sku_snapshot: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    pub quantity: i64,
    /// Discount applied to this line.
    pub discount_cents: i64,
    /// Tax rate at time of sale (frozen).
    pub tax_rate_bps: u32,
    /// Tax for this line item.
    pub tax_cents: i64,
    /// `quantity × unit_price − discount`.
    pub line_total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }

    /// What the customer actually paid for this line.
    pub fn charged(&self, mode: TaxMode) -> Money {
        match mode {
            TaxMode::Exclusive => Money::from_cents(self.line_total_cents + self.tax_cents),
            TaxMode::Inclusive => self.line_total(),
        }
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A payment towards a sale. Split tender means several payments.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub sale_id: String,
    pub method: PaymentMethod,
    /// Amount applied to the sale.
    pub amount_cents: i64,
    /// For cash: amount the customer handed over.
    pub tendered_cents: Option<i64>,
    /// For cash: change returned to the customer.
    pub change_cents: Option<i64>,
    /// External reference (card auth code, voucher number).
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Refunds & Exchanges
// =============================================================================

/// Money and (optionally) goods returned against a completed sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Refund {
    pub id: String,
    pub refund_number: String,
    pub sale_id: String,
    pub reason: Option<String>,
    pub method: PaymentMethod,
    pub total_cents: i64,
    pub user_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RefundItem {
    pub id: String,
    pub refund_id: String,
    pub sale_item_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Pro-rated share of the sale line total plus its tax.
    pub amount_cents: i64,
    /// Whether the goods went back on the shelf.
    pub restock: bool,
}

/// Goods returned and replaced by other goods in one visit.
///
/// `balance_cents > 0`: customer paid the difference.
/// `balance_cents < 0`: the store paid the difference back.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Exchange {
    pub id: String,
    pub exchange_number: String,
    pub original_sale_id: String,
    pub refund_id: String,
    pub new_sale_id: String,
    pub balance_cents: i64,
    pub user_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: i64, unit_price_cents: i64, discount_cents: i64) -> SaleItem {
        SaleItem {
            id: "i1".to_string(),
            sale_id: "s1".to_string(),
            product_id: "p1".to_string(),
            sku_snapshot: "TEA-100".to_string(),
            name_snapshot: "Black Tea 100g".to_string(),
            unit_price_cents,
            quantity,
            discount_cents,
            tax_rate_bps: 0,
            tax_cents: 0,
            line_total_cents: quantity * unit_price_cents - discount_cents,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_charged_depends_on_tax_mode() {
        let mut line = item(2, 500, 0);
        line.tax_cents = 80;
        assert_eq!(line.charged(TaxMode::Exclusive).cents(), 1080);
        assert_eq!(line.charged(TaxMode::Inclusive).cents(), 1000);
    }

    #[test]
    fn test_payment_method_parse() {
        assert_eq!(PaymentMethod::parse("Cash"), Some(PaymentMethod::Cash));
        assert_eq!(PaymentMethod::parse("debit"), Some(PaymentMethod::Card));
        assert_eq!(PaymentMethod::parse("credit"), Some(PaymentMethod::StoreCredit));
        assert_eq!(PaymentMethod::parse("cheque"), None);
    }

    #[test]
    fn test_sale_status_default() {
        assert_eq!(SaleStatus::default(), SaleStatus::Draft);
        assert_eq!(SaleStatus::Voided.to_string(), "voided");
    }
}
