//! # Pricing
//!
//! Line arithmetic shared by the cart, sales, refunds, exchanges and
//! goods received notes.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Line Amounts                                     │
//! │                                                                         │
//! │   gross    = quantity × unit_price                                      │
//! │   net      = gross − discount                     (SaleItem line total) │
//! │                                                                         │
//! │   Exclusive:  tax = net × rate          total = net + tax              │
//! │   Inclusive:  tax = net × r / (1 + r)   total = net                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{TaxMode, TaxRate};

/// Computed amounts for one priced line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineAmounts {
    pub gross: Money,
    pub discount: Money,
    pub net: Money,
    pub tax: Money,
    pub total: Money,
}

/// Prices one line.
///
/// Fails when the discount is negative or larger than the gross amount.
///
/// ## Example
/// ```rust
/// use tillstone_core::money::Money;
/// use tillstone_core::pricing::line_amounts;
/// use tillstone_core::types::{TaxMode, TaxRate};
///
/// let line = line_amounts(
///     Money::from_cents(450),
///     3,
///     Money::from_cents(100),
///     TaxRate::from_bps(1000),
///     TaxMode::Exclusive,
/// )
/// .unwrap();
/// assert_eq!(line.net.cents(), 1250);
/// assert_eq!(line.tax.cents(), 125);
/// assert_eq!(line.total.cents(), 1375);
/// ```
pub fn line_amounts(
    unit_price: Money,
    quantity: i64,
    discount: Money,
    tax_rate: TaxRate,
    mode: TaxMode,
) -> CoreResult<LineAmounts> {
    let gross = line_gross(unit_price, quantity)?;

    if discount.is_negative() {
        return Err(ValidationError::MustBePositive {
            field: "discount".to_string(),
        }
        .into());
    }
    if discount > gross.abs() {
        return Err(CoreError::DiscountTooLarge {
            discount_cents: discount.cents(),
            amount_cents: gross.cents(),
        });
    }

    let net = gross - discount;
    let (tax, total) = match mode {
        TaxMode::Exclusive => {
            let tax = net.calculate_tax(tax_rate);
            (tax, net + tax)
        }
        TaxMode::Inclusive => (net.extract_inclusive_tax(tax_rate), net),
    };

    Ok(LineAmounts {
        gross,
        discount,
        net,
        tax,
        total,
    })
}

/// `unit * quantity`, rejecting amounts too large to store.
pub fn line_gross(unit: Money, quantity: i64) -> CoreResult<Money> {
    unit.checked_mul(quantity).ok_or_else(|| {
        ValidationError::OutOfRange {
            field: "line_total".to_string(),
            min: i64::MIN,
            max: i64::MAX,
        }
        .into()
    })
}

/// Sum of document line totals, rejecting a total too large to store.
pub fn document_total(lines: impl IntoIterator<Item = Money>) -> CoreResult<Money> {
    lines
        .into_iter()
        .try_fold(0i64, |total, line| total.checked_add(line.cents()))
        .map(Money::from_cents)
        .ok_or_else(|| {
            ValidationError::OutOfRange {
                field: "total".to_string(),
                min: i64::MIN,
                max: i64::MAX,
            }
            .into()
        })
}

/// Change owed to a cash customer.
///
/// ```rust
/// use tillstone_core::money::Money;
/// use tillstone_core::pricing::change_due;
///
/// let change = change_due(Money::from_cents(1083), Money::from_cents(2000)).unwrap();
/// assert_eq!(change.cents(), 917);
/// ```
pub fn change_due(total: Money, tendered: Money) -> CoreResult<Money> {
    if tendered < total {
        return Err(CoreError::InvalidPaymentAmount {
            reason: format!(
                "tendered {} is less than amount due {}",
                tendered, total
            ),
        });
    }
    Ok(tendered - total)
}

/// Difference between the new sale and the refunded goods of an exchange.
///
/// Positive: the customer pays. Negative: the store pays back.
#[inline]
pub fn exchange_balance(refund_total: Money, new_sale_total: Money) -> Money {
    new_sale_total - refund_total
}

/// Charged amount of a GRN line. Free units are received but not charged.
pub fn grn_line_total(quantity: i64, unit_cost: Money, discount: Money) -> CoreResult<Money> {
    if unit_cost.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "unit_cost".to_string(),
            min: 0,
            max: i64::MAX,
        }
        .into());
    }
    let gross = line_gross(unit_cost, quantity)?;
    if discount.is_negative() || discount > gross {
        return Err(CoreError::DiscountTooLarge {
            discount_cents: discount.cents(),
            amount_cents: gross.cents(),
        });
    }
    Ok(gross - discount)
}

/// Units of a sale line that can still be refunded.
#[inline]
pub fn refundable_quantity(sold: i64, already_refunded: i64) -> i64 {
    (sold - already_refunded).max(0)
}

/// Refund owed for `quantity` of `sold` units on a line that charged
/// `charged` in total.
///
/// Refunding the last units of a line returns whatever is left of the
/// line, so partial refunds never sum to more or less than was paid.
///
/// ```rust
/// use tillstone_core::money::Money;
/// use tillstone_core::pricing::refund_line_amount;
///
/// let charged = Money::from_cents(1000);
/// let first = refund_line_amount(charged, Money::zero(), 1, 3, 0);
/// let second = refund_line_amount(charged, first, 1, 3, 1);
/// let last = refund_line_amount(charged, first + second, 1, 3, 2);
/// assert_eq!((first + second + last).cents(), 1000);
/// ```
pub fn refund_line_amount(
    charged: Money,
    already_refunded_amount: Money,
    quantity: i64,
    sold: i64,
    already_refunded_quantity: i64,
) -> Money {
    if already_refunded_quantity + quantity >= sold {
        return charged - already_refunded_amount;
    }
    charged.prorate(quantity, sold)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cents(c: i64) -> Money {
        Money::from_cents(c)
    }

    #[test]
    fn test_inclusive_line_extracts_tax() {
        let line = line_amounts(cents(1100), 1, Money::zero(), TaxRate::from_bps(1000), TaxMode::Inclusive)
            .unwrap();
        assert_eq!(line.net.cents(), 1100);
        assert_eq!(line.tax.cents(), 100);
        assert_eq!(line.total.cents(), 1100);
    }

    #[test]
    fn test_discount_larger_than_gross_fails() {
        let err = line_amounts(cents(100), 2, cents(201), TaxRate::zero(), TaxMode::Exclusive)
            .unwrap_err();
        assert!(matches!(err, CoreError::DiscountTooLarge { .. }));
    }

    #[test]
    fn test_negative_discount_fails() {
        assert!(line_amounts(cents(100), 1, cents(-1), TaxRate::zero(), TaxMode::Exclusive).is_err());
    }

    #[test]
    fn test_change_due_requires_enough_cash() {
        assert_eq!(change_due(cents(500), cents(500)).unwrap(), Money::zero());
        assert!(change_due(cents(500), cents(499)).is_err());
    }

    #[test]
    fn test_exchange_balance_sign() {
        assert_eq!(exchange_balance(cents(1000), cents(1500)).cents(), 500);
        assert_eq!(exchange_balance(cents(1500), cents(1000)).cents(), -500);
    }

    #[test]
    fn test_grn_line_total_ignores_free_units() {
        assert_eq!(grn_line_total(10, cents(250), cents(100)).unwrap().cents(), 2400);
        assert!(grn_line_total(1, cents(100), cents(101)).is_err());
    }

    #[test]
    fn test_line_total_overflow_is_an_error() {
        let err = grn_line_total(i64::MAX / 10, cents(100), Money::zero()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::OutOfRange { .. })));
        assert!(line_amounts(cents(i64::MAX), 2, Money::zero(), TaxRate::zero(), TaxMode::Exclusive).is_err());
        assert!(document_total([cents(i64::MAX), cents(1)]).is_err());
        assert_eq!(document_total([cents(300), cents(180)]).unwrap().cents(), 480);
    }

    #[test]
    fn test_refundable_quantity_never_negative() {
        assert_eq!(refundable_quantity(5, 2), 3);
        assert_eq!(refundable_quantity(5, 7), 0);
    }

    #[test]
    fn test_partial_refund_is_prorated() {
        assert_eq!(refund_line_amount(cents(1000), Money::zero(), 1, 3, 0).cents(), 333);
        assert_eq!(refund_line_amount(cents(1000), Money::zero(), 3, 3, 0).cents(), 1000);
    }
}
