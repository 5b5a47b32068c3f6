//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! All amounts are integers in the smallest currency unit (cents, paise,
//! fils, ...). Division only happens in three places: tax, percentage
//! discounts and refund pro-rating. Each rounds half away from zero on the
//! `+5000 / 10000` pattern so the same inputs always produce the same cent.
//!
//! ## Usage
//! ```rust
//! use tillstone_core::money::Money;
//!
//! let price = Money::from_cents(1099); // 10.99
//! let line = price * 3;                // 32.97
//! let total = line + Money::from_cents(500);
//! assert_eq!(total.cents(), 3797);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// Signed, so refunds, store payouts and exchange balances are negative
/// amounts rather than a separate type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use tillstone_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Whole currency units, truncated toward zero.
    #[inline]
    pub const fn major_units(&self) -> i64 {
        self.0 / 100
    }

    /// Minor units past the last whole unit (always 0-99).
    #[inline]
    pub const fn minor_units(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Calculates tax on this amount (tax-exclusive pricing).
    ///
    /// ```rust
    /// use tillstone_core::money::Money;
    /// use tillstone_core::types::TaxRate;
    ///
    /// // 10.00 at 8.25% = 0.825 → 0.83
    /// let tax = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(825));
    /// assert_eq!(tax.cents(), 83);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        Money::from_cents(round_div(self.0 as i128 * rate.bps() as i128, 10_000))
    }

    /// Extracts the tax already contained in a tax-inclusive amount.
    ///
    /// `tax = amount * bps / (10000 + bps)`
    ///
    /// ```rust
    /// use tillstone_core::money::Money;
    /// use tillstone_core::types::TaxRate;
    ///
    /// // 11.00 including 10% tax contains 1.00 of tax
    /// let tax = Money::from_cents(1100).extract_inclusive_tax(TaxRate::from_bps(1000));
    /// assert_eq!(tax.cents(), 100);
    /// ```
    pub fn extract_inclusive_tax(&self, rate: TaxRate) -> Money {
        let bps = rate.bps() as i128;
        Money::from_cents(round_div(self.0 as i128 * bps, 10_000 + bps))
    }

    /// Returns `bps` basis points of this amount.
    pub fn percentage(&self, bps: u32) -> Money {
        Money::from_cents(round_div(self.0 as i128 * bps as i128, 10_000))
    }

    /// `self * qty`, or `None` when the product does not fit in an `i64`.
    #[inline]
    pub fn checked_mul(&self, qty: i64) -> Option<Money> {
        self.0.checked_mul(qty).map(Money)
    }

    /// Returns `numerator / denominator` of this amount.
    ///
    /// Used to pro-rate a sale line when only part of it is refunded.
    /// A zero denominator yields zero.
    ///
    /// ```rust
    /// use tillstone_core::money::Money;
    ///
    /// // 1 of 3 units from a 10.00 line
    /// assert_eq!(Money::from_cents(1000).prorate(1, 3).cents(), 333);
    /// // 2 of 3 units
    /// assert_eq!(Money::from_cents(1000).prorate(2, 3).cents(), 667);
    /// ```
    pub fn prorate(&self, numerator: i64, denominator: i64) -> Money {
        if denominator == 0 {
            return Money::zero();
        }
        Money::from_cents(round_div(
            self.0 as i128 * numerator as i128,
            denominator as i128,
        ))
    }
}

/// Integer division rounding half away from zero.
fn round_div(numerator: i128, denominator: i128) -> i64 {
    let half = denominator / 2;
    let rounded = if (numerator < 0) != (denominator < 0) {
        (numerator - half) / denominator
    } else {
        (numerator + half) / denominator
    };
    rounded as i64
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-oriented display. Operator-facing formatting goes through
/// `AppConfig::format_currency` so the currency symbol is configurable.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major_units().abs(), self.minor_units())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major_units(), 10);
        assert_eq!(money.minor_units(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(0).to_string(), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
        assert_eq!((-a).cents(), -1000);
    }

    #[test]
    fn test_sum() {
        let total: Money = [100, 250, 650].into_iter().map(Money::from_cents).sum();
        assert_eq!(total.cents(), 1000);
    }

    #[test]
    fn test_tax_calculation_with_rounding() {
        let tax = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(825));
        assert_eq!(tax.cents(), 83);
    }

    #[test]
    fn test_tax_on_negative_amount_is_symmetric() {
        let tax = Money::from_cents(-1000).calculate_tax(TaxRate::from_bps(825));
        assert_eq!(tax.cents(), -83);
    }

    #[test]
    fn test_inclusive_tax_extraction() {
        // 10.83 including 8.25% contains 0.83 of tax
        let tax = Money::from_cents(1083).extract_inclusive_tax(TaxRate::from_bps(825));
        assert_eq!(tax.cents(), 83);
    }

    #[test]
    fn test_prorate_parts_can_exceed_whole_by_rounding() {
        let line = Money::from_cents(1000);
        let parts = line.prorate(1, 3) + line.prorate(1, 3) + line.prorate(1, 3);
        assert_eq!(parts.cents(), 999);
        assert_eq!(line.prorate(3, 3), line);
        assert_eq!(line.prorate(1, 0), Money::zero());
    }
}
