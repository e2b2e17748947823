//! # Money Module
//!
//! Provides the `Money` type for invoice, payment and quotation amounts.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units (paise / cents)                      │
//! │    Amounts are stored with 2 decimal places as i64                      │
//! │    Ledger balances are exact sums of integers                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use backoffice_core::money::Money;
//!
//! let invoice = Money::from_cents(150_000); // 1500.00
//! let payment = Money::from_cents(50_000);  // 500.00
//! assert_eq!((invoice - payment).to_string(), "1000.00");
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::quantity::Quantity;
use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for balances in credit
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **No currency**: the system is single-currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Returns the larger of `self` and zero.
    #[inline]
    pub const fn clamp_non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            Money(self.0)
        }
    }

    /// Parses a decimal amount ("1500.00", "12.5") into cents.
    ///
    /// Amounts with more than 2 fractional digits are rounded half away
    /// from zero.
    pub fn from_decimal(value: Decimal) -> Result<Self, ValidationError> {
        let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(2);

        i64::try_from(rounded.mantissa())
            .map(Money)
            .map_err(|_| ValidationError::OutOfRange {
                field: "amount".to_string(),
                min: i64::MIN / 100,
                max: i64::MAX / 100,
            })
    }

    /// Returns the amount as an exact decimal with scale 2.
    #[inline]
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Calculates tax on this amount.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`
    /// The +5000 provides rounding (5000/10000 = 0.5)
    ///
    /// ## Example
    /// ```rust
    /// use backoffice_core::money::Money;
    /// use backoffice_core::types::TaxRate;
    ///
    /// let subtotal = Money::from_cents(100_000); // 1000.00
    /// let gst = TaxRate::from_bps(1800);         // 18%
    /// assert_eq!(subtotal.calculate_tax(gst).cents(), 18_000);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        Money::from_cents(div_round(self.0 as i128 * rate.bps() as i128, 10_000) as i64)
    }

    /// Returns `percent`% of this amount, rounded half away from zero.
    ///
    /// ## Example
    /// ```rust
    /// use backoffice_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// let subtotal = Money::from_cents(10_000);
    /// let ten = Decimal::from(10);
    /// assert_eq!(subtotal.percentage_of(ten).cents(), 1_000);
    /// ```
    pub fn percentage_of(&self, percent: Decimal) -> Money {
        let value = (self.to_decimal() * percent / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        Money::from_decimal(value).unwrap_or(Money::zero())
    }

    /// Multiplies a unit price by a fractional quantity.
    ///
    /// ## Example
    /// ```rust
    /// use backoffice_core::money::Money;
    /// use backoffice_core::Quantity;
    ///
    /// let unit_price = Money::from_cents(1_250);  // 12.50 per kg
    /// let qty = Quantity::from_raw(25_000);       // 2.5 kg
    /// assert_eq!(unit_price.multiply_quantity(qty).cents(), 3_125);
    /// ```
    pub fn multiply_quantity(&self, qty: Quantity) -> Money {
        Money::from_cents(div_round(self.0 as i128 * qty.raw() as i128, 10_000) as i64)
    }
}

/// Integer division rounding half away from zero.
fn div_round(numerator: i128, denominator: i128) -> i128 {
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain two-decimal rendering ("1000.00"); currency symbols belong to the UI.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_decimal(), f)
    }
}

impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(|e| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: e.to_string(),
        })?;
        Money::from_decimal(value)
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

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(0).to_string(), "0.00");
    }

    #[test]
    fn test_parse() {
        assert_eq!("1500.00".parse::<Money>().unwrap().cents(), 150_000);
        assert_eq!("12.5".parse::<Money>().unwrap().cents(), 1_250);
        assert_eq!("0.005".parse::<Money>().unwrap().cents(), 1);
        assert!("twelve".parse::<Money>().is_err());
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!(vec![a, b].into_iter().sum::<Money>().cents(), 1500);
    }

    #[test]
    fn test_tax_calculation_with_rounding() {
        // 10.00 at 8.25% = 0.825 → 0.83
        let amount = Money::from_cents(1000);
        assert_eq!(amount.calculate_tax(TaxRate::from_bps(825)).cents(), 83);
    }

    #[test]
    fn test_percentage_of() {
        let subtotal = Money::from_cents(12_345);
        assert_eq!(subtotal.percentage_of(dec!(10)).cents(), 1_235);
        assert_eq!(subtotal.percentage_of(dec!(0)).cents(), 0);
        assert_eq!(subtotal.percentage_of(dec!(12.5)).cents(), 1_543);
    }

    #[test]
    fn test_multiply_quantity_rounds_to_cent() {
        let price = Money::from_cents(999);
        // 9.99 × 0.3333 = 3.329667 → 3.33
        assert_eq!(price.multiply_quantity(Quantity::from_raw(3333)).cents(), 333);
        assert_eq!(price.multiply_quantity(Quantity::from_whole(3)).cents(), 2997);
    }

    #[test]
    fn test_clamp_non_negative() {
        assert_eq!(Money::from_cents(-5).clamp_non_negative(), Money::zero());
        assert_eq!(Money::from_cents(5).clamp_non_negative().cents(), 5);
    }
}
