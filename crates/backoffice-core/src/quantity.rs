//! # Quantity Module
//!
//! Provides the `Quantity` type for stock quantities.
//!
//! ## Why Fixed-Point?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  STORED STOCK PRECISION                                                 │
//! │                                                                         │
//! │  Stock is cached with exactly 4 fractional digits:                     │
//! │    0.5 kg   → 5000 ten-thousandths                                     │
//! │    3 kg     → 30000 ten-thousandths                                    │
//! │                                                                         │
//! │  Integers let SQLite apply deltas atomically:                          │
//! │    UPDATE items SET stock_quantity = stock_quantity + ?                │
//! │                                                                         │
//! │  Conversion maths happens in Decimal, then rounds ONCE into Quantity.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

/// Number of fractional digits kept for stored quantities.
pub const QUANTITY_SCALE: u32 = 4;

/// A signed quantity with 4 fractional digits, stored as ten-thousandths.
///
/// Serializes as a decimal string (`"0.5000"`) so the web frontend never
/// sees floating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[serde(into = "Decimal", try_from = "Decimal")]
#[ts(export)]
pub struct Quantity(#[ts(type = "string")] i64);

impl Quantity {
    /// Creates a quantity from raw ten-thousandths.
    ///
    /// ## Example
    /// ```rust
    /// use backoffice_core::Quantity;
    ///
    /// let half = Quantity::from_raw(5000);
    /// assert_eq!(half.to_string(), "0.5000");
    /// ```
    #[inline]
    pub const fn from_raw(raw: i64) -> Self {
        Quantity(raw)
    }

    /// Creates a quantity from a whole number.
    #[inline]
    pub const fn from_whole(whole: i64) -> Self {
        Quantity(whole.saturating_mul(10_000))
    }

    /// Returns the raw ten-thousandths value.
    #[inline]
    pub const fn raw(&self) -> i64 {
        self.0
    }

    /// Zero quantity.
    #[inline]
    pub const fn zero() -> Self {
        Quantity(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Rounds a decimal to 4 fractional digits (banker's rounding) and
    /// stores it.
    ///
    /// ## Example
    /// ```rust
    /// use backoffice_core::Quantity;
    /// use rust_decimal::Decimal;
    /// use std::str::FromStr;
    ///
    /// let q = Quantity::from_decimal(Decimal::from_str("0.00005").unwrap()).unwrap();
    /// assert_eq!(q.raw(), 0); // half-to-even
    /// ```
    pub fn from_decimal(value: Decimal) -> Result<Self, ValidationError> {
        let mut rounded =
            value.round_dp_with_strategy(QUANTITY_SCALE, RoundingStrategy::MidpointNearestEven);
        rounded.rescale(QUANTITY_SCALE);

        i64::try_from(rounded.mantissa())
            .map(Quantity)
            .map_err(|_| ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: i64::MIN / 10_000,
                max: i64::MAX / 10_000,
            })
    }

    /// Returns the quantity as an exact decimal with scale 4.
    #[inline]
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, QUANTITY_SCALE)
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Quantity(self.0.saturating_abs())
    }

    /// Sum that refuses to wrap. Stock arithmetic goes through this.
    ///
    /// ```rust
    /// use backoffice_core::Quantity;
    ///
    /// assert!(Quantity::from_raw(i64::MAX).checked_add(Quantity::from_raw(1)).is_err());
    /// ```
    pub fn checked_add(self, other: Self) -> Result<Self, ValidationError> {
        self.0.checked_add(other.0).map(Quantity).ok_or_else(overflow)
    }

    pub fn checked_sub(self, other: Self) -> Result<Self, ValidationError> {
        self.0.checked_sub(other.0).map(Quantity).ok_or_else(overflow)
    }

    pub fn checked_neg(self) -> Result<Self, ValidationError> {
        self.0.checked_neg().map(Quantity).ok_or_else(overflow)
    }
}

fn overflow() -> ValidationError {
    ValidationError::Overflow {
        field: "quantity".to_string(),
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_decimal(), f)
    }
}

impl FromStr for Quantity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(|e| ValidationError::InvalidFormat {
            field: "quantity".to_string(),
            reason: e.to_string(),
        })?;
        Quantity::from_decimal(value)
    }
}

impl From<Quantity> for Decimal {
    fn from(value: Quantity) -> Self {
        value.to_decimal()
    }
}

impl TryFrom<Decimal> for Quantity {
    type Error = ValidationError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Quantity::from_decimal(value)
    }
}

// Operators saturate at the i64 bounds. Anything that writes stock uses the
// `checked_*` methods instead.

impl Add for Quantity {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Quantity(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Quantity {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Quantity {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Quantity(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Quantity {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Neg for Quantity {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Quantity(self.0.saturating_neg())
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Quantity::zero(), Add::add)
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
    fn test_display_keeps_four_digits() {
        assert_eq!(Quantity::from_raw(5000).to_string(), "0.5000");
        assert_eq!(Quantity::from_whole(3).to_string(), "3.0000");
        assert_eq!(Quantity::from_raw(-25000).to_string(), "-2.5000");
        assert_eq!(Quantity::zero().to_string(), "0.0000");
    }

    #[test]
    fn test_from_decimal_rounds_half_to_even() {
        assert_eq!(Quantity::from_decimal(dec!(0.12345)).unwrap().raw(), 1234);
        assert_eq!(Quantity::from_decimal(dec!(0.12355)).unwrap().raw(), 1236);
        assert_eq!(Quantity::from_decimal(dec!(0.500)).unwrap().raw(), 5000);
        assert_eq!(Quantity::from_decimal(dec!(-1.00005)).unwrap().raw(), -10000);
    }

    #[test]
    fn test_parse() {
        assert_eq!("500".parse::<Quantity>().unwrap(), Quantity::from_whole(500));
        assert_eq!(" 0.5 ".parse::<Quantity>().unwrap(), Quantity::from_raw(5000));
        assert!("abc".parse::<Quantity>().is_err());
    }

    #[test]
    fn test_arithmetic() {
        let a = Quantity::from_raw(5000);
        let b = Quantity::from_whole(3);
        assert_eq!((a - b).to_string(), "-2.5000");
        assert_eq!((a + b).raw(), 35000);
        assert_eq!(-a, Quantity::from_raw(-5000));

        let total: Quantity = vec![a, b, -a].into_iter().sum();
        assert_eq!(total, b);
    }

    #[test]
    fn test_checked_ops_reject_overflow() {
        let max = Quantity::from_raw(i64::MAX);
        let one = Quantity::from_raw(1);

        assert_eq!(
            max.checked_add(one).unwrap_err(),
            ValidationError::Overflow {
                field: "quantity".to_string()
            }
        );
        assert!(Quantity::from_raw(i64::MIN).checked_sub(one).is_err());
        assert!(Quantity::from_raw(i64::MIN).checked_neg().is_err());
        assert_eq!(max.checked_sub(one).unwrap().raw(), i64::MAX - 1);

        // plain operators stop at the bound rather than wrapping or panicking
        assert_eq!(max + one, max);
        assert_eq!(-Quantity::from_raw(i64::MIN), max);
    }

    #[test]
    fn test_serde_as_decimal_string() {
        let json = serde_json::to_string(&Quantity::from_raw(5000)).unwrap();
        assert_eq!(json, "\"0.5000\"");

        let back: Quantity = serde_json::from_str("\"2.25\"").unwrap();
        assert_eq!(back, Quantity::from_raw(22500));
    }
}
