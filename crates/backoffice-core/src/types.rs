//! # Reference Data Types
//!
//! Long-lived records maintained by administrators: tax rates, storage
//! locations and production batches.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Reference Data                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Tax        │   │    Location     │   │     Batch       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  name           │   │  name           │   │  item_id (FK)   │       │
//! │  │  rate_bps       │   │  code           │   │  batch_number   │       │
//! │  │  is_default     │   │  parent_id ──┐  │   │  expiry_date    │       │
//! │  └─────────────────┘   └──────────────┼──┘   └─────────────────┘       │
//! │                                ▲      │                                 │
//! │                                └──────┘ (warehouse → rack → bin)        │
//! │                                                                         │
//! │  ┌─────────────────┐                                                    │
//! │  │    TaxRate      │   1800 bps = 18.00 % (GST slab)                    │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1800 bps = 18% (standard GST slab)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage such as `18` or `2.5`.
    ///
    /// Rates must lie in 0..=100 and are rounded to the nearest basis point.
    ///
    /// ## Example
    /// ```rust
    /// use backoffice_core::types::TaxRate;
    /// use rust_decimal::Decimal;
    /// use std::str::FromStr;
    ///
    /// let rate = TaxRate::from_percent(Decimal::from_str("12.5").unwrap()).unwrap();
    /// assert_eq!(rate.bps(), 1250);
    /// ```
    pub fn from_percent(percent: Decimal) -> Result<Self, ValidationError> {
        if percent.is_sign_negative() || percent > Decimal::ONE_HUNDRED {
            return Err(ValidationError::OutOfRange {
                field: "rate".to_string(),
                min: 0,
                max: 100,
            });
        }

        let bps = (percent * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .mantissa();

        Ok(TaxRate(bps as u32))
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as an exact percentage (`18.00`).
    #[inline]
    pub fn percent(&self) -> Decimal {
        Decimal::new(self.0 as i64, 2)
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Tax
// =============================================================================

/// A named tax that quotations can apply (e.g. "GST 18%").
///
/// At most one tax is the default; the repository clears the previous
/// default when a new one is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Tax {
    pub id: String,
    pub name: String,
    /// Rate in basis points (1800 = 18%).
    pub rate_bps: u32,
    pub description: Option<String>,
    pub is_active: bool,
    pub is_default: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Tax {
    /// Returns the tax rate.
    #[inline]
    pub fn rate(&self) -> TaxRate {
        TaxRate::from_bps(self.rate_bps)
    }
}

// =============================================================================
// Location
// =============================================================================

/// A storage location. Locations nest (warehouse → rack → bin) through
/// `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Location {
    pub id: String,
    pub name: String,
    /// Short unique code (e.g. "WH-A").
    pub code: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Batch
// =============================================================================

/// A production batch of a batch-tracked inventory item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Batch {
    pub id: String,
    pub item_id: String,
    /// Unique per item.
    pub batch_number: String,
    #[ts(as = "Option<String>")]
    pub manufacturing_date: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Batch {
    /// True when the batch has an expiry date on or before `today`.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry <= today)
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
    fn test_tax_rate_from_percent() {
        assert_eq!(TaxRate::from_percent(dec!(18)).unwrap().bps(), 1800);
        assert_eq!(TaxRate::from_percent(dec!(8.25)).unwrap().bps(), 825);
        assert_eq!(TaxRate::from_percent(dec!(0)).unwrap(), TaxRate::zero());
        assert!(TaxRate::from_percent(dec!(-1)).is_err());
        assert!(TaxRate::from_percent(dec!(100.01)).is_err());
    }

    #[test]
    fn test_tax_rate_percent() {
        assert_eq!(TaxRate::from_bps(1800).percent(), dec!(18.00));
        assert_eq!(TaxRate::from_bps(5).percent(), dec!(0.05));
    }

    #[test]
    fn test_batch_expiry() {
        let now = Utc::now();
        let batch = Batch {
            id: "b1".to_string(),
            item_id: "i1".to_string(),
            batch_number: "LOT-1".to_string(),
            manufacturing_date: None,
            expiry_date: NaiveDate::from_ymd_opt(2024, 6, 30),
            notes: None,
            created_at: now,
            updated_at: now,
        };

        let before = NaiveDate::from_ymd_opt(2024, 6, 29).unwrap();
        let on = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        assert!(!batch.is_expired(before));
        assert!(batch.is_expired(on));
    }
}
