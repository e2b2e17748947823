//! # Quotation Module
//!
//! Price estimates sent to companies before invoicing.
//!
//! ## Two-Phase Totals
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Phase 1: per line          QuotationItem::compute_subtotal()           │
//! │           subtotal = quantity × unit_price                              │
//! │                                                                         │
//! │  Phase 2: per quotation     QuotationTotals::calculate(items, ..)       │
//! │           subtotal = Σ line subtotals                                   │
//! │           tax      = subtotal × rate                                    │
//! │           discount = subtotal × pct   |   fixed amount                  │
//! │           total    = max(0, subtotal + tax − discount)                  │
//! │                                                                         │
//! │  Saving a line never touches the parent. Callers run phase 2            │
//! │  explicitly after changing lines.                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::money::Money;
use crate::quantity::Quantity;
use crate::types::TaxRate;

/// Prefix of generated quotation numbers.
pub const QUOTATION_PREFIX: &str = "QT";

// =============================================================================
// Enums
// =============================================================================

/// How `discount_value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// Percent of the subtotal.
    Percentage,
    /// Flat currency amount.
    Fixed,
}

impl Default for DiscountType {
    fn default() -> Self {
        DiscountType::Percentage
    }
}

/// Where a quotation is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotationStatus::Draft => "draft",
            QuotationStatus::Sent => "sent",
            QuotationStatus::Accepted => "accepted",
            QuotationStatus::Rejected => "rejected",
            QuotationStatus::Expired => "expired",
        }
    }
}

impl Default for QuotationStatus {
    fn default() -> Self {
        QuotationStatus::Draft
    }
}

impl fmt::Display for QuotationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Quotation
// =============================================================================

/// A quotation header with cached totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Quotation {
    pub id: String,
    /// `QT-YYYYMMDD-NNNN`, unique.
    pub quotation_number: String,
    pub company_id: String,
    #[ts(as = "String")]
    pub quotation_date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub valid_until: Option<NaiveDate>,
    pub tax_id: Option<String>,
    pub discount_type: DiscountType,
    #[ts(type = "string")]
    pub discount_value: Decimal,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub status: QuotationStatus,
    pub notes: Option<String>,
    pub terms_conditions: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    /// Past its validity date on `today`.
    pub fn is_past_validity(&self, today: NaiveDate) -> bool {
        self.valid_until.is_some_and(|until| until < today)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Checks the editable header fields: discount and validity window.
    pub fn validate_header(&self) -> Result<(), ValidationError> {
        validate_discount(self.discount_type, self.discount_value)?;
        validate_validity(self.quotation_date, self.valid_until)
    }

    /// Copies freshly calculated totals into the cached columns.
    pub fn apply_totals(&mut self, totals: &QuotationTotals) {
        self.subtotal_cents = totals.subtotal_cents;
        self.tax_cents = totals.tax_cents;
        self.discount_cents = totals.discount_cents;
        self.total_cents = totals.total_cents;
    }
}

/// Caller input for a new quotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewQuotation {
    pub company_id: String,
    #[ts(as = "String")]
    pub quotation_date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub valid_until: Option<NaiveDate>,
    pub tax_id: Option<String>,
    pub discount_type: DiscountType,
    #[ts(type = "string")]
    pub discount_value: Decimal,
    pub notes: Option<String>,
    pub terms_conditions: Option<String>,
}

impl NewQuotation {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.company_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "company_id".to_string(),
            });
        }
        validate_discount(self.discount_type, self.discount_value)?;
        validate_validity(self.quotation_date, self.valid_until)
    }
}

/// A quotation may not expire before it is issued.
pub fn validate_validity(
    quotation_date: NaiveDate,
    valid_until: Option<NaiveDate>,
) -> Result<(), ValidationError> {
    match valid_until {
        Some(until) if until < quotation_date => Err(ValidationError::InvalidFormat {
            field: "valid_until".to_string(),
            reason: "must not be before the quotation date".to_string(),
        }),
        _ => Ok(()),
    }
}

/// Checks a discount value against its type.
///
/// Percentages lie in 0..=100; fixed amounts must not be negative.
pub fn validate_discount(kind: DiscountType, value: Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::MustNotBeNegative {
            field: "discount_value".to_string(),
        });
    }
    if kind == DiscountType::Percentage && value > Decimal::ONE_HUNDRED {
        return Err(ValidationError::OutOfRange {
            field: "discount_value".to_string(),
            min: 0,
            max: 100,
        });
    }
    Ok(())
}

/// Formats a quotation number from its date and the day's sequence.
///
/// ```rust
/// use backoffice_core::quotation::quotation_number;
/// use chrono::NaiveDate;
///
/// let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
/// assert_eq!(quotation_number(date, 7), "QT-20240309-0007");
/// ```
pub fn quotation_number(date: NaiveDate, sequence: u32) -> String {
    format!("{}-{}-{:04}", QUOTATION_PREFIX, date.format("%Y%m%d"), sequence)
}

/// Prefix shared by every quotation number of `date` ("QT-20240309-").
pub fn quotation_number_prefix(date: NaiveDate) -> String {
    format!("{}-{}-", QUOTATION_PREFIX, date.format("%Y%m%d"))
}

// =============================================================================
// Quotation Item
// =============================================================================

/// A quotation line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct QuotationItem {
    pub id: String,
    pub quotation_id: String,
    /// Optional link to a stocked item.
    pub item_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub quantity: Quantity,
    pub unit_price_cents: i64,
    pub unit_label: Option<String>,
    /// Machine/processing cost per line, informational.
    pub machine_cost_cents: i64,
    /// `quantity × unit_price`, cached.
    pub subtotal_cents: i64,
    pub position: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl QuotationItem {
    /// Builds a line and computes its subtotal.
    pub fn new(quotation_id: &str, input: NewQuotationItem, position: i64) -> Self {
        let mut item = QuotationItem {
            id: Uuid::new_v4().to_string(),
            quotation_id: quotation_id.to_string(),
            item_id: input.item_id,
            name: input.name,
            description: input.description,
            quantity: input.quantity,
            unit_price_cents: input.unit_price_cents,
            unit_label: input.unit_label,
            machine_cost_cents: input.machine_cost_cents,
            subtotal_cents: 0,
            position,
            created_at: Utc::now(),
        };
        item.compute_subtotal();
        item
    }

    /// Phase 1: refreshes this line's cached subtotal.
    pub fn compute_subtotal(&mut self) -> Money {
        let subtotal = Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity);
        self.subtotal_cents = subtotal.cents();
        subtotal
    }

    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

/// Caller input for a quotation line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewQuotationItem {
    pub item_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub quantity: Quantity,
    pub unit_price_cents: i64,
    pub unit_label: Option<String>,
    pub machine_cost_cents: i64,
}

impl NewQuotationItem {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "name".to_string(),
            });
        }
        if self.quantity.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "quantity".to_string(),
            });
        }
        if self.unit_price_cents < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "unit_price".to_string(),
            });
        }
        if self.machine_cost_cents < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "machine_cost".to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Totals
// =============================================================================

/// Phase 2 result: the quotation's cached totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuotationTotals {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
}

impl QuotationTotals {
    /// Recalculates totals from already-computed line subtotals.
    ///
    /// ```rust
    /// use backoffice_core::quotation::{DiscountType, QuotationTotals};
    /// use backoffice_core::types::TaxRate;
    /// use rust_decimal::Decimal;
    ///
    /// let totals = QuotationTotals::from_subtotal(
    ///     backoffice_core::Money::from_cents(100_000),
    ///     TaxRate::from_bps(1800),
    ///     DiscountType::Percentage,
    ///     Decimal::from(10),
    /// );
    /// assert_eq!(totals.tax_cents, 18_000);
    /// assert_eq!(totals.discount_cents, 10_000);
    /// assert_eq!(totals.total_cents, 108_000);
    /// ```
    pub fn calculate(
        items: &[QuotationItem],
        tax: TaxRate,
        discount_type: DiscountType,
        discount_value: Decimal,
    ) -> Self {
        let subtotal: Money = items.iter().map(QuotationItem::subtotal).sum();
        Self::from_subtotal(subtotal, tax, discount_type, discount_value)
    }

    pub fn from_subtotal(
        subtotal: Money,
        tax: TaxRate,
        discount_type: DiscountType,
        discount_value: Decimal,
    ) -> Self {
        let tax_amount = subtotal.calculate_tax(tax);
        let discount = match discount_type {
            DiscountType::Percentage => subtotal.percentage_of(discount_value),
            DiscountType::Fixed => Money::from_decimal(discount_value).unwrap_or_default(),
        };
        let total = (subtotal + tax_amount - discount).clamp_non_negative();

        QuotationTotals {
            subtotal_cents: subtotal.cents(),
            tax_cents: tax_amount.cents(),
            discount_cents: discount.cents(),
            total_cents: total.cents(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
