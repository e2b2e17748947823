//! # Stock Module
//!
//! Inventory items, stock movements and the maths that keeps an item's
//! cached stock equal to the signed sum of its movements.
//!
//! ## Applying A Movement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  NewStockTransaction { kind: Receipt, quantity: 500, unit: g }          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  resolve_base_quantity(graph, 500, g, item.base_unit = kg)              │
//! │       │   ok           → 0.5000                                         │
//! │       │   unconvertible → 500 (1:1) + ConversionFallback reason         │
//! │       ▼                                                                 │
//! │  signed_delta(Receipt, 0.5000) = +0.5000                                │
//! │       │   (Issue subtracts; Receipt, Return, Adjustment add)            │
//! │       ▼                                                                 │
//! │  apply_delta(item.stock_quantity, +0.5000)   NULL stock counts as 0     │
//! │                                                                         │
//! │  Deleting the movement applies -signed_delta using the STORED           │
//! │  base_quantity, never a fresh conversion.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A movement is applied when its row is written and reversed when the row
//! is deleted, both in the same SQL transaction as the stock change. Editing
//! quantity, unit or kind of an applied movement is not supported; correcting
//! one means deleting it and recording a new one.
//!
//! Stock arithmetic is checked. A movement whose conversion or delta would
//! leave the `Quantity` range is rejected with `ValidationError::Overflow`
//! rather than booked 1:1.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::quantity::Quantity;
use crate::units::UnitGraph;

// =============================================================================
// Transaction Kind
// =============================================================================

/// The kind of a stock movement.
///
/// `Adjustment` always adds. There is no negative adjustment kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Goods received from a supplier.
    Receipt,
    /// Goods issued out of stock.
    Issue,
    /// Goods returned into stock.
    Return,
    /// Stock found during a count.
    Adjustment,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 4] = [
        TransactionKind::Receipt,
        TransactionKind::Issue,
        TransactionKind::Return,
        TransactionKind::Adjustment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Receipt => "receipt",
            TransactionKind::Issue => "issue",
            TransactionKind::Return => "return",
            TransactionKind::Adjustment => "adjustment",
        }
    }

    /// True for kinds that add to stock.
    #[inline]
    pub fn is_inbound(&self) -> bool {
        !matches!(self, TransactionKind::Issue)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = CoreError;

    /// Parses a kind at the boundary, before anything is applied.
    ///
    /// ```rust
    /// use backoffice_core::stock::TransactionKind;
    ///
    /// assert_eq!("issue".parse::<TransactionKind>().unwrap(), TransactionKind::Issue);
    /// assert!("transfer".parse::<TransactionKind>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "receipt" => Ok(TransactionKind::Receipt),
            "issue" => Ok(TransactionKind::Issue),
            "return" => Ok(TransactionKind::Return),
            "adjustment" => Ok(TransactionKind::Adjustment),
            _ => Err(CoreError::InvalidTransactionKind(s.to_string())),
        }
    }
}

// =============================================================================
// Inventory Item
// =============================================================================

/// A stocked good.
///
/// `stock_quantity` is a cache owned by the stock ledger. Item edits never
/// write it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryItem {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub category: Option<String>,
    /// Price per base unit in cents.
    pub unit_price_cents: i64,
    /// Free-text unit label shown on quotations ("Nos", "Kg").
    pub unit_label: Option<String>,
    /// Unit the cached stock is held in.
    pub base_unit_id: Option<String>,
    /// Cached stock in base units. `None` until the first movement.
    pub stock_quantity: Option<Quantity>,
    pub min_stock_level: Quantity,
    pub reorder_level: Quantity,
    pub default_location_id: Option<String>,
    pub batch_tracking: bool,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Cached stock, treating an uninitialized value as zero.
    #[inline]
    pub fn stock(&self) -> Quantity {
        self.stock_quantity.unwrap_or_default()
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// True when stock is at or below the reorder level.
    pub fn needs_reorder(&self) -> bool {
        self.stock() <= self.reorder_level
    }

    /// True when stock has fallen under the minimum level.
    pub fn is_below_minimum(&self) -> bool {
        self.stock() < self.min_stock_level
    }

    /// Value of the cached stock at the item's unit price.
    pub fn stock_value(&self) -> Money {
        self.unit_price().multiply_quantity(self.stock())
    }
}

// =============================================================================
// Stock Transactions
// =============================================================================

/// Caller input for a new stock movement.
///
/// There is no `base_quantity` here: it is always derived when the
/// movement is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewStockTransaction {
    pub item_id: String,
    pub kind: TransactionKind,
    /// Non-negative magnitude in `unit_id`.
    pub quantity: Quantity,
    pub unit_id: Option<String>,
    pub batch_id: Option<String>,
    pub location_id: Option<String>,
    pub project: Option<String>,
    #[ts(as = "String")]
    pub transaction_date: NaiveDate,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

impl NewStockTransaction {
    /// Boundary checks run before the movement reaches the ledger.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.item_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "item_id".to_string(),
            });
        }

        if self.quantity.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "quantity".to_string(),
            });
        }

        Ok(())
    }
}

/// A recorded stock movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockTransaction {
    pub id: String,
    pub item_id: String,
    pub kind: TransactionKind,
    pub quantity: Quantity,
    pub unit_id: Option<String>,
    /// `quantity` in the item's base unit, fixed at record time.
    pub base_quantity: Quantity,
    pub batch_id: Option<String>,
    pub location_id: Option<String>,
    pub project: Option<String>,
    #[ts(as = "String")]
    pub transaction_date: NaiveDate,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl StockTransaction {
    /// Signed effect of this movement on its item's stock.
    #[inline]
    pub fn delta(&self) -> Quantity {
        signed_delta(self.kind, self.base_quantity)
    }
}

/// Descriptive fields that may change after a movement is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockTransactionNotes {
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub project: Option<String>,
}

// =============================================================================
// Base Quantity Resolution
// =============================================================================

/// Why a movement was booked 1:1 instead of converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ConversionFallback {
    MissingTransactionUnit,
    MissingItemBaseUnit,
    IncompatibleUnits { from: String, to: String },
    Unresolvable { detail: String },
}

impl fmt::Display for ConversionFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionFallback::MissingTransactionUnit => f.write_str("transaction has no unit"),
            ConversionFallback::MissingItemBaseUnit => f.write_str("item has no base unit"),
            ConversionFallback::IncompatibleUnits { from, to } => {
                write!(f, "units {} and {} do not share a root", from, to)
            }
            ConversionFallback::Unresolvable { detail } => f.write_str(detail),
        }
    }
}

/// A movement quantity expressed in the item's base unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BaseQuantity {
    pub value: Quantity,
    /// Set when the value is the raw quantity taken 1:1.
    pub fallback: Option<ConversionFallback>,
}

impl BaseQuantity {
    #[inline]
    pub fn is_converted(&self) -> bool {
        self.fallback.is_none()
    }
}

/// Converts a movement quantity into the item's base unit.
///
/// Missing or unrelated units degrade to a 1:1 booking with the reason
/// attached. Only an overflowing conversion is an error.
///
/// ```rust
/// use backoffice_core::stock::{resolve_base_quantity, ConversionFallback};
/// use backoffice_core::units::UnitGraph;
/// use backoffice_core::Quantity;
///
/// let graph = UnitGraph::default();
/// let base = resolve_base_quantity(&graph, Quantity::from_whole(4), None, Some("kg")).unwrap();
/// assert_eq!(base.value, Quantity::from_whole(4));
/// assert_eq!(base.fallback, Some(ConversionFallback::MissingTransactionUnit));
/// ```
pub fn resolve_base_quantity(
    graph: &UnitGraph,
    quantity: Quantity,
    transaction_unit: Option<&str>,
    item_base_unit: Option<&str>,
) -> CoreResult<BaseQuantity> {
    let fallback = |reason| {
        Ok(BaseQuantity {
            value: quantity,
            fallback: Some(reason),
        })
    };

    let Some(from) = transaction_unit else {
        return fallback(ConversionFallback::MissingTransactionUnit);
    };
    let Some(to) = item_base_unit else {
        return fallback(ConversionFallback::MissingItemBaseUnit);
    };

    if from == to {
        return Ok(BaseQuantity {
            value: quantity,
            fallback: None,
        });
    }

    match graph.convert(quantity, from, to) {
        Ok(value) => Ok(BaseQuantity {
            value,
            fallback: None,
        }),
        Err(CoreError::IncompatibleUnits { from, to }) => {
            fallback(ConversionFallback::IncompatibleUnits { from, to })
        }
        Err(err @ CoreError::Validation(_)) => Err(err),
        Err(other) => fallback(ConversionFallback::Unresolvable {
            detail: other.to_string(),
        }),
    }
}

/// `+base` for receipt, return and adjustment; `-base` for issue.
#[inline]
pub fn signed_delta(kind: TransactionKind, base_quantity: Quantity) -> Quantity {
    if kind.is_inbound() {
        base_quantity
    } else {
        -base_quantity
    }
}

/// Adds `delta` to a cached stock value, counting `None` as zero.
#[inline]
pub fn apply_delta(current: Option<Quantity>, delta: Quantity) -> Result<Quantity, ValidationError> {
    current.unwrap_or_default().checked_add(delta)
}

/// Signed sum of stored base quantities.
pub fn recompute_stock<'a>(
    transactions: impl IntoIterator<Item = &'a StockTransaction>,
) -> Result<Quantity, ValidationError> {
    transactions
        .into_iter()
        .try_fold(Quantity::zero(), |total, t| total.checked_add(t.delta()))
}

// =============================================================================
// Audit
// =============================================================================

/// Cached stock next to the value recomputed from stored movements, with
/// the item's stock levels and value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockAudit {
    pub item_id: String,
    pub cached: Quantity,
    pub recomputed: Quantity,
    pub transaction_count: i64,
    pub needs_reorder: bool,
    pub below_minimum: bool,
    /// Cached stock at the item's unit price.
    pub stock_value_cents: i64,
}

impl StockAudit {
    pub fn new(item: &InventoryItem, transactions: &[StockTransaction]) -> Result<Self, ValidationError> {
        Ok(StockAudit {
            item_id: item.id.clone(),
            cached: item.stock(),
            recomputed: recompute_stock(transactions)?,
            transaction_count: transactions.len() as i64,
            needs_reorder: item.needs_reorder(),
            below_minimum: item.is_below_minimum(),
            stock_value_cents: item.stock_value().cents(),
        })
    }

    pub fn drift(&self) -> Quantity {
        self.cached - self.recomputed
    }

    pub fn is_consistent(&self) -> bool {
        self.cached == self.recomputed
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Unit;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn unit(id: &str, base: Option<&str>, factor: Decimal) -> Unit {
        let now = Utc::now();
        Unit {
            id: id.to_string(),
            code: id.to_string(),
            name: id.to_string(),
            base_unit_id: base.map(str::to_string),
            conversion_factor: factor,
            created_at: now,
            updated_at: now,
        }
    }

    fn movement(id: &str, kind: TransactionKind, base_quantity: Quantity) -> StockTransaction {
        let now = Utc::now();
        StockTransaction {
            id: id.to_string(),
            item_id: "item".to_string(),
            kind,
            quantity: base_quantity,
            unit_id: None,
            base_quantity,
            batch_id: None,
            location_id: None,
            project: None,
            transaction_date: now.date_naive(),
            reference_number: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_parse_kind() {
        for kind in TransactionKind::ALL {
            assert_eq!(kind.as_str().parse::<TransactionKind>().unwrap(), kind);
        }
        assert_eq!(
            "Receipt".parse::<TransactionKind>().unwrap(),
            TransactionKind::Receipt
        );
        assert_eq!(
            "transfer".parse::<TransactionKind>().unwrap_err(),
            CoreError::InvalidTransactionKind("transfer".to_string())
        );
    }

    #[test]
    fn test_signed_delta() {
        let q = Quantity::from_whole(3);
        assert_eq!(signed_delta(TransactionKind::Receipt, q), q);
        assert_eq!(signed_delta(TransactionKind::Return, q), q);
        assert_eq!(signed_delta(TransactionKind::Adjustment, q), q);
        assert_eq!(signed_delta(TransactionKind::Issue, q), -q);
    }

    #[test]
    fn test_apply_delta_treats_null_as_zero() {
        let delta = Quantity::from_raw(5000);
        assert_eq!(apply_delta(None, delta).unwrap(), delta);
        assert_eq!(apply_delta(Some(Quantity::from_whole(1)), -delta).unwrap(), delta);
    }

    #[test]
    fn test_apply_delta_rejects_overflow() {
        let err = apply_delta(Some(Quantity::from_raw(i64::MAX - 10)), Quantity::from_raw(11)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Overflow {
                field: "quantity".to_string()
            }
        );
    }

    #[test]
    fn test_receipt_in_grams_lands_in_kilograms() {
        let graph = UnitGraph::new(vec![
            unit("kg", None, Decimal::ONE),
            unit("g", Some("kg"), dec!(0.001)),
        ]);

        let base = resolve_base_quantity(&graph, Quantity::from_whole(500), Some("g"), Some("kg")).unwrap();
        assert!(base.is_converted());
        assert_eq!(base.value.to_string(), "0.5000");

        let stock = apply_delta(Some(Quantity::zero()), signed_delta(TransactionKind::Receipt, base.value)).unwrap();
        assert_eq!(stock.to_string(), "0.5000");
    }

    #[test]
    fn test_issue_can_drive_stock_negative() {
        let graph = UnitGraph::new(vec![unit("kg", None, Decimal::ONE)]);
        let base = resolve_base_quantity(&graph, Quantity::from_whole(3), Some("kg"), Some("kg")).unwrap();
        assert_eq!(base.value.to_string(), "3.0000");

        let stock = apply_delta(
            Some(Quantity::from_raw(5000)),
            signed_delta(TransactionKind::Issue, base.value),
        )
        .unwrap();
        assert_eq!(stock.to_string(), "-2.5000");
    }

    #[test]
    fn test_incompatible_units_fall_back_one_to_one() {
        let graph = UnitGraph::new(vec![
            unit("ft", None, Decimal::ONE),
            unit("in", Some("ft"), dec!(0.08333)),
            unit("m", None, Decimal::ONE),
            unit("cm", Some("m"), dec!(0.01)),
        ]);

        let base = resolve_base_quantity(&graph, Quantity::from_whole(10), Some("in"), Some("cm")).unwrap();
        assert_eq!(base.value, Quantity::from_whole(10));
        assert_eq!(
            base.fallback,
            Some(ConversionFallback::IncompatibleUnits {
                from: "in".to_string(),
                to: "cm".to_string()
            })
        );
    }

    #[test]
    fn test_missing_units_fall_back_one_to_one() {
        let graph = UnitGraph::default();
        let q = Quantity::from_whole(2);

        let base = resolve_base_quantity(&graph, q, Some("g"), None).unwrap();
        assert_eq!(base.value, q);
        assert_eq!(base.fallback, Some(ConversionFallback::MissingItemBaseUnit));

        let base = resolve_base_quantity(&graph, q, Some("g"), Some("kg")).unwrap();
        assert_eq!(base.value, q);
        assert!(matches!(base.fallback, Some(ConversionFallback::Unresolvable { .. })));
    }

    #[test]
    fn test_overflowing_conversion_is_rejected_not_booked_one_to_one() {
        let graph = UnitGraph::new(vec![
            unit("kg", None, Decimal::ONE),
            unit("t", Some("kg"), dec!(1000)),
        ]);

        let err = resolve_base_quantity(&graph, Quantity::from_raw(i64::MAX / 10), Some("t"), Some("kg"))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::Overflow { .. })));
    }

    #[test]
    fn test_validate_rejects_negative_quantity() {
        let mut input = NewStockTransaction {
            item_id: "item".to_string(),
            kind: TransactionKind::Receipt,
            quantity: Quantity::from_whole(-1),
            unit_id: None,
            batch_id: None,
            location_id: None,
            project: None,
            transaction_date: Utc::now().date_naive(),
            reference_number: None,
            notes: None,
        };
        assert!(input.validate().is_err());

        input.quantity = Quantity::zero();
        assert!(input.validate().is_ok());
    }

    fn stocked_item(stock: Option<Quantity>) -> InventoryItem {
        let now = Utc::now();
        InventoryItem {
            id: "item".to_string(),
            name: "Steel Rod".to_string(),
            description: None,
            sku: None,
            category: None,
            unit_price_cents: 250,
            unit_label: None,
            base_unit_id: Some("kg".to_string()),
            stock_quantity: stock,
            min_stock_level: Quantity::from_whole(2),
            reorder_level: Quantity::from_whole(5),
            default_location_id: None,
            batch_tracking: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_audit_drift() {
        let item = stocked_item(Some(Quantity::from_whole(4)));
        let moves = [
            movement("t1", TransactionKind::Receipt, Quantity::from_whole(5)),
            movement("t2", TransactionKind::Issue, Quantity::from_whole(2)),
        ];

        let audit = StockAudit::new(&item, &moves).unwrap();
        assert_eq!(audit.recomputed, Quantity::from_whole(3));
        assert_eq!(audit.transaction_count, 2);
        assert_eq!(audit.drift(), Quantity::from_whole(1));
        assert!(!audit.is_consistent());
    }

    #[test]
    fn test_audit_reports_stock_levels_and_value() {
        let audit = StockAudit::new(&stocked_item(Some(Quantity::from_raw(15000))), &[]).unwrap();
        assert!(audit.needs_reorder);
        assert!(audit.below_minimum);
        assert_eq!(audit.stock_value_cents, 375);

        let audit = StockAudit::new(&stocked_item(Some(Quantity::from_whole(5))), &[]).unwrap();
        assert!(audit.needs_reorder);
        assert!(!audit.below_minimum);

        let audit = StockAudit::new(&stocked_item(None), &[]).unwrap();
        assert_eq!(audit.cached, Quantity::zero());
        assert_eq!(audit.stock_value_cents, 0);
        assert!(audit.is_consistent());
    }

    fn kind_strategy() -> impl Strategy<Value = TransactionKind> {
        prop_oneof![
            Just(TransactionKind::Receipt),
            Just(TransactionKind::Issue),
            Just(TransactionKind::Return),
            Just(TransactionKind::Adjustment),
        ]
    }

    proptest! {
        #[test]
        fn prop_folded_deltas_equal_recomputed_stock(
            moves in prop::collection::vec((kind_strategy(), 0i64..10_000_000), 0..40)
        ) {
            let moves: Vec<_> = moves
                .into_iter()
                .enumerate()
                .map(|(i, (kind, raw))| movement(&format!("t{}", i), kind, Quantity::from_raw(raw)))
                .collect();

            let mut stock = None;
            for t in &moves {
                stock = Some(apply_delta(stock, t.delta()).unwrap());
            }

            prop_assert_eq!(stock.unwrap_or_default(), recompute_stock(&moves).unwrap());
        }

        #[test]
        fn prop_apply_then_reverse_is_identity(
            start in -10_000_000i64..10_000_000,
            kind in kind_strategy(),
            raw in 0i64..10_000_000,
        ) {
            let start = Quantity::from_raw(start);
            let delta = signed_delta(kind, Quantity::from_raw(raw));

            let applied = apply_delta(Some(start), delta).unwrap();
            prop_assert_eq!(apply_delta(Some(applied), -delta).unwrap(), start);
        }
    }
}
