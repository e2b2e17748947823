//! # Units Module
//!
//! Measurement units and the conversion resolver.
//!
//! ## Unit Forest
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Units form a forest                              │
//! │                                                                         │
//! │      kg (root)                 m (root)               pcs (root)        │
//! │      ├── g    × 0.001          ├── cm  × 0.01                           │
//! │      │   └── mg × 0.001        ├── mm  × 0.001                          │
//! │      ├── ton  × 1000           ├── ft  × 0.3048                         │
//! │      └── lb   × 0.45359        │   └── in × 0.08333                     │
//! │          └── oz × 0.0625       └── yd  × 0.9144                         │
//! │                                                                         │
//! │  factor_to_root(oz) = 0.0625 × 0.45359 = 0.028349375                    │
//! │                                                                         │
//! │  convert(q, A, B) = q × factor_to_root(A) / factor_to_root(B)           │
//! │                     only when root(A) == root(B)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Corrupt Data
//! Every chain walk carries a visited set. A self-reference or a loop stops
//! the walk at the last unit reached before the repeat, so resolution always
//! terminates. New links are checked with [`UnitGraph::would_create_cycle`]
//! before they are written.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::quantity::{Quantity, QUANTITY_SCALE};

// =============================================================================
// Unit
// =============================================================================

/// A measurement unit.
///
/// A unit without `base_unit_id` is a root with an implicit factor of 1.
/// Otherwise one of this unit equals `conversion_factor` of its base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Unit {
    pub id: String,
    /// Short unique symbol ("kg", "pcs").
    pub code: String,
    pub name: String,
    pub base_unit_id: Option<String>,
    #[ts(type = "string")]
    pub conversion_factor: Decimal,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Unit {
    #[inline]
    pub fn is_root(&self) -> bool {
        self.base_unit_id.is_none()
    }
}

// =============================================================================
// Unit Graph
// =============================================================================

/// In-memory view of the unit catalogue used to resolve conversions.
///
/// ## Example
/// ```rust
/// use backoffice_core::units::{Unit, UnitGraph};
/// use backoffice_core::Quantity;
/// use chrono::Utc;
/// use rust_decimal::Decimal;
///
/// let unit = |id: &str, base: Option<&str>, factor: Decimal| Unit {
///     id: id.to_string(),
///     code: id.to_string(),
///     name: id.to_string(),
///     base_unit_id: base.map(str::to_string),
///     conversion_factor: factor,
///     created_at: Utc::now(),
///     updated_at: Utc::now(),
/// };
///
/// let graph = UnitGraph::new(vec![
///     unit("kg", None, Decimal::ONE),
///     unit("g", Some("kg"), Decimal::new(1, 3)),
/// ]);
///
/// let kg = graph.convert(Quantity::from_whole(500), "g", "kg").unwrap();
/// assert_eq!(kg.to_string(), "0.5000");
/// ```
#[derive(Debug, Clone, Default)]
pub struct UnitGraph {
    units: HashMap<String, Unit>,
}

impl UnitGraph {
    /// Builds a graph from unit records.
    pub fn new(units: impl IntoIterator<Item = Unit>) -> Self {
        UnitGraph {
            units: units.into_iter().map(|u| (u.id.clone(), u)).collect(),
        }
    }

    /// Looks up a unit by id.
    pub fn get(&self, id: &str) -> Option<&Unit> {
        self.units.get(id)
    }

    /// Number of units in the graph.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Follows the base chain of `unit_id` to its root.
    ///
    /// Returns `None` only when `unit_id` itself is unknown.
    pub fn root_of(&self, unit_id: &str) -> Option<&Unit> {
        self.walk(unit_id).map(|(root, _)| root)
    }

    /// Cumulative multiplier converting one `unit_id` into its root's scale.
    pub fn factor_to_root(&self, unit_id: &str) -> Option<Decimal> {
        self.walk(unit_id).map(|(_, factor)| factor)
    }

    /// Converts `quantity` expressed in `from_id` into `to_id`.
    ///
    /// The result is rounded to the stored quantity precision.
    ///
    /// ## Errors
    /// - [`CoreError::MissingUnitConfiguration`] when either unit is unknown
    /// - [`CoreError::IncompatibleUnits`] when the roots differ
    /// - [`CoreError::Validation`] when the result does not fit a `Quantity`
    pub fn convert(&self, quantity: Quantity, from_id: &str, to_id: &str) -> CoreResult<Quantity> {
        let (from_root, from_factor) =
            self.walk(from_id)
                .ok_or_else(|| CoreError::MissingUnitConfiguration {
                    reason: format!("unknown unit {}", from_id),
                })?;
        let (to_root, to_factor) =
            self.walk(to_id)
                .ok_or_else(|| CoreError::MissingUnitConfiguration {
                    reason: format!("unknown unit {}", to_id),
                })?;

        if from_root.id != to_root.id {
            return Err(CoreError::IncompatibleUnits {
                from: self.code_of(from_id),
                to: self.code_of(to_id),
            });
        }

        if to_factor.is_zero() || to_factor.is_sign_negative() {
            return Ok(quantity);
        }

        let converted = quantity
            .to_decimal()
            .checked_mul(from_factor)
            .and_then(|v| v.checked_div(to_factor))
            .ok_or_else(overflow)?
            .round_dp_with_strategy(QUANTITY_SCALE, RoundingStrategy::MidpointNearestEven);

        Ok(Quantity::from_decimal(converted).map_err(|_| overflow())?)
    }

    /// True when linking `unit_id` to `proposed_base` would close a loop.
    ///
    /// ```text
    /// kg ◄── g ◄── mg        set_base(kg, mg)?  walk mg → g → kg  hits kg → cycle
    /// ```
    pub fn would_create_cycle(&self, unit_id: &str, proposed_base: Option<&str>) -> bool {
        let Some(mut cursor) = proposed_base else {
            return false;
        };

        let mut visited = HashSet::new();
        loop {
            if cursor == unit_id {
                return true;
            }
            if !visited.insert(cursor) {
                return false;
            }
            match self.units.get(cursor).and_then(|u| u.base_unit_id.as_deref()) {
                Some(next) => cursor = next,
                None => return false,
            }
        }
    }

    /// Walks from `unit_id` towards its root, multiplying factors per hop.
    fn walk(&self, unit_id: &str) -> Option<(&Unit, Decimal)> {
        let mut current = self.units.get(unit_id)?;
        let mut factor = Decimal::ONE;
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(current.id.as_str());

        while let Some(base_id) = current.base_unit_id.as_deref() {
            if visited.contains(base_id) {
                break;
            }
            let Some(base) = self.units.get(base_id) else {
                break;
            };
            factor *= current.conversion_factor;
            visited.insert(base.id.as_str());
            current = base;
        }

        Some((current, factor))
    }

    fn code_of(&self, unit_id: &str) -> String {
        self.units
            .get(unit_id)
            .map(|u| u.code.clone())
            .unwrap_or_else(|| unit_id.to_string())
    }
}

// =============================================================================
// Standard Catalogue
// =============================================================================

/// An entry of the built-in unit catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardUnit {
    pub code: &'static str,
    pub name: &'static str,
    pub base_code: Option<&'static str>,
    factor_mantissa: i64,
    factor_scale: u32,
}

impl StandardUnit {
    const fn root(code: &'static str, name: &'static str) -> Self {
        StandardUnit {
            code,
            name,
            base_code: None,
            factor_mantissa: 1,
            factor_scale: 0,
        }
    }

    const fn derived(
        code: &'static str,
        name: &'static str,
        base: &'static str,
        factor_mantissa: i64,
        factor_scale: u32,
    ) -> Self {
        StandardUnit {
            code,
            name,
            base_code: Some(base),
            factor_mantissa,
            factor_scale,
        }
    }

    /// Multiplier to the base unit (1 for roots).
    pub fn factor(&self) -> Decimal {
        Decimal::new(self.factor_mantissa, self.factor_scale)
    }
}

/// Units every installation starts with.
pub const STANDARD_UNITS: &[StandardUnit] = &[
    // Count
    StandardUnit::root("pcs", "Pieces"),
    StandardUnit::root("box", "Box"),
    StandardUnit::root("pkt", "Pack"),
    StandardUnit::root("set", "Set"),
    StandardUnit::root("doz", "Dozen"),
    StandardUnit::root("ctn", "Carton"),
    StandardUnit::root("roll", "Roll"),
    StandardUnit::root("bdl", "Bundle"),
    // Weight
    StandardUnit::derived("oz", "Ounce", "lb", 625, 4),
    StandardUnit::derived("mg", "Milligram", "g", 1, 3),
    StandardUnit::root("kg", "Kilogram"),
    StandardUnit::derived("g", "Gram", "kg", 1, 3),
    StandardUnit::derived("ton", "Metric Ton", "kg", 1000, 0),
    StandardUnit::derived("lb", "Pound", "kg", 45359, 5),
    // Length
    StandardUnit::root("m", "Meter"),
    StandardUnit::derived("cm", "Centimeter", "m", 1, 2),
    StandardUnit::derived("mm", "Millimeter", "m", 1, 3),
    StandardUnit::derived("in", "Inch", "ft", 8333, 5),
    StandardUnit::derived("ft", "Foot", "m", 3048, 4),
    StandardUnit::derived("yd", "Yard", "m", 9144, 4),
    // Area
    StandardUnit::root("sqm", "Square Meter"),
    StandardUnit::derived("sqft", "Square Foot", "sqm", 9290, 5),
    // Volume
    StandardUnit::root("l", "Liter"),
    StandardUnit::derived("ml", "Milliliter", "l", 1, 3),
    StandardUnit::derived("gal", "Gallon", "l", 378541, 5),
    // Time
    StandardUnit::root("hr", "Hour"),
    StandardUnit::derived("day", "Day", "hr", 24, 0),
    StandardUnit::root("mo", "Month"),
];

/// Orders catalogue entries so every base precedes the units derived from it.
///
/// Entries whose base never appears are dropped from the result.
pub fn dependency_order(units: &[StandardUnit]) -> Vec<StandardUnit> {
    let mut placed: HashSet<&str> = HashSet::new();
    let mut ordered = Vec::with_capacity(units.len());
    let mut pending: Vec<StandardUnit> = units.to_vec();

    loop {
        let before = pending.len();
        pending.retain(|unit| {
            let ready = unit.base_code.map_or(true, |base| placed.contains(base));
            if ready {
                placed.insert(unit.code);
                ordered.push(*unit);
            }
            !ready
        });
        if pending.is_empty() || pending.len() == before {
            break;
        }
    }

    ordered
}

fn overflow() -> ValidationError {
    ValidationError::Overflow {
        field: "quantity".to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
