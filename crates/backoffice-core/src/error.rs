//! # Error Types
//!
//! Domain-specific error types for backoffice-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  backoffice-core errors (this file)                                    │
//! │  ├── CoreError        - Domain conditions (units, stock, ledger)       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  backoffice-db errors (separate crate)                                 │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Which Errors Reach The Caller?
//! `IncompatibleUnits` and `MissingUnitConfiguration` are produced by the
//! strict conversion API but are absorbed by the stock ledger, which falls
//! back to a 1:1 conversion. `InvalidTransactionKind` and validation errors
//! are rejected at the boundary and do reach the caller, and so does
//! `ValidationError::Overflow` from a conversion or stock total that leaves
//! the `Quantity` range.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The two units do not share a root unit.
    ///
    /// ## Example
    /// ```text
    /// Inch ──► Foot            (Foot has no base)
    /// Centimeter ──► Meter     (Meter has no base)
    ///
    /// root(Inch) = Foot ≠ Meter = root(Centimeter) → IncompatibleUnits
    /// ```
    #[error("Units {from} and {to} do not share a root unit")]
    IncompatibleUnits { from: String, to: String },

    /// A unit reference needed for conversion is absent or unknown.
    ///
    /// ## When This Occurs
    /// - The stock transaction has no unit
    /// - The inventory item has no base unit
    /// - A unit id does not exist in the unit catalogue
    #[error("Missing unit configuration: {reason}")]
    MissingUnitConfiguration { reason: String },

    /// Transaction kind outside {receipt, issue, return, adjustment}.
    #[error("Invalid transaction kind: '{0}'")]
    InvalidTransactionKind(String),

    /// Linking `unit` to `base` would close a loop in the unit tree.
    #[error("Unit {unit} cannot use {base} as base unit: would create a cycle")]
    UnitCycle { unit: String, base: String },

    /// Unit cannot be found.
    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    /// Inventory item cannot be found.
    #[error("Inventory item not found: {0}")]
    ItemNotFound(String),

    /// Company cannot be found.
    #[error("Company not found: {0}")]
    CompanyNotFound(String),

    /// The item already has stock movements, so its base unit is fixed.
    ///
    /// Cached stock and every stored `base_quantity` are expressed in the
    /// current base unit.
    #[error("Inventory item {0} has stock movements; its base unit cannot change")]
    BaseUnitInUse(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date, malformed decimal).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Arithmetic on the value would leave the stored integer range.
    #[error("{field} overflows the supported range")]
    Overflow { field: String },

    /// Duplicate value (e.g., duplicate invoice number).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
