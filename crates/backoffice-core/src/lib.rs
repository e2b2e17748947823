//! # backoffice-core: Pure Business Logic for the Back Office
//!
//! This crate holds every rule of the back office as pure functions with
//! zero I/O dependencies: unit conversion, stock ledger maths, company
//! statements and quotation totals.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Back Office Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          Caller (API layer, seed binary, admin tools)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               backoffice-db (Database Layer)                    │   │
//! │  │    repositories, SQL transactions, atomic stock increments      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ calls                                  │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ backoffice-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   units   │  │   stock   │  │  ledger   │  │ quotation │  │   │
//! │  │   │ UnitGraph │  │  deltas   │  │ statement │  │  totals   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`units`] - Unit records and the conversion resolver
//! - [`stock`] - Inventory items, stock movements, ledger maths
//! - [`ledger`] - Companies, invoices, payments, statements
//! - [`quotation`] - Quotations and their totals
//! - [`types`] - Reference data (taxes, locations, batches)
//! - [`quantity`] - Fixed-point stock quantities
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use backoffice_core::stock::{apply_delta, signed_delta, TransactionKind};
//! use backoffice_core::Quantity;
//!
//! let stock = Some(Quantity::from_raw(5000)); // 0.5 kg
//! let delta = signed_delta(TransactionKind::Issue, Quantity::from_whole(3));
//!
//! // Negative stock is allowed.
//! assert_eq!(apply_delta(stock, delta).unwrap().to_string(), "-2.5000");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod money;
pub mod quantity;
pub mod quotation;
pub mod stock;
pub mod types;
pub mod units;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use quantity::Quantity;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of display names.
pub const MAX_NAME_LEN: usize = 200;

/// Maximum length of short codes (unit symbols, location codes, SKUs).
pub const MAX_CODE_LEN: usize = 20;

/// Maximum length of invoice, payment and batch numbers.
pub const MAX_DOCUMENT_NUMBER_LEN: usize = 50;
