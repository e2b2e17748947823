//! # Repository Module
//!
//! Database repository implementations for the back office.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Caller                                                                │
//! │       │                                                                 │
//! │       │  db.stock().record(&movement)                                   │
//! │       ▼                                                                 │
//! │  StockTransactionRepository                                            │
//! │  ├── BEGIN                                                             │
//! │  ├── resolve base quantity    (backoffice-core)                        │
//! │  ├── INSERT stock_transactions                                         │
//! │  ├── UPDATE inventory_items SET stock = COALESCE(stock, 0) + delta     │
//! │  └── COMMIT                                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`UnitRepository`](unit::UnitRepository) - Unit catalogue, cycle checks, seeding
//! - [`InventoryRepository`](inventory::InventoryRepository) - Item CRUD and search
//! - [`StockTransactionRepository`](stock::StockTransactionRepository) - Stock ledger
//! - [`LocationRepository`](location::LocationRepository) - Locations and batches
//! - [`TaxRepository`](tax::TaxRepository) - Taxes and the default tax
//! - [`CompanyRepository`](company::CompanyRepository) - Companies
//! - [`InvoiceRepository`](invoice::InvoiceRepository) - Invoices + ledger projection
//! - [`PaymentRepository`](payment::PaymentRepository) - Payments + ledger projection
//! - [`LedgerRepository`](ledger::LedgerRepository) - Statements and balances
//! - [`QuotationRepository`](quotation::QuotationRepository) - Quotations and lines

pub mod company;
pub mod inventory;
pub mod invoice;
pub mod ledger;
pub mod location;
pub mod payment;
pub mod quotation;
pub mod stock;
pub mod tax;
pub mod unit;

use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// Generates a new record id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Decodes a decimal stored as TEXT.
pub(crate) fn parse_decimal(column: &str, value: &str) -> DbResult<Decimal> {
    Decimal::from_str(value).map_err(|_| DbError::CorruptValue {
        column: column.to_string(),
        value: value.to_string(),
    })
}

/// Escapes `%` and `_` for a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("steel"), "%steel%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("f", "0.001").unwrap(), Decimal::new(1, 3));
        assert!(matches!(
            parse_decimal("f", "abc"),
            Err(DbError::CorruptValue { .. })
        ));
    }
}
