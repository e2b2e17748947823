//! # backoffice-db: Database Layer for the Back Office
//!
//! SQLite persistence for units, inventory, the stock ledger, the company
//! ledger and quotations, built on sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Back Office Data Flow                            │
//! │                                                                         │
//! │  Caller (API handler, CLI, seed binary)                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  backoffice-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ UnitRepo       │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ StockRepo      │    │ 001_initial  │  │   │
//! │  │   │ DbConfig      │    │ InvoiceRepo .. │    │ _schema.sql  │  │   │
//! │  │   └───────────────┘    └───────┬────────┘    └──────────────┘  │   │
//! │  │                                │ pure maths                     │   │
//! │  │                                ▼                                │   │
//! │  │                        backoffice-core                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Environment configuration
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use backoffice_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::from_env()?).await?;
//! db.units().seed_standard_units().await?;
//!
//! let recorded = db.stock().record(&movement).await?;
//! let balances = db.ledger().balances().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::ConfigError;
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::company::CompanyRepository;
pub use repository::inventory::InventoryRepository;
pub use repository::invoice::InvoiceRepository;
pub use repository::ledger::LedgerRepository;
pub use repository::location::LocationRepository;
pub use repository::payment::PaymentRepository;
pub use repository::quotation::QuotationRepository;
pub use repository::stock::{RecordedMovement, ReversedMovement, StockTransactionRepository};
pub use repository::tax::TaxRepository;
pub use repository::unit::{SeedReport, UnitRepository};
