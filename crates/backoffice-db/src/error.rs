//! # Database Errors
//!
//! `DbError` is what every repository returns. Domain rejections from
//! `backoffice-core` (a unit cycle, an unknown item, a bad discount) arrive
//! as `DbError::Core` and are raised before anything is written. SQLite
//! failures are sorted by constraint kind so callers can tell "that invoice
//! number is taken" from "that company does not exist".
//!
//! ```text
//!   sqlx::Error ──► constraint kind ──► UniqueViolation / ForeignKeyViolation
//!        │                          └─► Locked (writer gave up waiting)
//!        └───────► pool state ──────► PoolExhausted / ConnectionFailed
//!
//!   CoreError / ValidationError ──► DbError::Core
//! ```

use sqlx::error::ErrorKind;
use thiserror::Error;

use backoffice_core::{CoreError, ValidationError};

use crate::config::ConfigError;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// No row with that id (or the stock movement was already reversed).
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A unique column already holds the value: unit code, SKU, company
    /// name, invoice/payment/quotation number, batch number.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// A referenced company, item, unit or location does not exist, or a
    /// unit still in use as a base is being deleted.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A CHECK constraint in the schema rejected the row.
    #[error("Check constraint failed: {0}")]
    CheckViolation(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Another writer held the database past the busy timeout.
    #[error("Database is locked")]
    Locked,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A stored value could not be decoded (malformed decimal TEXT).
    #[error("Corrupt {column} value: {value}")]
    CorruptValue { column: String, value: String },

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// True for `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound { .. })
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Core(CoreError::Validation(err))
    }
}

/// Sorts sqlx errors by constraint kind.
///
/// SQLite reports the offending column as `<table>.<column>` in the
/// message; repositories replace it with the field and value they know.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                match db_err.kind() {
                    ErrorKind::UniqueViolation => DbError::UniqueViolation {
                        field: msg
                            .rsplit(": ")
                            .next()
                            .unwrap_or("unknown")
                            .to_string(),
                        value: "unknown".to_string(),
                    },
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    },
                    ErrorKind::CheckViolation => DbError::CheckViolation(msg.to_string()),
                    _ if msg.contains("database is locked") => DbError::Locked,
                    _ => DbError::QueryFailed(msg.to_string()),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
