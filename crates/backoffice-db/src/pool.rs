//! # Connection Pool
//!
//! Opens the SQLite database, applies migrations and hands out repositories.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Opening the back-office DB                        │
//! │                                                                         │
//! │  DbConfig::from_env()          DbConfig::in_memory()                    │
//! │   file, WAL, N connections      private DB, exactly 1 connection        │
//! │           │                              │                              │
//! │           └──────────────┬───────────────┘                              │
//! │                          ▼                                              │
//! │              Database::new(config)                                      │
//! │               ├── SqliteConnectOptions (FKs on, busy timeout)           │
//! │               ├── SqlitePool                                            │
//! │               └── migrations::run_migrations (unless disabled)          │
//! │                          │                                              │
//! │                          ▼                                              │
//! │   units() inventory() stock() locations() taxes()                       │
//! │   companies() invoices() payments() ledger() quotations()               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock movements and ledger projections each run in one write transaction.
//! File databases use WAL so reports keep reading while a movement commits,
//! and the busy timeout lets a second writer wait for the lock instead of
//! failing straight away.
//!
//! An in-memory database lives and dies with its connection, so that pool is
//! pinned to a single connection that never idles out. Repository code must
//! not go back to the pool while it holds a transaction.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::company::CompanyRepository;
use crate::repository::inventory::InventoryRepository;
use crate::repository::invoice::InvoiceRepository;
use crate::repository::ledger::LedgerRepository;
use crate::repository::location::LocationRepository;
use crate::repository::payment::PaymentRepository;
use crate::repository::quotation::QuotationRepository;
use crate::repository::stock::StockTransactionRepository;
use crate::repository::tax::TaxRepository;
use crate::repository::unit::UnitRepository;

const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// How to open the back-office database.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/backoffice/backoffice.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, or `:memory:`.
    pub database_path: PathBuf,

    /// Pool ceiling (5 for files, 1 in memory).
    pub max_connections: u32,
    pub min_connections: u32,

    /// How long `pool.begin()` may wait for a free connection.
    pub connect_timeout: Duration,

    /// File pools only; the in-memory pool never drops its connection.
    pub idle_timeout: Duration,

    /// How long a writer waits on a locked database before `SQLITE_BUSY`.
    pub busy_timeout: Duration,

    /// Apply embedded migrations while opening.
    pub run_migrations: bool,
}

impl DbConfig {
    /// A file database, created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// A private, migrated, empty database. Used by every repository test.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            ..DbConfig::new(MEMORY_PATH)
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY_PATH
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let url = if self.is_in_memory() {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}?mode=rwc", self.database_path.display())
        };

        let mut options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout);

        if !self.is_in_memory() {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .create_if_missing(true);
        }

        Ok(options)
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.connect_timeout);

        if self.is_in_memory() {
            options.idle_timeout(None).max_lifetime(None)
        } else {
            options.idle_timeout(Some(self.idle_timeout))
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to an open database. Clones share one pool.
///
/// ```rust,ignore
/// let db = Database::new(DbConfig::from_env()?).await?;
/// let recorded = db.stock().record(&movement).await?;
/// let statement = db.ledger().statement(&company_id, period).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and, unless disabled, brings the schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            in_memory = config.is_in_memory(),
            "Opening back-office database"
        );

        let connect_options = config.connect_options()?;
        debug!(busy_timeout = ?config.busy_timeout, "SQLite options ready");

        let pool = config
            .pool_options()
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool open"
        );

        let db = Database { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending migrations. Safe to call repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Raw pool, for ad-hoc queries in tests and tooling.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn units(&self) -> UnitRepository {
        UnitRepository::new(self.pool.clone())
    }

    pub fn inventory(&self) -> InventoryRepository {
        InventoryRepository::new(self.pool.clone())
    }

    /// The stock ledger: the only writer of `inventory_items.stock_quantity`.
    pub fn stock(&self) -> StockTransactionRepository {
        StockTransactionRepository::new(self.pool.clone())
    }

    /// Locations and batches.
    pub fn locations(&self) -> LocationRepository {
        LocationRepository::new(self.pool.clone())
    }

    pub fn taxes(&self) -> TaxRepository {
        TaxRepository::new(self.pool.clone())
    }

    pub fn companies(&self) -> CompanyRepository {
        CompanyRepository::new(self.pool.clone())
    }

    pub fn invoices(&self) -> InvoiceRepository {
        InvoiceRepository::new(self.pool.clone())
    }

    pub fn payments(&self) -> PaymentRepository {
        PaymentRepository::new(self.pool.clone())
    }

    /// Read side of the company ledger: entries, statements, balances.
    pub fn ledger(&self) -> LedgerRepository {
        LedgerRepository::new(self.pool.clone())
    }

    pub fn quotations(&self) -> QuotationRepository {
        QuotationRepository::new(self.pool.clone())
    }

    /// Closes every connection. An in-memory database is gone afterwards.
    pub async fn close(&self) {
        info!("Closing back-office database");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_opens_migrated() {
        let config = DbConfig::in_memory();
        assert!(config.is_in_memory());
        assert_eq!(config.max_connections, 1);

        let db = Database::new(config).await.unwrap();
        assert!(db.health_check().await);

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'stock_transactions'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(tables, 1);
    }

    #[tokio::test]
    async fn test_clones_share_in_memory_data() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let other = db.clone();

        db.units().seed_standard_units().await.unwrap();
        assert!(other.units().get_by_code("kg").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[tokio::test]
    async fn test_closed_database_fails_health_check() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;
        assert!(!db.health_check().await);
    }

    #[test]
    fn test_file_config_defaults() {
        let config = DbConfig::new("/tmp/backoffice-test.db")
            .max_connections(8)
            .busy_timeout(Duration::from_secs(10));

        assert_eq!(config.max_connections, 8);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.busy_timeout, Duration::from_secs(10));
        assert!(config.run_migrations);
        assert!(!config.is_in_memory());
    }
}
