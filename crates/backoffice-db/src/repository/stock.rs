//! # Stock Transaction Repository
//!
//! The stock ledger: every change to an item's cached stock goes through
//! here, one SQL transaction per movement.
//!
//! ## Recording A Movement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    UPDATE inventory_items ... RETURNING base_unit_id  (item must exist) │
//! │    SELECT * FROM units                             (conversion graph)   │
//! │    resolve_base_quantity(...)                      (may fall back 1:1)  │
//! │    INSERT INTO stock_transactions (..., base_quantity, ...)             │
//! │    SELECT stock_quantity                       (reject on overflow)     │
//! │    UPDATE inventory_items                                               │
//! │       SET stock_quantity = COALESCE(stock_quantity, 0) + :delta         │
//! │       RETURNING stock_quantity                                          │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The increment happens inside the UPDATE itself, so two writers recording
//! movements for the same item can never overwrite each other's delta.
//! Deleting a movement runs the same UPDATE with the negated delta, computed
//! from the stored `base_quantity`. A movement is applied exactly when its
//! row exists: the INSERT applies it once, and only the writer whose
//! `DELETE ... RETURNING` gets the row back reverses it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use backoffice_core::stock::{
    apply_delta, resolve_base_quantity, ConversionFallback, InventoryItem, NewStockTransaction,
    StockAudit, StockTransaction, StockTransactionNotes,
};
use backoffice_core::units::UnitGraph;
use backoffice_core::{CoreError, Quantity};

use super::inventory::SELECT_ITEMS;
use super::new_id;
use super::unit::load_units;
use crate::error::{DbError, DbResult};

const SELECT_TRANSACTIONS: &str = r#"
    SELECT id, item_id, kind, quantity, unit_id, base_quantity, batch_id, location_id,
           project, transaction_date, reference_number, notes, created_at, updated_at
    FROM stock_transactions
"#;

/// Result of recording a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedMovement {
    pub transaction: StockTransaction,
    /// Item stock after the movement.
    pub item_stock: Quantity,
    /// Set when the quantity was booked 1:1 without conversion.
    pub fallback: Option<ConversionFallback>,
}

/// Result of deleting (reversing) a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversedMovement {
    pub transaction: StockTransaction,
    /// Item stock after the reversal.
    pub item_stock: Quantity,
}

/// Repository for the stock ledger.
///
/// ## Usage
/// ```rust,ignore
/// let recorded = db.stock().record(&NewStockTransaction {
///     item_id: steel.id.clone(),
///     kind: TransactionKind::Receipt,
///     quantity: "500".parse()?,
///     unit_id: Some(gram.id.clone()),
///     ..
/// }).await?;
///
/// assert_eq!(recorded.item_stock.to_string(), "0.5000"); // kg
/// ```
#[derive(Debug, Clone)]
pub struct StockTransactionRepository {
    pool: SqlitePool,
}

impl StockTransactionRepository {
    /// Creates a new StockTransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockTransactionRepository { pool }
    }

    /// Records a movement and applies its delta to the item's stock.
    ///
    /// ## Returns
    /// * `Err(DbError::Core(ItemNotFound))` - the item does not exist
    /// * `Err(DbError::Core(UnitNotFound))` - the movement names an unknown unit
    /// * `Err(DbError::Core(Validation))` - negative quantity, missing item id,
    ///   or a conversion or stock total that would overflow
    ///
    /// Unit problems that only prevent conversion never fail the call; the
    /// quantity is booked 1:1 and the reason is returned in `fallback`.
    pub async fn record(&self, input: &NewStockTransaction) -> DbResult<RecordedMovement> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        // Writing first takes the database write lock before anything is read.
        let item_base_unit: Option<String> = sqlx::query_scalar::<_, Option<String>>(
            "UPDATE inventory_items SET updated_at = ?2 WHERE id = ?1 RETURNING base_unit_id",
        )
        .bind(&input.item_id)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| CoreError::ItemNotFound(input.item_id.clone()))?;

        let graph = UnitGraph::new(load_units(&mut *tx).await?);
        if let Some(unit_id) = input.unit_id.as_deref() {
            if graph.get(unit_id).is_none() {
                return Err(CoreError::UnitNotFound(unit_id.to_string()).into());
            }
        }

        let base = resolve_base_quantity(
            &graph,
            input.quantity,
            input.unit_id.as_deref(),
            item_base_unit.as_deref(),
        )?;

        if let Some(reason) = &base.fallback {
            warn!(
                item_id = %input.item_id,
                quantity = %input.quantity,
                reason = %reason,
                "Unit conversion unavailable, booking quantity 1:1"
            );
        }

        let now = Utc::now();
        let transaction = StockTransaction {
            id: new_id(),
            item_id: input.item_id.clone(),
            kind: input.kind,
            quantity: input.quantity,
            unit_id: input.unit_id.clone(),
            base_quantity: base.value,
            batch_id: input.batch_id.clone(),
            location_id: input.location_id.clone(),
            project: input.project.clone(),
            transaction_date: input.transaction_date,
            reference_number: input.reference_number.clone(),
            notes: input.notes.clone(),
            created_at: now,
            updated_at: now,
        };

        insert_transaction(&mut *tx, &transaction).await?;

        let delta = transaction.delta();
        let item_stock = apply_stock_delta(&mut *tx, &transaction.item_id, delta).await?;

        tx.commit().await?;

        info!(
            id = %transaction.id,
            item_id = %transaction.item_id,
            kind = %transaction.kind,
            delta = %delta,
            stock = %item_stock,
            "Stock movement recorded"
        );

        Ok(RecordedMovement {
            transaction,
            item_stock,
            fallback: base.fallback,
        })
    }

    /// Deletes a movement and reverses its effect on stock.
    ///
    /// The reversal uses the stored base quantity, so later changes to the
    /// unit catalogue cannot skew it.
    pub async fn delete(&self, id: &str) -> DbResult<ReversedMovement> {
        debug!(id = %id, "Deleting stock movement");

        let mut tx = self.pool.begin().await?;

        // Only the writer whose DELETE returns the row reverses it.
        let transaction = sqlx::query_as::<_, StockTransaction>(
            r#"
            DELETE FROM stock_transactions WHERE id = ?1
            RETURNING id, item_id, kind, quantity, unit_id, base_quantity, batch_id, location_id,
                      project, transaction_date, reference_number, notes, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("StockTransaction", id))?;

        let delta = transaction.delta().checked_neg()?;
        let item_stock = apply_stock_delta(&mut *tx, &transaction.item_id, delta).await?;

        tx.commit().await?;

        info!(
            id = %transaction.id,
            item_id = %transaction.item_id,
            delta = %delta,
            stock = %item_stock,
            "Stock movement reversed"
        );

        Ok(ReversedMovement {
            transaction,
            item_stock,
        })
    }

    /// Edits the descriptive fields of a movement. Stock is not touched.
    pub async fn update_notes(
        &self,
        id: &str,
        notes: &StockTransactionNotes,
    ) -> DbResult<StockTransaction> {
        debug!(id = %id, "Updating stock movement notes");

        let result = sqlx::query(
            r#"
            UPDATE stock_transactions SET
                reference_number = ?2,
                notes = ?3,
                project = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&notes.reference_number)
        .bind(&notes.notes)
        .bind(&notes.project)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("StockTransaction", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("StockTransaction", id))
    }

    /// Gets a movement by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<StockTransaction>> {
        let transaction =
            sqlx::query_as::<_, StockTransaction>(&format!("{} WHERE id = ?1", SELECT_TRANSACTIONS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(transaction)
    }

    /// Movements of one item, oldest first.
    pub async fn list_for_item(&self, item_id: &str) -> DbResult<Vec<StockTransaction>> {
        let transactions = sqlx::query_as::<_, StockTransaction>(&format!(
            "{} WHERE item_id = ?1 ORDER BY transaction_date, created_at",
            SELECT_TRANSACTIONS
        ))
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    /// Movements tagged with a project, oldest first.
    pub async fn list_for_project(&self, project: &str) -> DbResult<Vec<StockTransaction>> {
        let transactions = sqlx::query_as::<_, StockTransaction>(&format!(
            "{} WHERE project = ?1 ORDER BY transaction_date, created_at",
            SELECT_TRANSACTIONS
        ))
        .bind(project)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    /// Compares the cached stock with the signed sum of stored movements.
    pub async fn audit_item(&self, item_id: &str) -> DbResult<StockAudit> {
        let mut tx = self.pool.begin().await?;

        let item = sqlx::query_as::<_, InventoryItem>(&format!("{} WHERE id = ?1", SELECT_ITEMS))
            .bind(item_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::ItemNotFound(item_id.to_string()))?;

        let transactions = sqlx::query_as::<_, StockTransaction>(&format!(
            "{} WHERE item_id = ?1",
            SELECT_TRANSACTIONS
        ))
        .bind(item_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let audit = StockAudit::new(&item, &transactions)?;

        if !audit.is_consistent() {
            warn!(
                item_id = %item_id,
                cached = %audit.cached,
                recomputed = %audit.recomputed,
                "Cached stock drifted from movement history"
            );
        }
        if audit.below_minimum {
            debug!(item_id = %item_id, stock = %audit.cached, "Item below minimum stock");
        }

        Ok(audit)
    }
}

async fn insert_transaction(conn: &mut SqliteConnection, t: &StockTransaction) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_transactions (
            id, item_id, kind, quantity, unit_id, base_quantity, batch_id, location_id,
            project, transaction_date, reference_number, notes, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(&t.id)
    .bind(&t.item_id)
    .bind(t.kind)
    .bind(t.quantity)
    .bind(&t.unit_id)
    .bind(t.base_quantity)
    .bind(&t.batch_id)
    .bind(&t.location_id)
    .bind(&t.project)
    .bind(t.transaction_date)
    .bind(&t.reference_number)
    .bind(&t.notes)
    .bind(t.created_at)
    .bind(t.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Atomically adds `delta` to an item's stock and returns the new value.
///
/// The caller already holds the write lock, so the total checked here is the
/// one the UPDATE produces. SQLite would turn an overflowing integer sum into
/// a REAL, so it is rejected before the write.
async fn apply_stock_delta(
    conn: &mut SqliteConnection,
    item_id: &str,
    delta: Quantity,
) -> DbResult<Quantity> {
    let current: Option<Quantity> = sqlx::query_scalar::<_, Option<Quantity>>(
        "SELECT stock_quantity FROM inventory_items WHERE id = ?1",
    )
    .bind(item_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| CoreError::ItemNotFound(item_id.to_string()))?;
    apply_delta(current, delta)?;

    let stock: Quantity = sqlx::query_scalar(
        r#"
        UPDATE inventory_items
        SET stock_quantity = COALESCE(stock_quantity, 0) + ?2,
            updated_at = ?3
        WHERE id = ?1
        RETURNING stock_quantity
        "#,
    )
    .bind(item_id)
    .bind(delta)
    .bind(Utc::now())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| CoreError::ItemNotFound(item_id.to_string()))?;

    Ok(stock)
}

// =============================================================================
// Unit Tests
// =============================================================================
