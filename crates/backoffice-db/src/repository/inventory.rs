//! # Inventory Repository
//!
//! CRUD and search for inventory items.
//!
//! `stock_quantity` is deliberately absent from every write in this file.
//! Only [`StockTransactionRepository`](super::stock::StockTransactionRepository)
//! moves stock.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use backoffice_core::stock::InventoryItem;
use backoffice_core::validation::{validate_code, validate_name, validate_price_cents, validate_search_query};
use backoffice_core::{CoreError, ValidationError};

use super::like_pattern;
use crate::error::{DbError, DbResult};

pub(crate) const SELECT_ITEMS: &str = r#"
    SELECT id, name, description, sku, category, unit_price_cents, unit_label,
           base_unit_id, stock_quantity, min_stock_level, reorder_level,
           default_location_id, batch_tracking, is_active, created_at, updated_at
    FROM inventory_items
"#;

/// Repository for inventory item database operations.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Gets an item by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<InventoryItem>> {
        let item = sqlx::query_as::<_, InventoryItem>(&format!("{} WHERE id = ?1", SELECT_ITEMS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    /// Gets an item by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<InventoryItem>> {
        let item = sqlx::query_as::<_, InventoryItem>(&format!("{} WHERE sku = ?1", SELECT_ITEMS))
            .bind(sku.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    /// Lists active items ordered by name.
    pub async fn list(&self, limit: i64, offset: i64) -> DbResult<Vec<InventoryItem>> {
        let items = sqlx::query_as::<_, InventoryItem>(&format!(
            "{} WHERE is_active = 1 ORDER BY name LIMIT ?1 OFFSET ?2",
            SELECT_ITEMS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Searches active items by name, SKU or category.
    ///
    /// An empty query returns the first `limit` items.
    pub async fn search(&self, query: &str, limit: i64) -> DbResult<Vec<InventoryItem>> {
        let query = validate_search_query(query)?;
        if query.is_empty() {
            return self.list(limit, 0).await;
        }

        debug!(query = %query, limit = limit, "Searching inventory");

        let pattern = like_pattern(&query);
        let items = sqlx::query_as::<_, InventoryItem>(&format!(
            r#"{}
            WHERE is_active = 1
              AND (name LIKE ?1 ESCAPE '\' OR sku LIKE ?1 ESCAPE '\' OR category LIKE ?1 ESCAPE '\')
            ORDER BY name
            LIMIT ?2"#,
            SELECT_ITEMS
        ))
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Items at or below their reorder level. Untouched stock counts as zero.
    pub async fn low_stock(&self) -> DbResult<Vec<InventoryItem>> {
        let items = sqlx::query_as::<_, InventoryItem>(&format!(
            "{} WHERE is_active = 1 AND COALESCE(stock_quantity, 0) <= reorder_level ORDER BY name",
            SELECT_ITEMS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Counts active items.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory_items WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Inserts a new item. Stock starts uninitialized whatever the input says.
    pub async fn insert(&self, item: &InventoryItem) -> DbResult<InventoryItem> {
        debug!(id = %item.id, name = %item.name, "Inserting inventory item");

        let item = checked(item)?;

        sqlx::query(
            r#"
            INSERT INTO inventory_items (
                id, name, description, sku, category, unit_price_cents, unit_label,
                base_unit_id, stock_quantity, min_stock_level, reorder_level,
                default_location_id, batch_tracking, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(&item.sku)
        .bind(&item.category)
        .bind(item.unit_price_cents)
        .bind(&item.unit_label)
        .bind(&item.base_unit_id)
        .bind(item.min_stock_level)
        .bind(item.reorder_level)
        .bind(&item.default_location_id)
        .bind(item.batch_tracking)
        .bind(item.is_active)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_sku(e, item.sku.as_deref()))?;

        Ok(InventoryItem {
            stock_quantity: None,
            ..item
        })
    }

    /// Updates an item's descriptive fields.
    ///
    /// The cached stock is left untouched and returned as stored. The base
    /// unit may only change while the item has no stock movements; otherwise
    /// the call fails with [`CoreError::BaseUnitInUse`].
    pub async fn update(&self, item: &InventoryItem) -> DbResult<InventoryItem> {
        debug!(id = %item.id, "Updating inventory item");

        let item = checked(item)?;
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE inventory_items SET
                name = ?2,
                description = ?3,
                sku = ?4,
                category = ?5,
                unit_price_cents = ?6,
                unit_label = ?7,
                base_unit_id = ?8,
                min_stock_level = ?9,
                reorder_level = ?10,
                default_location_id = ?11,
                batch_tracking = ?12,
                is_active = ?13,
                updated_at = ?14
            WHERE id = ?1
              AND (base_unit_id IS ?8
                   OR NOT EXISTS (SELECT 1 FROM stock_transactions WHERE item_id = ?1))
            "#,
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(&item.sku)
        .bind(&item.category)
        .bind(item.unit_price_cents)
        .bind(&item.unit_label)
        .bind(&item.base_unit_id)
        .bind(item.min_stock_level)
        .bind(item.reorder_level)
        .bind(&item.default_location_id)
        .bind(item.batch_tracking)
        .bind(item.is_active)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_sku(e, item.sku.as_deref()))?;

        if result.rows_affected() == 0 {
            return match self.get_by_id(&item.id).await? {
                Some(_) => {
                    warn!(id = %item.id, "Refusing base unit change on item with stock movements");
                    Err(CoreError::BaseUnitInUse(item.id.clone()).into())
                }
                None => Err(DbError::not_found("InventoryItem", &item.id)),
            };
        }

        self.get_by_id(&item.id)
            .await?
            .ok_or_else(|| DbError::not_found("InventoryItem", &item.id))
    }

    /// Soft-deletes an item. Its movements and history stay intact.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting inventory item");

        let result = sqlx::query(
            "UPDATE inventory_items SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("InventoryItem", id));
        }

        Ok(())
    }
}

fn checked(item: &InventoryItem) -> DbResult<InventoryItem> {
    validate_name("name", &item.name)?;
    validate_price_cents(item.unit_price_cents)?;

    let mut item = item.clone();
    item.name = item.name.trim().to_string();
    item.sku = match item.sku.as_deref().map(str::trim) {
        Some("") | None => None,
        Some(sku) => {
            validate_code("sku", sku)?;
            Some(sku.to_string())
        }
    };

    if item.min_stock_level.is_negative() || item.reorder_level.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "stock_level".to_string(),
        }
        .into());
    }

    Ok(item)
}

fn duplicate_sku(err: sqlx::Error, sku: Option<&str>) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { .. } => DbError::duplicate("sku", sku.unwrap_or_default()),
        other => other,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{date, item, test_db};
    use backoffice_core::stock::{NewStockTransaction, TransactionKind};
    use backoffice_core::Quantity;

    #[tokio::test]
    async fn test_insert_ignores_stock_input() {
        let db = test_db().await;
        let repo = db.inventory();

        let mut input = item("Steel Rod", None);
        input.stock_quantity = Some(Quantity::from_whole(99));

        let created = repo.insert(&input).await.unwrap();
        assert_eq!(created.stock_quantity, None);

        let fetched = repo.get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.stock_quantity, None);
        assert_eq!(fetched.stock(), Quantity::zero());
    }

    #[tokio::test]
    async fn test_update_never_writes_stock() {
        let db = test_db().await;
        let repo = db.inventory();

        let created = repo.insert(&item("Steel Rod", None)).await.unwrap();
        sqlx::query("UPDATE inventory_items SET stock_quantity = 50000 WHERE id = ?1")
            .bind(&created.id)
            .execute(db.pool())
            .await
            .unwrap();

        let mut edited = created.clone();
        edited.name = "Steel Rod 12mm".to_string();
        edited.stock_quantity = Some(Quantity::zero());

        let updated = repo.update(&edited).await.unwrap();
        assert_eq!(updated.name, "Steel Rod 12mm");
        assert_eq!(updated.stock_quantity, Some(Quantity::from_whole(5)));
    }

    #[tokio::test]
    async fn test_base_unit_fixed_once_stock_moves() {
        let db = test_db().await;
        db.units().seed_standard_units().await.unwrap();
        let kg = db.units().get_by_code("kg").await.unwrap().unwrap();
        let g = db.units().get_by_code("g").await.unwrap().unwrap();
        let repo = db.inventory();

        // no movements yet: the base unit is still free to change
        let mut rod = repo.insert(&item("Steel Rod", Some(&kg.id))).await.unwrap();
        rod.base_unit_id = Some(g.id.clone());
        let rod = repo.update(&rod).await.unwrap();
        assert_eq!(rod.base_unit_id.as_deref(), Some(g.id.as_str()));

        let receipt = db
            .stock()
            .record(&NewStockTransaction {
                item_id: rod.id.clone(),
                kind: TransactionKind::Receipt,
                quantity: Quantity::from_whole(500),
                unit_id: Some(g.id.clone()),
                batch_id: None,
                location_id: None,
                project: None,
                transaction_date: date(2024, 4, 1),
                reference_number: None,
                notes: None,
            })
            .await
            .unwrap();

        let mut rebased = rod.clone();
        rebased.base_unit_id = Some(kg.id.clone());
        rebased.name = "Steel Rod 12mm".to_string();
        let err = repo.update(&rebased).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::BaseUnitInUse(ref id)) if id == &rod.id));

        let stored = repo.get_by_id(&rod.id).await.unwrap().unwrap();
        assert_eq!(stored.base_unit_id.as_deref(), Some(g.id.as_str()));
        assert_eq!(stored.name, "Steel Rod");
        assert_eq!(stored.stock_quantity, Some(Quantity::from_whole(500)));

        // other fields still edit while the base unit stays put
        let mut renamed = stored.clone();
        renamed.name = "Steel Rod 12mm".to_string();
        assert_eq!(repo.update(&renamed).await.unwrap().name, "Steel Rod 12mm");

        // once every movement is reversed the base unit is free again
        db.stock().delete(&receipt.transaction.id).await.unwrap();
        let rebased = repo.update(&rebased).await.unwrap();
        assert_eq!(rebased.base_unit_id.as_deref(), Some(kg.id.as_str()));
    }

    #[tokio::test]
    async fn test_update_unknown_item_is_not_found() {
        let db = test_db().await;
        let err = db.inventory().update(&item("Ghost", None)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_sku() {
        let db = test_db().await;
        let repo = db.inventory();

        let mut a = item("A", None);
        a.sku = Some("ROD-12".to_string());
        let mut b = item("B", None);
        b.sku = Some("ROD-12".to_string());

        repo.insert(&a).await.unwrap();
        let err = repo.insert(&b).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "sku"));
        assert!(repo.get_by_sku("ROD-12").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_search_escapes_wildcards() {
        let db = test_db().await;
        let repo = db.inventory();

        repo.insert(&item("Paint 100%", None)).await.unwrap();
        repo.insert(&item("Paint 1000", None)).await.unwrap();

        let found = repo.search("100%", 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Paint 100%");

        assert_eq!(repo.search("paint", 10).await.unwrap().len(), 2);
        assert_eq!(repo.search("  ", 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_low_stock_counts_null_as_zero() {
        let db = test_db().await;
        let repo = db.inventory();

        let mut watched = item("Bolts", None);
        watched.reorder_level = Quantity::from_whole(10);
        repo.insert(&watched).await.unwrap();

        let mut stocked = item("Nuts", None);
        stocked.reorder_level = Quantity::from_whole(10);
        let stocked = repo.insert(&stocked).await.unwrap();
        sqlx::query("UPDATE inventory_items SET stock_quantity = 200000 WHERE id = ?1")
            .bind(&stocked.id)
            .execute(db.pool())
            .await
            .unwrap();

        let low = repo.low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].name, "Bolts");
    }

    #[tokio::test]
    async fn test_soft_delete_hides_item() {
        let db = test_db().await;
        let repo = db.inventory();

        let created = repo.insert(&item("Washer", None)).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);

        repo.soft_delete(&created.id).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 0);
        assert!(!repo.get_by_id(&created.id).await.unwrap().unwrap().is_active);

        assert!(repo.soft_delete("missing").await.unwrap_err().is_not_found());
    }
}
