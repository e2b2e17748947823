//! # Location Repository
//!
//! Storage locations and item batches.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use backoffice_core::types::{Batch, Location};
use backoffice_core::validation::{validate_code, validate_document_number, validate_name};
use backoffice_core::ValidationError;

use crate::error::{DbError, DbResult};

const SELECT_LOCATIONS: &str = r#"
    SELECT id, name, code, description, parent_id, is_active, created_at, updated_at
    FROM locations
"#;

const SELECT_BATCHES: &str = r#"
    SELECT id, item_id, batch_number, manufacturing_date, expiry_date, notes, created_at, updated_at
    FROM batches
"#;

/// Repository for locations and batches.
#[derive(Debug, Clone)]
pub struct LocationRepository {
    pool: SqlitePool,
}

impl LocationRepository {
    /// Creates a new LocationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LocationRepository { pool }
    }

    // =========================================================================
    // Locations
    // =========================================================================

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Location>> {
        let location = sqlx::query_as::<_, Location>(&format!("{} WHERE id = ?1", SELECT_LOCATIONS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(location)
    }

    /// Active locations ordered by name.
    pub async fn list(&self) -> DbResult<Vec<Location>> {
        let locations =
            sqlx::query_as::<_, Location>(&format!("{} WHERE is_active = 1 ORDER BY name", SELECT_LOCATIONS))
                .fetch_all(&self.pool)
                .await?;

        Ok(locations)
    }

    /// Direct children of a location.
    pub async fn children(&self, parent_id: &str) -> DbResult<Vec<Location>> {
        let locations = sqlx::query_as::<_, Location>(&format!(
            "{} WHERE parent_id = ?1 ORDER BY name",
            SELECT_LOCATIONS
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(locations)
    }

    pub async fn insert(&self, location: &Location) -> DbResult<Location> {
        debug!(id = %location.id, name = %location.name, "Inserting location");

        let location = checked_location(location)?;

        sqlx::query(
            r#"
            INSERT INTO locations (
                id, name, code, description, parent_id, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&location.id)
        .bind(&location.name)
        .bind(&location.code)
        .bind(&location.description)
        .bind(&location.parent_id)
        .bind(location.is_active)
        .bind(location.created_at)
        .bind(location.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(location)
    }

    pub async fn update(&self, location: &Location) -> DbResult<Location> {
        debug!(id = %location.id, "Updating location");

        let mut location = checked_location(location)?;
        if location.parent_id.as_deref() == Some(location.id.as_str()) {
            return Err(ValidationError::InvalidFormat {
                field: "parent_id".to_string(),
                reason: "a location cannot be its own parent".to_string(),
            }
            .into());
        }
        location.updated_at = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE locations SET
                name = ?2, code = ?3, description = ?4, parent_id = ?5, is_active = ?6, updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(&location.id)
        .bind(&location.name)
        .bind(&location.code)
        .bind(&location.description)
        .bind(&location.parent_id)
        .bind(location.is_active)
        .bind(location.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Location", &location.id));
        }

        Ok(location)
    }

    /// Deletes a location. Children, movements and items lose the link.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM locations WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Location", id));
        }

        Ok(())
    }

    // =========================================================================
    // Batches
    // =========================================================================

    pub async fn get_batch(&self, id: &str) -> DbResult<Option<Batch>> {
        let batch = sqlx::query_as::<_, Batch>(&format!("{} WHERE id = ?1", SELECT_BATCHES))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(batch)
    }

    /// Batches of an item, soonest expiry first (undated last).
    pub async fn batches_for_item(&self, item_id: &str) -> DbResult<Vec<Batch>> {
        let batches = sqlx::query_as::<_, Batch>(&format!(
            "{} WHERE item_id = ?1 ORDER BY expiry_date IS NULL, expiry_date, batch_number",
            SELECT_BATCHES
        ))
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(batches)
    }

    /// Inserts a batch; numbers are unique per item.
    pub async fn insert_batch(&self, batch: &Batch) -> DbResult<Batch> {
        debug!(item_id = %batch.item_id, batch_number = %batch.batch_number, "Inserting batch");

        validate_document_number("batch_number", &batch.batch_number)?;
        if let (Some(made), Some(expires)) = (batch.manufacturing_date, batch.expiry_date) {
            if expires < made {
                return Err(ValidationError::InvalidFormat {
                    field: "expiry_date".to_string(),
                    reason: "must not be before the manufacturing date".to_string(),
                }
                .into());
            }
        }

        let mut batch = batch.clone();
        batch.batch_number = batch.batch_number.trim().to_string();

        sqlx::query(
            r#"
            INSERT INTO batches (
                id, item_id, batch_number, manufacturing_date, expiry_date, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&batch.id)
        .bind(&batch.item_id)
        .bind(&batch.batch_number)
        .bind(batch.manufacturing_date)
        .bind(batch.expiry_date)
        .bind(&batch.notes)
        .bind(batch.created_at)
        .bind(batch.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("batch_number", &batch.batch_number),
            other => other,
        })?;

        Ok(batch)
    }

    pub async fn delete_batch(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM batches WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Batch", id));
        }

        Ok(())
    }
}

fn checked_location(location: &Location) -> DbResult<Location> {
    validate_name("name", &location.name)?;

    let mut location = location.clone();
    location.name = location.name.trim().to_string();
    location.code = match location.code.as_deref().map(str::trim) {
        Some("") | None => None,
        Some(code) => {
            validate_code("code", code)?;
            Some(code.to_string())
        }
    };

    Ok(location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::new_id;
    use crate::repository::test_support::{date, item, test_db};
    use chrono::NaiveDate;

    fn location(name: &str, parent: Option<&str>) -> Location {
        let now = Utc::now();
        Location {
            id: new_id(),
            name: name.to_string(),
            code: None,
            description: None,
            parent_id: parent.map(str::to_string),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn batch(item_id: &str, number: &str, expiry: Option<NaiveDate>) -> Batch {
        let now = Utc::now();
        Batch {
            id: new_id(),
            item_id: item_id.to_string(),
            batch_number: number.to_string(),
            manufacturing_date: Some(date(2024, 1, 1)),
            expiry_date: expiry,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_location_tree() {
        let db = test_db().await;
        let repo = db.locations();

        let warehouse = repo.insert(&location("Warehouse", None)).await.unwrap();
        repo.insert(&location("Rack A", Some(&warehouse.id))).await.unwrap();
        repo.insert(&location("Rack B", Some(&warehouse.id))).await.unwrap();

        let children = repo.children(&warehouse.id).await.unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name, "Rack A");

        repo.delete(&warehouse.id).await.unwrap();
        assert!(repo.children(&warehouse.id).await.unwrap().is_empty());
        assert_eq!(repo.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_location_cannot_parent_itself() {
        let db = test_db().await;
        let repo = db.locations();

        let mut yard = repo.insert(&location("Yard", None)).await.unwrap();
        yard.parent_id = Some(yard.id.clone());
        assert!(matches!(
            repo.update(&yard).await.unwrap_err(),
            DbError::Core(_)
        ));
    }

    #[tokio::test]
    async fn test_batches_per_item() {
        let db = test_db().await;
        let repo = db.locations();
        let resin = db.inventory().insert(&item("Resin", None)).await.unwrap();

        repo.insert_batch(&batch(&resin.id, "B-2", None)).await.unwrap();
        repo.insert_batch(&batch(&resin.id, "B-1", Some(date(2025, 6, 1))))
            .await
            .unwrap();

        let err = repo.insert_batch(&batch(&resin.id, "B-1", None)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        let batches = repo.batches_for_item(&resin.id).await.unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].batch_number, "B-1");
        assert!(batches[0].is_expired(date(2025, 6, 2)));
    }

    #[tokio::test]
    async fn test_batch_expiry_before_manufacture_rejected() {
        let db = test_db().await;
        let resin = db.inventory().insert(&item("Resin", None)).await.unwrap();

        let err = db
            .locations()
            .insert_batch(&batch(&resin.id, "B-9", Some(date(2023, 12, 31))))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(_)));
    }
}
