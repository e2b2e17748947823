//! # Tax Repository
//!
//! Named tax rates for quotations. At most one tax is flagged as the
//! default; setting a new default clears the old one in the same
//! transaction.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use backoffice_core::types::Tax;
use backoffice_core::validation::{validate_name, validate_tax_rate_bps};

use crate::error::{DbError, DbResult};

const SELECT_TAXES: &str = r#"
    SELECT id, name, rate_bps, description, is_active, is_default, created_at, updated_at
    FROM taxes
"#;

/// Repository for tax database operations.
#[derive(Debug, Clone)]
pub struct TaxRepository {
    pool: SqlitePool,
}

impl TaxRepository {
    /// Creates a new TaxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TaxRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Tax>> {
        let tax = sqlx::query_as::<_, Tax>(&format!("{} WHERE id = ?1", SELECT_TAXES))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(tax)
    }

    /// Active taxes, default first.
    pub async fn list_active(&self) -> DbResult<Vec<Tax>> {
        let taxes = sqlx::query_as::<_, Tax>(&format!(
            "{} WHERE is_active = 1 ORDER BY is_default DESC, name",
            SELECT_TAXES
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(taxes)
    }

    pub async fn get_default(&self) -> DbResult<Option<Tax>> {
        let tax = sqlx::query_as::<_, Tax>(&format!("{} WHERE is_default = 1", SELECT_TAXES))
            .fetch_optional(&self.pool)
            .await?;

        Ok(tax)
    }

    /// Inserts a tax. A default tax replaces the previous default.
    pub async fn insert(&self, tax: &Tax) -> DbResult<Tax> {
        debug!(id = %tax.id, name = %tax.name, rate_bps = tax.rate_bps, "Inserting tax");

        let tax = checked(tax)?;
        let mut tx = self.pool.begin().await?;

        if tax.is_default {
            clear_default(&mut *tx).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO taxes (
                id, name, rate_bps, description, is_active, is_default, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&tax.id)
        .bind(&tax.name)
        .bind(tax.rate_bps)
        .bind(&tax.description)
        .bind(tax.is_active)
        .bind(tax.is_default)
        .bind(tax.created_at)
        .bind(tax.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| duplicate_name(e, &tax.name))?;

        tx.commit().await?;
        Ok(tax)
    }

    pub async fn update(&self, tax: &Tax) -> DbResult<Tax> {
        debug!(id = %tax.id, "Updating tax");

        let mut tax = checked(tax)?;
        tax.updated_at = Utc::now();

        let mut tx = self.pool.begin().await?;

        if tax.is_default {
            clear_default(&mut *tx).await?;
        }

        let result = sqlx::query(
            r#"
            UPDATE taxes SET
                name = ?2, rate_bps = ?3, description = ?4, is_active = ?5, is_default = ?6, updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(&tax.id)
        .bind(&tax.name)
        .bind(tax.rate_bps)
        .bind(&tax.description)
        .bind(tax.is_active)
        .bind(tax.is_default)
        .bind(tax.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| duplicate_name(e, &tax.name))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tax", &tax.id));
        }

        tx.commit().await?;
        Ok(tax)
    }

    /// Makes `id` the only default tax.
    pub async fn set_default(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        clear_default(&mut *tx).await?;

        let result = sqlx::query("UPDATE taxes SET is_default = 1, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tax", id));
        }

        tx.commit().await?;
        info!(id = %id, "Default tax changed");
        Ok(())
    }

    /// Deletes a tax. Quotations using it keep their cached totals.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM taxes WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tax", id));
        }

        Ok(())
    }
}

async fn clear_default(conn: &mut SqliteConnection) -> DbResult<()> {
    sqlx::query("UPDATE taxes SET is_default = 0 WHERE is_default = 1")
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn checked(tax: &Tax) -> DbResult<Tax> {
    validate_name("name", &tax.name)?;
    validate_tax_rate_bps(tax.rate_bps)?;

    let mut tax = tax.clone();
    tax.name = tax.name.trim().to_string();
    Ok(tax)
}

fn duplicate_name(err: sqlx::Error, name: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { .. } => DbError::duplicate("name", name),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::new_id;
    use crate::repository::test_support::test_db;
    use backoffice_core::types::TaxRate;

    fn tax(name: &str, bps: u32, is_default: bool) -> Tax {
        let now = Utc::now();
        Tax {
            id: new_id(),
            name: name.to_string(),
            rate_bps: bps,
            description: None,
            is_active: true,
            is_default,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_single_default() {
        let db = test_db().await;
        let repo = db.taxes();

        let gst18 = repo.insert(&tax("GST 18%", 1800, true)).await.unwrap();
        let gst12 = repo.insert(&tax("GST 12%", 1200, true)).await.unwrap();

        let default = repo.get_default().await.unwrap().unwrap();
        assert_eq!(default.id, gst12.id);
        assert_eq!(default.rate(), TaxRate::from_bps(1200));

        repo.set_default(&gst18.id).await.unwrap();
        assert_eq!(repo.get_default().await.unwrap().unwrap().id, gst18.id);

        let active = repo.list_active().await.unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].id, gst18.id);
    }

    #[tokio::test]
    async fn test_rate_bounds_and_duplicates() {
        let db = test_db().await;
        let repo = db.taxes();

        assert!(repo.insert(&tax("Bogus", 10_001, false)).await.is_err());

        repo.insert(&tax("Exempt", 0, false)).await.unwrap();
        let err = repo.insert(&tax("Exempt", 500, false)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_missing_tax() {
        let db = test_db().await;
        let repo = db.taxes();

        assert!(repo.set_default("missing").await.unwrap_err().is_not_found());
        assert!(repo.update(&tax("Ghost", 100, false)).await.unwrap_err().is_not_found());
        assert!(repo.delete("missing").await.unwrap_err().is_not_found());
    }
}
