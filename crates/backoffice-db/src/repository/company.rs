//! # Company Repository
//!
//! Customer accounts. Deleting a company cascades to its invoices,
//! payments, ledger entries and quotations.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use backoffice_core::ledger::Company;
use backoffice_core::validation::{validate_email, validate_gstin, validate_name, validate_search_query};

use super::like_pattern;
use crate::error::{DbError, DbResult};

const SELECT_COMPANIES: &str = r#"
    SELECT id, name, email, phone, address, contact_person, gstin, created_at, updated_at
    FROM companies
"#;

/// Repository for company database operations.
#[derive(Debug, Clone)]
pub struct CompanyRepository {
    pool: SqlitePool,
}

impl CompanyRepository {
    /// Creates a new CompanyRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CompanyRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Company>> {
        let company = sqlx::query_as::<_, Company>(&format!("{} WHERE id = ?1", SELECT_COMPANIES))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(company)
    }

    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Company>> {
        let company = sqlx::query_as::<_, Company>(&format!("{} WHERE name = ?1", SELECT_COMPANIES))
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(company)
    }

    /// All companies ordered by name.
    pub async fn list(&self) -> DbResult<Vec<Company>> {
        let companies = sqlx::query_as::<_, Company>(&format!("{} ORDER BY name", SELECT_COMPANIES))
            .fetch_all(&self.pool)
            .await?;

        Ok(companies)
    }

    /// Searches by name, contact person or GSTIN.
    pub async fn search(&self, query: &str, limit: i64) -> DbResult<Vec<Company>> {
        let query = validate_search_query(query)?;
        let pattern = like_pattern(&query);

        let companies = sqlx::query_as::<_, Company>(&format!(
            r#"{}
            WHERE name LIKE ?1 ESCAPE '\' OR contact_person LIKE ?1 ESCAPE '\' OR gstin LIKE ?1 ESCAPE '\'
            ORDER BY name
            LIMIT ?2"#,
            SELECT_COMPANIES
        ))
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(companies)
    }

    pub async fn insert(&self, company: &Company) -> DbResult<Company> {
        debug!(id = %company.id, name = %company.name, "Inserting company");

        let company = checked(company)?;

        sqlx::query(
            r#"
            INSERT INTO companies (
                id, name, email, phone, address, contact_person, gstin, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&company.id)
        .bind(&company.name)
        .bind(&company.email)
        .bind(&company.phone)
        .bind(&company.address)
        .bind(&company.contact_person)
        .bind(&company.gstin)
        .bind(company.created_at)
        .bind(company.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_name(e, &company.name))?;

        Ok(company)
    }

    pub async fn update(&self, company: &Company) -> DbResult<Company> {
        debug!(id = %company.id, "Updating company");

        let mut company = checked(company)?;
        company.updated_at = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE companies SET
                name = ?2, email = ?3, phone = ?4, address = ?5,
                contact_person = ?6, gstin = ?7, updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(&company.id)
        .bind(&company.name)
        .bind(&company.email)
        .bind(&company.phone)
        .bind(&company.address)
        .bind(&company.contact_person)
        .bind(&company.gstin)
        .bind(company.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_name(e, &company.name))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Company", &company.id));
        }

        Ok(company)
    }

    /// Deletes a company together with its documents and ledger.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM companies WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Company", id));
        }

        info!(id = %id, "Company deleted");
        Ok(())
    }
}

fn checked(company: &Company) -> DbResult<Company> {
    validate_name("name", &company.name)?;

    let mut company = company.clone();
    company.name = company.name.trim().to_string();
    company.email = non_blank(company.email);
    company.gstin = non_blank(company.gstin).map(|g| g.to_ascii_uppercase());

    if let Some(email) = company.email.as_deref() {
        validate_email(email)?;
    }
    if let Some(gstin) = company.gstin.as_deref() {
        validate_gstin(gstin)?;
    }

    Ok(company)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn duplicate_name(err: sqlx::Error, name: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { .. } => DbError::duplicate("name", name),
        other => other,
    }
}
