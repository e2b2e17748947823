//! # Invoice Repository
//!
//! Invoices are the debit side of the company ledger. Every write here
//! also writes the mirrored ledger entry in the same SQL transaction.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use backoffice_core::ledger::Invoice;
use backoffice_core::validation::{validate_document_number, validate_ledger_amount};

use super::ledger::{delete_invoice_entry, project_invoice_entry};
use crate::error::{DbError, DbResult};

const SELECT_INVOICES: &str = r#"
    SELECT id, company_id, invoice_number, invoice_date, description, amount_cents,
           reference, created_at, updated_at
    FROM invoices
"#;

/// Repository for invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!("{} WHERE id = ?1", SELECT_INVOICES))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(invoice)
    }

    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<Invoice>> {
        let invoice =
            sqlx::query_as::<_, Invoice>(&format!("{} WHERE invoice_number = ?1", SELECT_INVOICES))
                .bind(number.trim())
                .fetch_optional(&self.pool)
                .await?;

        Ok(invoice)
    }

    /// A company's invoices, oldest first.
    pub async fn list_for_company(&self, company_id: &str) -> DbResult<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "{} WHERE company_id = ?1 ORDER BY invoice_date, created_at",
            SELECT_INVOICES
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    /// Creates an invoice and its debit entry.
    pub async fn create(&self, invoice: &Invoice) -> DbResult<Invoice> {
        debug!(number = %invoice.invoice_number, company_id = %invoice.company_id, "Creating invoice");

        let invoice = checked(invoice)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, company_id, invoice_number, invoice_date, description, amount_cents,
                reference, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.company_id)
        .bind(&invoice.invoice_number)
        .bind(invoice.invoice_date)
        .bind(&invoice.description)
        .bind(invoice.amount_cents)
        .bind(&invoice.reference)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| duplicate_number(e, &invoice.invoice_number))?;

        let entry = project_invoice_entry(&mut *tx, &invoice).await?;
        tx.commit().await?;

        info!(
            id = %invoice.id,
            entry_id = %entry.id,
            amount = %invoice.amount(),
            "Invoice created"
        );
        Ok(invoice)
    }

    /// Updates an invoice and refreshes its entry (recreating it if it
    /// went missing).
    pub async fn update(&self, invoice: &Invoice) -> DbResult<Invoice> {
        debug!(id = %invoice.id, "Updating invoice");

        let mut invoice = checked(invoice)?;
        invoice.updated_at = Utc::now();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE invoices SET
                company_id = ?2,
                invoice_number = ?3,
                invoice_date = ?4,
                description = ?5,
                amount_cents = ?6,
                reference = ?7,
                updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.company_id)
        .bind(&invoice.invoice_number)
        .bind(invoice.invoice_date)
        .bind(&invoice.description)
        .bind(invoice.amount_cents)
        .bind(&invoice.reference)
        .bind(invoice.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| duplicate_number(e, &invoice.invoice_number))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", &invoice.id));
        }

        project_invoice_entry(&mut *tx, &invoice).await?;
        tx.commit().await?;

        Ok(invoice)
    }

    /// Deletes an invoice and its entry.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting invoice");

        let mut tx = self.pool.begin().await?;

        let removed = delete_invoice_entry(&mut *tx, id).await?;
        if removed == 0 {
            warn!(id = %id, "Invoice had no ledger entry");
        }

        let result = sqlx::query("DELETE FROM invoices WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", id));
        }

        tx.commit().await?;
        Ok(())
    }
}

fn checked(invoice: &Invoice) -> DbResult<Invoice> {
    validate_document_number("invoice_number", &invoice.invoice_number)?;
    validate_ledger_amount(invoice.amount_cents)?;

    let mut invoice = invoice.clone();
    invoice.invoice_number = invoice.invoice_number.trim().to_string();
    Ok(invoice)
}

fn duplicate_number(err: sqlx::Error, number: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { .. } => DbError::duplicate("invoice_number", number),
        other => other,
    }
}
