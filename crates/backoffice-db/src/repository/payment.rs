//! # Payment Repository
//!
//! Payments are the credit side of the company ledger, projected the same
//! way invoices are.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use backoffice_core::ledger::Payment;
use backoffice_core::validation::{validate_document_number, validate_ledger_amount};

use super::ledger::{delete_payment_entry, project_payment_entry};
use crate::error::{DbError, DbResult};

const SELECT_PAYMENTS: &str = r#"
    SELECT id, company_id, payment_number, payment_date, description, amount_cents,
           payment_mode, reference, created_at, updated_at
    FROM payments
"#;

/// Repository for payment database operations.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!("{} WHERE id = ?1", SELECT_PAYMENTS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<Payment>> {
        let payment =
            sqlx::query_as::<_, Payment>(&format!("{} WHERE payment_number = ?1", SELECT_PAYMENTS))
                .bind(number.trim())
                .fetch_optional(&self.pool)
                .await?;

        Ok(payment)
    }

    pub async fn list_for_company(&self, company_id: &str) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "{} WHERE company_id = ?1 ORDER BY payment_date, created_at",
            SELECT_PAYMENTS
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Creates a payment and its credit entry.
    pub async fn create(&self, payment: &Payment) -> DbResult<Payment> {
        debug!(number = %payment.payment_number, company_id = %payment.company_id, "Creating payment");

        let payment = checked(payment)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, company_id, payment_number, payment_date, description, amount_cents,
                payment_mode, reference, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.company_id)
        .bind(&payment.payment_number)
        .bind(payment.payment_date)
        .bind(&payment.description)
        .bind(payment.amount_cents)
        .bind(payment.payment_mode)
        .bind(&payment.reference)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| duplicate_number(e, &payment.payment_number))?;

        let entry = project_payment_entry(&mut *tx, &payment).await?;
        tx.commit().await?;

        info!(
            id = %payment.id,
            entry_id = %entry.id,
            amount = %payment.amount(),
            mode = %payment.payment_mode,
            "Payment recorded"
        );
        Ok(payment)
    }

    /// Updates a payment and refreshes (or recreates) its entry.
    pub async fn update(&self, payment: &Payment) -> DbResult<Payment> {
        debug!(id = %payment.id, "Updating payment");

        let mut payment = checked(payment)?;
        payment.updated_at = Utc::now();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE payments SET
                company_id = ?2,
                payment_number = ?3,
                payment_date = ?4,
                description = ?5,
                amount_cents = ?6,
                payment_mode = ?7,
                reference = ?8,
                updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.company_id)
        .bind(&payment.payment_number)
        .bind(payment.payment_date)
        .bind(&payment.description)
        .bind(payment.amount_cents)
        .bind(payment.payment_mode)
        .bind(&payment.reference)
        .bind(payment.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| duplicate_number(e, &payment.payment_number))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Payment", &payment.id));
        }

        project_payment_entry(&mut *tx, &payment).await?;
        tx.commit().await?;

        Ok(payment)
    }

    /// Deletes a payment and its entry.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting payment");

        let mut tx = self.pool.begin().await?;
        delete_payment_entry(&mut *tx, id).await?;

        let result = sqlx::query("DELETE FROM payments WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Payment", id));
        }

        tx.commit().await?;
        Ok(())
    }
}

fn checked(payment: &Payment) -> DbResult<Payment> {
    validate_document_number("payment_number", &payment.payment_number)?;
    validate_ledger_amount(payment.amount_cents)?;

    let mut payment = payment.clone();
    payment.payment_number = payment.payment_number.trim().to_string();
    Ok(payment)
}

fn duplicate_number(err: sqlx::Error, number: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { .. } => DbError::duplicate("payment_number", number),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::new_id;
    use crate::repository::test_support::{company, date, test_db};
    use backoffice_core::ledger::{EntryType, PaymentMode};

    fn payment(company_id: &str, number: &str, cents: i64, mode: PaymentMode) -> Payment {
        let now = Utc::now();
        Payment {
            id: new_id(),
            company_id: company_id.to_string(),
            payment_number: number.to_string(),
            payment_date: date(2024, 6, 1),
            description: None,
            amount_cents: cents,
            payment_mode: mode,
            reference: Some("UTR 4471".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_projects_credit_entry() {
        let db = test_db().await;
        let acme = db.companies().insert(&company("Acme")).await.unwrap();

        db.payments()
            .create(&payment(&acme.id, "PAY-001", 5_000, PaymentMode::Cheque))
            .await
            .unwrap();

        let entries = db.ledger().entries_for_company(&acme.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_type, EntryType::Credit);
        assert_eq!(entries[0].payment_mode, Some(PaymentMode::Cheque));
        assert_eq!(entries[0].reference.as_deref(), Some("UTR 4471"));
    }

    #[tokio::test]
    async fn test_update_changes_mode_on_entry() {
        let db = test_db().await;
        let acme = db.companies().insert(&company("Acme")).await.unwrap();
        let repo = db.payments();

        let mut pay = repo
            .create(&payment(&acme.id, "PAY-001", 5_000, PaymentMode::Cash))
            .await
            .unwrap();
        pay.payment_mode = PaymentMode::BankTransfer;
        pay.amount_cents = 7_500;
        repo.update(&pay).await.unwrap();

        let stored = repo.get_by_number("PAY-001").await.unwrap().unwrap();
        assert_eq!(stored.payment_mode, PaymentMode::BankTransfer);

        let entries = db.ledger().entries_for_company(&acme.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].payment_mode, Some(PaymentMode::BankTransfer));
        assert_eq!(entries[0].amount_cents, 7_500);
    }

    #[tokio::test]
    async fn test_delete_and_missing() {
        let db = test_db().await;
        let acme = db.companies().insert(&company("Acme")).await.unwrap();
        let repo = db.payments();

        let pay = repo
            .create(&payment(&acme.id, "PAY-001", 5_000, PaymentMode::Upi))
            .await
            .unwrap();
        repo.delete(&pay.id).await.unwrap();

        assert!(db.ledger().entries_for_company(&acme.id).await.unwrap().is_empty());
        assert!(repo.list_for_company(&acme.id).await.unwrap().is_empty());
        assert!(repo.delete(&pay.id).await.unwrap_err().is_not_found());
        assert!(repo.update(&pay).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_amount_must_be_positive() {
        let db = test_db().await;
        let acme = db.companies().insert(&company("Acme")).await.unwrap();

        let err = db
            .payments()
            .create(&payment(&acme.id, "PAY-001", 0, PaymentMode::Cash))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(_)));
    }
}
