//! # Ledger Repository
//!
//! Read side of the company ledger (entries, statements, balances) plus
//! the projection helpers the invoice and payment repositories call inside
//! their own SQL transactions.
//!
//! ## Projection
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  InvoiceRepository::create(inv)          PaymentRepository::update(p)   │
//! │    BEGIN                                   BEGIN                        │
//! │    INSERT invoices                         UPDATE payments              │
//! │    project_invoice_entry(tx, inv) ──┐      project_payment_entry(tx, p) │
//! │    COMMIT                           │      COMMIT                       │
//! │                                     ▼                                   │
//! │        existing entry?  yes → UPDATE ledger_entries (same id)           │
//! │                         no  → INSERT ledger_entries                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! The entry is written by the same call that writes its source row, so a
//! failure on either side rolls both back.

use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use backoffice_core::ledger::{
    project_invoice, project_payment, CompanyBalance, CompanyStatement, Invoice, LedgerEntry,
    Payment, StatementPeriod,
};
use backoffice_core::{CoreError, Money};

use crate::error::DbResult;

const SELECT_ENTRIES: &str = r#"
    SELECT id, company_id, entry_type, transaction_number, transaction_date, description,
           amount_cents, reference, payment_mode, invoice_id, payment_id, created_at
    FROM ledger_entries
"#;

const SELECT_BALANCES: &str = r#"
    SELECT c.id AS company_id,
           c.name AS company_name,
           COALESCE((SELECT SUM(i.amount_cents) FROM invoices i WHERE i.company_id = c.id), 0)
               AS total_debit_cents,
           COALESCE((SELECT SUM(p.amount_cents) FROM payments p WHERE p.company_id = c.id), 0)
               AS total_credit_cents
    FROM companies c
"#;

#[derive(Debug, FromRow)]
struct BalanceRow {
    company_id: String,
    company_name: String,
    total_debit_cents: i64,
    total_credit_cents: i64,
}

impl From<BalanceRow> for CompanyBalance {
    fn from(row: BalanceRow) -> Self {
        CompanyBalance::new(
            row.company_id,
            row.company_name,
            Money::from_cents(row.total_debit_cents),
            Money::from_cents(row.total_credit_cents),
        )
    }
}

/// Repository for ledger reads.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// A company's entries ordered by (date, created_at).
    pub async fn entries_for_company(&self, company_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            "{} WHERE company_id = ?1 ORDER BY transaction_date, created_at",
            SELECT_ENTRIES
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Builds a company's statement over `period`.
    ///
    /// Entries dated before the period start feed the opening balance.
    pub async fn statement(
        &self,
        company_id: &str,
        period: StatementPeriod,
    ) -> DbResult<CompanyStatement> {
        debug!(company_id = %company_id, ?period, "Building statement");

        self.ensure_company(company_id).await?;

        let entries = match period.end {
            Some(end) => {
                sqlx::query_as::<_, LedgerEntry>(&format!(
                    "{} WHERE company_id = ?1 AND transaction_date <= ?2",
                    SELECT_ENTRIES
                ))
                .bind(company_id)
                .bind(end)
                .fetch_all(&self.pool)
                .await?
            }
            None => self.entries_for_company(company_id).await?,
        };

        Ok(CompanyStatement::build(company_id, entries, period))
    }

    /// Lifetime totals of one company, summed from its invoices and payments.
    pub async fn balance(&self, company_id: &str) -> DbResult<CompanyBalance> {
        let row = sqlx::query_as::<_, BalanceRow>(&format!("{} WHERE c.id = ?1", SELECT_BALANCES))
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CoreError::CompanyNotFound(company_id.to_string()))?;

        Ok(row.into())
    }

    /// Totals of every company ordered by name.
    pub async fn balances(&self) -> DbResult<Vec<CompanyBalance>> {
        let rows = sqlx::query_as::<_, BalanceRow>(&format!("{} ORDER BY c.name", SELECT_BALANCES))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(CompanyBalance::from).collect())
    }

    async fn ensure_company(&self, company_id: &str) -> DbResult<()> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM companies WHERE id = ?1")
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await?;

        match exists {
            Some(_) => Ok(()),
            None => Err(CoreError::CompanyNotFound(company_id.to_string()).into()),
        }
    }
}

// =============================================================================
// Projection helpers (run inside the caller's transaction)
// =============================================================================

/// Writes the ledger entry mirroring `invoice`, creating it if missing.
pub(crate) async fn project_invoice_entry(
    conn: &mut SqliteConnection,
    invoice: &Invoice,
) -> DbResult<LedgerEntry> {
    let existing = find_entry(conn, "invoice_id", &invoice.id).await?;
    let entry = project_invoice(invoice, existing.as_ref());
    save_entry(conn, &entry, existing.is_some()).await?;
    Ok(entry)
}

/// Writes the ledger entry mirroring `payment`, creating it if missing.
pub(crate) async fn project_payment_entry(
    conn: &mut SqliteConnection,
    payment: &Payment,
) -> DbResult<LedgerEntry> {
    let existing = find_entry(conn, "payment_id", &payment.id).await?;
    let entry = project_payment(payment, existing.as_ref());
    save_entry(conn, &entry, existing.is_some()).await?;
    Ok(entry)
}

pub(crate) async fn delete_invoice_entry(conn: &mut SqliteConnection, invoice_id: &str) -> DbResult<u64> {
    let result = sqlx::query("DELETE FROM ledger_entries WHERE invoice_id = ?1")
        .bind(invoice_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn delete_payment_entry(conn: &mut SqliteConnection, payment_id: &str) -> DbResult<u64> {
    let result = sqlx::query("DELETE FROM ledger_entries WHERE payment_id = ?1")
        .bind(payment_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// `column` is one of the two fixed source columns, never caller input.
async fn find_entry(
    conn: &mut SqliteConnection,
    column: &'static str,
    source_id: &str,
) -> DbResult<Option<LedgerEntry>> {
    let entry = sqlx::query_as::<_, LedgerEntry>(&format!("{} WHERE {} = ?1", SELECT_ENTRIES, column))
        .bind(source_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(entry)
}

async fn save_entry(conn: &mut SqliteConnection, entry: &LedgerEntry, exists: bool) -> DbResult<()> {
    if exists {
        debug!(id = %entry.id, number = %entry.transaction_number, "Refreshing ledger entry");
        sqlx::query(
            r#"
            UPDATE ledger_entries SET
                company_id = ?2,
                entry_type = ?3,
                transaction_number = ?4,
                transaction_date = ?5,
                description = ?6,
                amount_cents = ?7,
                reference = ?8,
                payment_mode = ?9
            WHERE id = ?1
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.company_id)
        .bind(entry.entry_type)
        .bind(&entry.transaction_number)
        .bind(entry.transaction_date)
        .bind(&entry.description)
        .bind(entry.amount_cents)
        .bind(&entry.reference)
        .bind(entry.payment_mode)
        .execute(&mut *conn)
        .await?;
    } else {
        debug!(id = %entry.id, number = %entry.transaction_number, "Creating ledger entry");
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                id, company_id, entry_type, transaction_number, transaction_date, description,
                amount_cents, reference, payment_mode, invoice_id, payment_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.company_id)
        .bind(entry.entry_type)
        .bind(&entry.transaction_number)
        .bind(entry.transaction_date)
        .bind(&entry.description)
        .bind(entry.amount_cents)
        .bind(&entry.reference)
        .bind(entry.payment_mode)
        .bind(&entry.invoice_id)
        .bind(&entry.payment_id)
        .bind(entry.created_at)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::new_id;
    use crate::repository::test_support::{company, date, test_db};
    use backoffice_core::ledger::PaymentMode;
    use chrono::{NaiveDate, Utc};

    fn invoice(company_id: &str, number: &str, on: NaiveDate, cents: i64) -> Invoice {
        let now = Utc::now();
        Invoice {
            id: new_id(),
            company_id: company_id.to_string(),
            invoice_number: number.to_string(),
            invoice_date: on,
            description: None,
            amount_cents: cents,
            reference: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn payment(company_id: &str, number: &str, on: NaiveDate, cents: i64) -> Payment {
        let now = Utc::now();
        Payment {
            id: new_id(),
            company_id: company_id.to_string(),
            payment_number: number.to_string(),
            payment_date: on,
            description: None,
            amount_cents: cents,
            payment_mode: PaymentMode::Upi,
            reference: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_statement_with_opening_balance() {
        let db = test_db().await;
        let acme = db.companies().insert(&company("Acme")).await.unwrap();

        db.invoices()
            .create(&invoice(&acme.id, "INV-1", date(2024, 1, 10), 100_000))
            .await
            .unwrap();
        db.payments()
            .create(&payment(&acme.id, "PAY-1", date(2024, 1, 20), 40_000))
            .await
            .unwrap();
        db.invoices()
            .create(&invoice(&acme.id, "INV-2", date(2024, 2, 5), 25_000))
            .await
            .unwrap();
        db.payments()
            .create(&payment(&acme.id, "PAY-2", date(2024, 3, 1), 10_000))
            .await
            .unwrap();

        let period = StatementPeriod::new(Some(date(2024, 2, 1)), Some(date(2024, 2, 29)));
        let statement = db.ledger().statement(&acme.id, period).await.unwrap();

        assert_eq!(statement.opening_balance_cents, 60_000);
        assert_eq!(statement.lines.len(), 1);
        assert_eq!(statement.lines[0].balance_cents, 85_000);
        assert_eq!(statement.total_debit_cents, 25_000);
        assert_eq!(statement.closing_balance_cents, 85_000);

        let full = db.ledger().statement(&acme.id, StatementPeriod::all()).await.unwrap();
        assert_eq!(full.lines.len(), 4);
        assert_eq!(full.outstanding_cents, 75_000);
    }

    #[tokio::test]
    async fn test_balances_match_sources() {
        let db = test_db().await;
        let acme = db.companies().insert(&company("Acme")).await.unwrap();
        let beta = db.companies().insert(&company("Beta")).await.unwrap();

        db.invoices()
            .create(&invoice(&acme.id, "INV-1", date(2024, 1, 10), 50_000))
            .await
            .unwrap();
        db.payments()
            .create(&payment(&acme.id, "PAY-1", date(2024, 1, 11), 20_000))
            .await
            .unwrap();

        let balance = db.ledger().balance(&acme.id).await.unwrap();
        assert_eq!(balance.total_debit_cents, 50_000);
        assert_eq!(balance.total_credit_cents, 20_000);
        assert_eq!(balance.outstanding_cents, 30_000);

        let all = db.ledger().balances().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].company_id, beta.id);
        assert_eq!(all[1].outstanding_cents, 0);
    }

    #[tokio::test]
    async fn test_unknown_company() {
        let db = test_db().await;

        let err = db.ledger().balance("missing").await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::CompanyNotFound(_))));

        let err = db
            .ledger()
            .statement("missing", StatementPeriod::all())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::CompanyNotFound(_))));
    }
}
