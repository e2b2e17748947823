//! # Quotation Repository
//!
//! Quotations and their lines.
//!
//! ## Totals
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add_item / update_item / remove_item / update_header                   │
//! │    BEGIN                                                                │
//! │    write the line (phase 1: QuotationItem::compute_subtotal)            │
//! │    recalculate(tx, quotation_id)                                        │
//! │      ├── load lines + tax rate + discount                               │
//! │      ├── QuotationTotals::calculate        (phase 2)                    │
//! │      └── UPDATE quotations SET subtotal/tax/discount/total              │
//! │    COMMIT                                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Totals are never recomputed as a side effect of saving a line; every
//! caller above invokes the recalculation step by name.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use backoffice_core::quotation::{
    quotation_number, quotation_number_prefix, DiscountType, NewQuotation,
    NewQuotationItem, Quotation, QuotationItem, QuotationStatus, QuotationTotals,
};
use backoffice_core::types::TaxRate;

use super::{new_id, parse_decimal};
use crate::error::{DbError, DbResult};

/// Attempts at claiming a quotation number before giving up.
const NUMBER_ATTEMPTS: usize = 5;

const QUOTATION_COLUMNS: &str = r#"
    id, quotation_number, company_id, quotation_date, valid_until, tax_id, discount_type,
    discount_value, subtotal_cents, tax_cents, discount_cents, total_cents, status, notes,
    terms_conditions, created_at, updated_at
"#;

const SELECT_ITEMS: &str = r#"
    SELECT id, quotation_id, item_id, name, description, quantity, unit_price_cents, unit_label,
           machine_cost_cents, subtotal_cents, position, created_at
    FROM quotation_items
"#;

#[derive(Debug, sqlx::FromRow)]
struct QuotationRow {
    id: String,
    quotation_number: String,
    company_id: String,
    quotation_date: NaiveDate,
    valid_until: Option<NaiveDate>,
    tax_id: Option<String>,
    discount_type: DiscountType,
    discount_value: String,
    subtotal_cents: i64,
    tax_cents: i64,
    discount_cents: i64,
    total_cents: i64,
    status: QuotationStatus,
    notes: Option<String>,
    terms_conditions: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<QuotationRow> for Quotation {
    type Error = DbError;

    fn try_from(row: QuotationRow) -> DbResult<Self> {
        Ok(Quotation {
            discount_value: parse_decimal("quotations.discount_value", &row.discount_value)?,
            id: row.id,
            quotation_number: row.quotation_number,
            company_id: row.company_id,
            quotation_date: row.quotation_date,
            valid_until: row.valid_until,
            tax_id: row.tax_id,
            discount_type: row.discount_type,
            subtotal_cents: row.subtotal_cents,
            tax_cents: row.tax_cents,
            discount_cents: row.discount_cents,
            total_cents: row.total_cents,
            status: row.status,
            notes: row.notes,
            terms_conditions: row.terms_conditions,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for quotations and quotation lines.
///
/// ## Usage
/// ```rust,ignore
/// let quote = db.quotations().create(&new_quote).await?;   // QT-20240309-0001
/// db.quotations().add_item(&quote.id, line).await?;
/// let quote = db.quotations().get_by_id(&quote.id).await?; // totals refreshed
/// ```
#[derive(Debug, Clone)]
pub struct QuotationRepository {
    pool: SqlitePool,
}

impl QuotationRepository {
    /// Creates a new QuotationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        QuotationRepository { pool }
    }

    // =========================================================================
    // Quotations
    // =========================================================================

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Quotation>> {
        let row = sqlx::query_as::<_, QuotationRow>(&format!(
            "SELECT {} FROM quotations WHERE id = ?1",
            QUOTATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Quotation::try_from).transpose()
    }

    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<Quotation>> {
        let row = sqlx::query_as::<_, QuotationRow>(&format!(
            "SELECT {} FROM quotations WHERE quotation_number = ?1",
            QUOTATION_COLUMNS
        ))
        .bind(number.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Quotation::try_from).transpose()
    }

    /// A company's quotations, newest first.
    pub async fn list_for_company(&self, company_id: &str) -> DbResult<Vec<Quotation>> {
        let rows = sqlx::query_as::<_, QuotationRow>(&format!(
            "SELECT {} FROM quotations WHERE company_id = ?1 ORDER BY quotation_date DESC, quotation_number DESC",
            QUOTATION_COLUMNS
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Quotation::try_from).collect()
    }

    /// Creates an empty draft with the next number of its date.
    ///
    /// Two callers racing for the same number both compute it, one INSERT
    /// wins and the other retries with the following sequence.
    pub async fn create(&self, input: &NewQuotation) -> DbResult<Quotation> {
        input.validate()?;

        let now = Utc::now();
        let mut quotation = Quotation {
            id: new_id(),
            quotation_number: String::new(),
            company_id: input.company_id.clone(),
            quotation_date: input.quotation_date,
            valid_until: input.valid_until,
            tax_id: input.tax_id.clone(),
            discount_type: input.discount_type,
            discount_value: input.discount_value,
            subtotal_cents: 0,
            tax_cents: 0,
            discount_cents: 0,
            total_cents: 0,
            status: QuotationStatus::Draft,
            notes: input.notes.clone(),
            terms_conditions: input.terms_conditions.clone(),
            created_at: now,
            updated_at: now,
        };

        for attempt in 1..=NUMBER_ATTEMPTS {
            let sequence = self.next_sequence(input.quotation_date).await?;
            quotation.quotation_number = quotation_number(input.quotation_date, sequence);

            match self.insert(&quotation).await {
                Ok(()) => {
                    info!(
                        id = %quotation.id,
                        number = %quotation.quotation_number,
                        "Quotation created"
                    );
                    return Ok(quotation);
                }
                Err(DbError::UniqueViolation { .. }) if attempt < NUMBER_ATTEMPTS => {
                    debug!(number = %quotation.quotation_number, attempt, "Quotation number taken, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(DbError::duplicate("quotation_number", &quotation.quotation_number))
    }

    /// Updates header fields and recalculates totals.
    ///
    /// Number, status and cached totals in `quotation` are ignored.
    pub async fn update_header(&self, quotation: &Quotation) -> DbResult<Quotation> {
        debug!(id = %quotation.id, "Updating quotation header");

        quotation.validate_header()?;

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE quotations SET
                quotation_date = ?2,
                valid_until = ?3,
                tax_id = ?4,
                discount_type = ?5,
                discount_value = ?6,
                notes = ?7,
                terms_conditions = ?8,
                updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(&quotation.id)
        .bind(quotation.quotation_date)
        .bind(quotation.valid_until)
        .bind(&quotation.tax_id)
        .bind(quotation.discount_type)
        .bind(quotation.discount_value.to_string())
        .bind(&quotation.notes)
        .bind(&quotation.terms_conditions)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Quotation", &quotation.id));
        }

        let updated = recalculate(&mut *tx, &quotation.id).await?;
        tx.commit().await?;
        Ok(updated)
    }

    pub async fn update_status(&self, id: &str, status: QuotationStatus) -> DbResult<()> {
        debug!(id = %id, status = %status, "Updating quotation status");

        let result = sqlx::query("UPDATE quotations SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Quotation", id));
        }

        Ok(())
    }

    /// Marks draft and sent quotations valid until before `today` as expired.
    pub async fn expire_past_validity(&self, today: NaiveDate) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE quotations SET status = 'expired', updated_at = ?2
            WHERE status IN ('draft', 'sent')
              AND valid_until IS NOT NULL
              AND valid_until < ?1
            "#,
        )
        .bind(today)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(count = result.rows_affected(), "Quotations expired");
        }

        Ok(result.rows_affected())
    }

    /// Deletes a quotation and its lines.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM quotations WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Quotation", id));
        }

        Ok(())
    }

    /// Recomputes and stores the cached totals of a quotation.
    pub async fn recalculate_totals(&self, id: &str) -> DbResult<Quotation> {
        let mut tx = self.pool.begin().await?;
        let quotation = recalculate(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(quotation)
    }

    // =========================================================================
    // Lines
    // =========================================================================

    /// Lines of a quotation in display order.
    pub async fn items(&self, quotation_id: &str) -> DbResult<Vec<QuotationItem>> {
        let mut conn = self.pool.acquire().await?;
        load_items(&mut *conn, quotation_id).await
    }

    /// Appends a line and recalculates the quotation totals.
    pub async fn add_item(
        &self,
        quotation_id: &str,
        input: NewQuotationItem,
    ) -> DbResult<QuotationItem> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query("UPDATE quotations SET updated_at = ?2 WHERE id = ?1")
            .bind(quotation_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        if touched.rows_affected() == 0 {
            return Err(DbError::not_found("Quotation", quotation_id));
        }

        let position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM quotation_items WHERE quotation_id = ?1",
        )
        .bind(quotation_id)
        .fetch_one(&mut *tx)
        .await?;

        let item = QuotationItem::new(quotation_id, input, position);

        sqlx::query(
            r#"
            INSERT INTO quotation_items (
                id, quotation_id, item_id, name, description, quantity, unit_price_cents,
                unit_label, machine_cost_cents, subtotal_cents, position, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&item.id)
        .bind(&item.quotation_id)
        .bind(&item.item_id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(&item.unit_label)
        .bind(item.machine_cost_cents)
        .bind(item.subtotal_cents)
        .bind(item.position)
        .bind(item.created_at)
        .execute(&mut *tx)
        .await?;

        recalculate(&mut *tx, quotation_id).await?;
        tx.commit().await?;

        debug!(id = %item.id, quotation_id = %quotation_id, subtotal = %item.subtotal(), "Quotation line added");
        Ok(item)
    }

    /// Rewrites a line and recalculates the quotation totals.
    pub async fn update_item(&self, item: &QuotationItem) -> DbResult<QuotationItem> {
        NewQuotationItem {
            item_id: item.item_id.clone(),
            name: item.name.clone(),
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price_cents,
            unit_label: item.unit_label.clone(),
            machine_cost_cents: item.machine_cost_cents,
        }
        .validate()?;

        let mut item = item.clone();
        item.compute_subtotal();

        let mut tx = self.pool.begin().await?;

        let quotation_id: String = sqlx::query_scalar(
            r#"
            UPDATE quotation_items SET
                item_id = ?2,
                name = ?3,
                description = ?4,
                quantity = ?5,
                unit_price_cents = ?6,
                unit_label = ?7,
                machine_cost_cents = ?8,
                subtotal_cents = ?9,
                position = ?10
            WHERE id = ?1
            RETURNING quotation_id
            "#,
        )
        .bind(&item.id)
        .bind(&item.item_id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(&item.unit_label)
        .bind(item.machine_cost_cents)
        .bind(item.subtotal_cents)
        .bind(item.position)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("QuotationItem", &item.id))?;

        recalculate(&mut *tx, &quotation_id).await?;
        tx.commit().await?;

        item.quotation_id = quotation_id;
        Ok(item)
    }

    /// Removes a line and recalculates the quotation totals.
    pub async fn remove_item(&self, item_id: &str) -> DbResult<Quotation> {
        let mut tx = self.pool.begin().await?;

        let quotation_id: String =
            sqlx::query_scalar("DELETE FROM quotation_items WHERE id = ?1 RETURNING quotation_id")
                .bind(item_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("QuotationItem", item_id))?;

        let quotation = recalculate(&mut *tx, &quotation_id).await?;
        tx.commit().await?;
        Ok(quotation)
    }

    async fn next_sequence(&self, date: NaiveDate) -> DbResult<u32> {
        let prefix = quotation_number_prefix(date);
        let start = prefix.chars().count() as i64 + 1;

        let max: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(CAST(substr(quotation_number, ?2) AS INTEGER))
            FROM quotations
            WHERE quotation_number LIKE ?1 || '%'
            "#,
        )
        .bind(&prefix)
        .bind(start)
        .fetch_one(&self.pool)
        .await?;

        u32::try_from(max.unwrap_or(0) + 1)
            .map_err(|_| DbError::Internal(format!("quotation sequence overflow for {}", prefix)))
    }

    async fn insert(&self, q: &Quotation) -> DbResult<()> {
        sqlx::query(&format!(
            "INSERT INTO quotations ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            QUOTATION_COLUMNS
        ))
        .bind(&q.id)
        .bind(&q.quotation_number)
        .bind(&q.company_id)
        .bind(q.quotation_date)
        .bind(q.valid_until)
        .bind(&q.tax_id)
        .bind(q.discount_type)
        .bind(q.discount_value.to_string())
        .bind(q.subtotal_cents)
        .bind(q.tax_cents)
        .bind(q.discount_cents)
        .bind(q.total_cents)
        .bind(q.status)
        .bind(&q.notes)
        .bind(&q.terms_conditions)
        .bind(q.created_at)
        .bind(q.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

async fn load_items(conn: &mut SqliteConnection, quotation_id: &str) -> DbResult<Vec<QuotationItem>> {
    let items = sqlx::query_as::<_, QuotationItem>(&format!(
        "{} WHERE quotation_id = ?1 ORDER BY position, created_at",
        SELECT_ITEMS
    ))
    .bind(quotation_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

/// Phase 2: recomputes the cached totals from the stored lines.
async fn recalculate(conn: &mut SqliteConnection, quotation_id: &str) -> DbResult<Quotation> {
    let (tax_id, discount_type, discount_value): (Option<String>, DiscountType, String) =
        sqlx::query_as("SELECT tax_id, discount_type, discount_value FROM quotations WHERE id = ?1")
            .bind(quotation_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DbError::not_found("Quotation", quotation_id))?;

    let rate = match tax_id.as_deref() {
        Some(tax_id) => {
            let bps: Option<u32> = sqlx::query_scalar("SELECT rate_bps FROM taxes WHERE id = ?1")
                .bind(tax_id)
                .fetch_optional(&mut *conn)
                .await?;
            bps.map(TaxRate::from_bps).unwrap_or_default()
        }
        None => TaxRate::zero(),
    };

    let discount_value: Decimal = parse_decimal("quotations.discount_value", &discount_value)?;
    let items = load_items(conn, quotation_id).await?;
    let totals = QuotationTotals::calculate(&items, rate, discount_type, discount_value);

    let row = sqlx::query_as::<_, QuotationRow>(&format!(
        r#"
        UPDATE quotations SET
            subtotal_cents = ?2, tax_cents = ?3, discount_cents = ?4, total_cents = ?5
        WHERE id = ?1
        RETURNING {}
        "#,
        QUOTATION_COLUMNS
    ))
    .bind(quotation_id)
    .bind(totals.subtotal_cents)
    .bind(totals.tax_cents)
    .bind(totals.discount_cents)
    .bind(totals.total_cents)
    .fetch_one(&mut *conn)
    .await?;

    debug!(
        quotation_id = %quotation_id,
        lines = items.len(),
        total_cents = totals.total_cents,
        "Quotation totals recalculated"
    );

    row.try_into()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Database;
    use crate::repository::test_support::{company, date, test_db};
    use backoffice_core::types::Tax;
    use backoffice_core::{CoreError, Quantity, ValidationError};
    use rust_decimal_macros::dec;

    async fn with_company() -> (Database, String) {
        let db = test_db().await;
        let acme = db.companies().insert(&company("Acme")).await.unwrap();
        (db, acme.id)
    }

    fn new_quote(company_id: &str, tax_id: Option<&str>) -> NewQuotation {
        NewQuotation {
            company_id: company_id.to_string(),
            quotation_date: date(2024, 3, 9),
            valid_until: Some(date(2024, 4, 8)),
            tax_id: tax_id.map(str::to_string),
            discount_type: DiscountType::Percentage,
            discount_value: dec!(10),
            notes: None,
            terms_conditions: Some("50% advance".to_string()),
        }
    }

    fn line(name: &str, qty: &str, price_cents: i64) -> NewQuotationItem {
        NewQuotationItem {
            item_id: None,
            name: name.to_string(),
            description: None,
            quantity: qty.parse().unwrap(),
            unit_price_cents: price_cents,
            unit_label: Some("Nos".to_string()),
            machine_cost_cents: 0,
        }
    }

    async fn gst18(db: &Database) -> Tax {
        let now = Utc::now();
        db.taxes()
            .insert(&Tax {
                id: new_id(),
                name: "GST 18%".to_string(),
                rate_bps: 1800,
                description: None,
                is_active: true,
                is_default: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_numbers_are_sequential_per_day() {
        let (db, company_id) = with_company().await;
        let repo = db.quotations();

        let first = repo.create(&new_quote(&company_id, None)).await.unwrap();
        let second = repo.create(&new_quote(&company_id, None)).await.unwrap();
        let mut other_day = new_quote(&company_id, None);
        other_day.quotation_date = date(2024, 3, 10);
        other_day.valid_until = None;
        let third = repo.create(&other_day).await.unwrap();

        assert_eq!(first.quotation_number, "QT-20240309-0001");
        assert_eq!(second.quotation_number, "QT-20240309-0002");
        assert_eq!(third.quotation_number, "QT-20240310-0001");
        assert_eq!(first.status, QuotationStatus::Draft);
    }

    #[tokio::test]
    async fn test_lines_drive_totals() {
        let (db, company_id) = with_company().await;
        let tax = gst18(&db).await;
        let repo = db.quotations();

        let quote = repo.create(&new_quote(&company_id, Some(&tax.id))).await.unwrap();
        repo.add_item(&quote.id, line("Laser cutting", "4", 12_500)).await.unwrap();
        let bend = repo.add_item(&quote.id, line("Bending", "2.5", 20_000)).await.unwrap();
        assert_eq!(bend.position, 1);
        assert_eq!(bend.subtotal_cents, 50_000);

        let quote = repo.get_by_id(&quote.id).await.unwrap().unwrap();
        assert_eq!(quote.subtotal_cents, 100_000);
        assert_eq!(quote.tax_cents, 18_000);
        assert_eq!(quote.discount_cents, 10_000);
        assert_eq!(quote.total_cents, 108_000);

        let mut bend = bend;
        bend.quantity = Quantity::from_whole(5);
        let bend = repo.update_item(&bend).await.unwrap();
        assert_eq!(bend.subtotal_cents, 100_000);

        let quote = repo.get_by_id(&quote.id).await.unwrap().unwrap();
        assert_eq!(quote.subtotal_cents, 150_000);
        assert_eq!(quote.total_cents, 162_000);

        let quote = repo.remove_item(&bend.id).await.unwrap();
        assert_eq!(quote.subtotal_cents, 50_000);
        assert_eq!(repo.items(&quote.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_header_change_recalculates() {
        let (db, company_id) = with_company().await;
        let repo = db.quotations();

        let quote = repo.create(&new_quote(&company_id, None)).await.unwrap();
        repo.add_item(&quote.id, line("Welding", "1", 80_000)).await.unwrap();

        let mut quote = repo.get_by_id(&quote.id).await.unwrap().unwrap();
        assert_eq!(quote.total_cents, 72_000);

        quote.discount_type = DiscountType::Fixed;
        quote.discount_value = dec!(1000);
        let quote = repo.update_header(&quote).await.unwrap();
        assert_eq!(quote.discount_cents, 100_000);
        assert_eq!(quote.total_cents, 0);
        assert_eq!(quote.discount_value, dec!(1000));

        let mut bad = quote.clone();
        bad.discount_type = DiscountType::Percentage;
        bad.discount_value = dec!(150);
        assert!(repo.update_header(&bad).await.is_err());
    }

    #[tokio::test]
    async fn test_header_rejects_validity_before_issue_date() {
        let (db, company_id) = with_company().await;
        let repo = db.quotations();

        let quote = repo.create(&new_quote(&company_id, None)).await.unwrap();

        let mut bad = quote.clone();
        bad.valid_until = Some(date(2024, 3, 1));
        let err = repo.update_header(&bad).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::Validation(ValidationError::InvalidFormat { ref field, .. }))
                if field == "valid_until"
        ));

        let mut moved = quote.clone();
        moved.quotation_date = date(2024, 4, 20);
        assert!(repo.update_header(&moved).await.is_err());

        let stored = repo.get_by_id(&quote.id).await.unwrap().unwrap();
        assert_eq!(stored.valid_until, Some(date(2024, 4, 8)));
        assert_eq!(stored.quotation_date, date(2024, 3, 9));

        moved.valid_until = None;
        assert_eq!(repo.update_header(&moved).await.unwrap().quotation_date, date(2024, 4, 20));
    }

    #[tokio::test]
    async fn test_deleted_tax_counts_as_zero() {
        let (db, company_id) = with_company().await;
        let tax = gst18(&db).await;
        let repo = db.quotations();

        let quote = repo.create(&new_quote(&company_id, Some(&tax.id))).await.unwrap();
        repo.add_item(&quote.id, line("Welding", "1", 10_000)).await.unwrap();
        db.taxes().delete(&tax.id).await.unwrap();

        let quote = repo.recalculate_totals(&quote.id).await.unwrap();
        assert_eq!(quote.tax_id, None);
        assert_eq!(quote.tax_cents, 0);
    }

    #[tokio::test]
    async fn test_status_and_expiry() {
        let (db, company_id) = with_company().await;
        let repo = db.quotations();

        let sent = repo.create(&new_quote(&company_id, None)).await.unwrap();
        repo.update_status(&sent.id, QuotationStatus::Sent).await.unwrap();
        let accepted = repo.create(&new_quote(&company_id, None)).await.unwrap();
        repo.update_status(&accepted.id, QuotationStatus::Accepted).await.unwrap();

        let expired = repo.expire_past_validity(date(2024, 5, 1)).await.unwrap();
        assert_eq!(expired, 1);

        let sent = repo.get_by_id(&sent.id).await.unwrap().unwrap();
        assert_eq!(sent.status, QuotationStatus::Expired);
        assert!(sent.is_past_validity(date(2024, 5, 1)));
        let accepted = repo.get_by_number(&accepted.quotation_number).await.unwrap().unwrap();
        assert_eq!(accepted.status, QuotationStatus::Accepted);
    }

    #[tokio::test]
    async fn test_delete_cascades_lines() {
        let (db, company_id) = with_company().await;
        let repo = db.quotations();

        let quote = repo.create(&new_quote(&company_id, None)).await.unwrap();
        repo.add_item(&quote.id, line("Welding", "1", 10_000)).await.unwrap();
        repo.delete(&quote.id).await.unwrap();

        assert!(repo.items(&quote.id).await.unwrap().is_empty());
        assert!(repo.list_for_company(&company_id).await.unwrap().is_empty());
        assert!(repo.add_item(&quote.id, line("X", "1", 1)).await.unwrap_err().is_not_found());
    }
}
