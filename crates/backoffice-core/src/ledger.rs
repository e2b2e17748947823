//! # Ledger Module
//!
//! Company accounts: invoices (debits), payments (credits), the unified
//! ledger they are projected into, and statements built from that ledger.
//!
//! ## Projection
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   One write, one SQL transaction                        │
//! │                                                                         │
//! │   Invoice INV-001  ──project_invoice──►  LedgerEntry (debit,  1500.00)  │
//! │   Payment PAY-001  ──project_payment──►  LedgerEntry (credit,  500.00)  │
//! │                                                                         │
//! │   create  → insert entry                                                │
//! │   update  → refresh entry (recreate when missing)                       │
//! │   delete  → remove entry                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Statement
//! ```text
//!   opening = Σ debit − Σ credit dated before the period start
//!
//!   date        number    debit     credit    balance
//!   2024-01-05  INV-001   1500.00             1500.00
//!   2024-01-20  PAY-001              500.00   1000.00
//!
//!   closing = opening + Σ debit − Σ credit = outstanding
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Company
// =============================================================================

/// A customer account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Company {
    pub id: String,
    /// Unique display name.
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub contact_person: Option<String>,
    /// 15-character GST identification number.
    pub gstin: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Payment Mode
// =============================================================================

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    Cash,
    Cheque,
    BankTransfer,
    Upi,
    Card,
    Other,
}

impl PaymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Cash => "cash",
            PaymentMode::Cheque => "cheque",
            PaymentMode::BankTransfer => "bank_transfer",
            PaymentMode::Upi => "upi",
            PaymentMode::Card => "card",
            PaymentMode::Other => "other",
        }
    }
}

impl Default for PaymentMode {
    fn default() -> Self {
        PaymentMode::BankTransfer
    }
}

impl fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cash" => Ok(PaymentMode::Cash),
            "cheque" => Ok(PaymentMode::Cheque),
            "bank_transfer" => Ok(PaymentMode::BankTransfer),
            "upi" => Ok(PaymentMode::Upi),
            "card" => Ok(PaymentMode::Card),
            "other" => Ok(PaymentMode::Other),
            _ => Err(ValidationError::NotAllowed {
                field: "payment_mode".to_string(),
                allowed: ["cash", "cheque", "bank_transfer", "upi", "card", "other"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }),
        }
    }
}

// =============================================================================
// Invoice & Payment
// =============================================================================

/// An amount billed to a company (debit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    pub company_id: String,
    /// Unique across all companies.
    pub invoice_number: String,
    #[ts(as = "String")]
    pub invoice_date: NaiveDate,
    pub description: Option<String>,
    pub amount_cents: i64,
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// An amount received from a company (credit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub company_id: String,
    /// Unique across all companies.
    pub payment_number: String,
    #[ts(as = "String")]
    pub payment_date: NaiveDate,
    pub description: Option<String>,
    pub amount_cents: i64,
    pub payment_mode: PaymentMode,
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Ledger Entry
// =============================================================================

/// Side of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Invoice: the company owes more.
    Debit,
    /// Payment: the company owes less.
    Credit,
}

/// A debit or credit mirrored from exactly one invoice or payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LedgerEntry {
    pub id: String,
    pub company_id: String,
    pub entry_type: EntryType,
    /// Invoice or payment number.
    pub transaction_number: String,
    #[ts(as = "String")]
    pub transaction_date: NaiveDate,
    pub description: Option<String>,
    pub amount_cents: i64,
    pub reference: Option<String>,
    pub payment_mode: Option<PaymentMode>,
    pub invoice_id: Option<String>,
    pub payment_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Debit amount of this entry (zero for credits).
    pub fn debit(&self) -> Money {
        match self.entry_type {
            EntryType::Debit => Money::from_cents(self.amount_cents),
            EntryType::Credit => Money::zero(),
        }
    }

    /// Credit amount of this entry (zero for debits).
    pub fn credit(&self) -> Money {
        match self.entry_type {
            EntryType::Debit => Money::zero(),
            EntryType::Credit => Money::from_cents(self.amount_cents),
        }
    }

    /// Effect on the outstanding balance.
    pub fn signed_amount(&self) -> Money {
        self.debit() - self.credit()
    }
}

/// Builds (or refreshes) the ledger entry mirroring `invoice`.
///
/// An existing entry keeps its id and creation time.
pub fn project_invoice(invoice: &Invoice, existing: Option<&LedgerEntry>) -> LedgerEntry {
    let (id, created_at) = identity(existing);
    LedgerEntry {
        id,
        company_id: invoice.company_id.clone(),
        entry_type: EntryType::Debit,
        transaction_number: invoice.invoice_number.clone(),
        transaction_date: invoice.invoice_date,
        description: invoice.description.clone(),
        amount_cents: invoice.amount_cents,
        reference: invoice.reference.clone(),
        payment_mode: None,
        invoice_id: Some(invoice.id.clone()),
        payment_id: None,
        created_at,
    }
}

/// Builds (or refreshes) the ledger entry mirroring `payment`.
pub fn project_payment(payment: &Payment, existing: Option<&LedgerEntry>) -> LedgerEntry {
    let (id, created_at) = identity(existing);
    LedgerEntry {
        id,
        company_id: payment.company_id.clone(),
        entry_type: EntryType::Credit,
        transaction_number: payment.payment_number.clone(),
        transaction_date: payment.payment_date,
        description: payment.description.clone(),
        amount_cents: payment.amount_cents,
        reference: payment.reference.clone(),
        payment_mode: Some(payment.payment_mode),
        invoice_id: None,
        payment_id: Some(payment.id.clone()),
        created_at,
    }
}

fn identity(existing: Option<&LedgerEntry>) -> (String, DateTime<Utc>) {
    match existing {
        Some(entry) => (entry.id.clone(), entry.created_at),
        None => (Uuid::new_v4().to_string(), Utc::now()),
    }
}

// =============================================================================
// Statement
// =============================================================================

/// Inclusive date range of a statement. Open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatementPeriod {
    #[ts(as = "Option<String>")]
    pub start: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub end: Option<NaiveDate>,
}

impl StatementPeriod {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        StatementPeriod { start, end }
    }

    /// Whole history.
    pub fn all() -> Self {
        StatementPeriod::default()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }

    pub fn is_before(&self, date: NaiveDate) -> bool {
        self.start.is_some_and(|s| date < s)
    }
}

/// One statement row with the balance after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatementLine {
    pub entry: LedgerEntry,
    pub debit_cents: i64,
    pub credit_cents: i64,
    pub balance_cents: i64,
}

/// A company's account statement over a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CompanyStatement {
    pub company_id: String,
    pub period: StatementPeriod,
    pub opening_balance_cents: i64,
    pub lines: Vec<StatementLine>,
    pub total_debit_cents: i64,
    pub total_credit_cents: i64,
    pub closing_balance_cents: i64,
    pub outstanding_cents: i64,
}

impl CompanyStatement {
    /// Builds a statement from a company's ledger entries.
    ///
    /// Entries may arrive in any order; they are sorted by
    /// `(transaction_date, created_at)`. Entries after the period end are
    /// ignored.
    pub fn build(company_id: &str, mut entries: Vec<LedgerEntry>, period: StatementPeriod) -> Self {
        entries.sort_by(|a, b| {
            (a.transaction_date, a.created_at).cmp(&(b.transaction_date, b.created_at))
        });

        let opening: Money = entries
            .iter()
            .filter(|e| period.is_before(e.transaction_date))
            .map(LedgerEntry::signed_amount)
            .sum();

        let mut balance = opening;
        let mut total_debit = Money::zero();
        let mut total_credit = Money::zero();
        let mut lines = Vec::new();

        for entry in entries
            .into_iter()
            .filter(|e| period.contains(e.transaction_date))
        {
            let debit = entry.debit();
            let credit = entry.credit();
            total_debit += debit;
            total_credit += credit;
            balance += debit - credit;

            lines.push(StatementLine {
                debit_cents: debit.cents(),
                credit_cents: credit.cents(),
                balance_cents: balance.cents(),
                entry,
            });
        }

        let closing = opening + total_debit - total_credit;

        CompanyStatement {
            company_id: company_id.to_string(),
            period,
            opening_balance_cents: opening.cents(),
            lines,
            total_debit_cents: total_debit.cents(),
            total_credit_cents: total_credit.cents(),
            closing_balance_cents: closing.cents(),
            outstanding_cents: closing.cents(),
        }
    }
}

// =============================================================================
// Balance
// =============================================================================

/// Lifetime totals for one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CompanyBalance {
    pub company_id: String,
    pub company_name: String,
    /// Sum of invoices.
    pub total_debit_cents: i64,
    /// Sum of payments.
    pub total_credit_cents: i64,
    pub outstanding_cents: i64,
}

impl CompanyBalance {
    pub fn new(company_id: String, company_name: String, debit: Money, credit: Money) -> Self {
        CompanyBalance {
            company_id,
            company_name,
            total_debit_cents: debit.cents(),
            total_credit_cents: credit.cents(),
            outstanding_cents: (debit - credit).cents(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
