//! # Seed Data Loader
//!
//! Applies migrations and loads the standard unit catalogue. With `--demo`
//! it also adds a sample company with an invoice, a payment and a stocked
//! item so a fresh database has something to look at.
//!
//! ## Usage
//! ```bash
//! # Seed units into the database named by BACKOFFICE_DB_PATH
//! cargo run -p backoffice-db --bin seed
//!
//! # Explicit path plus demo data
//! cargo run -p backoffice-db --bin seed -- --db ./data/backoffice.db --demo
//! ```
//!
//! Re-running is safe: units are reconciled by code and the demo data is
//! skipped when the demo company already exists.

use std::env;

use chrono::Utc;
use tracing_subscriber::EnvFilter;

use backoffice_core::ledger::{Company, Invoice, Payment, PaymentMode};
use backoffice_core::stock::{InventoryItem, NewStockTransaction, TransactionKind};
use backoffice_core::{Money, Quantity};
use backoffice_db::repository::new_id;
use backoffice_db::{Database, DbConfig};

const DEMO_COMPANY: &str = "Demo Fabricators Pvt Ltd";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,backoffice=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<String> = None;
    let mut demo = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--demo" => demo = true,
            "--help" | "-h" => {
                println!("Back Office Seed Loader");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: $BACKOFFICE_DB_PATH)");
                println!("      --demo         Also add a demo company, invoice, payment and item");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => eprintln!("Ignoring unknown argument: {}", other),
        }
        i += 1;
    }

    let config = match db_path {
        Some(path) => DbConfig::new(path),
        None => DbConfig::from_env()?,
    };

    println!("Back Office Seed Loader");
    println!("=======================");
    println!("Database: {}", config.database_path.display());
    println!();

    let db = Database::new(config).await?;
    println!("✓ Connected, migrations applied");

    let report = db.units().seed_standard_units().await?;
    println!(
        "✓ Units: {} created, {} repaired, {} unchanged",
        report.created, report.repaired, report.unchanged
    );

    if demo {
        seed_demo(&db).await?;
    }

    db.close().await;
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

async fn seed_demo(db: &Database) -> Result<(), Box<dyn std::error::Error>> {
    if db.companies().get_by_name(DEMO_COMPANY).await?.is_some() {
        println!("⚠ Demo company already exists, skipping demo data");
        return Ok(());
    }

    let now = Utc::now();
    let today = now.date_naive();

    let company = db
        .companies()
        .insert(&Company {
            id: new_id(),
            name: DEMO_COMPANY.to_string(),
            email: Some("accounts@demo-fab.example".to_string()),
            phone: None,
            address: Some("Plot 12, MIDC, Pune".to_string()),
            contact_person: Some("R. Kulkarni".to_string()),
            gstin: None,
            created_at: now,
            updated_at: now,
        })
        .await?;

    db.invoices()
        .create(&Invoice {
            id: new_id(),
            company_id: company.id.clone(),
            invoice_number: "DEMO-INV-0001".to_string(),
            invoice_date: today,
            description: Some("Sheet metal fabrication".to_string()),
            amount_cents: 118_000_00,
            reference: None,
            created_at: now,
            updated_at: now,
        })
        .await?;

    db.payments()
        .create(&Payment {
            id: new_id(),
            company_id: company.id.clone(),
            payment_number: "DEMO-PAY-0001".to_string(),
            payment_date: today,
            description: Some("Advance".to_string()),
            amount_cents: 50_000_00,
            payment_mode: PaymentMode::BankTransfer,
            reference: None,
            created_at: now,
            updated_at: now,
        })
        .await?;

    let balance = db.ledger().balance(&company.id).await?;
    println!(
        "✓ Company '{}' outstanding {}",
        balance.company_name,
        Money::from_cents(balance.outstanding_cents)
    );
    println!("{}", serde_json::to_string_pretty(&balance)?);

    let kg = db.units().get_by_code("kg").await?;
    let g = db.units().get_by_code("g").await?;

    let item = db
        .inventory()
        .insert(&InventoryItem {
            id: new_id(),
            name: "MS Round Bar 12mm".to_string(),
            description: None,
            sku: Some("DEMO-MSRB-12".to_string()),
            category: Some("Raw material".to_string()),
            unit_price_cents: 72_00,
            unit_label: Some("kg".to_string()),
            base_unit_id: kg.as_ref().map(|u| u.id.clone()),
            stock_quantity: None,
            min_stock_level: Quantity::from_whole(5),
            reorder_level: Quantity::from_whole(10),
            default_location_id: None,
            batch_tracking: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
        .await?;

    let movements = [
        (TransactionKind::Receipt, Quantity::from_whole(25), kg.as_ref()),
        (TransactionKind::Receipt, Quantity::from_whole(500), g.as_ref()),
        (TransactionKind::Issue, Quantity::from_whole(8), kg.as_ref()),
    ];

    for (kind, quantity, unit) in movements {
        let recorded = db
            .stock()
            .record(&NewStockTransaction {
                item_id: item.id.clone(),
                kind,
                quantity,
                unit_id: unit.map(|u| u.id.clone()),
                batch_id: None,
                location_id: None,
                project: Some("DEMO".to_string()),
                transaction_date: today,
                reference_number: None,
                notes: None,
            })
            .await?;

        println!(
            "  {} {} {} -> stock {}",
            kind,
            quantity,
            unit.map(|u| u.code.as_str()).unwrap_or("(item unit)"),
            recorded.item_stock
        );
    }

    let audit = db.stock().audit_item(&item.id).await?;
    println!(
        "✓ Demo item '{}' stocked, value {}{}",
        item.name,
        Money::from_cents(audit.stock_value_cents),
        if audit.needs_reorder { " (reorder)" } else { "" }
    );
    Ok(())
}
