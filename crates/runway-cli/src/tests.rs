//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::sync::Arc;

use runway_core::export::ExportFormat;
use runway_core::test_utils::{
    date, money, monthly_rule, period, seed, test_db, test_engine, Fixture, OWNER,
};
use runway_core::{
    AdjustmentMode, Database, Engine, EntryKind, EntryStatus, InstallmentPurchase, InvoiceFilter,
    InvoiceStatus, LedgerFilter, NewLedgerEntry, Origin, Target,
};

use crate::cli::TargetArgs;
use crate::commands::{self, truncate};

fn setup() -> (Arc<Database>, Engine, Fixture) {
    let db = test_db();
    let fixture = seed(&db, OWNER);
    let engine = test_engine(db.clone());
    (db, engine, fixture)
}

/// Rent of 1200 on the 5th, from January 2024
async fn add_rent(engine: &Engine, fixture: &Fixture) -> i64 {
    let new = monthly_rule(
        "Rent",
        "1200",
        EntryKind::Expense,
        Target::Account(fixture.account.id),
        5,
        date(2024, 1, 1),
    );
    commands::cmd_rules_add(engine, OWNER, &new).await.unwrap();
    engine.rules(OWNER, false).await.unwrap()[0].id
}

// ========== Utility Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("exactly10!", 10), "exactly10!");
    assert_eq!(truncate("this is a long description", 10), "this is...");
    // Multi-byte characters are not split
    assert_eq!(truncate("café au lait", 7), "café...");
}

#[test]
fn test_money_formats_cents() {
    assert_eq!(commands::money(money("12.5")), "12.50");
    assert_eq!(commands::money(money("-1200")), "-1200.00");
}

#[test]
fn test_target_args() {
    let account = TargetArgs {
        account: Some(3),
        card: None,
    };
    assert_eq!(account.target().unwrap(), Target::Account(3));

    let card = TargetArgs {
        account: None,
        card: Some(4),
    };
    assert_eq!(card.target().unwrap(), Target::Card(4));

    let neither = TargetArgs {
        account: None,
        card: None,
    };
    assert!(neither.target().is_err());
}

// ========== Init Tests ==========

#[test]
fn test_cmd_init_creates_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runway.db");

    commands::cmd_init(&path, true, OWNER).unwrap();
    assert!(path.exists());

    // Reopening an initialized database works
    let db = commands::open_db(&path, true).unwrap();
    assert!(db.list_accounts(OWNER).unwrap().is_empty());
}

// ========== Reference Data Tests ==========

#[tokio::test]
async fn test_cmd_accounts_add_and_list() {
    let (db, engine, _) = setup();

    commands::cmd_accounts_add(&engine, OWNER, "Savings", money("250"))
        .await
        .unwrap();
    commands::cmd_accounts_list(&engine, OWNER, false)
        .await
        .unwrap();
    commands::cmd_accounts_list(&engine, OWNER, true).await.unwrap();

    let accounts = db.list_accounts(OWNER).unwrap();
    assert_eq!(accounts.len(), 2);
    let savings = accounts.iter().find(|a| a.name == "Savings").unwrap();
    assert_eq!(savings.opening_balance, money("250"));
}

#[tokio::test]
async fn test_cmd_cards_add_rejects_bad_day() {
    let (db, engine, fixture) = setup();

    let result =
        commands::cmd_cards_add(&engine, OWNER, "Amex", 0, 10, Some(fixture.account.id)).await;
    assert!(result.is_err());

    commands::cmd_cards_add(&engine, OWNER, "Amex", 3, 10, Some(fixture.account.id))
        .await
        .unwrap();
    assert_eq!(db.list_cards(OWNER).unwrap().len(), 2);
}

#[tokio::test]
async fn test_cmd_categories_add_is_idempotent() {
    let (db, engine, _) = setup();

    commands::cmd_categories_add(&engine, OWNER, "Housing")
        .await
        .unwrap();
    commands::cmd_categories_add(&engine, OWNER, "Food")
        .await
        .unwrap();
    assert_eq!(db.list_categories(OWNER).unwrap().len(), 2);
}

// ========== Rules Command Tests ==========

#[tokio::test]
async fn test_cmd_rules_pause_resume_delete() {
    let (db, engine, fixture) = setup();
    let id = add_rent(&engine, &fixture).await;

    commands::cmd_rules_set_active(&engine, OWNER, id, false)
        .await
        .unwrap();
    assert!(db.list_rules(OWNER, true).unwrap().is_empty());
    commands::cmd_rules_list(&engine, OWNER, true, false)
        .await
        .unwrap();

    commands::cmd_rules_set_active(&engine, OWNER, id, true)
        .await
        .unwrap();
    assert_eq!(db.list_rules(OWNER, true).unwrap().len(), 1);
    commands::cmd_rules_show(&engine, OWNER, id, false)
        .await
        .unwrap();

    commands::cmd_rules_delete(&engine, OWNER, id).await.unwrap();
    assert!(db.get_rule(OWNER, id).unwrap().is_none());
}

#[tokio::test]
async fn test_cmd_rules_show_unknown() {
    let (_, engine, _) = setup();
    assert!(commands::cmd_rules_show(&engine, OWNER, 42, false)
        .await
        .is_err());
}

#[tokio::test]
async fn test_cmd_confirm_realizes_month_once() {
    let (db, engine, fixture) = setup();
    let id = add_rent(&engine, &fixture).await;

    commands::cmd_confirm(&engine, OWNER, id, Some(date(2024, 3, 7)), false)
        .await
        .unwrap();

    let entries = db
        .list_ledger_entries(OWNER, &LedgerFilter::new().rule(id))
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].origin, Origin::Recurring);
    assert_eq!(entries[0].status, EntryStatus::Confirmed);
    assert_eq!(entries[0].amount, money("1200"));

    // Confirming the same month again keeps the single realization
    commands::cmd_confirm(&engine, OWNER, id, Some(date(2024, 3, 20)), false)
        .await
        .unwrap();
    let entries = db
        .list_ledger_entries(OWNER, &LedgerFilter::new().rule(id))
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].date, date(2024, 3, 7));
}

#[tokio::test]
async fn test_cmd_adjust_modes() {
    let (db, engine, fixture) = setup();
    let id = add_rent(&engine, &fixture).await;

    commands::cmd_adjust(
        &engine,
        OWNER,
        id,
        period(2024, 2),
        AdjustmentMode::ThisMonthOnly,
        Some(money("1100")),
        Some("discount".to_string()),
        false,
    )
    .await
    .unwrap();
    let feb = db
        .list_ledger_entries(OWNER, &LedgerFilter::new().rule(id).period(period(2024, 2)))
        .unwrap();
    assert_eq!(feb.len(), 1);
    assert_eq!(feb[0].origin, Origin::RecurringAdjustment);
    assert_eq!(feb[0].amount, money("1100"));

    commands::cmd_adjust(
        &engine,
        OWNER,
        id,
        period(2024, 4),
        AdjustmentMode::Skip,
        None,
        None,
        true,
    )
    .await
    .unwrap();
    let april = engine.for_month(OWNER, period(2024, 4)).await;
    assert!(april.transactions.iter().all(|t| !t.is_virtual));
    assert!(april.transactions.iter().all(|t| t.amount.is_zero()));

    commands::cmd_adjust(
        &engine,
        OWNER,
        id,
        period(2024, 6),
        AdjustmentMode::FromNowOn,
        Some(money("1300")),
        None,
        false,
    )
    .await
    .unwrap();
    let rule = db.get_rule(OWNER, id).unwrap().unwrap();
    assert_eq!(rule.amount, money("1300"));

    // An amount is required unless skipping
    let missing = commands::cmd_adjust(
        &engine,
        OWNER,
        id,
        period(2024, 7),
        AdjustmentMode::ThisMonthOnly,
        None,
        None,
        false,
    )
    .await;
    assert!(missing.is_err());
}

// ========== Entries Command Tests ==========

#[tokio::test]
async fn test_cmd_entries_add_confirm_delete() {
    let (db, engine, fixture) = setup();

    let new = NewLedgerEntry::manual(
        "Groceries",
        money("82.40"),
        date(2024, 3, 12),
        EntryKind::Expense,
        Target::Account(fixture.account.id),
        EntryStatus::Pending,
    );
    commands::cmd_entries_add(&engine, OWNER, &new).await.unwrap();

    let entries = db
        .list_ledger_entries(OWNER, &LedgerFilter::new().period(period(2024, 3)))
        .unwrap();
    assert_eq!(entries.len(), 1);
    let id = entries[0].id;

    commands::cmd_entries_confirm(&engine, OWNER, id).await.unwrap();
    commands::cmd_entries_list(
        &engine,
        OWNER,
        Some(period(2024, 3)),
        None,
        None,
        Some(EntryStatus::Confirmed),
        false,
    )
    .await
    .unwrap();
    let confirmed = db
        .list_ledger_entries(OWNER, &LedgerFilter::new().status(EntryStatus::Confirmed))
        .unwrap();
    assert_eq!(confirmed.len(), 1);

    commands::cmd_entries_delete(&engine, OWNER, id).await.unwrap();
    assert!(db
        .list_ledger_entries(OWNER, &LedgerFilter::new())
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_cmd_entries_installments() {
    let (db, engine, fixture) = setup();

    let purchase = InstallmentPurchase {
        description: "Laptop".to_string(),
        total_amount: money("100"),
        installments: 3,
        first_date: date(2024, 1, 15),
        card_id: fixture.card.id,
        category_id: None,
        note: None,
    };
    commands::cmd_entries_installments(&engine, OWNER, &purchase)
        .await
        .unwrap();

    let entries = db
        .list_ledger_entries(OWNER, &LedgerFilter::new().card(fixture.card.id))
        .unwrap();
    assert_eq!(entries.len(), 3);
    let total: rust_decimal::Decimal = entries.iter().map(|e| e.amount).sum();
    assert_eq!(total, money("100"));
}

// ========== Month / Balance Command Tests ==========

#[tokio::test]
async fn test_cmd_month_and_indicators() {
    let (_, engine, fixture) = setup();
    add_rent(&engine, &fixture).await;

    commands::cmd_month(&engine, OWNER, period(2024, 3), false)
        .await
        .unwrap();
    commands::cmd_month(&engine, OWNER, period(2024, 3), true)
        .await
        .unwrap();
    commands::cmd_indicators(&engine, OWNER, period(2024, 3), false)
        .await
        .unwrap();
    commands::cmd_upcoming(&engine, OWNER, date(2024, 3, 1), date(2024, 4, 30), false)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cmd_balance_and_project() {
    let (_, engine, fixture) = setup();
    add_rent(&engine, &fixture).await;

    commands::cmd_balance(&engine, OWNER, &[], date(2024, 3, 1), false)
        .await
        .unwrap();
    commands::cmd_project(
        &engine,
        OWNER,
        &[fixture.account.id],
        date(2024, 3, 1),
        date(2024, 6, 30),
        false,
    )
    .await
    .unwrap();

    // Horizon before start is rejected
    let backwards = commands::cmd_project(
        &engine,
        OWNER,
        &[],
        date(2024, 6, 30),
        date(2024, 3, 1),
        false,
    )
    .await;
    assert!(backwards.is_err());

    // Unknown account is rejected
    assert!(commands::cmd_balance(&engine, OWNER, &[999], date(2024, 3, 1), false)
        .await
        .is_err());
}

#[tokio::test]
async fn test_cmd_export_to_file() {
    let (_, engine, fixture) = setup();
    add_rent(&engine, &fixture).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("march.csv");
    commands::cmd_export(&engine, OWNER, period(2024, 3), ExportFormat::Csv, Some(&path))
        .await
        .unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let mut lines = content.lines();
    assert!(lines.next().unwrap().starts_with("date,description"));
    let row = lines.next().unwrap();
    assert!(row.starts_with("2024-03-05,Rent"));
    assert!(lines.next().is_none());

    let json_path = dir.path().join("march.json");
    commands::cmd_export(&engine, OWNER, period(2024, 3), ExportFormat::Json, Some(&json_path))
        .await
        .unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(value["transactions"].as_array().unwrap().len(), 1);
}

// ========== Invoice Command Tests ==========

#[tokio::test]
async fn test_cmd_invoice_close_and_pay() {
    let (db, engine, fixture) = setup();

    commands::cmd_invoices_open(&engine, OWNER, fixture.card.id, period(2024, 5))
        .await
        .unwrap();
    let charge = NewLedgerEntry::manual(
        "Books",
        money("60"),
        date(2024, 5, 2),
        EntryKind::CardExpense,
        Target::Card(fixture.card.id),
        EntryStatus::Confirmed,
    );
    commands::cmd_entries_add(&engine, OWNER, &charge)
        .await
        .unwrap();

    let invoice = db.list_invoices(OWNER, &InvoiceFilter::new()).unwrap()[0].clone();
    commands::cmd_invoices_preview(&engine, OWNER, invoice.id, false)
        .await
        .unwrap();

    // Not closed yet
    assert!(commands::cmd_invoices_pay(&engine, OWNER, invoice.id, None, date(2024, 5, 28))
        .await
        .is_err());

    commands::cmd_invoices_close(&engine, OWNER, date(2024, 5, 21), false)
        .await
        .unwrap();
    let closed = db.get_invoice(OWNER, invoice.id).unwrap().unwrap();
    assert_eq!(closed.status, InvoiceStatus::Closed);
    assert_eq!(closed.total, money("60"));

    commands::cmd_invoices_pay(&engine, OWNER, invoice.id, None, date(2024, 5, 28))
        .await
        .unwrap();
    let paid = db.get_invoice(OWNER, invoice.id).unwrap().unwrap();
    assert_eq!(paid.status, InvoiceStatus::Paid);

    commands::cmd_invoices_list(&engine, OWNER, Some(fixture.card.id), None, false)
        .await
        .unwrap();
}
