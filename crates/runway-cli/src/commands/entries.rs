//! Ledger entry commands

use anyhow::Result;
use runway_core::{
    Engine, EntryStatus, InstallmentPurchase, LedgerEntry, LedgerFilter, NewLedgerEntry, Period,
};

use super::{money, print_json, truncate};

fn print_entry_line(entry: &LedgerEntry) {
    let status = match entry.status {
        EntryStatus::Confirmed => "✔",
        EntryStatus::Pending => "…",
    };
    let installment = entry
        .installment
        .as_ref()
        .map(|i| format!(" [{}/{}]", i.index, i.total))
        .unwrap_or_default();
    println!(
        "   {} #{:<5} {} │ {:28} │ {:>10} │ {:10} │ {}",
        status,
        entry.id,
        entry.date,
        truncate(&format!("{}{}", entry.description, installment), 28),
        money(entry.signed_amount()),
        entry.origin.as_str(),
        entry.target
    );
}

pub async fn cmd_entries_list(
    engine: &Engine,
    owner: &str,
    period: Option<Period>,
    account: Option<i64>,
    card: Option<i64>,
    status: Option<EntryStatus>,
    json: bool,
) -> Result<()> {
    let mut filter = LedgerFilter::new();
    if let Some(period) = period {
        filter = filter.period(period);
    }
    if let Some(id) = account {
        filter = filter.account(id);
    }
    if let Some(id) = card {
        filter = filter.card(id);
    }
    if let Some(status) = status {
        filter = filter.status(status);
    }

    let entries = engine.entries(owner, &filter).await?;
    if json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        println!("No entries found.");
        return Ok(());
    }

    println!();
    println!("📒 Ledger Entries ({})", entries.len());
    println!("   ─────────────────────────────────────────────────────────────");
    for entry in &entries {
        print_entry_line(entry);
    }
    Ok(())
}

pub async fn cmd_entries_add(engine: &Engine, owner: &str, new: &NewLedgerEntry) -> Result<()> {
    let entry = engine.record_entry(owner, new).await?;
    println!(
        "✅ Entry #{} recorded: '{}' {} on {} ({})",
        entry.id,
        entry.description,
        money(entry.signed_amount()),
        entry.date,
        entry.status
    );
    Ok(())
}

pub async fn cmd_entries_installments(
    engine: &Engine,
    owner: &str,
    purchase: &InstallmentPurchase,
) -> Result<()> {
    let entries = engine.record_installments(owner, purchase).await?;
    println!(
        "✅ '{}' split into {} installments on card #{}",
        purchase.description,
        entries.len(),
        purchase.card_id
    );
    for entry in &entries {
        print_entry_line(entry);
    }
    Ok(())
}

pub async fn cmd_entries_confirm(engine: &Engine, owner: &str, id: i64) -> Result<()> {
    let entry = engine.confirm_entry(owner, id).await?;
    println!("✅ Entry #{} '{}' confirmed", entry.id, entry.description);
    Ok(())
}

pub async fn cmd_entries_delete(engine: &Engine, owner: &str, id: i64) -> Result<()> {
    engine.delete_entry(owner, id).await?;
    println!("🗑  Entry #{} deleted", id);
    Ok(())
}

