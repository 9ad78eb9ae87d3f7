//! Month view, upcoming obligations and export

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use runway_core::export::{export_month, ExportFormat};
use runway_core::{Engine, EntryStatus, MonthView, Period, Transaction};
use rust_decimal::Decimal;

use super::{money, print_json, truncate};

fn row_marker(tx: &Transaction) -> &'static str {
    if tx.is_invoice_liability() {
        "🧾"
    } else if tx.is_virtual {
        "○"
    } else {
        match tx.status {
            EntryStatus::Confirmed => "✔",
            EntryStatus::Pending => "…",
        }
    }
}

fn print_failures(view: &MonthView) {
    if view.partial {
        println!();
        println!("   ⚠️  Partial view, some sources could not be read:");
        for failure in &view.failures {
            println!("      - {}: {}", failure.source, failure.message);
        }
    }
}

pub async fn cmd_month(engine: &Engine, owner: &str, period: Period, json: bool) -> Result<()> {
    let view = engine.for_month(owner, period).await;
    if json {
        return print_json(&view);
    }

    println!();
    println!("📅 {}", period);
    println!("   ─────────────────────────────────────────────────────────────");

    if view.transactions.is_empty() {
        println!("   Nothing scheduled or recorded.");
        print_failures(&view);
        return Ok(());
    }

    let mut net = Decimal::ZERO;
    for tx in &view.transactions {
        let target = tx
            .target_name
            .clone()
            .unwrap_or_else(|| tx.target.to_string());
        // Card charges folded into a closed invoice are listed but not counted
        let amount = if tx.counts_toward_totals {
            net += tx.signed_amount();
            money(tx.signed_amount())
        } else {
            format!("({})", money(tx.signed_amount()))
        };
        println!(
            "   {} {} │ {:28} │ {:>12} │ {}",
            row_marker(tx),
            tx.date,
            truncate(&tx.description, 28),
            amount,
            truncate(&target, 16)
        );
    }
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Net for the month: {}", money(net));
    println!("   ✔ confirmed  … pending  ○ projected  🧾 invoice due");
    print_failures(&view);
    Ok(())
}

pub async fn cmd_upcoming(
    engine: &Engine,
    owner: &str,
    from: NaiveDate,
    to: NaiveDate,
    json: bool,
) -> Result<()> {
    let occurrences = engine.upcoming(owner, from, to).await?;
    if json {
        return print_json(&occurrences);
    }

    if occurrences.is_empty() {
        println!("Nothing due between {} and {}.", from, to);
        return Ok(());
    }

    println!();
    println!("⏳ Upcoming {} → {}", from, to);
    println!("   ─────────────────────────────────────────────────────────────");
    let mut total = Decimal::ZERO;
    for occurrence in &occurrences {
        total += occurrence.signed_amount();
        println!(
            "   {} │ {:28} │ {:>12} │ rule #{}",
            occurrence.date,
            truncate(&occurrence.description, 28),
            money(occurrence.signed_amount()),
            occurrence.rule_id
        );
    }
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Net: {}", money(total));
    Ok(())
}

pub async fn cmd_export(
    engine: &Engine,
    owner: &str,
    period: Period,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let view = engine.for_month(owner, period).await;
    if view.partial {
        eprintln!(
            "⚠️  Exporting a partial view of {} ({} source(s) failed)",
            period,
            view.failures.len()
        );
    }
    let content = export_month(&view, format)?;

    match output {
        Some(path) => {
            std::fs::write(path, &content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "✅ Exported {} transactions to {}",
                view.transactions.len(),
                path.display()
            );
        }
        None => print!("{}", content),
    }
    Ok(())
}
