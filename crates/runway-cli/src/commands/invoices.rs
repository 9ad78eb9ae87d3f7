//! Card invoice commands

use anyhow::Result;
use chrono::NaiveDate;
use runway_core::{Engine, Invoice, InvoiceFilter, InvoiceStatus, Period};

use super::{money, print_json, truncate};

fn print_invoice_line(invoice: &Invoice) {
    let icon = match invoice.status {
        InvoiceStatus::Open => "📂",
        InvoiceStatus::Closed => "🔒",
        InvoiceStatus::Paid => "✅",
    };
    println!(
        "   {} #{:<4} card #{:<3} {} │ closes {} │ due {} │ {:>10} │ {}",
        icon,
        invoice.id,
        invoice.card_id,
        invoice.period,
        invoice.closing_date,
        invoice.due_date,
        money(invoice.total),
        invoice.status
    );
}

pub async fn cmd_invoices_list(
    engine: &Engine,
    owner: &str,
    card: Option<i64>,
    status: Option<InvoiceStatus>,
    json: bool,
) -> Result<()> {
    let mut filter = InvoiceFilter::new();
    if let Some(id) = card {
        filter = filter.card(id);
    }
    if let Some(status) = status {
        filter = filter.status(status);
    }
    let invoices = engine.invoices(owner, &filter).await?;
    if json {
        return print_json(&invoices);
    }

    if invoices.is_empty() {
        println!("No invoices found.");
        return Ok(());
    }

    println!();
    println!("🧾 Invoices");
    println!("   ─────────────────────────────────────────────────────────────");
    for invoice in &invoices {
        print_invoice_line(invoice);
    }
    Ok(())
}

pub async fn cmd_invoices_open(
    engine: &Engine,
    owner: &str,
    card_id: i64,
    period: Period,
) -> Result<()> {
    let invoice = engine.open_invoice(owner, card_id, period).await?;
    println!("📂 Invoice #{} for card #{} {}", invoice.id, card_id, period);
    print_invoice_line(&invoice);
    Ok(())
}

pub async fn cmd_invoices_preview(engine: &Engine, owner: &str, id: i64, json: bool) -> Result<()> {
    let preview = engine.invoice_preview(owner, id).await?;
    if json {
        return print_json(&preview);
    }

    println!();
    print_invoice_line(&preview.invoice);
    println!("   ─────────────────────────────────────────────────────────────");
    for entry in &preview.entries {
        println!(
            "     {} │ {:32} │ {:>10}",
            entry.date,
            truncate(&entry.description, 32),
            money(entry.amount)
        );
    }
    for occurrence in &preview.virtuals {
        println!(
            "   ○ {} │ {:32} │ {:>10}",
            occurrence.date,
            truncate(&occurrence.description, 32),
            money(occurrence.amount)
        );
    }
    println!("   ─────────────────────────────────────────────────────────────");
    let label = if preview.invoice.is_settled_total() {
        "Total (frozen)"
    } else {
        "Total (so far)"
    };
    println!("   {}: {}", label, money(preview.total));
    Ok(())
}

pub async fn cmd_invoices_close(
    engine: &Engine,
    owner: &str,
    as_of: NaiveDate,
    json: bool,
) -> Result<()> {
    let report = engine.auto_close_due(owner, as_of).await;
    if json {
        return print_json(&report);
    }

    if report.closed.is_empty() && report.failures.is_empty() {
        println!("No invoices due to close as of {}.", as_of);
        return Ok(());
    }
    for invoice in &report.closed {
        print_invoice_line(invoice);
    }
    for failure in &report.failures {
        match failure.invoice_id {
            Some(id) => println!("   ⚠️  Invoice #{} not closed: {}", id, failure.message),
            None => println!("   ⚠️  Scan failed: {}", failure.message),
        }
    }
    if !report.failures.is_empty() {
        anyhow::bail!("{} invoice(s) could not be closed", report.failures.len());
    }
    Ok(())
}

pub async fn cmd_invoices_pay(
    engine: &Engine,
    owner: &str,
    id: i64,
    from_account: Option<i64>,
    date: NaiveDate,
) -> Result<()> {
    let (invoice, payment) = engine.pay_invoice(owner, id, from_account, date).await?;
    println!(
        "✅ Invoice #{} paid: {} from {} on {} (entry #{})",
        invoice.id,
        money(payment.amount),
        payment.target,
        payment.date,
        payment.id
    );
    Ok(())
}
