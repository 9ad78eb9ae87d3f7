//! Recurring rule commands, confirmation and adjustments

use anyhow::Result;
use chrono::NaiveDate;
use runway_core::{
    Adjustment, AdjustmentMode, AdjustmentOutcome, Engine, NewRecurringRule, Period,
    RecurringRule,
};
use rust_decimal::Decimal;

use super::{money, print_json, truncate};

fn print_rule_line(rule: &RecurringRule) {
    let status = if rule.active { "▶" } else { "⏸" };
    let ends = rule
        .end_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "open".to_string());
    println!(
        "   {} #{:<4} {:24} │ {:>10} {:12} │ day {:>2} │ {} → {} │ {}",
        status,
        rule.id,
        truncate(&rule.description, 24),
        money(rule.amount),
        rule.kind.as_str(),
        rule.day_of_month,
        rule.start_date,
        ends,
        rule.target
    );
}

pub async fn cmd_rules_list(engine: &Engine, owner: &str, all: bool, json: bool) -> Result<()> {
    let rules = engine.rules(owner, !all).await?;
    if json {
        return print_json(&rules);
    }

    if rules.is_empty() {
        println!("No recurring rules. Add one with:");
        println!("  runway rules add Rent -a 1200 -k expense --account 1 --day 5 --start 2024-01-01");
        return Ok(());
    }

    println!();
    println!("🔁 Recurring Rules");
    println!("   ─────────────────────────────────────────────────────────────");
    for rule in &rules {
        print_rule_line(rule);
    }
    Ok(())
}

pub async fn cmd_rules_show(engine: &Engine, owner: &str, id: i64, json: bool) -> Result<()> {
    let rule = engine.rule(owner, id).await?;
    if json {
        return print_json(&rule);
    }

    println!();
    print_rule_line(&rule);
    if let Some(note) = &rule.note {
        println!("     note: {}", note);
    }
    if !rule.revisions.is_empty() {
        println!("     Amount history:");
        for revision in &rule.revisions {
            println!(
                "       before {}: {}",
                revision.effective_from,
                money(revision.previous_amount)
            );
        }
        println!("       current: {}", money(rule.amount));
    }
    Ok(())
}

pub async fn cmd_rules_add(engine: &Engine, owner: &str, new: &NewRecurringRule) -> Result<()> {
    let rule = engine.create_rule(owner, new).await?;
    println!(
        "✅ Rule #{} '{}' created: {} {} on day {}",
        rule.id,
        rule.description,
        rule.kind,
        money(rule.amount),
        rule.day_of_month
    );
    Ok(())
}

pub async fn cmd_rules_set_active(
    engine: &Engine,
    owner: &str,
    id: i64,
    active: bool,
) -> Result<()> {
    let rule = engine.set_rule_active(owner, id, active).await?;
    if rule.active {
        println!("▶ Rule #{} '{}' resumed", rule.id, rule.description);
    } else {
        println!("⏸ Rule #{} '{}' paused", rule.id, rule.description);
    }
    Ok(())
}

pub async fn cmd_rules_delete(engine: &Engine, owner: &str, id: i64) -> Result<()> {
    engine.delete_rule(owner, id).await?;
    println!("🗑  Rule #{} deleted (its ledger entries are kept)", id);
    Ok(())
}

pub async fn cmd_confirm(
    engine: &Engine,
    owner: &str,
    rule_id: i64,
    date: Option<NaiveDate>,
    json: bool,
) -> Result<()> {
    let entry = engine.confirm(owner, rule_id, date).await?;
    if json {
        return print_json(&entry);
    }
    println!(
        "✅ Confirmed '{}' on {}: {} (entry #{})",
        entry.description,
        entry.date,
        money(entry.signed_amount()),
        entry.id
    );
    Ok(())
}

pub async fn cmd_adjust(
    engine: &Engine,
    owner: &str,
    rule_id: i64,
    period: Period,
    mode: AdjustmentMode,
    amount: Option<Decimal>,
    note: Option<String>,
    json: bool,
) -> Result<()> {
    let adjustment = Adjustment {
        mode,
        rule_id,
        period,
        amount,
        note,
    };
    let outcome = engine.apply_adjustment(owner, &adjustment).await?;
    if json {
        return print_json(&outcome);
    }

    match outcome {
        AdjustmentOutcome::Entry(entry) if mode == AdjustmentMode::Skip => {
            println!(
                "⏭  Rule #{} skipped for {} (entry #{})",
                rule_id, period, entry.id
            );
        }
        AdjustmentOutcome::Entry(entry) => {
            println!(
                "✏️  Rule #{} set to {} for {} only (pending entry #{})",
                rule_id,
                money(entry.amount),
                period,
                entry.id
            );
        }
        AdjustmentOutcome::Rule(rule) => {
            println!(
                "✏️  Rule #{} now {} from {} onward",
                rule.id,
                money(rule.amount),
                period
            );
        }
    }
    Ok(())
}
