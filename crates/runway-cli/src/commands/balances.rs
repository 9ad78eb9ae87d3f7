//! Balance and indicator commands

use anyhow::Result;
use chrono::NaiveDate;
use runway_core::{Engine, PartialFailure, Period};

use super::{money, print_json, truncate};

fn print_failures(failures: &[PartialFailure]) {
    if failures.is_empty() {
        return;
    }
    println!();
    println!("   ⚠️  Partial result, some sources counted as zero:");
    for failure in failures {
        println!("      - {}: {}", failure.source, failure.message);
    }
}

pub async fn cmd_balance(
    engine: &Engine,
    owner: &str,
    accounts: &[i64],
    as_of: NaiveDate,
    json: bool,
) -> Result<()> {
    let report = engine.current_balance(owner, accounts, as_of).await?;
    if json {
        return print_json(&report);
    }

    println!();
    println!("💰 Balance as of {}", report.as_of);
    println!("   ─────────────────────────────────────────");
    for account in &report.accounts {
        let marker = if account.partial { " ⚠️" } else { "" };
        println!(
            "   #{:<4} {:24} │ {:>12}{}",
            account.account_id,
            truncate(&account.name, 24),
            money(account.balance),
            marker
        );
    }
    println!("   ─────────────────────────────────────────");
    println!("   Total{:26}{:>12}", "", money(report.total));
    print_failures(&report.failures);
    Ok(())
}

pub async fn cmd_project(
    engine: &Engine,
    owner: &str,
    accounts: &[i64],
    from: NaiveDate,
    horizon: NaiveDate,
    json: bool,
) -> Result<()> {
    let projection = engine
        .projected_balance(owner, accounts, from, horizon)
        .await?;
    if json {
        return print_json(&projection);
    }

    println!();
    println!("🔭 Projected balance {} → {}", projection.from, projection.horizon);
    println!("   ─────────────────────────────────────────");
    println!("   Opening balances      {:>14}", money(projection.opening));
    println!("   Confirmed entries     {:>14}", money(projection.confirmed));
    println!("   Pending entries       {:>14}", money(projection.pending));
    println!("   Recurring (projected) {:>14}", money(projection.recurring));
    println!("   Card invoices due     {:>14}", money(-projection.invoices));
    println!("   Other card charges    {:>14}", money(-projection.card_charges));
    println!("   ─────────────────────────────────────────");
    println!("   Projected             {:>14}", money(projection.projected));
    print_failures(&projection.failures);
    Ok(())
}

pub async fn cmd_indicators(engine: &Engine, owner: &str, period: Period, json: bool) -> Result<()> {
    let indicators = engine.consolidated_indicators(owner, period).await?;
    if json {
        return print_json(&indicators);
    }

    println!();
    println!("📊 Indicators for {}", indicators.period);
    println!("   ─────────────────────────────────────────────────────────");
    println!(
        "   {:10} {:>12} {:>12} {:>12} {:>12}",
        "", "confirmed", "pending", "projected", "total"
    );
    for (label, flow) in [("Income", &indicators.income), ("Expense", &indicators.expense)] {
        println!(
            "   {:10} {:>12} {:>12} {:>12} {:>12}",
            label,
            money(flow.confirmed),
            money(flow.pending),
            money(flow.projected_recurring),
            money(flow.total)
        );
    }
    println!("   ─────────────────────────────────────────────────────────");
    println!("   Opening balance        {:>12}", money(indicators.opening_balance));
    println!("   Net flow               {:>12}", money(indicators.net_flow));
    println!(
        "   Savings rate           {:>11.1}%",
        indicators.savings_rate * rust_decimal::Decimal::ONE_HUNDRED
    );
    println!(
        "   Projected closing      {:>12}",
        money(indicators.projected_closing_balance)
    );
    print_failures(&indicators.failures);
    Ok(())
}
