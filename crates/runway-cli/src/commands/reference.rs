//! Account, card and category commands

use anyhow::Result;
use runway_core::{Engine, NewAccount, NewCard};
use rust_decimal::Decimal;

use super::{money, print_json, truncate};

pub async fn cmd_accounts_list(engine: &Engine, owner: &str, json: bool) -> Result<()> {
    let accounts = engine.accounts(owner).await?;
    if json {
        return print_json(&accounts);
    }

    if accounts.is_empty() {
        println!("No accounts yet. Add one with:");
        println!("  runway accounts add Checking --opening 1500");
        return Ok(());
    }

    println!();
    println!("🏦 Accounts");
    println!("   ─────────────────────────────────────────");
    for account in accounts {
        println!(
            "   #{:<4} {:24} │ opening {:>12}",
            account.id,
            truncate(&account.name, 24),
            money(account.opening_balance)
        );
    }
    Ok(())
}

pub async fn cmd_accounts_add(
    engine: &Engine,
    owner: &str,
    name: &str,
    opening: Decimal,
) -> Result<()> {
    let account = engine
        .create_account(
            owner,
            &NewAccount {
                name: name.to_string(),
                opening_balance: opening,
            },
        )
        .await?;
    println!(
        "✅ Account #{} '{}' created (opening {})",
        account.id,
        account.name,
        money(account.opening_balance)
    );
    Ok(())
}

pub async fn cmd_cards_list(engine: &Engine, owner: &str, json: bool) -> Result<()> {
    let cards = engine.cards(owner).await?;
    if json {
        return print_json(&cards);
    }

    if cards.is_empty() {
        println!("No cards yet. Add one with:");
        println!("  runway cards add Visa --closing-day 20 --due-day 28 --pay-from 1");
        return Ok(());
    }

    println!();
    println!("💳 Cards");
    println!("   ─────────────────────────────────────────");
    for card in cards {
        let pay_from = card
            .payment_account_id
            .map(|id| format!("account #{}", id))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "   #{:<4} {:20} │ closes {:>2} │ due {:>2} │ paid from {}",
            card.id,
            truncate(&card.name, 20),
            card.closing_day,
            card.due_day,
            pay_from
        );
    }
    Ok(())
}

pub async fn cmd_cards_add(
    engine: &Engine,
    owner: &str,
    name: &str,
    closing_day: u32,
    due_day: u32,
    pay_from: Option<i64>,
) -> Result<()> {
    let card = engine
        .create_card(
            owner,
            &NewCard {
                name: name.to_string(),
                closing_day,
                due_day,
                payment_account_id: pay_from,
            },
        )
        .await?;
    println!(
        "✅ Card #{} '{}' created (closes on {}, due on {})",
        card.id, card.name, card.closing_day, card.due_day
    );
    Ok(())
}

pub async fn cmd_categories_list(engine: &Engine, owner: &str, json: bool) -> Result<()> {
    let categories = engine.categories(owner).await?;
    if json {
        return print_json(&categories);
    }

    if categories.is_empty() {
        println!("No categories yet.");
        return Ok(());
    }
    for category in categories {
        println!("   #{:<4} {}", category.id, category.name);
    }
    Ok(())
}

pub async fn cmd_categories_add(engine: &Engine, owner: &str, name: &str) -> Result<()> {
    let category = engine.upsert_category(owner, name).await?;
    println!("✅ Category #{} '{}'", category.id, category.name);
    Ok(())
}
