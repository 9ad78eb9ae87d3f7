//! Runway CLI - Recurring projection and balance tracker
//!
//! Usage:
//!   runway init                  Initialize database
//!   runway rules add ...         Add a monthly recurring rule
//!   runway month 2024-05         Merged view of a month
//!   runway project 2024-12-31    Projected balance at a date
//!   runway serve --port 3000     Start web server

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use chrono::Duration;
use clap::Parser;
use runway_core::{
    EntryStatus, InstallmentPurchase, NewLedgerEntry, NewRecurringRule, Period, RunwayConfig,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;
use commands::today;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = RunwayConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    let db_path = cli.db.clone().unwrap_or_else(|| config.db_path());
    let no_encrypt = cli.no_encrypt || !config.database.encrypt;
    let owner = cli.owner.clone().unwrap_or_else(|| config.owner.clone());
    let json = cli.json;
    tracing::debug!(
        db = %db_path.display(),
        owner = %owner,
        encrypted = !no_encrypt,
        "Resolved configuration"
    );

    let engine = match &cli.command {
        Commands::Init => return commands::cmd_init(&db_path, no_encrypt, &owner),
        Commands::Serve { port, host } => {
            let mut config = config;
            config.owner = owner;
            return commands::cmd_serve(&db_path, config, host.clone(), *port, no_encrypt).await;
        }
        _ => {
            let db = commands::open_db(&db_path, no_encrypt)?;
            commands::open_engine(db, &config.engine)
        }
    };
    let engine = &engine;
    let owner = owner.as_str();

    match cli.command {
        Commands::Init | Commands::Serve { .. } => Ok(()),
        Commands::Accounts { action } => match action.unwrap_or(AccountsAction::List) {
            AccountsAction::List => commands::cmd_accounts_list(engine, owner, json).await,
            AccountsAction::Add { name, opening } => {
                commands::cmd_accounts_add(engine, owner, &name, opening).await
            }
        },
        Commands::Cards { action } => match action.unwrap_or(CardsAction::List) {
            CardsAction::List => commands::cmd_cards_list(engine, owner, json).await,
            CardsAction::Add {
                name,
                closing_day,
                due_day,
                pay_from,
            } => {
                commands::cmd_cards_add(engine, owner, &name, closing_day, due_day, pay_from).await
            }
        },
        Commands::Categories { action } => match action.unwrap_or(CategoriesAction::List) {
            CategoriesAction::List => commands::cmd_categories_list(engine, owner, json).await,
            CategoriesAction::Add { name } => {
                commands::cmd_categories_add(engine, owner, &name).await
            }
        },
        Commands::Rules { action } => match action.unwrap_or(RulesAction::List { all: false }) {
            RulesAction::List { all } => commands::cmd_rules_list(engine, owner, all, json).await,
            RulesAction::Show { id } => commands::cmd_rules_show(engine, owner, id, json).await,
            RulesAction::Add {
                description,
                amount,
                kind,
                target,
                day,
                start,
                end,
                category,
                note,
            } => {
                let new = NewRecurringRule {
                    description,
                    amount,
                    kind,
                    category_id: category,
                    target: target.target()?,
                    day_of_month: day,
                    start_date: start,
                    end_date: end,
                    note,
                };
                commands::cmd_rules_add(engine, owner, &new).await
            }
            RulesAction::Pause { id } => {
                commands::cmd_rules_set_active(engine, owner, id, false).await
            }
            RulesAction::Resume { id } => {
                commands::cmd_rules_set_active(engine, owner, id, true).await
            }
            RulesAction::Delete { id } => commands::cmd_rules_delete(engine, owner, id).await,
        },
        Commands::Entries { action } => match action.unwrap_or(EntriesAction::List {
            month: None,
            account: None,
            card: None,
            status: None,
        }) {
            EntriesAction::List {
                month,
                account,
                card,
                status,
            } => commands::cmd_entries_list(engine, owner, month, account, card, status, json).await,
            EntriesAction::Add {
                description,
                amount,
                kind,
                target,
                date,
                pending,
                category,
                note,
            } => {
                let status = if pending {
                    EntryStatus::Pending
                } else {
                    EntryStatus::Confirmed
                };
                let mut new = NewLedgerEntry::manual(
                    description,
                    amount,
                    date.unwrap_or_else(today),
                    kind,
                    target.target()?,
                    status,
                );
                new.category_id = category;
                new.note = note;
                commands::cmd_entries_add(engine, owner, &new).await
            }
            EntriesAction::Installments {
                description,
                total,
                count,
                card,
                first_date,
                category,
            } => {
                let purchase = InstallmentPurchase {
                    description,
                    total_amount: total,
                    installments: count,
                    first_date: first_date.unwrap_or_else(today),
                    card_id: card,
                    category_id: category,
                    note: None,
                };
                commands::cmd_entries_installments(engine, owner, &purchase).await
            }
            EntriesAction::Confirm { id } => commands::cmd_entries_confirm(engine, owner, id).await,
            EntriesAction::Delete { id } => commands::cmd_entries_delete(engine, owner, id).await,
        },
        Commands::Month { period } => {
            let period = period.unwrap_or_else(|| Period::of(today()));
            commands::cmd_month(engine, owner, period, json).await
        }
        Commands::Confirm { rule_id, date } => {
            commands::cmd_confirm(engine, owner, rule_id, date, json).await
        }
        Commands::Adjust {
            rule_id,
            month,
            mode,
            amount,
            note,
        } => commands::cmd_adjust(engine, owner, rule_id, month, mode, amount, note, json).await,
        Commands::Balance { as_of, accounts } => {
            let as_of = as_of.unwrap_or_else(today);
            commands::cmd_balance(engine, owner, &accounts, as_of, json).await
        }
        Commands::Project {
            horizon,
            from,
            accounts,
        } => {
            let from = from.unwrap_or_else(today);
            commands::cmd_project(engine, owner, &accounts, from, horizon, json).await
        }
        Commands::Indicators { period } => {
            let period = period.unwrap_or_else(|| Period::of(today()));
            commands::cmd_indicators(engine, owner, period, json).await
        }
        Commands::Invoices { action } => match action.unwrap_or(InvoicesAction::List {
            card: None,
            status: None,
        }) {
            InvoicesAction::List { card, status } => {
                commands::cmd_invoices_list(engine, owner, card, status, json).await
            }
            InvoicesAction::Open { card_id, month } => {
                let period = month.unwrap_or_else(|| Period::of(today()));
                commands::cmd_invoices_open(engine, owner, card_id, period).await
            }
            InvoicesAction::Preview { id } => {
                commands::cmd_invoices_preview(engine, owner, id, json).await
            }
            InvoicesAction::Close { as_of } => {
                let as_of = as_of.unwrap_or_else(today);
                commands::cmd_invoices_close(engine, owner, as_of, json).await
            }
            InvoicesAction::Pay {
                id,
                from_account,
                date,
            } => {
                let date = date.unwrap_or_else(today);
                commands::cmd_invoices_pay(engine, owner, id, from_account, date).await
            }
        },
        Commands::Upcoming { days, from, to } => {
            let (from, to) = match (from, to) {
                (Some(from), Some(to)) => (from, to),
                _ => {
                    let from = today();
                    (from, from + Duration::days(i64::from(days)))
                }
            };
            commands::cmd_upcoming(engine, owner, from, to, json).await
        }
        Commands::Export {
            period,
            format,
            output,
        } => commands::cmd_export(engine, owner, period, format, output.as_deref()).await,
    }
}
