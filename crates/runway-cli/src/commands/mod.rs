//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, open_engine)
//! - `reference` - Accounts, cards and categories
//! - `rules` - Recurring rules, confirmation and adjustments
//! - `entries` - Manual entries and installment purchases
//! - `month` - Month view, upcoming obligations and export
//! - `balances` - Current/projected balance and indicators
//! - `invoices` - Card invoice commands (open, preview, close, pay)
//! - `serve` - Web server command

pub mod balances;
pub mod core;
pub mod entries;
pub mod invoices;
pub mod month;
pub mod reference;
pub mod rules;
pub mod serve;

// Re-export command functions for main.rs
pub use balances::*;
pub use core::*;
pub use entries::*;
pub use invoices::*;
pub use month::*;
pub use reference::*;
pub use rules::*;
pub use serve::*;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Amount rounded to cents for display
pub fn money(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
