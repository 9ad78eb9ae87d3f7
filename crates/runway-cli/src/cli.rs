//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use runway_core::export::ExportFormat;
use runway_core::{AdjustmentMode, EntryKind, EntryStatus, InvoiceStatus, Period, Target};
use rust_decimal::Decimal;

/// Runway - See where your money is headed
#[derive(Parser)]
#[command(name = "runway")]
#[command(about = "Recurring projection and balance tracker", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path (overrides config and RUNWAY_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file (defaults to ~/.config/runway/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Owner whose data to read and write (overrides config and RUNWAY_OWNER)
    #[arg(long, global = true)]
    pub owner: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set RUNWAY_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Manage bank accounts
    Accounts {
        #[command(subcommand)]
        action: Option<AccountsAction>,
    },

    /// Manage credit cards
    Cards {
        #[command(subcommand)]
        action: Option<CardsAction>,
    },

    /// Manage categories
    Categories {
        #[command(subcommand)]
        action: Option<CategoriesAction>,
    },

    /// Manage recurring rules
    Rules {
        #[command(subcommand)]
        action: Option<RulesAction>,
    },

    /// Manage ledger entries
    Entries {
        #[command(subcommand)]
        action: Option<EntriesAction>,
    },

    /// Show the merged view of a month (ledger, recurring, invoices)
    Month {
        /// Month as YYYY-MM (defaults to the current month)
        period: Option<Period>,
    },

    /// Confirm a recurring rule's occurrence as a real entry
    Confirm {
        /// Rule ID
        rule_id: i64,

        /// Settlement date (defaults to today; picks the month)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Override a rule for one month, from a month onward, or skip a month
    Adjust {
        /// Rule ID
        rule_id: i64,

        /// Month as YYYY-MM
        #[arg(short, long)]
        month: Period,

        /// this-month-only, from-now-on, or skip
        #[arg(long, default_value = "this-month-only")]
        mode: AdjustmentMode,

        /// New amount (required unless skipping)
        #[arg(short, long)]
        amount: Option<Decimal>,

        #[arg(long)]
        note: Option<String>,
    },

    /// Current balance from confirmed entries
    Balance {
        /// Balance as of this date (defaults to today)
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Restrict to these account IDs (repeatable; default all)
        #[arg(short, long = "account")]
        accounts: Vec<i64>,
    },

    /// Projected balance at a horizon date
    Project {
        /// Horizon date
        horizon: NaiveDate,

        /// Start of the projection (defaults to today)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Restrict to these account IDs (repeatable; default all)
        #[arg(short, long = "account")]
        accounts: Vec<i64>,
    },

    /// Consolidated indicators for a month
    Indicators {
        /// Month as YYYY-MM (defaults to the current month)
        period: Option<Period>,
    },

    /// Manage card invoices
    Invoices {
        #[command(subcommand)]
        action: Option<InvoicesAction>,
    },

    /// Upcoming recurring obligations
    Upcoming {
        /// Look-ahead window in days from today
        #[arg(long, default_value = "30")]
        days: u32,

        /// Explicit start date (with --to)
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,

        /// Explicit end date (with --from)
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,
    },

    /// Export a month view
    Export {
        /// Month as YYYY-MM
        period: Period,

        /// csv or json
        #[arg(short, long, default_value = "csv")]
        format: ExportFormat,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start the web server
    Serve {
        /// Port to listen on (defaults to config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to config)
        #[arg(long)]
        host: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AccountsAction {
    /// List accounts
    List,
    /// Add an account
    Add {
        /// Account name
        name: String,

        /// Opening balance
        #[arg(long, default_value = "0")]
        opening: Decimal,
    },
}

#[derive(Subcommand)]
pub enum CardsAction {
    /// List cards
    List,
    /// Add a card
    Add {
        /// Card name
        name: String,

        /// Day of month the statement closes
        #[arg(long)]
        closing_day: u32,

        /// Day of month the invoice is due
        #[arg(long)]
        due_day: u32,

        /// Account ID the invoice is paid from
        #[arg(long)]
        pay_from: Option<i64>,
    },
}

#[derive(Subcommand)]
pub enum CategoriesAction {
    /// List categories
    List,
    /// Add a category (no-op if it exists)
    Add {
        /// Category name
        name: String,
    },
}

/// Where an entry or rule lands; exactly one is required
#[derive(Args, Clone, Copy)]
#[group(required = true, multiple = false)]
pub struct TargetArgs {
    /// Account ID
    #[arg(long)]
    pub account: Option<i64>,

    /// Card ID
    #[arg(long)]
    pub card: Option<i64>,
}

impl TargetArgs {
    pub fn target(&self) -> anyhow::Result<Target> {
        match (self.account, self.card) {
            (Some(id), None) => Ok(Target::Account(id)),
            (None, Some(id)) => Ok(Target::Card(id)),
            _ => anyhow::bail!("Specify exactly one of --account or --card"),
        }
    }
}

#[derive(Subcommand)]
pub enum RulesAction {
    /// List rules
    List {
        /// Include paused rules
        #[arg(long)]
        all: bool,
    },
    /// Show one rule with its amount history
    Show {
        /// Rule ID
        id: i64,
    },
    /// Add a monthly rule
    Add {
        /// Description
        description: String,

        #[arg(short, long)]
        amount: Decimal,

        /// income, expense or card-expense
        #[arg(short, long)]
        kind: EntryKind,

        #[command(flatten)]
        target: TargetArgs,

        /// Day of month (clamped in short months)
        #[arg(long)]
        day: u32,

        /// First date the rule applies
        #[arg(long)]
        start: NaiveDate,

        /// Last date the rule applies
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Category ID
        #[arg(long)]
        category: Option<i64>,

        #[arg(long)]
        note: Option<String>,
    },
    /// Pause a rule
    Pause {
        /// Rule ID
        id: i64,
    },
    /// Resume a paused rule
    Resume {
        /// Rule ID
        id: i64,
    },
    /// Delete a rule (its ledger entries stay)
    Delete {
        /// Rule ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum EntriesAction {
    /// List entries
    List {
        /// Month as YYYY-MM
        #[arg(short, long)]
        month: Option<Period>,

        /// Account ID
        #[arg(long)]
        account: Option<i64>,

        /// Card ID
        #[arg(long)]
        card: Option<i64>,

        /// pending or confirmed
        #[arg(long)]
        status: Option<EntryStatus>,
    },
    /// Record a manual entry
    Add {
        /// Description
        description: String,

        #[arg(short, long)]
        amount: Decimal,

        /// income, expense or card-expense
        #[arg(short, long)]
        kind: EntryKind,

        #[command(flatten)]
        target: TargetArgs,

        /// Entry date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Record as pending instead of confirmed
        #[arg(long)]
        pending: bool,

        /// Category ID
        #[arg(long)]
        category: Option<i64>,

        #[arg(long)]
        note: Option<String>,
    },
    /// Split a card purchase into monthly installments
    Installments {
        /// Description
        description: String,

        /// Total purchase amount
        #[arg(long)]
        total: Decimal,

        /// Number of installments
        #[arg(short = 'n', long)]
        count: u32,

        /// Card ID
        #[arg(long)]
        card: i64,

        /// Date of the first installment (defaults to today)
        #[arg(long)]
        first_date: Option<NaiveDate>,

        /// Category ID
        #[arg(long)]
        category: Option<i64>,
    },
    /// Confirm a pending entry
    Confirm {
        /// Entry ID
        id: i64,
    },
    /// Delete an entry
    Delete {
        /// Entry ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum InvoicesAction {
    /// List invoices
    List {
        /// Card ID
        #[arg(long)]
        card: Option<i64>,

        /// open, closed or paid
        #[arg(long)]
        status: Option<InvoiceStatus>,
    },
    /// Open a card's invoice for a month
    Open {
        /// Card ID
        card_id: i64,

        /// Month as YYYY-MM (defaults to the current month)
        #[arg(short, long)]
        month: Option<Period>,
    },
    /// Show an invoice with its charges
    Preview {
        /// Invoice ID
        id: i64,
    },
    /// Close every open invoice whose closing date has passed
    Close {
        /// Reference date (defaults to today)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Pay a closed invoice
    Pay {
        /// Invoice ID
        id: i64,

        /// Account ID to pay from (defaults to the card's paying account)
        #[arg(long)]
        from_account: Option<i64>,

        /// Payment date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}
