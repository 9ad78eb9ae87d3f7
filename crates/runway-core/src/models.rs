//! Domain models for Runway

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::period::Period;

/// What a rule or entry does to cash: money in, money out of an account, or a
/// charge on a card that is paid later through its invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Income,
    Expense,
    CardExpense,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::CardExpense => "card_expense",
        }
    }

    pub fn is_card(&self) -> bool {
        matches!(self, Self::CardExpense)
    }

    /// Apply the kind's sign to a non-negative magnitude
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            Self::Income => amount,
            Self::Expense | Self::CardExpense => -amount,
        }
    }
}

impl std::str::FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "card_expense" | "card" => Ok(Self::CardExpense),
            _ => Err(format!("Unknown entry kind: {}", s)),
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an entry lands: a bank account or a credit card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Account(i64),
    Card(i64),
}

impl Target {
    pub fn account_id(&self) -> Option<i64> {
        match self {
            Self::Account(id) => Some(*id),
            Self::Card(_) => None,
        }
    }

    pub fn card_id(&self) -> Option<i64> {
        match self {
            Self::Card(id) => Some(*id),
            Self::Account(_) => None,
        }
    }

    /// Rebuild from the two nullable storage columns
    pub fn from_columns(account_id: Option<i64>, card_id: Option<i64>) -> Option<Self> {
        match (account_id, card_id) {
            (Some(a), None) => Some(Self::Account(a)),
            (None, Some(c)) => Some(Self::Card(c)),
            _ => None,
        }
    }

    /// Card-expense must target a card; income and expense must target an account
    pub fn validate_for(&self, kind: EntryKind) -> Result<()> {
        match (kind, self) {
            (EntryKind::CardExpense, Self::Card(_)) => Ok(()),
            (EntryKind::CardExpense, Self::Account(_)) => Err(Error::Validation(
                "card_expense requires a card target, not an account".to_string(),
            )),
            (_, Self::Card(_)) => Err(Error::Validation(format!(
                "{} requires an account target, not a card",
                kind
            ))),
            (_, Self::Account(_)) => Ok(()),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account(id) => write!(f, "account #{}", id),
            Self::Card(id) => write!(f, "card #{}", id),
        }
    }
}

/// Settlement status of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Confirmed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
        }
    }
}

impl std::str::FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            _ => Err(format!("Unknown entry status: {}", s)),
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How an entry came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Typed in by the user
    Manual,
    /// Confirmed occurrence of a recurring rule
    Recurring,
    /// One-month amount override of a recurring rule
    RecurringAdjustment,
    /// Zero-amount marker suppressing a recurring rule for one month
    RecurringSkip,
    /// Card invoice liability or its payment
    Invoice,
    /// Projected, never persisted
    RecurringVirtual,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Recurring => "recurring",
            Self::RecurringAdjustment => "recurring_adjustment",
            Self::RecurringSkip => "recurring_skip",
            Self::Invoice => "invoice",
            Self::RecurringVirtual => "recurring_virtual",
        }
    }

    /// Origins that realize a rule for a month. At most one per (rule, month).
    pub const REALIZATIONS: [Origin; 3] = [
        Origin::Recurring,
        Origin::RecurringAdjustment,
        Origin::RecurringSkip,
    ];

    pub fn is_realization(&self) -> bool {
        Self::REALIZATIONS.contains(self)
    }
}

impl std::str::FromStr for Origin {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "manual" => Ok(Self::Manual),
            "recurring" => Ok(Self::Recurring),
            "recurring_adjustment" => Ok(Self::RecurringAdjustment),
            "recurring_skip" => Ok(Self::RecurringSkip),
            "invoice" => Ok(Self::Invoice),
            "recurring_virtual" => Ok(Self::RecurringVirtual),
            _ => Err(format!("Unknown entry origin: {}", s)),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reject negative amounts, and zero unless explicitly allowed
pub(crate) fn validate_amount(amount: Decimal, allow_zero: bool) -> Result<()> {
    if amount < Decimal::ZERO || (!allow_zero && amount.is_zero()) {
        return Err(Error::Validation(format!(
            "amount must be greater than zero, got {}",
            amount
        )));
    }
    Ok(())
}

// ========== Reference data ==========

/// A bank account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub owner: String,
    pub name: String,
    pub opening_balance: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub name: String,
    #[serde(default)]
    pub opening_balance: Decimal,
}

/// A credit card with a monthly billing cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub owner: String,
    pub name: String,
    /// Day of month the statement closes (clamped in short months)
    pub closing_day: u32,
    /// Day of month the invoice is due
    pub due_day: u32,
    /// Account the invoice is paid from
    pub payment_account_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Card {
    /// Closing and due dates of the invoice for `period`. A due day earlier
    /// than the closing day rolls into the following month.
    pub fn invoice_dates(&self, period: Period) -> (NaiveDate, NaiveDate) {
        let closing = period.clamp_day(self.closing_day);
        let due = if self.due_day >= self.closing_day {
            period.clamp_day(self.due_day)
        } else {
            period.succ().clamp_day(self.due_day)
        };
        (closing, due)
    }

    /// Billing window of the invoice for `period` as `(exclusive start,
    /// inclusive end)`. The start is the previous month's closing date, so
    /// consecutive windows of a card never overlap even when the closing day
    /// is clamped.
    pub fn billing_window(&self, period: Period) -> (NaiveDate, NaiveDate) {
        (
            period.pred().clamp_day(self.closing_day),
            period.clamp_day(self.closing_day),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCard {
    pub name: String,
    pub closing_day: u32,
    pub due_day: u32,
    pub payment_account_id: Option<i64>,
}

impl NewCard {
    pub fn validate(&self) -> Result<()> {
        validate_day("closing_day", self.closing_day)?;
        validate_day("due_day", self.due_day)
    }
}

/// Spending/income category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub owner: String,
    pub name: String,
}

fn validate_day(field: &str, day: u32) -> Result<()> {
    if !(1..=31).contains(&day) {
        return Err(Error::Validation(format!(
            "{} must be between 1 and 31, got {}",
            field, day
        )));
    }
    Ok(())
}

// ========== Recurring rules ==========

/// Record of a from-now-on amount change. Months before `effective_from`
/// keep materializing at `previous_amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountRevision {
    pub effective_from: Period,
    pub previous_amount: Decimal,
}

/// A monthly-repeating obligation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringRule {
    pub id: i64,
    pub owner: String,
    pub description: String,
    /// Current amount (applies from the latest revision onward)
    pub amount: Decimal,
    pub kind: EntryKind,
    pub category_id: Option<i64>,
    pub target: Target,
    pub day_of_month: u32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub active: bool,
    pub note: Option<String>,
    /// Sorted by `effective_from`
    #[serde(default)]
    pub revisions: Vec<AmountRevision>,
    pub created_at: DateTime<Utc>,
}

impl RecurringRule {
    /// The date this rule falls due in `period`, or None when the clamped
    /// date lies outside the rule's validity range
    pub fn occurrence_date(&self, period: Period) -> Option<NaiveDate> {
        if !period.overlaps(self.start_date, self.end_date) {
            return None;
        }
        let date = period.clamp_day(self.day_of_month);
        if date < self.start_date {
            return None;
        }
        if let Some(end) = self.end_date {
            if date > end {
                return None;
            }
        }
        Some(date)
    }

    /// Amount in force for `period`, honoring from-now-on revisions
    pub fn amount_for(&self, period: Period) -> Decimal {
        self.revisions
            .iter()
            .filter(|r| r.effective_from > period)
            .min_by_key(|r| r.effective_from)
            .map(|r| r.previous_amount)
            .unwrap_or(self.amount)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecurringRule {
    pub description: String,
    pub amount: Decimal,
    pub kind: EntryKind,
    pub category_id: Option<i64>,
    pub target: Target,
    pub day_of_month: u32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub note: Option<String>,
}

impl NewRecurringRule {
    pub fn validate(&self) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(Error::Validation("description is required".to_string()));
        }
        validate_amount(self.amount, false)?;
        validate_day("day_of_month", self.day_of_month)?;
        self.target.validate_for(self.kind)?;
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(Error::Validation(format!(
                    "end date {} is before start date {}",
                    end, self.start_date
                )));
            }
        }
        Ok(())
    }
}

// ========== Ledger ==========

/// Position of an entry within an installment purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub index: u32,
    pub total: u32,
    pub group_id: String,
}

/// A real, persisted transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub owner: String,
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub kind: EntryKind,
    pub category_id: Option<i64>,
    pub target: Target,
    pub status: EntryStatus,
    pub origin: Origin,
    pub rule_id: Option<i64>,
    pub installment: Option<Installment>,
    pub invoice_id: Option<i64>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn signed_amount(&self) -> Decimal {
        self.kind.signed(self.amount)
    }

    /// Whether this entry realizes `rule_id` in `period`
    pub fn realizes(&self, rule_id: i64, period: Period) -> bool {
        self.rule_id == Some(rule_id) && self.origin.is_realization() && period.contains(self.date)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub kind: EntryKind,
    pub category_id: Option<i64>,
    pub target: Target,
    pub status: EntryStatus,
    pub origin: Origin,
    pub rule_id: Option<i64>,
    pub installment: Option<Installment>,
    pub invoice_id: Option<i64>,
    pub note: Option<String>,
}

impl NewLedgerEntry {
    /// A manual entry with no rule or invoice link
    pub fn manual(
        description: impl Into<String>,
        amount: Decimal,
        date: NaiveDate,
        kind: EntryKind,
        target: Target,
        status: EntryStatus,
    ) -> Self {
        Self {
            description: description.into(),
            amount,
            date,
            kind,
            category_id: None,
            target,
            status,
            origin: Origin::Manual,
            rule_id: None,
            installment: None,
            invoice_id: None,
            note: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.origin == Origin::RecurringVirtual {
            return Err(Error::Validation(
                "virtual occurrences are never persisted".to_string(),
            ));
        }
        // Skip markers are the only zero-amount entries
        validate_amount(self.amount, self.origin == Origin::RecurringSkip)?;
        self.target.validate_for(self.kind)?;
        if self.origin.is_realization() && self.rule_id.is_none() {
            return Err(Error::Validation(format!(
                "{} entries must link to a rule",
                self.origin
            )));
        }
        if let Some(inst) = &self.installment {
            if inst.total == 0 || inst.index == 0 || inst.index > inst.total {
                return Err(Error::Validation(format!(
                    "invalid installment {}/{}",
                    inst.index, inst.total
                )));
            }
        }
        Ok(())
    }
}

/// Partial update applied to a stored entry
#[derive(Debug, Clone, Default)]
pub struct LedgerEntryUpdate {
    pub amount: Option<Decimal>,
    pub status: Option<EntryStatus>,
    pub origin: Option<Origin>,
    pub note: Option<String>,
    pub invoice_id: Option<i64>,
}

// ========== Invoices ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Open,
    Closed,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Paid => "paid",
        }
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            "paid" => Ok(Self::Paid),
            _ => Err(format!("Unknown invoice status: {}", s)),
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A card billing period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub owner: String,
    pub card_id: i64,
    pub period: Period,
    /// Previous month's closing date; charges strictly after it belong here
    pub window_start: NaiveDate,
    pub closing_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    /// Frozen at closing; last computed value while open
    pub total: Decimal,
    pub closed_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Invoice {
    /// Billing window as `(exclusive start, inclusive end)`
    pub fn billing_window(&self) -> (NaiveDate, NaiveDate) {
        (self.window_start, self.closing_date)
    }

    /// Whether a card charge dated `date` belongs to this invoice
    pub fn covers(&self, date: NaiveDate) -> bool {
        let (start, end) = self.billing_window();
        date > start && date <= end
    }

    /// Closed or paid invoices have a frozen total that subsumes their charges
    pub fn is_settled_total(&self) -> bool {
        matches!(self.status, InvoiceStatus::Closed | InvoiceStatus::Paid)
    }
}
