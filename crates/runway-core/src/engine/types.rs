//! Engine result types: month views, virtual occurrences, balances

use std::fmt;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{
    validate_amount, EntryKind, EntryStatus, Installment, Invoice, LedgerEntry, Origin,
    RecurringRule, Target,
};
use crate::period::Period;

/// Currency scale applied at the output boundary
pub(crate) const CURRENCY_DP: u32 = 2;

/// Stable identity of a virtual occurrence: one rule, one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OccurrenceKey {
    pub rule_id: i64,
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl OccurrenceKey {
    pub fn new(rule_id: i64, date: NaiveDate) -> Self {
        use chrono::Datelike;
        Self {
            rule_id,
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }
}

impl fmt::Display for OccurrenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rule-{}@{:04}-{:02}-{:02}",
            self.rule_id, self.year, self.month, self.day
        )
    }
}

/// A rule projected into one month; never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualOccurrence {
    pub key: OccurrenceKey,
    pub rule_id: i64,
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub kind: EntryKind,
    pub category_id: Option<i64>,
    pub target: Target,
    pub note: Option<String>,
}

impl VirtualOccurrence {
    pub(crate) fn from_rule(rule: &RecurringRule, date: NaiveDate) -> Self {
        Self {
            key: OccurrenceKey::new(rule.id, date),
            rule_id: rule.id,
            description: rule.description.clone(),
            amount: rule.amount_for(Period::of(date)),
            date,
            kind: rule.kind,
            category_id: rule.category_id,
            target: rule.target,
            note: rule.note.clone(),
        }
    }

    pub fn signed_amount(&self) -> Decimal {
        self.kind.signed(self.amount)
    }
}

/// Where a merged transaction came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "source", content = "id", rename_all = "snake_case")]
pub enum TransactionId {
    Ledger(i64),
    Virtual(OccurrenceKey),
    /// Consolidated liability of a closed card invoice
    Invoice(i64),
}

/// One row of a month view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub kind: EntryKind,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub target: Target,
    pub target_name: Option<String>,
    pub status: EntryStatus,
    pub origin: Origin,
    pub rule_id: Option<i64>,
    pub installment: Option<Installment>,
    pub invoice_id: Option<i64>,
    pub note: Option<String>,
    pub is_virtual: bool,
    /// False for card charges already folded into a closed invoice's total
    pub counts_toward_totals: bool,
}

impl Transaction {
    pub fn signed_amount(&self) -> Decimal {
        self.kind.signed(self.amount)
    }

    pub fn is_invoice_liability(&self) -> bool {
        matches!(self.id, TransactionId::Invoice(_))
    }

    /// Liability row for a closed invoice, shown on its due date
    pub(crate) fn invoice_liability(invoice: &Invoice) -> Self {
        Self {
            id: TransactionId::Invoice(invoice.id),
            description: format!("Card invoice {}", invoice.period),
            amount: invoice.total,
            date: invoice.due_date,
            kind: EntryKind::Expense,
            category_id: None,
            category_name: None,
            target: Target::Card(invoice.card_id),
            target_name: None,
            status: EntryStatus::Pending,
            origin: Origin::Invoice,
            rule_id: None,
            installment: None,
            invoice_id: Some(invoice.id),
            note: None,
            is_virtual: false,
            counts_toward_totals: true,
        }
    }
}

impl From<LedgerEntry> for Transaction {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: TransactionId::Ledger(entry.id),
            description: entry.description,
            amount: entry.amount,
            date: entry.date,
            kind: entry.kind,
            category_id: entry.category_id,
            category_name: None,
            target: entry.target,
            target_name: None,
            status: entry.status,
            origin: entry.origin,
            rule_id: entry.rule_id,
            installment: entry.installment,
            invoice_id: entry.invoice_id,
            note: entry.note,
            is_virtual: false,
            counts_toward_totals: true,
        }
    }
}

impl From<VirtualOccurrence> for Transaction {
    fn from(v: VirtualOccurrence) -> Self {
        Self {
            id: TransactionId::Virtual(v.key),
            description: v.description,
            amount: v.amount,
            date: v.date,
            kind: v.kind,
            category_id: v.category_id,
            category_name: None,
            target: v.target,
            target_name: None,
            status: EntryStatus::Pending,
            origin: Origin::RecurringVirtual,
            rule_id: Some(v.rule_id),
            installment: None,
            invoice_id: None,
            note: v.note,
            is_virtual: true,
            counts_toward_totals: true,
        }
    }
}

/// A sub-fetch that failed while building an aggregate; its contribution was
/// taken as zero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialFailure {
    pub source: String,
    pub message: String,
}

impl PartialFailure {
    pub(crate) fn new(source: impl Into<String>, err: &Error) -> Self {
        Self {
            source: source.into(),
            message: err.to_string(),
        }
    }
}

/// Merged, chronological (newest first) view of one month
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthView {
    pub period: Period,
    pub transactions: Vec<Transaction>,
    pub partial: bool,
    pub failures: Vec<PartialFailure>,
}

impl MonthView {
    pub fn virtuals(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|t| t.is_virtual)
    }

    /// Rows whose origin traces back to `rule_id`
    pub fn for_rule(&self, rule_id: i64) -> impl Iterator<Item = &Transaction> {
        self.transactions
            .iter()
            .filter(move |t| t.rule_id == Some(rule_id))
    }
}

/// The three one-off override semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentMode {
    /// Override the amount for the target month only
    ThisMonthOnly,
    /// Change the rule's amount from the target month onward
    FromNowOn,
    /// Suppress the target month entirely
    Skip,
}

impl AdjustmentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThisMonthOnly => "this_month_only",
            Self::FromNowOn => "from_now_on",
            Self::Skip => "skip",
        }
    }
}

impl std::str::FromStr for AdjustmentMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "this_month_only" | "this_month" | "once" => Ok(Self::ThisMonthOnly),
            "from_now_on" | "forward" => Ok(Self::FromNowOn),
            "skip" | "skip_this_month" => Ok(Self::Skip),
            _ => Err(format!("Unknown adjustment mode: {}", s)),
        }
    }
}

impl fmt::Display for AdjustmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Request to override a rule for one month (or from one month onward)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adjustment {
    pub mode: AdjustmentMode,
    pub rule_id: i64,
    pub period: Period,
    pub amount: Option<Decimal>,
    pub note: Option<String>,
}

impl Adjustment {
    /// Amount checks that need no store access
    pub fn validate(&self) -> Result<()> {
        match self.mode {
            AdjustmentMode::ThisMonthOnly | AdjustmentMode::FromNowOn => match self.amount {
                Some(amount) => validate_amount(amount, false),
                None => Err(Error::Validation(format!(
                    "{} requires an amount",
                    self.mode
                ))),
            },
            AdjustmentMode::Skip => Ok(()),
        }
    }
}

/// What an adjustment produced
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AdjustmentOutcome {
    Entry(LedgerEntry),
    Rule(RecurringRule),
}

/// Installment purchase on a card, split into monthly entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallmentPurchase {
    pub description: String,
    pub total_amount: Decimal,
    pub installments: u32,
    pub first_date: NaiveDate,
    pub card_id: i64,
    pub category_id: Option<i64>,
    pub note: Option<String>,
}

// ========== Balances ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account_id: i64,
    pub name: String,
    pub opening_balance: Decimal,
    pub balance: Decimal,
    /// This account's ledger could not be read; balance is the opening only
    pub partial: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceReport {
    pub as_of: NaiveDate,
    pub total: Decimal,
    pub accounts: Vec<AccountBalance>,
    pub partial: bool,
    pub failures: Vec<PartialFailure>,
}

impl BalanceReport {
    pub(crate) fn rounded(mut self) -> Self {
        self.total = self.total.round_dp(CURRENCY_DP);
        for account in &mut self.accounts {
            account.opening_balance = account.opening_balance.round_dp(CURRENCY_DP);
            account.balance = account.balance.round_dp(CURRENCY_DP);
        }
        self
    }
}

/// Projected cash position at `horizon`, broken down by source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectedBalance {
    pub from: NaiveDate,
    pub horizon: NaiveDate,
    pub opening: Decimal,
    /// Signed confirmed entries dated up to the horizon
    pub confirmed: Decimal,
    /// Signed pending entries dated up to the horizon
    pub pending: Decimal,
    /// Signed virtual occurrences on accounts
    pub recurring: Decimal,
    /// Unpaid invoices due by the horizon (positive = owed)
    pub invoices: Decimal,
    /// Card charges not covered by any invoice (positive = owed)
    pub card_charges: Decimal,
    pub projected: Decimal,
    pub partial: bool,
    pub failures: Vec<PartialFailure>,
}

impl ProjectedBalance {
    pub(crate) fn rounded(mut self) -> Self {
        for value in [
            &mut self.opening,
            &mut self.confirmed,
            &mut self.pending,
            &mut self.recurring,
            &mut self.invoices,
            &mut self.card_charges,
            &mut self.projected,
        ] {
            *value = value.round_dp(CURRENCY_DP);
        }
        self
    }
}

/// Income or expense for a month, by certainty
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowBreakdown {
    pub confirmed: Decimal,
    pub pending: Decimal,
    pub projected_recurring: Decimal,
    pub total: Decimal,
}

impl FlowBreakdown {
    pub(crate) fn add(&mut self, status: EntryStatus, is_virtual: bool, amount: Decimal) {
        if is_virtual {
            self.projected_recurring += amount;
        } else {
            match status {
                EntryStatus::Confirmed => self.confirmed += amount,
                EntryStatus::Pending => self.pending += amount,
            }
        }
    }

    fn finish(&mut self) {
        self.total = self.confirmed + self.pending + self.projected_recurring;
    }

    fn rounded(mut self) -> Self {
        self.confirmed = self.confirmed.round_dp(CURRENCY_DP);
        self.pending = self.pending.round_dp(CURRENCY_DP);
        self.projected_recurring = self.projected_recurring.round_dp(CURRENCY_DP);
        self.total = self.total.round_dp(CURRENCY_DP);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidatedIndicators {
    pub period: Period,
    pub opening_balance: Decimal,
    pub income: FlowBreakdown,
    pub expense: FlowBreakdown,
    pub net_flow: Decimal,
    /// net_flow / income; 0 when there is no income
    pub savings_rate: Decimal,
    pub projected_closing_balance: Decimal,
    pub partial: bool,
    pub failures: Vec<PartialFailure>,
}

impl ConsolidatedIndicators {
    pub(crate) fn compute(
        period: Period,
        opening_balance: Decimal,
        mut income: FlowBreakdown,
        mut expense: FlowBreakdown,
        failures: Vec<PartialFailure>,
    ) -> Self {
        income.finish();
        expense.finish();
        let net_flow = income.total - expense.total;
        Self {
            period,
            opening_balance: opening_balance.round_dp(CURRENCY_DP),
            net_flow: net_flow.round_dp(CURRENCY_DP),
            savings_rate: savings_rate(net_flow, income.total),
            projected_closing_balance: (opening_balance + net_flow).round_dp(CURRENCY_DP),
            income: income.rounded(),
            expense: expense.rounded(),
            partial: !failures.is_empty(),
            failures,
        }
    }
}

/// Fraction of income kept, to 4 decimal places; 0 when income is 0
pub fn savings_rate(net_flow: Decimal, income: Decimal) -> Decimal {
    if income.is_zero() {
        return Decimal::ZERO;
    }
    (net_flow / income).round_dp(4)
}

// ========== Invoices ==========

/// Outcome of one auto-close sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoCloseReport {
    pub as_of: NaiveDate,
    pub closed: Vec<Invoice>,
    pub failures: Vec<AutoCloseFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoCloseFailure {
    /// None when the scan itself could not list invoices
    pub invoice_id: Option<i64>,
    pub message: String,
}

/// Charges an invoice would freeze if it closed now
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoicePreview {
    pub invoice: Invoice,
    pub entries: Vec<LedgerEntry>,
    pub virtuals: Vec<VirtualOccurrence>,
    pub total: Decimal,
    pub computed_at: chrono::DateTime<Utc>,
}
