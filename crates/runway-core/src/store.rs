//! Data store seam
//!
//! The engine never touches SQL directly; it talks to a [`Store`]. Every call
//! is scoped to an owner, and records belonging to another owner behave as if
//! they did not exist. [`Database`] is the shipped implementation; tests wrap
//! it to inject failures.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::{Database, LedgerFilter};
use crate::error::Result;
use crate::models::{
    Account, Card, Category, Invoice, InvoiceStatus, LedgerEntry, LedgerEntryUpdate, NewAccount,
    NewCard, NewLedgerEntry, NewRecurringRule, RecurringRule,
};
use crate::period::Period;

/// Invoice query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoiceFilter {
    pub card_id: Option<i64>,
    pub statuses: Option<Vec<InvoiceStatus>>,
    pub period: Option<Period>,
    pub due_from: Option<NaiveDate>,
    pub due_to: Option<NaiveDate>,
    pub closing_from: Option<NaiveDate>,
    pub closing_to: Option<NaiveDate>,
}

impl InvoiceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn card(mut self, id: i64) -> Self {
        self.card_id = Some(id);
        self
    }

    pub fn status(mut self, status: InvoiceStatus) -> Self {
        self.statuses = Some(vec![status]);
        self
    }

    pub fn statuses(mut self, statuses: &[InvoiceStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    pub fn period(mut self, period: Period) -> Self {
        self.period = Some(period);
        self
    }

    /// Due date inside `[from, to]`
    pub fn due_between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.due_from = Some(from);
        self.due_to = Some(to);
        self
    }

    pub fn due_until(mut self, to: NaiveDate) -> Self {
        self.due_to = Some(to);
        self
    }

    pub fn closing_until(mut self, to: NaiveDate) -> Self {
        self.closing_to = Some(to);
        self
    }

    /// Closing date inside `[from, to]`
    pub fn closing_between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.closing_from = Some(from);
        self.closing_to = Some(to);
        self
    }
}

/// Store-side aggregate of account-targeted ledger entries for one month
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub confirmed_income: Decimal,
    pub confirmed_expense: Decimal,
    pub pending_income: Decimal,
    pub pending_expense: Decimal,
}

/// Owner-scoped persistence used by the engine
#[async_trait]
pub trait Store: Send + Sync {
    // Reference data
    async fn accounts(&self, owner: &str) -> Result<Vec<Account>>;
    async fn account(&self, owner: &str, id: i64) -> Result<Option<Account>>;
    async fn create_account(&self, owner: &str, new: &NewAccount) -> Result<Account>;
    async fn cards(&self, owner: &str) -> Result<Vec<Card>>;
    async fn card(&self, owner: &str, id: i64) -> Result<Option<Card>>;
    async fn create_card(&self, owner: &str, new: &NewCard) -> Result<Card>;
    async fn categories(&self, owner: &str) -> Result<Vec<Category>>;
    async fn upsert_category(&self, owner: &str, name: &str) -> Result<Category>;

    // Recurring rules
    async fn rules(&self, owner: &str, active_only: bool) -> Result<Vec<RecurringRule>>;
    async fn rule(&self, owner: &str, id: i64) -> Result<Option<RecurringRule>>;
    async fn create_rule(&self, owner: &str, new: &NewRecurringRule) -> Result<RecurringRule>;
    /// Set the amount from `effective_from` onward, keeping earlier months'
    /// amount in the revision history
    async fn change_rule_amount(
        &self,
        owner: &str,
        id: i64,
        effective_from: Period,
        amount: Decimal,
    ) -> Result<RecurringRule>;
    async fn set_rule_active(&self, owner: &str, id: i64, active: bool) -> Result<RecurringRule>;
    async fn delete_rule(&self, owner: &str, id: i64) -> Result<()>;

    // Ledger
    async fn ledger_entries(&self, owner: &str, filter: &LedgerFilter)
        -> Result<Vec<LedgerEntry>>;
    async fn ledger_entry(&self, owner: &str, id: i64) -> Result<Option<LedgerEntry>>;
    /// Must fail with `Error::Conflict` on a second realization of a rule in
    /// the same month
    async fn create_ledger_entry(&self, owner: &str, new: &NewLedgerEntry) -> Result<LedgerEntry>;
    /// All-or-nothing batch insert
    async fn create_ledger_entries(
        &self,
        owner: &str,
        entries: &[NewLedgerEntry],
    ) -> Result<Vec<LedgerEntry>>;
    async fn update_ledger_entry(
        &self,
        owner: &str,
        id: i64,
        update: &LedgerEntryUpdate,
    ) -> Result<LedgerEntry>;
    async fn delete_ledger_entry(&self, owner: &str, id: i64) -> Result<()>;

    // Invoices
    async fn invoices(&self, owner: &str, filter: &InvoiceFilter) -> Result<Vec<Invoice>>;
    async fn invoice(&self, owner: &str, id: i64) -> Result<Option<Invoice>>;
    /// Idempotent per (card, period)
    async fn open_invoice(&self, owner: &str, card: &Card, period: Period) -> Result<Invoice>;
    async fn close_invoice(
        &self,
        owner: &str,
        id: i64,
        total: Decimal,
        entry_ids: &[i64],
    ) -> Result<Invoice>;
    async fn pay_invoice(
        &self,
        owner: &str,
        id: i64,
        payment: &NewLedgerEntry,
    ) -> Result<(Invoice, LedgerEntry)>;

    // Aggregates
    async fn period_totals(&self, owner: &str, period: Period) -> Result<PeriodTotals>;
}

#[async_trait]
impl Store for Database {
    async fn accounts(&self, owner: &str) -> Result<Vec<Account>> {
        self.list_accounts(owner)
    }

    async fn account(&self, owner: &str, id: i64) -> Result<Option<Account>> {
        self.get_account(owner, id)
    }

    async fn create_account(&self, owner: &str, new: &NewAccount) -> Result<Account> {
        Database::create_account(self, owner, new)
    }

    async fn cards(&self, owner: &str) -> Result<Vec<Card>> {
        self.list_cards(owner)
    }

    async fn card(&self, owner: &str, id: i64) -> Result<Option<Card>> {
        self.get_card(owner, id)
    }

    async fn create_card(&self, owner: &str, new: &NewCard) -> Result<Card> {
        Database::create_card(self, owner, new)
    }

    async fn categories(&self, owner: &str) -> Result<Vec<Category>> {
        self.list_categories(owner)
    }

    async fn upsert_category(&self, owner: &str, name: &str) -> Result<Category> {
        Database::upsert_category(self, owner, name)
    }

    async fn rules(&self, owner: &str, active_only: bool) -> Result<Vec<RecurringRule>> {
        self.list_rules(owner, active_only)
    }

    async fn rule(&self, owner: &str, id: i64) -> Result<Option<RecurringRule>> {
        self.get_rule(owner, id)
    }

    async fn create_rule(&self, owner: &str, new: &NewRecurringRule) -> Result<RecurringRule> {
        Database::create_rule(self, owner, new)
    }

    async fn change_rule_amount(
        &self,
        owner: &str,
        id: i64,
        effective_from: Period,
        amount: Decimal,
    ) -> Result<RecurringRule> {
        Database::change_rule_amount(self, owner, id, effective_from, amount)
    }

    async fn set_rule_active(&self, owner: &str, id: i64, active: bool) -> Result<RecurringRule> {
        Database::set_rule_active(self, owner, id, active)
    }

    async fn delete_rule(&self, owner: &str, id: i64) -> Result<()> {
        Database::delete_rule(self, owner, id)
    }

    async fn ledger_entries(
        &self,
        owner: &str,
        filter: &LedgerFilter,
    ) -> Result<Vec<LedgerEntry>> {
        self.list_ledger_entries(owner, filter)
    }

    async fn ledger_entry(&self, owner: &str, id: i64) -> Result<Option<LedgerEntry>> {
        self.get_ledger_entry(owner, id)
    }

    async fn create_ledger_entry(&self, owner: &str, new: &NewLedgerEntry) -> Result<LedgerEntry> {
        Database::create_ledger_entry(self, owner, new)
    }

    async fn create_ledger_entries(
        &self,
        owner: &str,
        entries: &[NewLedgerEntry],
    ) -> Result<Vec<LedgerEntry>> {
        Database::create_ledger_entries(self, owner, entries)
    }

    async fn update_ledger_entry(
        &self,
        owner: &str,
        id: i64,
        update: &LedgerEntryUpdate,
    ) -> Result<LedgerEntry> {
        Database::update_ledger_entry(self, owner, id, update)
    }

    async fn delete_ledger_entry(&self, owner: &str, id: i64) -> Result<()> {
        Database::delete_ledger_entry(self, owner, id)
    }

    async fn invoices(&self, owner: &str, filter: &InvoiceFilter) -> Result<Vec<Invoice>> {
        self.list_invoices(owner, filter)
    }

    async fn invoice(&self, owner: &str, id: i64) -> Result<Option<Invoice>> {
        self.get_invoice(owner, id)
    }

    async fn open_invoice(&self, owner: &str, card: &Card, period: Period) -> Result<Invoice> {
        Database::open_invoice(self, owner, card, period)
    }

    async fn close_invoice(
        &self,
        owner: &str,
        id: i64,
        total: Decimal,
        entry_ids: &[i64],
    ) -> Result<Invoice> {
        Database::close_invoice(self, owner, id, total, entry_ids)
    }

    async fn pay_invoice(
        &self,
        owner: &str,
        id: i64,
        payment: &NewLedgerEntry,
    ) -> Result<(Invoice, LedgerEntry)> {
        Database::pay_invoice(self, owner, id, payment)
    }

    async fn period_totals(&self, owner: &str, period: Period) -> Result<PeriodTotals> {
        Database::period_totals(self, owner, period)
    }
}
