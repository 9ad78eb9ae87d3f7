//! Test utilities for runway-core
//!
//! Fixtures for a seeded temp database and [`FaultyStore`], a `Store` that
//! wraps a real `Database` and fails chosen calls on demand. Used to exercise
//! the partial-failure paths of the merge layer, balances and auto-close. It
//! can also run a one-shot hook inside a call, to interleave a concurrent
//! writer with a read in progress.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::config::EngineSettings;
use crate::db::{Database, LedgerFilter, TargetKind};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::events::EventBus;
use crate::models::{
    Account, Card, Category, EntryKind, Invoice, LedgerEntry, LedgerEntryUpdate, NewAccount,
    NewCard, NewLedgerEntry, NewRecurringRule, RecurringRule, Target,
};
use crate::period::Period;
use crate::store::{InvoiceFilter, PeriodTotals, Store};

pub const OWNER: &str = "alice";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}

pub fn period(y: i32, m: u32) -> Period {
    Period::new(y, m).expect("valid test period")
}

/// Decimal from a literal like "12.50"
pub fn money(s: &str) -> Decimal {
    s.parse().expect("valid test amount")
}

/// Fresh temp database
pub fn test_db() -> Arc<Database> {
    Arc::new(Database::in_memory().expect("Failed to create test database"))
}

/// Engine over `store` with default settings and its own bus
pub fn test_engine(store: Arc<dyn Store>) -> Engine {
    Engine::new(store, EventBus::new(), EngineSettings::default())
}

/// One account, one card paid from it, one category
pub struct Fixture {
    pub account: Account,
    pub card: Card,
    pub category: Category,
}

/// Seed `owner` with a checking account (opening 1000), a card closing on the
/// 20th and due on the 28th, and a "Housing" category
pub fn seed(db: &Database, owner: &str) -> Fixture {
    let account = db
        .create_account(
            owner,
            &NewAccount {
                name: "Checking".to_string(),
                opening_balance: money("1000"),
            },
        )
        .expect("seed account");
    let card = db
        .create_card(
            owner,
            &NewCard {
                name: "Visa".to_string(),
                closing_day: 20,
                due_day: 28,
                payment_account_id: Some(account.id),
            },
        )
        .expect("seed card");
    let category = db.upsert_category(owner, "Housing").expect("seed category");
    Fixture {
        account,
        card,
        category,
    }
}

/// Monthly rule starting at `start` with no end
pub fn monthly_rule(
    description: &str,
    amount: &str,
    kind: EntryKind,
    target: Target,
    day: u32,
    start: NaiveDate,
) -> NewRecurringRule {
    NewRecurringRule {
        description: description.to_string(),
        amount: money(amount),
        kind,
        category_id: None,
        target,
        day_of_month: day,
        start_date: start,
        end_date: None,
        note: None,
    }
}

/// Store calls [`FaultyStore`] can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Rules,
    /// Every ledger query
    Ledger,
    /// Ledger queries scoped to one account
    AccountLedger(i64),
    /// Ledger queries restricted to card entries
    CardLedger,
    Invoices,
    CloseInvoice(i64),
    Accounts,
    Cards,
    Categories,
    PeriodTotals,
}

type Hook = Box<dyn FnOnce() + Send>;

/// `Store` wrapper that injects failures into selected calls
pub struct FaultyStore {
    inner: Arc<Database>,
    faults: Mutex<HashSet<Fault>>,
    hooks: Mutex<HashMap<Fault, Hook>>,
}

impl FaultyStore {
    pub fn new(inner: Arc<Database>) -> Self {
        Self {
            inner,
            faults: Mutex::new(HashSet::new()),
            hooks: Mutex::new(HashMap::new()),
        }
    }

    /// Run `hook` once, the next time the call `point` names reaches the store
    pub fn on_next(&self, point: Fault, hook: impl FnOnce() + Send + 'static) {
        self.hooks
            .lock()
            .expect("hook lock")
            .insert(point, Box::new(hook));
    }

    pub fn fail(&self, fault: Fault) {
        self.faults.lock().expect("fault lock").insert(fault);
    }

    pub fn heal(&self, fault: Fault) {
        self.faults.lock().expect("fault lock").remove(&fault);
    }

    fn check(&self, fault: Fault) -> Result<()> {
        let hook = self.hooks.lock().expect("hook lock").remove(&fault);
        if let Some(hook) = hook {
            hook();
        }
        if self.faults.lock().expect("fault lock").contains(&fault) {
            return Err(Error::Store(format!("injected failure: {:?}", fault)));
        }
        Ok(())
    }

    fn check_ledger(&self, filter: &LedgerFilter) -> Result<()> {
        self.check(Fault::Ledger)?;
        if let Some(account_id) = filter.account_id {
            self.check(Fault::AccountLedger(account_id))?;
        }
        if filter.card_id.is_some() || filter.target_kind == Some(TargetKind::Card) {
            self.check(Fault::CardLedger)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn accounts(&self, owner: &str) -> Result<Vec<Account>> {
        self.check(Fault::Accounts)?;
        self.inner.accounts(owner).await
    }

    async fn account(&self, owner: &str, id: i64) -> Result<Option<Account>> {
        self.check(Fault::Accounts)?;
        self.inner.account(owner, id).await
    }

    async fn create_account(&self, owner: &str, new: &NewAccount) -> Result<Account> {
        Store::create_account(self.inner.as_ref(), owner, new).await
    }

    async fn cards(&self, owner: &str) -> Result<Vec<Card>> {
        self.check(Fault::Cards)?;
        self.inner.cards(owner).await
    }

    async fn card(&self, owner: &str, id: i64) -> Result<Option<Card>> {
        self.check(Fault::Cards)?;
        self.inner.card(owner, id).await
    }

    async fn create_card(&self, owner: &str, new: &NewCard) -> Result<Card> {
        Store::create_card(self.inner.as_ref(), owner, new).await
    }

    async fn categories(&self, owner: &str) -> Result<Vec<Category>> {
        self.check(Fault::Categories)?;
        self.inner.categories(owner).await
    }

    async fn upsert_category(&self, owner: &str, name: &str) -> Result<Category> {
        Store::upsert_category(self.inner.as_ref(), owner, name).await
    }

    async fn rules(&self, owner: &str, active_only: bool) -> Result<Vec<RecurringRule>> {
        self.check(Fault::Rules)?;
        self.inner.rules(owner, active_only).await
    }

    async fn rule(&self, owner: &str, id: i64) -> Result<Option<RecurringRule>> {
        self.check(Fault::Rules)?;
        self.inner.rule(owner, id).await
    }

    async fn create_rule(&self, owner: &str, new: &NewRecurringRule) -> Result<RecurringRule> {
        Store::create_rule(self.inner.as_ref(), owner, new).await
    }

    async fn change_rule_amount(
        &self,
        owner: &str,
        id: i64,
        effective_from: Period,
        amount: Decimal,
    ) -> Result<RecurringRule> {
        Store::change_rule_amount(self.inner.as_ref(), owner, id, effective_from, amount).await
    }

    async fn set_rule_active(&self, owner: &str, id: i64, active: bool) -> Result<RecurringRule> {
        Store::set_rule_active(self.inner.as_ref(), owner, id, active).await
    }

    async fn delete_rule(&self, owner: &str, id: i64) -> Result<()> {
        Store::delete_rule(self.inner.as_ref(), owner, id).await
    }

    async fn ledger_entries(
        &self,
        owner: &str,
        filter: &LedgerFilter,
    ) -> Result<Vec<LedgerEntry>> {
        self.check_ledger(filter)?;
        self.inner.ledger_entries(owner, filter).await
    }

    async fn ledger_entry(&self, owner: &str, id: i64) -> Result<Option<LedgerEntry>> {
        self.check(Fault::Ledger)?;
        self.inner.ledger_entry(owner, id).await
    }

    async fn create_ledger_entry(&self, owner: &str, new: &NewLedgerEntry) -> Result<LedgerEntry> {
        Store::create_ledger_entry(self.inner.as_ref(), owner, new).await
    }

    async fn create_ledger_entries(
        &self,
        owner: &str,
        entries: &[NewLedgerEntry],
    ) -> Result<Vec<LedgerEntry>> {
        Store::create_ledger_entries(self.inner.as_ref(), owner, entries).await
    }

    async fn update_ledger_entry(
        &self,
        owner: &str,
        id: i64,
        update: &LedgerEntryUpdate,
    ) -> Result<LedgerEntry> {
        Store::update_ledger_entry(self.inner.as_ref(), owner, id, update).await
    }

    async fn delete_ledger_entry(&self, owner: &str, id: i64) -> Result<()> {
        Store::delete_ledger_entry(self.inner.as_ref(), owner, id).await
    }

    async fn invoices(&self, owner: &str, filter: &InvoiceFilter) -> Result<Vec<Invoice>> {
        self.check(Fault::Invoices)?;
        self.inner.invoices(owner, filter).await
    }

    async fn invoice(&self, owner: &str, id: i64) -> Result<Option<Invoice>> {
        self.check(Fault::Invoices)?;
        self.inner.invoice(owner, id).await
    }

    async fn open_invoice(&self, owner: &str, card: &Card, period: Period) -> Result<Invoice> {
        Store::open_invoice(self.inner.as_ref(), owner, card, period).await
    }

    async fn close_invoice(
        &self,
        owner: &str,
        id: i64,
        total: Decimal,
        entry_ids: &[i64],
    ) -> Result<Invoice> {
        self.check(Fault::CloseInvoice(id))?;
        Store::close_invoice(self.inner.as_ref(), owner, id, total, entry_ids).await
    }

    async fn pay_invoice(
        &self,
        owner: &str,
        id: i64,
        payment: &NewLedgerEntry,
    ) -> Result<(Invoice, LedgerEntry)> {
        Store::pay_invoice(self.inner.as_ref(), owner, id, payment).await
    }

    async fn period_totals(&self, owner: &str, period: Period) -> Result<PeriodTotals> {
        self.check(Fault::PeriodTotals)?;
        Store::period_totals(self.inner.as_ref(), owner, period).await
    }
}
