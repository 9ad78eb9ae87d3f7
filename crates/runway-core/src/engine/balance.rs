//! Balance calculator
//!
//! Amounts are non-negative magnitudes tagged with a kind; signs are applied
//! only when summing (income +, expense -). Results are rounded to currency
//! scale on the way out. A sub-fetch that fails contributes zero and is
//! reported as a `PartialFailure` instead of failing the whole computation.

use std::collections::HashSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::types::{
    AccountBalance, BalanceReport, ConsolidatedIndicators, FlowBreakdown, PartialFailure,
    ProjectedBalance, TransactionId,
};
use super::invoices::billing_invoice;
use super::Engine;
use crate::config::IndicatorSource;
use crate::db::LedgerFilter;
use crate::error::{Error, Result};
use crate::models::{Account, EntryKind, EntryStatus, Invoice, InvoiceStatus, Target};
use crate::period::Period;
use crate::store::{InvoiceFilter, PeriodTotals};

fn covered_by_any(invoices: &[Invoice], card_id: i64, date: NaiveDate) -> bool {
    invoices
        .iter()
        .any(|inv| inv.card_id == card_id && inv.covers(date))
}

impl Engine {
    /// The owner's accounts restricted to `ids` (all when empty)
    async fn scoped_accounts(&self, owner: &str, ids: &[i64]) -> Result<Vec<Account>> {
        let accounts = self.store.accounts(owner).await?;
        if ids.is_empty() {
            return Ok(accounts);
        }
        let mut selected = Vec::with_capacity(ids.len());
        for id in ids {
            let account = accounts
                .iter()
                .find(|a| a.id == *id)
                .ok_or_else(|| Error::NotFound(format!("account {}", id)))?;
            selected.push(account.clone());
        }
        Ok(selected)
    }

    /// Opening balances plus confirmed account entries dated up to `as_of`
    pub async fn current_balance(
        &self,
        owner: &str,
        account_ids: &[i64],
        as_of: NaiveDate,
    ) -> Result<BalanceReport> {
        let accounts = self.scoped_accounts(owner, account_ids).await?;
        let mut failures = Vec::new();
        let mut balances = Vec::with_capacity(accounts.len());

        for account in accounts {
            let filter = LedgerFilter::new()
                .account(account.id)
                .status(EntryStatus::Confirmed)
                .until(as_of);
            let (movement, partial) = match self.store.ledger_entries(owner, &filter).await {
                Ok(entries) => (entries.iter().map(|e| e.signed_amount()).sum(), false),
                Err(e) => {
                    warn!(owner, account_id = account.id, error = %e, "Account ledger fetch failed");
                    failures.push(PartialFailure::new(format!("account {}", account.id), &e));
                    (Decimal::ZERO, true)
                }
            };
            balances.push(AccountBalance {
                account_id: account.id,
                name: account.name,
                opening_balance: account.opening_balance,
                balance: account.opening_balance + movement,
                partial,
            });
        }

        let report = BalanceReport {
            as_of,
            total: balances.iter().map(|b| b.balance).sum(),
            accounts: balances,
            partial: !failures.is_empty(),
            failures,
        };
        Ok(report.rounded())
    }

    /// Expected cash position at `horizon`
    ///
    /// Starts from the opening balances and adds every account entry dated up
    /// to the horizon (confirmed and pending), the rules' virtual occurrences
    /// from `from`'s month through the horizon, then subtracts unpaid invoices
    /// due by the horizon and card charges no invoice covers yet. Charges
    /// belonging to an invoice due after the horizon fall outside it.
    pub async fn projected_balance(
        &self,
        owner: &str,
        account_ids: &[i64],
        from: NaiveDate,
        horizon: NaiveDate,
    ) -> Result<ProjectedBalance> {
        if horizon < from {
            return Err(Error::Validation(format!(
                "horizon {} is before {}",
                horizon, from
            )));
        }
        let accounts = self.scoped_accounts(owner, account_ids).await?;
        let in_scope: HashSet<i64> = accounts.iter().map(|a| a.id).collect();
        let all_accounts = account_ids.is_empty();
        let mut failures = Vec::new();

        let opening: Decimal = accounts.iter().map(|a| a.opening_balance).sum();
        let mut confirmed = Decimal::ZERO;
        let mut pending = Decimal::ZERO;
        for account in &accounts {
            let filter = LedgerFilter::new().account(account.id).until(horizon);
            match self.store.ledger_entries(owner, &filter).await {
                Ok(entries) => {
                    for entry in entries {
                        match entry.status {
                            EntryStatus::Confirmed => confirmed += entry.signed_amount(),
                            EntryStatus::Pending => pending += entry.signed_amount(),
                        }
                    }
                }
                Err(e) => {
                    warn!(owner, account_id = account.id, error = %e, "Account ledger fetch failed");
                    failures.push(PartialFailure::new(format!("account {}", account.id), &e));
                }
            }
        }

        let virtuals = match self
            .virtuals_between(owner, Period::of(from).first_day(), horizon)
            .await
        {
            Ok(v) => v,
            Err(e) => {
                warn!(owner, error = %e, "Projection materialization failed");
                failures.push(PartialFailure::new("recurring", &e));
                Vec::new()
            }
        };
        let recurring: Decimal = virtuals
            .iter()
            .filter(|v| v.target.account_id().is_some_and(|id| in_scope.contains(&id)))
            .map(|v| v.signed_amount())
            .sum();

        // Cards paid from an account in scope; cards without a paying
        // account only count when every account is in scope
        let cards: HashSet<i64> = match self.store.cards(owner).await {
            Ok(cards) => cards
                .into_iter()
                .filter(|c| match c.payment_account_id {
                    Some(id) => in_scope.contains(&id),
                    None => all_accounts,
                })
                .map(|c| c.id)
                .collect(),
            Err(e) => {
                warn!(owner, error = %e, "Card fetch failed");
                failures.push(PartialFailure::new("cards", &e));
                HashSet::new()
            }
        };

        let invoices = match self.store.invoices(owner, &InvoiceFilter::new()).await {
            Ok(invoices) => invoices,
            Err(e) => {
                warn!(owner, error = %e, "Invoice fetch failed");
                failures.push(PartialFailure::new("invoices", &e));
                Vec::new()
            }
        };

        let mut invoice_total = Decimal::ZERO;
        for invoice in invoices
            .iter()
            .filter(|inv| cards.contains(&inv.card_id) && inv.due_date <= horizon)
        {
            match invoice.status {
                InvoiceStatus::Closed => invoice_total += invoice.total,
                InvoiceStatus::Open => match self.invoice_charges(owner, invoice).await {
                    Ok((entries, virtual_charges)) => {
                        invoice_total += entries.iter().map(|e| e.amount).sum::<Decimal>()
                            + virtual_charges.iter().map(|v| v.amount).sum::<Decimal>();
                    }
                    Err(e) => {
                        warn!(owner, invoice_id = invoice.id, error = %e, "Invoice preview failed");
                        failures.push(PartialFailure::new(format!("invoice {}", invoice.id), &e));
                    }
                },
                InvoiceStatus::Paid => {}
            }
        }

        let mut card_charges = Decimal::ZERO;
        match self
            .store
            .ledger_entries(owner, &LedgerFilter::new().cards_only().until(horizon))
            .await
        {
            Ok(entries) => {
                for entry in entries {
                    let Target::Card(card_id) = entry.target else {
                        continue;
                    };
                    if cards.contains(&card_id)
                        && entry.invoice_id.is_none()
                        && billing_invoice(&invoices, card_id, entry.date).is_none()
                    {
                        card_charges += entry.amount;
                    }
                }
            }
            Err(e) => {
                warn!(owner, error = %e, "Card ledger fetch failed");
                failures.push(PartialFailure::new("card ledger", &e));
            }
        }
        for v in &virtuals {
            if let Target::Card(card_id) = v.target {
                if cards.contains(&card_id) && !covered_by_any(&invoices, card_id, v.date) {
                    card_charges += v.amount;
                }
            }
        }

        let projected = opening + confirmed + pending + recurring - invoice_total - card_charges;
        debug!(
            owner,
            from = %from,
            horizon = %horizon,
            projected = %projected,
            partial = !failures.is_empty(),
            "Projected balance"
        );

        Ok(ProjectedBalance {
            from,
            horizon,
            opening,
            confirmed,
            pending,
            recurring,
            invoices: invoice_total,
            card_charges,
            projected,
            partial: !failures.is_empty(),
            failures,
        }
        .rounded())
    }

    /// Income/expense split by certainty, net flow and savings rate for one
    /// month, derived from the merged month view
    pub async fn consolidated_indicators(
        &self,
        owner: &str,
        period: Period,
    ) -> Result<ConsolidatedIndicators> {
        if self.settings.cache_indicators {
            if let Some(hit) = self.cache.get(owner, period) {
                debug!(owner, period = %period, "Indicator cache hit");
                return Ok(hit);
            }
        }
        let generation = self.cache.generation(owner);

        let mut failures = Vec::new();

        let opening = match self
            .current_balance(owner, &[], period.pred().last_day())
            .await
        {
            Ok(report) => {
                failures.extend(report.failures);
                report.total
            }
            Err(e) => {
                warn!(owner, period = %period, error = %e, "Opening balance failed");
                failures.push(PartialFailure::new("opening balance", &e));
                Decimal::ZERO
            }
        };

        let view = self.for_month(owner, period).await;
        failures.extend(view.failures.iter().cloned());

        let store_totals: Option<PeriodTotals> = match self.settings.indicator_source {
            IndicatorSource::Local => None,
            IndicatorSource::Store => match self.store.period_totals(owner, period).await {
                Ok(totals) => Some(totals),
                Err(e) => {
                    warn!(owner, period = %period, error = %e, "Store totals failed, aggregating locally");
                    None
                }
            },
        };

        let mut income = FlowBreakdown::default();
        let mut expense = FlowBreakdown::default();
        for tx in view.transactions.iter().filter(|t| t.counts_toward_totals) {
            let account_ledger =
                matches!(tx.id, TransactionId::Ledger(_)) && tx.target.account_id().is_some();
            if account_ledger && store_totals.is_some() {
                continue;
            }
            let bucket = match tx.kind {
                EntryKind::Income => &mut income,
                EntryKind::Expense | EntryKind::CardExpense => &mut expense,
            };
            bucket.add(tx.status, tx.is_virtual, tx.amount);
        }
        if let Some(totals) = store_totals {
            income.confirmed += totals.confirmed_income;
            income.pending += totals.pending_income;
            expense.confirmed += totals.confirmed_expense;
            expense.pending += totals.pending_expense;
        }

        let indicators =
            ConsolidatedIndicators::compute(period, opening, income, expense, failures);

        if self.settings.cache_indicators
            && !indicators.partial
            && !self.cache.put(owner, generation, indicators.clone())
        {
            debug!(owner, period = %period, "Indicators changed while computing, not cached");
        }
        Ok(indicators)
    }
}
