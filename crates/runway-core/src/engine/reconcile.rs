//! Merge layer: one chronological view per month
//!
//! Combines the month's ledger entries, the rules' still-virtual occurrences
//! and the liabilities of closed card invoices. A card charge is never shown
//! twice as money owed: once its invoice is closed (or paid), the itemized
//! virtual charges inside the billing window drop out and the card entries
//! linked to it stay listed but stop counting toward totals.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::materialize::materialize;
use super::types::{MonthView, PartialFailure, Transaction};
use super::Engine;
use crate::db::LedgerFilter;
use crate::models::{Invoice, InvoiceStatus, Target};
use crate::period::Period;
use crate::store::InvoiceFilter;

/// Whether a card charge on `card_id` dated `date` is folded into a settled
/// invoice
fn covered_by(settled: &[Invoice], card_id: i64, date: chrono::NaiveDate) -> bool {
    settled
        .iter()
        .any(|inv| inv.card_id == card_id && inv.covers(date))
}

impl Engine {
    /// Merged view of `period` for `owner`
    ///
    /// Fetches run strictly in sequence: rules, ledger, invoices, reference
    /// names. A failed fetch marks the view partial instead of failing it.
    pub async fn for_month(&self, owner: &str, period: Period) -> MonthView {
        let mut failures = Vec::new();

        let rules = match self.store.rules(owner, true).await {
            Ok(rules) => rules,
            Err(e) => {
                warn!(owner, period = %period, error = %e, "Failed to fetch rules");
                failures.push(PartialFailure::new("rules", &e));
                Vec::new()
            }
        };

        let entries = match self
            .store
            .ledger_entries(owner, &LedgerFilter::new().period(period))
            .await
        {
            Ok(entries) => Some(entries),
            Err(e) => {
                warn!(owner, period = %period, error = %e, "Failed to fetch ledger");
                failures.push(PartialFailure::new("ledger", &e));
                None
            }
        };

        // Without the ledger there is nothing to dedup against, so projecting
        // would risk showing a month twice
        let virtuals = match &entries {
            Some(entries) => materialize(&rules, period, entries),
            None => Vec::new(),
        };
        let entries = entries.unwrap_or_default();

        let settled = match self
            .store
            .invoices(
                owner,
                &InvoiceFilter::new()
                    .statuses(&[InvoiceStatus::Closed, InvoiceStatus::Paid])
                    .closing_between(period.first_day(), period.succ().last_day()),
            )
            .await
        {
            Ok(invoices) => invoices,
            Err(e) => {
                warn!(owner, period = %period, error = %e, "Failed to fetch settled invoices");
                failures.push(PartialFailure::new("invoices", &e));
                Vec::new()
            }
        };

        let liabilities = match self
            .store
            .invoices(
                owner,
                &InvoiceFilter::new()
                    .status(InvoiceStatus::Closed)
                    .due_between(period.first_day(), period.last_day()),
            )
            .await
        {
            Ok(invoices) => invoices,
            Err(e) => {
                warn!(owner, period = %period, error = %e, "Failed to fetch invoice liabilities");
                failures.push(PartialFailure::new("invoices", &e));
                Vec::new()
            }
        };

        let mut transactions: Vec<Transaction> =
            Vec::with_capacity(entries.len() + virtuals.len() + liabilities.len());

        for entry in entries {
            // Card entries are linked when their invoice closes; a charge
            // recorded after that keeps counting until a later invoice takes it
            let covered = entry.target.card_id().is_some() && entry.invoice_id.is_some();
            let mut tx = Transaction::from(entry);
            tx.counts_toward_totals = !covered;
            transactions.push(tx);
        }

        let mut subsumed = 0usize;
        for virtual_occurrence in virtuals {
            if let Target::Card(card_id) = virtual_occurrence.target {
                if covered_by(&settled, card_id, virtual_occurrence.date) {
                    subsumed += 1;
                    continue;
                }
            }
            transactions.push(virtual_occurrence.into());
        }

        transactions.extend(liabilities.iter().map(Transaction::invoice_liability));

        self.decorate(owner, &mut transactions).await;

        // Newest first; ties keep ledger, virtual, invoice order
        transactions.sort_by(|a, b| b.date.cmp(&a.date));

        debug!(
            owner,
            period = %period,
            count = transactions.len(),
            subsumed,
            partial = !failures.is_empty(),
            "Built month view"
        );

        MonthView {
            period,
            transactions,
            partial: !failures.is_empty(),
            failures,
        }
    }

    /// Fill in category and account/card names; missing lookups leave them unset
    async fn decorate(&self, owner: &str, transactions: &mut [Transaction]) {
        let categories: HashMap<i64, String> = match self.store.categories(owner).await {
            Ok(categories) => categories.into_iter().map(|c| (c.id, c.name)).collect(),
            Err(e) => {
                debug!(owner, error = %e, "Category lookup failed");
                HashMap::new()
            }
        };
        let accounts: HashMap<i64, String> = match self.store.accounts(owner).await {
            Ok(accounts) => accounts.into_iter().map(|a| (a.id, a.name)).collect(),
            Err(e) => {
                debug!(owner, error = %e, "Account lookup failed");
                HashMap::new()
            }
        };
        let cards: HashMap<i64, String> = match self.store.cards(owner).await {
            Ok(cards) => cards.into_iter().map(|c| (c.id, c.name)).collect(),
            Err(e) => {
                debug!(owner, error = %e, "Card lookup failed");
                HashMap::new()
            }
        };

        for tx in transactions.iter_mut() {
            tx.category_name = tx.category_id.and_then(|id| categories.get(&id).cloned());
            tx.target_name = match tx.target {
                Target::Account(id) => accounts.get(&id).cloned(),
                Target::Card(id) => cards.get(&id).cloned(),
            };
            if tx.is_invoice_liability() {
                if let Some(name) = &tx.target_name {
                    tx.description = format!("{} invoice", name);
                }
            }
        }
    }
}
