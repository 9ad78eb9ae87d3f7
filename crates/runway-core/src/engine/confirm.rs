//! Confirmation workflow: realize a rule's occurrence as a confirmed entry

use chrono::NaiveDate;
use tracing::{debug, info};

use super::Engine;
use crate::db::LedgerFilter;
use crate::error::{Error, Result};
use crate::events::{ChangeEvent, ChangeOp, ChangeSubject, EntityKind};
use crate::models::{
    EntryStatus, LedgerEntry, LedgerEntryUpdate, NewLedgerEntry, Origin, RecurringRule,
};
use crate::period::Period;

impl Engine {
    /// Load an owner's rule, requiring it to be active
    pub(crate) async fn active_rule(&self, owner: &str, rule_id: i64) -> Result<RecurringRule> {
        let rule = self
            .store
            .rule(owner, rule_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("rule {}", rule_id)))?;
        if !rule.active {
            return Err(Error::Validation(format!("rule {} is inactive", rule_id)));
        }
        Ok(rule)
    }

    /// The entry realizing `rule_id` in `period`, if any
    pub(crate) async fn realization(
        &self,
        owner: &str,
        rule_id: i64,
        period: Period,
    ) -> Result<Option<LedgerEntry>> {
        let entries = self
            .store
            .ledger_entries(
                owner,
                &LedgerFilter::new().period(period).rule(rule_id).realizations(),
            )
            .await?;
        Ok(entries.into_iter().next())
    }

    /// Confirm a rule's occurrence in the month of `date` (today by default)
    ///
    /// Idempotent per month: a second call returns the entry created by the
    /// first. A pending this-month-only adjustment is promoted to confirmed
    /// with its overridden amount. A skipped month cannot be confirmed, and
    /// the date must fall within the rule's start and end dates.
    pub async fn confirm(
        &self,
        owner: &str,
        rule_id: i64,
        date: Option<NaiveDate>,
    ) -> Result<LedgerEntry> {
        let rule = self.active_rule(owner, rule_id).await?;
        let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
        let period = Period::of(date);

        if rule.occurrence_date(period).is_none() {
            return Err(Error::Validation(format!(
                "rule {} has no occurrence in {}",
                rule_id, period
            )));
        }
        if date < rule.start_date || rule.end_date.is_some_and(|end| date > end) {
            return Err(Error::Validation(format!(
                "{} is outside the active range of rule {}",
                date, rule_id
            )));
        }

        if let Some(existing) = self.realization(owner, rule_id, period).await? {
            return self.settle_existing(owner, existing).await;
        }

        let new = NewLedgerEntry {
            description: rule.description.clone(),
            amount: rule.amount_for(period),
            date,
            kind: rule.kind,
            category_id: rule.category_id,
            target: rule.target,
            status: EntryStatus::Confirmed,
            origin: Origin::Recurring,
            rule_id: Some(rule.id),
            installment: None,
            invoice_id: None,
            note: rule.note.clone(),
        };

        let entry = match self.store.create_ledger_entry(owner, &new).await {
            Ok(entry) => entry,
            Err(Error::Conflict(msg)) => {
                // Lost a race against a concurrent confirm/adjust; the winner stands
                debug!(owner, rule_id, period = %period, "Confirm raced: {}", msg);
                let existing = self
                    .realization(owner, rule_id, period)
                    .await?
                    .ok_or(Error::Conflict(msg))?;
                return self.settle_existing(owner, existing).await;
            }
            Err(e) => return Err(e),
        };

        info!(owner, rule_id, entry_id = entry.id, period = %period, "Confirmed recurring occurrence");
        self.notify(
            ChangeEvent::new(owner, ChangeOp::Confirm, EntityKind::LedgerEntry)
                .subject(ChangeSubject::Recurring)
                .id(entry.id),
        );
        Ok(entry)
    }

    /// Resolve a confirm against the month's existing realization
    async fn settle_existing(&self, owner: &str, existing: LedgerEntry) -> Result<LedgerEntry> {
        match (existing.origin, existing.status) {
            (Origin::RecurringSkip, _) => Err(Error::Conflict(format!(
                "rule {} is skipped in {}",
                existing.rule_id.unwrap_or_default(),
                Period::of(existing.date)
            ))),
            (_, EntryStatus::Confirmed) => Ok(existing),
            (_, EntryStatus::Pending) => {
                let entry = self
                    .store
                    .update_ledger_entry(
                        owner,
                        existing.id,
                        &LedgerEntryUpdate {
                            status: Some(EntryStatus::Confirmed),
                            ..Default::default()
                        },
                    )
                    .await?;
                info!(owner, entry_id = entry.id, "Confirmed pending adjustment");
                self.notify(
                    ChangeEvent::new(owner, ChangeOp::Confirm, EntityKind::LedgerEntry)
                        .subject(ChangeSubject::Recurring)
                        .id(entry.id),
                );
                Ok(entry)
            }
        }
    }
}
