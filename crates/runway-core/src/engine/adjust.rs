//! Adjustment workflow: one-off overrides of a rule
//!
//! | Mode            | Persists                                   | Rule changed |
//! |-----------------|--------------------------------------------|--------------|
//! | this-month-only | pending `recurring_adjustment` entry       | no           |
//! | from-now-on     | new amount + revision for earlier months   | yes          |
//! | skip            | confirmed zero `recurring_skip` entry      | no           |

use rust_decimal::Decimal;
use tracing::info;

use super::types::{Adjustment, AdjustmentMode, AdjustmentOutcome};
use super::Engine;
use crate::error::{Error, Result};
use crate::events::{ChangeEvent, ChangeOp, ChangeSubject, EntityKind};
use crate::models::{
    EntryStatus, LedgerEntry, LedgerEntryUpdate, NewLedgerEntry, Origin, RecurringRule,
};

impl Engine {
    /// Apply an adjustment to a rule for the adjustment's month
    pub async fn apply_adjustment(
        &self,
        owner: &str,
        adjustment: &Adjustment,
    ) -> Result<AdjustmentOutcome> {
        adjustment.validate()?;
        let rule = self.active_rule(owner, adjustment.rule_id).await?;

        match adjustment.mode {
            AdjustmentMode::FromNowOn => {
                if rule.occurrence_date(adjustment.period).is_none() {
                    return Err(Error::Validation(format!(
                        "rule {} has no occurrence in {}",
                        rule.id, adjustment.period
                    )));
                }
                // validate() guarantees the amount
                let amount = adjustment.amount.unwrap_or_default();
                let rule = self
                    .store
                    .change_rule_amount(owner, rule.id, adjustment.period, amount)
                    .await?;
                info!(
                    owner,
                    rule_id = rule.id,
                    from = %adjustment.period,
                    amount = %amount,
                    "Applied from-now-on adjustment"
                );
                self.notify(
                    ChangeEvent::new(owner, ChangeOp::Update, EntityKind::Rule)
                        .subject(ChangeSubject::Recurring)
                        .id(rule.id),
                );
                Ok(AdjustmentOutcome::Rule(rule))
            }
            AdjustmentMode::ThisMonthOnly => {
                let amount = adjustment.amount.unwrap_or_default();
                self.adjust_month(owner, &rule, adjustment, amount)
                    .await
                    .map(AdjustmentOutcome::Entry)
            }
            AdjustmentMode::Skip => self
                .skip_month(owner, &rule, adjustment)
                .await
                .map(AdjustmentOutcome::Entry),
        }
    }

    async fn adjust_month(
        &self,
        owner: &str,
        rule: &RecurringRule,
        adjustment: &Adjustment,
        amount: Decimal,
    ) -> Result<LedgerEntry> {
        let period = adjustment.period;
        let date = rule.occurrence_date(period).ok_or_else(|| {
            Error::Validation(format!("rule {} has no occurrence in {}", rule.id, period))
        })?;

        let (entry, op) = match self.realization(owner, rule.id, period).await? {
            Some(existing)
                if existing.origin == Origin::RecurringAdjustment
                    && existing.status == EntryStatus::Pending =>
            {
                let update = LedgerEntryUpdate {
                    amount: Some(amount),
                    note: adjustment.note.clone(),
                    ..Default::default()
                };
                let entry = self
                    .store
                    .update_ledger_entry(owner, existing.id, &update)
                    .await?;
                (entry, ChangeOp::Update)
            }
            Some(existing) => {
                return Err(Error::Conflict(format!(
                    "rule {} is already {} in {} (entry {})",
                    rule.id,
                    if existing.origin == Origin::RecurringSkip {
                        "skipped"
                    } else {
                        "confirmed"
                    },
                    period,
                    existing.id
                )))
            }
            None => {
                let new = NewLedgerEntry {
                    description: rule.description.clone(),
                    amount,
                    date,
                    kind: rule.kind,
                    category_id: rule.category_id,
                    target: rule.target,
                    status: EntryStatus::Pending,
                    origin: Origin::RecurringAdjustment,
                    rule_id: Some(rule.id),
                    installment: None,
                    invoice_id: None,
                    note: adjustment.note.clone(),
                };
                let entry = self.store.create_ledger_entry(owner, &new).await?;
                (entry, ChangeOp::Create)
            }
        };

        info!(
            owner,
            rule_id = rule.id,
            period = %period,
            amount = %amount,
            entry_id = entry.id,
            "Applied this-month-only adjustment"
        );
        self.notify(
            ChangeEvent::new(owner, op, EntityKind::LedgerEntry)
                .subject(ChangeSubject::Recurring)
                .id(entry.id),
        );
        Ok(entry)
    }

    async fn skip_month(
        &self,
        owner: &str,
        rule: &RecurringRule,
        adjustment: &Adjustment,
    ) -> Result<LedgerEntry> {
        let period = adjustment.period;
        let date = rule.occurrence_date(period).ok_or_else(|| {
            Error::Validation(format!("rule {} has no occurrence in {}", rule.id, period))
        })?;

        let (entry, op) = match self.realization(owner, rule.id, period).await? {
            Some(existing) if existing.origin == Origin::RecurringSkip => return Ok(existing),
            Some(existing)
                if existing.origin == Origin::RecurringAdjustment
                    && existing.status == EntryStatus::Pending =>
            {
                let update = LedgerEntryUpdate {
                    amount: Some(Decimal::ZERO),
                    status: Some(EntryStatus::Confirmed),
                    origin: Some(Origin::RecurringSkip),
                    note: adjustment.note.clone(),
                    invoice_id: None,
                };
                let entry = self
                    .store
                    .update_ledger_entry(owner, existing.id, &update)
                    .await?;
                (entry, ChangeOp::Update)
            }
            Some(existing) => {
                return Err(Error::Conflict(format!(
                    "rule {} is already confirmed in {} (entry {})",
                    rule.id, period, existing.id
                )))
            }
            None => {
                let new = NewLedgerEntry {
                    description: rule.description.clone(),
                    amount: Decimal::ZERO,
                    date,
                    kind: rule.kind,
                    category_id: rule.category_id,
                    target: rule.target,
                    status: EntryStatus::Confirmed,
                    origin: Origin::RecurringSkip,
                    rule_id: Some(rule.id),
                    installment: None,
                    invoice_id: None,
                    note: adjustment.note.clone(),
                };
                let entry = self.store.create_ledger_entry(owner, &new).await?;
                (entry, ChangeOp::Create)
            }
        };

        info!(owner, rule_id = rule.id, period = %period, "Skipped recurring occurrence");
        self.notify(
            ChangeEvent::new(owner, op, EntityKind::LedgerEntry)
                .subject(ChangeSubject::Recurring)
                .id(entry.id),
        );
        Ok(entry)
    }
}
