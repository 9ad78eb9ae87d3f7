//! Reference data, rule and manual ledger management
//!
//! Thin wrappers over the store that add the owner checks and publish a
//! change event after every successful mutation.

use chrono::{Months, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::info;

use super::types::{InstallmentPurchase, CURRENCY_DP};
use super::Engine;
use crate::db::LedgerFilter;
use crate::error::{Error, Result};
use crate::events::{ChangeEvent, ChangeOp, ChangeSubject, EntityKind};
use crate::models::{
    Account, Card, Category, EntryKind, EntryStatus, Installment, LedgerEntry, LedgerEntryUpdate,
    NewAccount, NewCard, NewLedgerEntry, NewRecurringRule, Origin, RecurringRule, Target,
};

/// Longest installment plan accepted
const MAX_INSTALLMENTS: u32 = 120;

/// Split `total` into `n` amounts truncated to cents, the remainder on the first
fn split_installments(total: Decimal, n: u32) -> Vec<Decimal> {
    let each = (total / Decimal::from(n)).round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::ToZero);
    let remainder = total - each * Decimal::from(n);
    (0..n)
        .map(|i| if i == 0 { each + remainder } else { each })
        .collect()
}

impl Engine {
    // ========== Reference data ==========

    pub async fn create_account(&self, owner: &str, new: &NewAccount) -> Result<Account> {
        let account = self.store.create_account(owner, new).await?;
        self.notify(ChangeEvent::new(owner, ChangeOp::Create, EntityKind::Account).id(account.id));
        Ok(account)
    }

    pub async fn accounts(&self, owner: &str) -> Result<Vec<Account>> {
        self.store.accounts(owner).await
    }

    pub async fn create_card(&self, owner: &str, new: &NewCard) -> Result<Card> {
        let card = self.store.create_card(owner, new).await?;
        self.notify(ChangeEvent::new(owner, ChangeOp::Create, EntityKind::Card).id(card.id));
        Ok(card)
    }

    pub async fn cards(&self, owner: &str) -> Result<Vec<Card>> {
        self.store.cards(owner).await
    }

    pub async fn upsert_category(&self, owner: &str, name: &str) -> Result<Category> {
        if name.trim().is_empty() {
            return Err(Error::Validation("category name is required".to_string()));
        }
        let category = self.store.upsert_category(owner, name.trim()).await?;
        self.notify(
            ChangeEvent::new(owner, ChangeOp::Create, EntityKind::Category).id(category.id),
        );
        Ok(category)
    }

    pub async fn categories(&self, owner: &str) -> Result<Vec<Category>> {
        self.store.categories(owner).await
    }

    // ========== Rules ==========

    pub async fn create_rule(&self, owner: &str, new: &NewRecurringRule) -> Result<RecurringRule> {
        new.validate()?;
        let rule = self.store.create_rule(owner, new).await?;
        info!(owner, rule_id = rule.id, amount = %rule.amount, "Created recurring rule");
        self.notify(
            ChangeEvent::new(owner, ChangeOp::Create, EntityKind::Rule)
                .subject(ChangeSubject::Recurring)
                .id(rule.id),
        );
        Ok(rule)
    }

    pub async fn rules(&self, owner: &str, active_only: bool) -> Result<Vec<RecurringRule>> {
        self.store.rules(owner, active_only).await
    }

    pub async fn rule(&self, owner: &str, id: i64) -> Result<RecurringRule> {
        self.store
            .rule(owner, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("rule {}", id)))
    }

    /// Deactivate or reactivate a rule; inactive rules stop projecting
    pub async fn set_rule_active(
        &self,
        owner: &str,
        id: i64,
        active: bool,
    ) -> Result<RecurringRule> {
        let rule = self.store.set_rule_active(owner, id, active).await?;
        self.notify(
            ChangeEvent::new(owner, ChangeOp::Update, EntityKind::Rule)
                .subject(ChangeSubject::Recurring)
                .id(id),
        );
        Ok(rule)
    }

    pub async fn delete_rule(&self, owner: &str, id: i64) -> Result<()> {
        self.store.delete_rule(owner, id).await?;
        self.notify(
            ChangeEvent::new(owner, ChangeOp::Delete, EntityKind::Rule)
                .subject(ChangeSubject::Recurring)
                .id(id),
        );
        Ok(())
    }

    // ========== Ledger ==========

    pub async fn entries(&self, owner: &str, filter: &LedgerFilter) -> Result<Vec<LedgerEntry>> {
        self.store.ledger_entries(owner, filter).await
    }

    /// Record a manual entry
    pub async fn record_entry(&self, owner: &str, new: &NewLedgerEntry) -> Result<LedgerEntry> {
        if new.origin != Origin::Manual {
            return Err(Error::Validation(format!(
                "only manual entries can be recorded directly, got {}",
                new.origin
            )));
        }
        let entry = self.store.create_ledger_entry(owner, new).await?;
        self.notify(
            ChangeEvent::new(owner, ChangeOp::Create, EntityKind::LedgerEntry)
                .subject(entry.kind.into())
                .id(entry.id),
        );
        Ok(entry)
    }

    /// Split a card purchase into monthly confirmed entries sharing a group id
    pub async fn record_installments(
        &self,
        owner: &str,
        purchase: &InstallmentPurchase,
    ) -> Result<Vec<LedgerEntry>> {
        let n = purchase.installments;
        if n == 0 || n > MAX_INSTALLMENTS {
            return Err(Error::Validation(format!(
                "installments must be between 1 and {}",
                MAX_INSTALLMENTS
            )));
        }
        crate::models::validate_amount(purchase.total_amount, false)?;
        let amounts = split_installments(purchase.total_amount, n);
        if amounts.iter().any(|a| *a <= Decimal::ZERO) {
            return Err(Error::Validation(format!(
                "{} is too small to split into {} installments",
                purchase.total_amount, n
            )));
        }

        let group_id = format!(
            "inst-{}-{}",
            purchase.card_id,
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );

        let mut batch = Vec::with_capacity(amounts.len());
        for (i, amount) in amounts.into_iter().enumerate() {
            let offset = i as u32;
            let date = purchase
                .first_date
                .checked_add_months(Months::new(offset))
                .ok_or_else(|| Error::Validation("installment date out of range".to_string()))?;
            batch.push(NewLedgerEntry {
                description: format!("{} ({}/{})", purchase.description, offset + 1, n),
                amount,
                date,
                kind: EntryKind::CardExpense,
                category_id: purchase.category_id,
                target: Target::Card(purchase.card_id),
                status: EntryStatus::Confirmed,
                origin: Origin::Manual,
                rule_id: None,
                installment: Some(Installment {
                    index: offset + 1,
                    total: n,
                    group_id: group_id.clone(),
                }),
                invoice_id: None,
                note: purchase.note.clone(),
            });
        }

        let entries = self.store.create_ledger_entries(owner, &batch).await?;
        info!(owner, group_id = %group_id, count = entries.len(), "Recorded installment purchase");
        self.notify(
            ChangeEvent::new(owner, ChangeOp::Create, EntityKind::LedgerEntry)
                .subject(ChangeSubject::CardExpense)
                .ids(entries.iter().map(|e| e.id)),
        );
        Ok(entries)
    }

    /// Mark a pending entry confirmed
    pub async fn confirm_entry(&self, owner: &str, id: i64) -> Result<LedgerEntry> {
        let current = self
            .store
            .ledger_entry(owner, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("ledger entry {}", id)))?;
        if current.status == EntryStatus::Confirmed {
            return Ok(current);
        }
        let entry = self
            .store
            .update_ledger_entry(
                owner,
                id,
                &LedgerEntryUpdate {
                    status: Some(EntryStatus::Confirmed),
                    ..Default::default()
                },
            )
            .await?;
        self.notify(
            ChangeEvent::new(owner, ChangeOp::Confirm, EntityKind::LedgerEntry)
                .subject(entry.kind.into())
                .id(entry.id),
        );
        Ok(entry)
    }

    /// Delete an entry. Removing a realization brings the rule's virtual
    /// occurrence back for that month.
    pub async fn delete_entry(&self, owner: &str, id: i64) -> Result<()> {
        let entry = self
            .store
            .ledger_entry(owner, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("ledger entry {}", id)))?;
        self.store.delete_ledger_entry(owner, id).await?;
        let subject = if entry.origin.is_realization() {
            ChangeSubject::Recurring
        } else {
            entry.kind.into()
        };
        self.notify(
            ChangeEvent::new(owner, ChangeOp::Delete, EntityKind::LedgerEntry)
                .subject(subject)
                .id(id),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_split_installments_remainder_on_first() {
        let parts = split_installments(dec!(100), 3);
        assert_eq!(parts, vec![dec!(33.34), dec!(33.33), dec!(33.33)]);
        assert_eq!(parts.iter().sum::<Decimal>(), dec!(100));
    }

    #[test]
    fn test_split_installments_even() {
        assert_eq!(split_installments(dec!(90), 3), vec![dec!(30); 3]);
        assert_eq!(split_installments(dec!(12.5), 1), vec![dec!(12.5)]);
    }
}
