//! Occurrence materializer
//!
//! Projects active rules into a month. The projection is a pure function of
//! its inputs: the same rules and ledger snapshot always yield the same
//! occurrences, keys and order.

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::types::VirtualOccurrence;
use super::Engine;
use crate::db::LedgerFilter;
use crate::error::{Error, Result};
use crate::models::{LedgerEntry, RecurringRule};
use crate::period::Period;

/// Virtual occurrences of `rules` in `period` not yet realized by any entry
/// in `existing`
///
/// A rule is realized in a month by a linked entry with a recurring,
/// adjustment or skip origin. Output is ordered by date, then rule id.
pub fn materialize(
    rules: &[RecurringRule],
    period: Period,
    existing: &[LedgerEntry],
) -> Vec<VirtualOccurrence> {
    let realized: HashSet<i64> = existing
        .iter()
        .filter(|e| e.origin.is_realization() && period.contains(e.date))
        .filter_map(|e| e.rule_id)
        .collect();

    let mut occurrences: Vec<VirtualOccurrence> = rules
        .iter()
        .filter(|rule| rule.active && !realized.contains(&rule.id))
        .filter_map(|rule| {
            rule.occurrence_date(period)
                .map(|date| VirtualOccurrence::from_rule(rule, date))
        })
        .collect();

    occurrences.sort_by(|a, b| a.date.cmp(&b.date).then(a.rule_id.cmp(&b.rule_id)));
    occurrences
}

impl Engine {
    /// Materialize one month straight from the store
    ///
    /// Read path: a failed fetch yields no occurrences rather than an error.
    pub async fn materialize_month(&self, owner: &str, period: Period) -> Vec<VirtualOccurrence> {
        match self
            .virtuals_between(owner, period.first_day(), period.last_day())
            .await
        {
            Ok(occurrences) => occurrences,
            Err(e) => {
                warn!(owner, period = %period, error = %e, "Materialization failed");
                Vec::new()
            }
        }
    }

    /// Upcoming obligations: virtual occurrences dated in `[from, to]`
    pub async fn upcoming(
        &self,
        owner: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<VirtualOccurrence>> {
        if to < from {
            return Err(Error::Validation(format!(
                "end date {} is before start date {}",
                to, from
            )));
        }
        self.virtuals_between(owner, from, to).await
    }

    /// Virtual occurrences across every month touching `[from, to]`, clipped
    /// to the range
    pub(crate) async fn virtuals_between(
        &self,
        owner: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<VirtualOccurrence>> {
        let first = Period::of(from);
        let last = Period::of(to);

        let rules = self.store.rules(owner, true).await?;
        // Realizations anywhere in the touched months, not just the clipped range
        let realizations = self
            .store
            .ledger_entries(
                owner,
                &LedgerFilter::new()
                    .date_range(first.first_day(), last.last_day())
                    .realizations(),
            )
            .await?;

        let mut occurrences = Vec::new();
        for period in first.through(last) {
            occurrences.extend(
                materialize(&rules, period, &realizations)
                    .into_iter()
                    .filter(|v| v.date >= from && v.date <= to),
            );
        }

        debug!(
            owner,
            from = %from,
            to = %to,
            rules = rules.len(),
            count = occurrences.len(),
            "Materialized virtual occurrences"
        );
        Ok(occurrences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryKind, EntryStatus, Origin, Target};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rule(id: i64, day: u32) -> RecurringRule {
        RecurringRule {
            id,
            owner: "alice".to_string(),
            description: format!("Rule {}", id),
            amount: dec!(100),
            kind: EntryKind::Expense,
            category_id: None,
            target: Target::Account(1),
            day_of_month: day,
            start_date: date(2024, 1, 1),
            end_date: None,
            active: true,
            note: None,
            revisions: vec![],
            created_at: Utc::now(),
        }
    }

    fn entry(rule_id: i64, on: NaiveDate, origin: Origin) -> LedgerEntry {
        LedgerEntry {
            id: 1,
            owner: "alice".to_string(),
            description: "x".to_string(),
            amount: dec!(100),
            date: on,
            kind: EntryKind::Expense,
            category_id: None,
            target: Target::Account(1),
            status: EntryStatus::Confirmed,
            origin,
            rule_id: Some(rule_id),
            installment: None,
            invoice_id: None,
            note: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_orders_by_date_then_rule() {
        let rules = vec![rule(3, 10), rule(1, 20), rule(2, 10)];
        let period = Period::new(2024, 3).unwrap();
        let out = materialize(&rules, period, &[]);
        let ids: Vec<i64> = out.iter().map(|v| v.rule_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_is_idempotent() {
        let rules = vec![rule(1, 31), rule(2, 5)];
        let period = Period::new(2024, 4).unwrap();
        let a = materialize(&rules, period, &[]);
        let b = materialize(&rules, period, &[]);
        assert_eq!(a, b);
        assert_eq!(a[1].date, date(2024, 4, 30));
    }

    #[test]
    fn test_realized_rules_are_suppressed() {
        let rules = vec![rule(1, 5), rule(2, 5), rule(3, 5)];
        let period = Period::new(2024, 3).unwrap();
        let existing = vec![
            entry(1, date(2024, 3, 7), Origin::Recurring),
            entry(2, date(2024, 3, 5), Origin::RecurringSkip),
            // Manual entries linked to a rule do not realize it
            entry(3, date(2024, 3, 5), Origin::Manual),
        ];
        let out = materialize(&rules, period, &existing);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rule_id, 3);
    }

    #[test]
    fn test_realization_in_other_month_does_not_suppress() {
        let rules = vec![rule(1, 5)];
        let existing = vec![entry(1, date(2024, 2, 5), Origin::Recurring)];
        let out = materialize(&rules, Period::new(2024, 3).unwrap(), &existing);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_inactive_rules_are_ignored() {
        let mut r = rule(1, 5);
        r.active = false;
        assert!(materialize(&[r], Period::new(2024, 3).unwrap(), &[]).is_empty());
    }
}
