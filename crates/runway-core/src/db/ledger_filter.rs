//! Ledger filter builder for constructing dynamic SQL queries
//!
//! The same filter value travels through the `Store` trait, so it owns its
//! data instead of borrowing like a one-shot query builder would.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{EntryKind, EntryStatus, LedgerEntry, Origin};
use crate::period::Period;

/// Restrict entries to one side of the account/card split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Account,
    Card,
}

/// Builder for ledger entry queries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub status: Option<EntryStatus>,
    pub kind: Option<EntryKind>,
    pub target_kind: Option<TargetKind>,
    pub account_id: Option<i64>,
    pub card_id: Option<i64>,
    pub rule_id: Option<i64>,
    pub invoice_id: Option<i64>,
    pub origins: Option<Vec<Origin>>,
}

/// Result of building a filter - contains SQL components and parameters
pub struct FilterResult {
    /// WHERE clause including "WHERE" keyword
    pub where_clause: String,
    /// ORDER BY clause including "ORDER BY" keyword
    pub order_clause: &'static str,
    /// Parameters for the query (boxed for rusqlite compatibility)
    pub params: Vec<Box<dyn rusqlite::ToSql>>,
}

impl LedgerFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries dated inside `period`
    pub fn period(self, period: Period) -> Self {
        self.date_range(period.first_day(), period.last_day())
    }

    /// Inclusive date range
    pub fn date_range(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.date_from = Some(from);
        self.date_to = Some(to);
        self
    }

    /// Entries dated on or before `date`
    pub fn until(mut self, date: NaiveDate) -> Self {
        self.date_to = Some(date);
        self
    }

    pub fn status(mut self, status: EntryStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn kind(mut self, kind: EntryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn accounts_only(mut self) -> Self {
        self.target_kind = Some(TargetKind::Account);
        self
    }

    pub fn cards_only(mut self) -> Self {
        self.target_kind = Some(TargetKind::Card);
        self
    }

    pub fn account(mut self, id: i64) -> Self {
        self.account_id = Some(id);
        self
    }

    pub fn card(mut self, id: i64) -> Self {
        self.card_id = Some(id);
        self
    }

    pub fn rule(mut self, id: i64) -> Self {
        self.rule_id = Some(id);
        self
    }

    pub fn invoice(mut self, id: i64) -> Self {
        self.invoice_id = Some(id);
        self
    }

    /// Only the rule-realizing origins (recurring, adjustment, skip)
    pub fn realizations(mut self) -> Self {
        self.origins = Some(Origin::REALIZATIONS.to_vec());
        self
    }

    /// Whether an already loaded entry passes this filter
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.date_from.map_or(true, |d| entry.date >= d)
            && self.date_to.map_or(true, |d| entry.date <= d)
            && self.status.map_or(true, |s| entry.status == s)
            && self.kind.map_or(true, |k| entry.kind == k)
            && self.target_kind.map_or(true, |t| match t {
                TargetKind::Account => entry.target.account_id().is_some(),
                TargetKind::Card => entry.target.card_id().is_some(),
            })
            && self
                .account_id
                .map_or(true, |id| entry.target.account_id() == Some(id))
            && self
                .card_id
                .map_or(true, |id| entry.target.card_id() == Some(id))
            && self.rule_id.map_or(true, |id| entry.rule_id == Some(id))
            && self.invoice_id.map_or(true, |id| entry.invoice_id == Some(id))
            && self
                .origins
                .as_ref()
                .map_or(true, |o| o.contains(&entry.origin))
    }

    /// Build the filter components for an owner-scoped query
    pub fn build(&self, owner: &str) -> FilterResult {
        let mut conditions = vec!["e.owner = ?".to_string()];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(owner.to_string())];

        if let Some(from) = self.date_from {
            conditions.push("e.date >= ?".to_string());
            params.push(Box::new(from.to_string()));
        }

        if let Some(to) = self.date_to {
            conditions.push("e.date <= ?".to_string());
            params.push(Box::new(to.to_string()));
        }

        if let Some(status) = self.status {
            conditions.push("e.status = ?".to_string());
            params.push(Box::new(status.as_str()));
        }

        if let Some(kind) = self.kind {
            conditions.push("e.kind = ?".to_string());
            params.push(Box::new(kind.as_str()));
        }

        match self.target_kind {
            Some(TargetKind::Account) => conditions.push("e.account_id IS NOT NULL".to_string()),
            Some(TargetKind::Card) => conditions.push("e.card_id IS NOT NULL".to_string()),
            None => {}
        }

        if let Some(id) = self.account_id {
            conditions.push("e.account_id = ?".to_string());
            params.push(Box::new(id));
        }

        if let Some(id) = self.card_id {
            conditions.push("e.card_id = ?".to_string());
            params.push(Box::new(id));
        }

        if let Some(id) = self.rule_id {
            conditions.push("e.rule_id = ?".to_string());
            params.push(Box::new(id));
        }

        if let Some(id) = self.invoice_id {
            conditions.push("e.invoice_id = ?".to_string());
            params.push(Box::new(id));
        }

        if let Some(origins) = &self.origins {
            if origins.is_empty() {
                conditions.push("0".to_string());
            } else {
                let placeholders: Vec<&str> = origins.iter().map(|_| "?").collect();
                conditions.push(format!("e.origin IN ({})", placeholders.join(", ")));
                for origin in origins {
                    params.push(Box::new(origin.as_str()));
                }
            }
        }

        FilterResult {
            where_clause: format!("WHERE {}", conditions.join(" AND ")),
            order_clause: "ORDER BY e.date ASC, e.id ASC",
            params,
        }
    }
}

impl FilterResult {
    /// Get parameter references for query execution
    pub fn params_refs(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_is_always_scoped() {
        let result = LedgerFilter::new().build("alice");
        assert_eq!(result.where_clause, "WHERE e.owner = ?");
        assert_eq!(result.params.len(), 1);
    }

    #[test]
    fn test_period_and_realizations() {
        let period = Period::new(2024, 3).unwrap();
        let result = LedgerFilter::new()
            .period(period)
            .rule(4)
            .realizations()
            .build("alice");
        assert!(result.where_clause.contains("e.date >= ?"));
        assert!(result.where_clause.contains("e.date <= ?"));
        assert!(result.where_clause.contains("e.rule_id = ?"));
        assert!(result.where_clause.contains("e.origin IN (?, ?, ?)"));
        // owner + 2 dates + rule + 3 origins
        assert_eq!(result.params.len(), 7);
    }

    #[test]
    fn test_target_kind_has_no_params() {
        let result = LedgerFilter::new().cards_only().build("alice");
        assert!(result.where_clause.contains("e.card_id IS NOT NULL"));
        assert_eq!(result.params.len(), 1);
    }
}
