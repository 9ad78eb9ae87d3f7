//! Recurring rule operations

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use tracing::info;

use super::{get_date, get_decimal, get_opt_date, get_parsed, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{AmountRevision, NewRecurringRule, RecurringRule, Target};
use crate::period::Period;

const RULE_COLUMNS: &str = "id, owner, description, amount, kind, category_id, account_id, \
     card_id, day_of_month, start_date, end_date, active, note, created_at";

fn row_to_rule(row: &Row<'_>) -> rusqlite::Result<RecurringRule> {
    let account_id: Option<i64> = row.get(6)?;
    let card_id: Option<i64> = row.get(7)?;
    let target = Target::from_columns(account_id, card_id).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Integer,
            "rule must target exactly one of account/card".into(),
        )
    })?;
    let created_at: String = row.get(13)?;

    Ok(RecurringRule {
        id: row.get(0)?,
        owner: row.get(1)?,
        description: row.get(2)?,
        amount: get_decimal(row, 3)?,
        kind: get_parsed(row, 4)?,
        category_id: row.get(5)?,
        target,
        day_of_month: row.get(8)?,
        start_date: get_date(row, 9)?,
        end_date: get_opt_date(row, 10)?,
        active: row.get(11)?,
        note: row.get(12)?,
        revisions: Vec::new(),
        created_at: parse_datetime(&created_at),
    })
}

fn load_revisions(conn: &Connection, rule_id: i64) -> Result<Vec<AmountRevision>> {
    let mut stmt = conn.prepare(
        "SELECT effective_from, previous_amount FROM rule_amount_revisions
         WHERE rule_id = ? ORDER BY effective_from",
    )?;
    let revisions = stmt
        .query_map(params![rule_id], |row| {
            Ok(AmountRevision {
                effective_from: get_parsed(row, 0)?,
                previous_amount: get_decimal(row, 1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(revisions)
}

impl Database {
    /// Ensure an account/card/category id belongs to the owner
    fn check_rule_refs(&self, owner: &str, target: Target, category_id: Option<i64>) -> Result<()> {
        match target {
            Target::Account(id) => {
                if self.get_account(owner, id)?.is_none() {
                    return Err(Error::NotFound(format!("account {}", id)));
                }
            }
            Target::Card(id) => {
                if self.get_card(owner, id)?.is_none() {
                    return Err(Error::NotFound(format!("card {}", id)));
                }
            }
        }
        if let Some(category_id) = category_id {
            let conn = self.conn()?;
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT id FROM categories WHERE owner = ? AND id = ?",
                    params![owner, category_id],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Err(Error::NotFound(format!("category {}", category_id)));
            }
        }
        Ok(())
    }

    /// Create a recurring rule
    pub fn create_rule(&self, owner: &str, new: &NewRecurringRule) -> Result<RecurringRule> {
        new.validate()?;
        self.check_rule_refs(owner, new.target, new.category_id)?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO recurring_rules
                (owner, description, amount, kind, category_id, account_id, card_id,
                 day_of_month, start_date, end_date, note)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                owner,
                new.description.trim(),
                new.amount.to_string(),
                new.kind.as_str(),
                new.category_id,
                new.target.account_id(),
                new.target.card_id(),
                new.day_of_month,
                new.start_date.to_string(),
                new.end_date.map(|d| d.to_string()),
                new.note,
            ],
        )?;
        let id = conn.last_insert_rowid();
        info!(rule_id = id, owner, kind = %new.kind, "Created recurring rule");

        self.get_rule(owner, id)?
            .ok_or_else(|| Error::NotFound(format!("rule {}", id)))
    }

    /// List rules, optionally only the active ones
    pub fn list_rules(&self, owner: &str, active_only: bool) -> Result<Vec<RecurringRule>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM recurring_rules WHERE owner = ? {} ORDER BY id",
            RULE_COLUMNS,
            if active_only { "AND active = 1" } else { "" }
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rules = stmt
            .query_map(params![owner], row_to_rule)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // One pass over the owner's revisions instead of one query per rule
        let mut stmt = conn.prepare(
            r#"
            SELECT r.rule_id, r.effective_from, r.previous_amount
            FROM rule_amount_revisions r
            JOIN recurring_rules rr ON rr.id = r.rule_id
            WHERE rr.owner = ?
            ORDER BY r.effective_from
            "#,
        )?;
        let mut by_rule: HashMap<i64, Vec<AmountRevision>> = HashMap::new();
        let rows = stmt.query_map(params![owner], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                AmountRevision {
                    effective_from: get_parsed(row, 1)?,
                    previous_amount: get_decimal(row, 2)?,
                },
            ))
        })?;
        for row in rows {
            let (rule_id, revision) = row?;
            by_rule.entry(rule_id).or_default().push(revision);
        }
        for rule in &mut rules {
            if let Some(revisions) = by_rule.remove(&rule.id) {
                rule.revisions = revisions;
            }
        }

        Ok(rules)
    }

    /// Get a rule by ID, with its revision history
    pub fn get_rule(&self, owner: &str, id: i64) -> Result<Option<RecurringRule>> {
        let conn = self.conn()?;
        let rule = conn
            .query_row(
                &format!(
                    "SELECT {} FROM recurring_rules WHERE owner = ? AND id = ?",
                    RULE_COLUMNS
                ),
                params![owner, id],
                row_to_rule,
            )
            .optional()?;

        match rule {
            Some(mut rule) => {
                rule.revisions = load_revisions(&conn, id)?;
                Ok(Some(rule))
            }
            None => Ok(None),
        }
    }

    /// Change a rule's amount from `effective_from` onward
    ///
    /// Months before `effective_from` keep the amount they had. Revisions at or
    /// after `effective_from` are superseded by this one.
    pub fn change_rule_amount(
        &self,
        owner: &str,
        id: i64,
        effective_from: Period,
        amount: Decimal,
    ) -> Result<RecurringRule> {
        let rule = self
            .get_rule(owner, id)?
            .ok_or_else(|| Error::NotFound(format!("rule {}", id)))?;
        let previous_amount = rule.amount_for(effective_from.pred());

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM rule_amount_revisions WHERE rule_id = ? AND effective_from >= ?",
            params![id, effective_from.key()],
        )?;
        tx.execute(
            "INSERT INTO rule_amount_revisions (rule_id, effective_from, previous_amount) VALUES (?, ?, ?)",
            params![id, effective_from.key(), previous_amount.to_string()],
        )?;
        tx.execute(
            "UPDATE recurring_rules SET amount = ? WHERE owner = ? AND id = ?",
            params![amount.to_string(), owner, id],
        )?;
        tx.commit()?;

        info!(
            rule_id = id,
            effective_from = %effective_from,
            old = %previous_amount,
            new = %amount,
            "Changed recurring rule amount"
        );

        self.get_rule(owner, id)?
            .ok_or_else(|| Error::NotFound(format!("rule {}", id)))
    }

    /// Deactivate or reactivate a rule
    pub fn set_rule_active(&self, owner: &str, id: i64, active: bool) -> Result<RecurringRule> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE recurring_rules SET active = ? WHERE owner = ? AND id = ?",
            params![active, owner, id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("rule {}", id)));
        }
        self.get_rule(owner, id)?
            .ok_or_else(|| Error::NotFound(format!("rule {}", id)))
    }

    /// Hard-delete a rule. Ledger entries that realized it keep their data
    /// and lose the link.
    pub fn delete_rule(&self, owner: &str, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM recurring_rules WHERE owner = ? AND id = ?",
            params![owner, id],
        )?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("rule {}", id)));
        }
        info!(rule_id = id, "Deleted recurring rule");
        Ok(())
    }
}
