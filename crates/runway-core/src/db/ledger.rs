//! Ledger entry operations

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{
    get_date, get_decimal, get_parsed, is_unique_violation, parse_datetime, Database, LedgerFilter,
};
use crate::error::{Error, Result};
use crate::models::{Installment, LedgerEntry, LedgerEntryUpdate, NewLedgerEntry, Target};
use crate::period::Period;

const ENTRY_COLUMNS: &str = "e.id, e.owner, e.description, e.amount, e.date, e.kind, \
     e.category_id, e.account_id, e.card_id, e.status, e.origin, e.rule_id, \
     e.installment_index, e.installment_total, e.installment_group, e.invoice_id, e.note, \
     e.created_at";

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let account_id: Option<i64> = row.get(7)?;
    let card_id: Option<i64> = row.get(8)?;
    let target = Target::from_columns(account_id, card_id).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            rusqlite::types::Type::Integer,
            "entry must target exactly one of account/card".into(),
        )
    })?;

    let index: Option<u32> = row.get(12)?;
    let total: Option<u32> = row.get(13)?;
    let group: Option<String> = row.get(14)?;
    let installment = match (index, total, group) {
        (Some(index), Some(total), Some(group_id)) => Some(Installment {
            index,
            total,
            group_id,
        }),
        _ => None,
    };
    let created_at: String = row.get(17)?;

    Ok(LedgerEntry {
        id: row.get(0)?,
        owner: row.get(1)?,
        description: row.get(2)?,
        amount: get_decimal(row, 3)?,
        date: get_date(row, 4)?,
        kind: get_parsed(row, 5)?,
        category_id: row.get(6)?,
        target,
        status: get_parsed(row, 9)?,
        origin: get_parsed(row, 10)?,
        rule_id: row.get(11)?,
        installment,
        invoice_id: row.get(15)?,
        note: row.get(16)?,
        created_at: parse_datetime(&created_at),
    })
}

/// Insert one entry on an open connection/transaction, mapping a second
/// realization of the same rule and month to `Conflict`
pub(super) fn insert_entry(conn: &Connection, owner: &str, new: &NewLedgerEntry) -> Result<i64> {
    let installment = new.installment.as_ref();
    let result = conn.execute(
        r#"
        INSERT INTO ledger_entries
            (owner, description, amount, date, period_key, kind, category_id, account_id,
             card_id, status, origin, rule_id, installment_index, installment_total,
             installment_group, invoice_id, note)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            owner,
            new.description,
            new.amount.to_string(),
            new.date.to_string(),
            Period::of(new.date).key(),
            new.kind.as_str(),
            new.category_id,
            new.target.account_id(),
            new.target.card_id(),
            new.status.as_str(),
            new.origin.as_str(),
            new.rule_id,
            installment.map(|i| i.index),
            installment.map(|i| i.total),
            installment.map(|i| i.group_id.clone()),
            new.invoice_id,
            new.note,
        ],
    );

    match result {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(e) if is_unique_violation(&e) => Err(Error::Conflict(format!(
            "rule {} is already realized in {}",
            new.rule_id.unwrap_or_default(),
            Period::of(new.date)
        ))),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    fn check_entry_refs(&self, owner: &str, new: &NewLedgerEntry) -> Result<()> {
        match new.target {
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
        if let Some(rule_id) = new.rule_id {
            if self.get_rule(owner, rule_id)?.is_none() {
                return Err(Error::NotFound(format!("rule {}", rule_id)));
            }
        }
        Ok(())
    }

    /// Record a ledger entry
    ///
    /// Returns `Error::Conflict` if the entry would be a second realization
    /// of the same rule in the same month.
    pub fn create_ledger_entry(&self, owner: &str, new: &NewLedgerEntry) -> Result<LedgerEntry> {
        new.validate()?;
        self.check_entry_refs(owner, new)?;

        let conn = self.conn()?;
        let id = insert_entry(&conn, owner, new)?;
        self.get_ledger_entry(owner, id)?
            .ok_or_else(|| Error::NotFound(format!("ledger entry {}", id)))
    }

    /// Record several entries atomically (installment purchases)
    pub fn create_ledger_entries(
        &self,
        owner: &str,
        entries: &[NewLedgerEntry],
    ) -> Result<Vec<LedgerEntry>> {
        for new in entries {
            new.validate()?;
            self.check_entry_refs(owner, new)?;
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(entries.len());
        for new in entries {
            ids.push(insert_entry(&tx, owner, new)?);
        }
        tx.commit()?;

        let mut created = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = self.get_ledger_entry(owner, id)? {
                created.push(entry);
            }
        }
        Ok(created)
    }

    /// Query ledger entries, oldest first
    pub fn list_ledger_entries(
        &self,
        owner: &str,
        filter: &LedgerFilter,
    ) -> Result<Vec<LedgerEntry>> {
        let conn = self.conn()?;
        let built = filter.build(owner);
        let sql = format!(
            "SELECT {} FROM ledger_entries e {} {}",
            ENTRY_COLUMNS, built.where_clause, built.order_clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(built.params_refs().as_slice(), row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn get_ledger_entry(&self, owner: &str, id: i64) -> Result<Option<LedgerEntry>> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                &format!(
                    "SELECT {} FROM ledger_entries e WHERE e.owner = ? AND e.id = ?",
                    ENTRY_COLUMNS
                ),
                params![owner, id],
                row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }

    /// Apply a partial update
    pub fn update_ledger_entry(
        &self,
        owner: &str,
        id: i64,
        update: &LedgerEntryUpdate,
    ) -> Result<LedgerEntry> {
        let current = self
            .get_ledger_entry(owner, id)?
            .ok_or_else(|| Error::NotFound(format!("ledger entry {}", id)))?;

        let amount = update.amount.unwrap_or(current.amount);
        let origin = update.origin.unwrap_or(current.origin);
        crate::models::validate_amount(amount, origin == crate::models::Origin::RecurringSkip)?;

        let conn = self.conn()?;
        let result = conn.execute(
            r#"
            UPDATE ledger_entries
            SET amount = ?, status = ?, origin = ?, note = ?, invoice_id = ?
            WHERE owner = ? AND id = ?
            "#,
            params![
                amount.to_string(),
                update.status.unwrap_or(current.status).as_str(),
                origin.as_str(),
                update.note.clone().or(current.note),
                update.invoice_id.or(current.invoice_id),
                owner,
                id,
            ],
        );
        match result {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(Error::Conflict(format!(
                    "ledger entry {} would duplicate a realization",
                    id
                )))
            }
            Err(e) => return Err(e.into()),
        }

        self.get_ledger_entry(owner, id)?
            .ok_or_else(|| Error::NotFound(format!("ledger entry {}", id)))
    }

    pub fn delete_ledger_entry(&self, owner: &str, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM ledger_entries WHERE owner = ? AND id = ?",
            params![owner, id],
        )?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("ledger entry {}", id)));
        }
        Ok(())
    }
}
