//! Period aggregates used by the indicator calculation

use rusqlite::params;
use rust_decimal::Decimal;

use super::{get_decimal, get_parsed, Database};
use crate::error::Result;
use crate::models::{EntryKind, EntryStatus};
use crate::period::Period;
use crate::store::PeriodTotals;

impl Database {
    /// Confirmed/pending income and expense of account-targeted entries dated
    /// in `period`
    ///
    /// Amounts are TEXT, so the sum happens here rather than in SQL to keep
    /// decimal precision.
    pub fn period_totals(&self, owner: &str, period: Period) -> Result<PeriodTotals> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT kind, status, amount FROM ledger_entries
            WHERE owner = ? AND period_key = ? AND account_id IS NOT NULL
            "#,
        )?;
        let rows = stmt.query_map(params![owner, period.key()], |row| {
            Ok((
                get_parsed::<EntryKind>(row, 0)?,
                get_parsed::<EntryStatus>(row, 1)?,
                get_decimal(row, 2)?,
            ))
        })?;

        let mut totals = PeriodTotals::default();
        for row in rows {
            let (kind, status, amount) = row?;
            let bucket = match (kind, status) {
                (EntryKind::Income, EntryStatus::Confirmed) => &mut totals.confirmed_income,
                (EntryKind::Income, EntryStatus::Pending) => &mut totals.pending_income,
                (_, EntryStatus::Confirmed) => &mut totals.confirmed_expense,
                (_, EntryStatus::Pending) => &mut totals.pending_expense,
            };
            *bucket += amount;
        }
        Ok(totals)
    }

    /// Sum of signed confirmed entries on one account up to `as_of`, plus its
    /// opening balance
    pub fn account_balance(
        &self,
        owner: &str,
        account_id: i64,
        as_of: chrono::NaiveDate,
    ) -> Result<Option<Decimal>> {
        let Some(account) = self.get_account(owner, account_id)? else {
            return Ok(None);
        };
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT kind, amount FROM ledger_entries
            WHERE owner = ? AND account_id = ? AND status = 'confirmed' AND date <= ?
            "#,
        )?;
        let rows = stmt.query_map(params![owner, account_id, as_of.to_string()], |row| {
            Ok((get_parsed::<EntryKind>(row, 0)?, get_decimal(row, 1)?))
        })?;

        let mut balance = account.opening_balance;
        for row in rows {
            let (kind, amount) = row?;
            balance += kind.signed(amount);
        }
        Ok(Some(balance))
    }
}
