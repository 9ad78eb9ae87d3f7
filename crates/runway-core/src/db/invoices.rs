//! Card invoice operations

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use rust_decimal::Decimal;
use tracing::info;

use super::ledger_filter::FilterResult;
use super::{format_datetime, get_date, get_decimal, get_parsed, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Card, Invoice, InvoiceStatus, LedgerEntry, NewLedgerEntry, Origin};
use crate::period::Period;
use crate::store::InvoiceFilter;

const INVOICE_COLUMNS: &str = "id, owner, card_id, period_key, window_start, closing_date, \
     due_date, status, total, closed_at, paid_at";

fn row_to_invoice(row: &Row<'_>) -> rusqlite::Result<Invoice> {
    let closed_at: Option<String> = row.get(9)?;
    let paid_at: Option<String> = row.get(10)?;
    Ok(Invoice {
        id: row.get(0)?,
        owner: row.get(1)?,
        card_id: row.get(2)?,
        period: get_parsed(row, 3)?,
        window_start: get_date(row, 4)?,
        closing_date: get_date(row, 5)?,
        due_date: get_date(row, 6)?,
        status: get_parsed(row, 7)?,
        total: get_decimal(row, 8)?,
        closed_at: closed_at.as_deref().map(parse_datetime),
        paid_at: paid_at.as_deref().map(parse_datetime),
    })
}

fn build_filter(owner: &str, filter: &InvoiceFilter) -> FilterResult {
    let mut conditions = vec!["owner = ?".to_string()];
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(owner.to_string())];

    if let Some(card_id) = filter.card_id {
        conditions.push("card_id = ?".to_string());
        params.push(Box::new(card_id));
    }
    if let Some(statuses) = &filter.statuses {
        if statuses.is_empty() {
            conditions.push("0".to_string());
        } else {
            let placeholders: Vec<&str> = statuses.iter().map(|_| "?").collect();
            conditions.push(format!("status IN ({})", placeholders.join(", ")));
            for status in statuses {
                params.push(Box::new(status.as_str()));
            }
        }
    }
    if let Some(period) = filter.period {
        conditions.push("period_key = ?".to_string());
        params.push(Box::new(period.key()));
    }
    if let Some(from) = filter.due_from {
        conditions.push("due_date >= ?".to_string());
        params.push(Box::new(from.to_string()));
    }
    if let Some(to) = filter.due_to {
        conditions.push("due_date <= ?".to_string());
        params.push(Box::new(to.to_string()));
    }
    if let Some(from) = filter.closing_from {
        conditions.push("closing_date >= ?".to_string());
        params.push(Box::new(from.to_string()));
    }
    if let Some(to) = filter.closing_to {
        conditions.push("closing_date <= ?".to_string());
        params.push(Box::new(to.to_string()));
    }

    FilterResult {
        where_clause: format!("WHERE {}", conditions.join(" AND ")),
        order_clause: "ORDER BY closing_date ASC, id ASC",
        params,
    }
}

impl Database {
    pub fn list_invoices(&self, owner: &str, filter: &InvoiceFilter) -> Result<Vec<Invoice>> {
        let conn = self.conn()?;
        let built = build_filter(owner, filter);
        let sql = format!(
            "SELECT {} FROM invoices {} {}",
            INVOICE_COLUMNS, built.where_clause, built.order_clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let invoices = stmt
            .query_map(built.params_refs().as_slice(), row_to_invoice)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(invoices)
    }

    pub fn get_invoice(&self, owner: &str, id: i64) -> Result<Option<Invoice>> {
        let conn = self.conn()?;
        let invoice = conn
            .query_row(
                &format!(
                    "SELECT {} FROM invoices WHERE owner = ? AND id = ?",
                    INVOICE_COLUMNS
                ),
                params![owner, id],
                row_to_invoice,
            )
            .optional()?;
        Ok(invoice)
    }

    /// Open the card's invoice for `period`, or return the existing one
    pub fn open_invoice(&self, owner: &str, card: &Card, period: Period) -> Result<Invoice> {
        if card.owner != owner {
            return Err(Error::NotFound(format!("card {}", card.id)));
        }
        let (window_start, closing) = card.billing_window(period);
        let (_, due) = card.invoice_dates(period);

        let conn = self.conn()?;
        let inserted = conn.execute(
            r#"
            INSERT INTO invoices (owner, card_id, period_key, window_start, closing_date, due_date)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(card_id, period_key) DO NOTHING
            "#,
            params![
                owner,
                card.id,
                period.key(),
                window_start.to_string(),
                closing.to_string(),
                due.to_string()
            ],
        )?;
        if inserted > 0 {
            info!(card_id = card.id, period = %period, "Opened invoice");
        }

        let invoice = conn.query_row(
            &format!(
                "SELECT {} FROM invoices WHERE owner = ? AND card_id = ? AND period_key = ?",
                INVOICE_COLUMNS
            ),
            params![owner, card.id, period.key()],
            row_to_invoice,
        )?;
        Ok(invoice)
    }

    /// Freeze an open invoice's total and link the ledger entries it covers
    ///
    /// Fails with `Conflict` if the invoice is no longer open.
    pub fn close_invoice(
        &self,
        owner: &str,
        id: i64,
        total: Decimal,
        entry_ids: &[i64],
    ) -> Result<Invoice> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let updated = tx.execute(
            r#"
            UPDATE invoices SET status = 'closed', total = ?, closed_at = ?
            WHERE owner = ? AND id = ? AND status = 'open'
            "#,
            params![
                total.to_string(),
                format_datetime(Utc::now()),
                owner,
                id
            ],
        )?;
        if updated == 0 {
            let exists: Option<String> = tx
                .query_row(
                    "SELECT status FROM invoices WHERE owner = ? AND id = ?",
                    params![owner, id],
                    |row| row.get(0),
                )
                .optional()?;
            return Err(match exists {
                Some(status) => Error::Conflict(format!("invoice {} is already {}", id, status)),
                None => Error::NotFound(format!("invoice {}", id)),
            });
        }

        for entry_id in entry_ids {
            tx.execute(
                "UPDATE ledger_entries SET invoice_id = ? WHERE owner = ? AND id = ?",
                params![id, owner, entry_id],
            )?;
        }
        tx.commit()?;

        self.get_invoice(owner, id)?
            .ok_or_else(|| Error::NotFound(format!("invoice {}", id)))
    }

    /// Mark a closed invoice paid and record the payment entry, atomically
    pub fn pay_invoice(
        &self,
        owner: &str,
        id: i64,
        payment: &NewLedgerEntry,
    ) -> Result<(Invoice, LedgerEntry)> {
        payment.validate()?;
        if payment.origin != Origin::Invoice {
            return Err(Error::Validation(
                "invoice payments must have origin 'invoice'".to_string(),
            ));
        }
        let invoice = self
            .get_invoice(owner, id)?
            .ok_or_else(|| Error::NotFound(format!("invoice {}", id)))?;
        if invoice.status != InvoiceStatus::Closed {
            return Err(Error::Conflict(format!(
                "invoice {} is {}, only closed invoices can be paid",
                id, invoice.status
            )));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE invoices SET status = 'paid', paid_at = ? WHERE owner = ? AND id = ?",
            params![format_datetime(Utc::now()), owner, id],
        )?;
        let entry_id = super::ledger::insert_entry(&tx, owner, payment)?;
        tx.commit()?;

        info!(invoice_id = id, amount = %payment.amount, "Invoice paid");

        let invoice = self
            .get_invoice(owner, id)?
            .ok_or_else(|| Error::NotFound(format!("invoice {}", id)))?;
        let entry = self
            .get_ledger_entry(owner, entry_id)?
            .ok_or_else(|| Error::NotFound(format!("ledger entry {}", entry_id)))?;
        Ok((invoice, entry))
    }
}
