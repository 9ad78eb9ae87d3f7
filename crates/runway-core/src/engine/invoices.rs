//! Card invoice lifecycle: open, preview, auto-close, pay

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::types::{AutoCloseFailure, AutoCloseReport, InvoicePreview, VirtualOccurrence};
use super::Engine;
use crate::db::LedgerFilter;
use crate::error::{Error, Result};
use crate::events::{ChangeEvent, ChangeOp, EntityKind};
use crate::models::{
    EntryKind, EntryStatus, Invoice, InvoiceStatus, LedgerEntry, NewLedgerEntry, Origin, Target,
};
use crate::period::Period;
use crate::store::InvoiceFilter;

/// The invoice an unlinked charge on `card_id` dated `date` is billed on
///
/// Normally the invoice whose window covers the date. A charge recorded after
/// that invoice already closed moves to the card's earliest open invoice
/// closing after it. `None` when no invoice takes it yet.
pub(crate) fn billing_invoice(
    invoices: &[Invoice],
    card_id: i64,
    date: NaiveDate,
) -> Option<&Invoice> {
    let card_invoices = invoices.iter().filter(|inv| inv.card_id == card_id);
    let window = card_invoices.clone().find(|inv| inv.covers(date))?;
    if !window.is_settled_total() {
        return Some(window);
    }
    card_invoices
        .filter(|inv| inv.status == InvoiceStatus::Open && inv.closing_date > date)
        .min_by_key(|inv| inv.closing_date)
}

impl Engine {
    /// Charges an open invoice would freeze right now: unlinked card entries
    /// billed on it (its window plus late charges from already closed
    /// windows), plus the window's still-virtual card occurrences when enabled
    pub(crate) async fn invoice_charges(
        &self,
        owner: &str,
        invoice: &Invoice,
    ) -> Result<(Vec<LedgerEntry>, Vec<VirtualOccurrence>)> {
        let (start, end) = invoice.billing_window();
        let first = start.succ_opt().unwrap_or(start);

        let card_invoices = self
            .store
            .invoices(owner, &InvoiceFilter::new().card(invoice.card_id))
            .await?;
        let entries: Vec<LedgerEntry> = self
            .store
            .ledger_entries(owner, &LedgerFilter::new().card(invoice.card_id).until(end))
            .await?
            .into_iter()
            .filter(|e| match e.invoice_id {
                Some(id) => id == invoice.id,
                None => billing_invoice(&card_invoices, invoice.card_id, e.date)
                    .is_some_and(|owner_invoice| owner_invoice.id == invoice.id),
            })
            .collect();

        let virtuals = if self.settings.include_virtual_card_charges {
            self.virtuals_between(owner, first, end)
                .await?
                .into_iter()
                .filter(|v| v.target == Target::Card(invoice.card_id))
                .collect()
        } else {
            Vec::new()
        };

        Ok((entries, virtuals))
    }

    pub async fn invoices(&self, owner: &str, filter: &InvoiceFilter) -> Result<Vec<Invoice>> {
        self.store.invoices(owner, filter).await
    }

    /// Open the card's invoice for `period` (idempotent)
    pub async fn open_invoice(&self, owner: &str, card_id: i64, period: Period) -> Result<Invoice> {
        let card = self
            .store
            .card(owner, card_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("card {}", card_id)))?;
        let invoice = self.store.open_invoice(owner, &card, period).await?;
        self.notify(ChangeEvent::new(owner, ChangeOp::Create, EntityKind::Invoice).id(invoice.id));
        Ok(invoice)
    }

    /// Make sure every card has an invoice for the month of `as_of`
    pub async fn open_current_invoices(&self, owner: &str, as_of: NaiveDate) -> Result<Vec<Invoice>> {
        let period = Period::of(as_of);
        let mut opened = Vec::new();
        for card in self.store.cards(owner).await? {
            opened.push(self.store.open_invoice(owner, &card, period).await?);
        }
        if !opened.is_empty() {
            self.notify(
                ChangeEvent::new(owner, ChangeOp::Create, EntityKind::Invoice)
                    .ids(opened.iter().map(|i| i.id)),
            );
        }
        Ok(opened)
    }

    /// Invoice with its charges; the total is live while open and frozen after
    pub async fn invoice_preview(&self, owner: &str, invoice_id: i64) -> Result<InvoicePreview> {
        let invoice = self
            .store
            .invoice(owner, invoice_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("invoice {}", invoice_id)))?;

        if invoice.is_settled_total() {
            let entries = self
                .store
                .ledger_entries(owner, &LedgerFilter::new().invoice(invoice.id))
                .await?
                .into_iter()
                .filter(|e| e.origin != Origin::Invoice)
                .collect();
            return Ok(InvoicePreview {
                total: invoice.total,
                invoice,
                entries,
                virtuals: Vec::new(),
                computed_at: Utc::now(),
            });
        }

        let (entries, virtuals) = self.invoice_charges(owner, &invoice).await?;
        let total = charges_total(&entries, &virtuals);
        Ok(InvoicePreview {
            invoice,
            entries,
            virtuals,
            total,
            computed_at: Utc::now(),
        })
    }

    /// Close every open invoice whose closing date is on or before `as_of`
    ///
    /// Each invoice is handled on its own; a failure is logged, reported and
    /// the scan moves on.
    pub async fn auto_close_due(&self, owner: &str, as_of: NaiveDate) -> AutoCloseReport {
        let mut report = AutoCloseReport {
            as_of,
            closed: Vec::new(),
            failures: Vec::new(),
        };

        let due = match self
            .store
            .invoices(
                owner,
                &InvoiceFilter::new()
                    .status(InvoiceStatus::Open)
                    .closing_until(as_of),
            )
            .await
        {
            Ok(invoices) => invoices,
            Err(e) => {
                warn!(owner, as_of = %as_of, error = %e, "Failed to list invoices for auto-close");
                report.failures.push(AutoCloseFailure {
                    invoice_id: None,
                    message: e.to_string(),
                });
                return report;
            }
        };

        for invoice in due {
            match self.close_one(owner, &invoice).await {
                Ok(closed) => {
                    info!(
                        owner,
                        invoice_id = closed.id,
                        card_id = closed.card_id,
                        period = %closed.period,
                        total = %closed.total,
                        "Invoice auto-closed"
                    );
                    report.closed.push(closed);
                }
                Err(e) => {
                    warn!(owner, invoice_id = invoice.id, error = %e, "Invoice auto-close failed");
                    report.failures.push(AutoCloseFailure {
                        invoice_id: Some(invoice.id),
                        message: e.to_string(),
                    });
                }
            }
        }

        if !report.closed.is_empty() {
            self.notify(
                ChangeEvent::new(owner, ChangeOp::Update, EntityKind::Invoice)
                    .ids(report.closed.iter().map(|i| i.id)),
            );
        }
        debug!(
            owner,
            as_of = %as_of,
            closed = report.closed.len(),
            failed = report.failures.len(),
            "Auto-close scan finished"
        );
        report
    }

    async fn close_one(&self, owner: &str, invoice: &Invoice) -> Result<Invoice> {
        let (entries, virtuals) = self.invoice_charges(owner, invoice).await?;
        let total = charges_total(&entries, &virtuals);
        let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
        self.store
            .close_invoice(owner, invoice.id, total, &ids)
            .await
    }

    /// Pay a closed invoice from `account_id` (the card's paying account by
    /// default), recording a confirmed expense on that account
    pub async fn pay_invoice(
        &self,
        owner: &str,
        invoice_id: i64,
        account_id: Option<i64>,
        date: NaiveDate,
    ) -> Result<(Invoice, LedgerEntry)> {
        let invoice = self
            .store
            .invoice(owner, invoice_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("invoice {}", invoice_id)))?;
        let card = self
            .store
            .card(owner, invoice.card_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("card {}", invoice.card_id)))?;

        let account_id = account_id.or(card.payment_account_id).ok_or_else(|| {
            Error::Validation(format!(
                "card {} has no paying account; pass one explicitly",
                card.id
            ))
        })?;
        if invoice.status != InvoiceStatus::Closed {
            return Err(Error::Conflict(format!(
                "invoice {} is {}, only closed invoices can be paid",
                invoice_id, invoice.status
            )));
        }
        if invoice.total <= Decimal::ZERO {
            return Err(Error::Validation(format!(
                "invoice {} has nothing to pay",
                invoice_id
            )));
        }

        let payment = NewLedgerEntry {
            description: format!("{} invoice {}", card.name, invoice.period),
            amount: invoice.total,
            date,
            kind: EntryKind::Expense,
            category_id: None,
            target: Target::Account(account_id),
            status: EntryStatus::Confirmed,
            origin: Origin::Invoice,
            rule_id: None,
            installment: None,
            invoice_id: Some(invoice.id),
            note: None,
        };
        let (invoice, entry) = self.store.pay_invoice(owner, invoice.id, &payment).await?;

        self.notify(ChangeEvent::new(owner, ChangeOp::Update, EntityKind::Invoice).id(invoice.id));
        self.notify(ChangeEvent::new(owner, ChangeOp::Create, EntityKind::LedgerEntry).id(entry.id));
        Ok((invoice, entry))
    }
}

fn charges_total(entries: &[LedgerEntry], virtuals: &[VirtualOccurrence]) -> Decimal {
    entries.iter().map(|e| e.amount).sum::<Decimal>()
        + virtuals.iter().map(|v| v.amount).sum::<Decimal>()
}
