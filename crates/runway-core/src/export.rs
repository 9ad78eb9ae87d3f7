//! Export of month views
//!
//! Supports:
//! - CSV, one row per transaction in view order (newest first)
//! - JSON, the full view including partial-failure details

use serde::Serialize;

use crate::engine::{MonthView, Transaction, TransactionId};
use crate::error::{Error, Result};

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown export format: {}", s)),
        }
    }
}

/// Flattened transaction row
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    date: String,
    description: &'a str,
    kind: &'a str,
    amount: String,
    signed_amount: String,
    status: &'a str,
    origin: &'a str,
    category: &'a str,
    target: String,
    source: &'static str,
    source_id: String,
    rule_id: Option<i64>,
    installment: String,
    counts_toward_totals: bool,
    note: &'a str,
}

impl<'a> From<&'a Transaction> for CsvRow<'a> {
    fn from(tx: &'a Transaction) -> Self {
        let (source, source_id) = match &tx.id {
            TransactionId::Ledger(id) => ("ledger", id.to_string()),
            TransactionId::Virtual(key) => ("virtual", key.to_string()),
            TransactionId::Invoice(id) => ("invoice", id.to_string()),
        };
        Self {
            date: tx.date.to_string(),
            description: &tx.description,
            kind: tx.kind.as_str(),
            amount: format!("{:.2}", tx.amount),
            signed_amount: format!("{:.2}", tx.signed_amount()),
            status: tx.status.as_str(),
            origin: tx.origin.as_str(),
            category: tx.category_name.as_deref().unwrap_or(""),
            target: tx
                .target_name
                .clone()
                .unwrap_or_else(|| tx.target.to_string()),
            source,
            source_id,
            rule_id: tx.rule_id,
            installment: tx
                .installment
                .as_ref()
                .map(|i| format!("{}/{}", i.index, i.total))
                .unwrap_or_default(),
            counts_toward_totals: tx.counts_toward_totals,
            note: tx.note.as_deref().unwrap_or(""),
        }
    }
}

/// Render a month view as CSV with a header row
pub fn month_view_csv(view: &MonthView) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for tx in &view.transactions {
        writer.serialize(CsvRow::from(tx))?;
    }
    // An empty view still gets its header
    if view.transactions.is_empty() {
        writer.write_record([
            "date",
            "description",
            "kind",
            "amount",
            "signed_amount",
            "status",
            "origin",
            "category",
            "target",
            "source",
            "source_id",
            "rule_id",
            "installment",
            "counts_toward_totals",
            "note",
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| Error::Validation(format!("non-UTF-8 export: {}", e)))
}

/// Render a month view in the requested format
pub fn export_month(view: &MonthView, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Csv => month_view_csv(view),
        ExportFormat::Json => Ok(serde_json::to_string_pretty(view)?),
    }
}
