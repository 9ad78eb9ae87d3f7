//! Card invoice handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::today;
use crate::{request_owner, AppError, AppState};
use runway_core::{
    AutoCloseReport, Invoice, InvoiceFilter, InvoicePreview, InvoiceStatus, LedgerEntry, Period,
};

/// Query parameters for listing invoices
#[derive(Debug, Deserialize)]
pub struct InvoicesQuery {
    pub card_id: Option<i64>,
    pub status: Option<InvoiceStatus>,
    pub period: Option<Period>,
}

/// GET /api/invoices - List invoices
pub async fn list_invoices(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<InvoicesQuery>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let owner = request_owner(&headers, &state)?;

    let mut filter = InvoiceFilter::new();
    if let Some(id) = params.card_id {
        filter = filter.card(id);
    }
    if let Some(status) = params.status {
        filter = filter.status(status);
    }
    if let Some(period) = params.period {
        filter = filter.period(period);
    }

    Ok(Json(state.engine.invoices(&owner, &filter).await?))
}

/// Request body for opening an invoice
#[derive(Debug, Deserialize)]
pub struct OpenInvoiceRequest {
    pub card_id: i64,
    /// Defaults to the current month
    pub period: Option<Period>,
}

/// POST /api/invoices - Open a card's invoice for a month (idempotent)
pub async fn open_invoice(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<OpenInvoiceRequest>,
) -> Result<Json<Invoice>, AppError> {
    let owner = request_owner(&headers, &state)?;
    let period = req.period.unwrap_or_else(|| Period::of(today()));
    Ok(Json(
        state
            .engine
            .open_invoice(&owner, req.card_id, period)
            .await?,
    ))
}

/// GET /api/invoices/:id - Invoice with its charges and (live or frozen) total
pub async fn preview_invoice(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<InvoicePreview>, AppError> {
    let owner = request_owner(&headers, &state)?;
    Ok(Json(state.engine.invoice_preview(&owner, id).await?))
}

/// Request body for an on-demand auto-close
#[derive(Debug, Default, Deserialize)]
pub struct CloseInvoicesRequest {
    /// Defaults to today
    pub as_of: Option<NaiveDate>,
}

/// POST /api/invoices/close - Close every open invoice past its closing date
///
/// Per-invoice failures are reported in the body; the request itself succeeds.
pub async fn close_due_invoices(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CloseInvoicesRequest>,
) -> Result<Json<AutoCloseReport>, AppError> {
    let owner = request_owner(&headers, &state)?;
    let as_of = req.as_of.unwrap_or_else(today);
    Ok(Json(state.engine.auto_close_due(&owner, as_of).await))
}

/// Request body for paying an invoice
#[derive(Debug, Default, Deserialize)]
pub struct PayInvoiceRequest {
    /// Paying account; defaults to the card's
    pub account_id: Option<i64>,
    /// Defaults to today
    pub date: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct PayInvoiceResponse {
    pub invoice: Invoice,
    pub payment: LedgerEntry,
}

/// POST /api/invoices/:id/pay - Pay a closed invoice
pub async fn pay_invoice(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<PayInvoiceRequest>,
) -> Result<Json<PayInvoiceResponse>, AppError> {
    let owner = request_owner(&headers, &state)?;
    let date = req.date.unwrap_or_else(today);
    let (invoice, payment) = state
        .engine
        .pay_invoice(&owner, id, req.account_id, date)
        .await?;
    Ok(Json(PayInvoiceResponse { invoice, payment }))
}
