//! Ledger entry handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

use crate::{request_owner, AppError, AppState, SuccessResponse};
use runway_core::{
    EntryStatus, InstallmentPurchase, LedgerEntry, LedgerFilter, NewLedgerEntry, Period,
};

/// Query parameters for listing entries
#[derive(Debug, Deserialize)]
pub struct EntriesQuery {
    /// Month as YYYY-MM
    pub period: Option<Period>,
    pub account_id: Option<i64>,
    pub card_id: Option<i64>,
    pub rule_id: Option<i64>,
    pub invoice_id: Option<i64>,
    pub status: Option<EntryStatus>,
}

/// GET /api/entries - List ledger entries
pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<EntriesQuery>,
) -> Result<Json<Vec<LedgerEntry>>, AppError> {
    let owner = request_owner(&headers, &state)?;

    let mut filter = LedgerFilter::new();
    if let Some(period) = params.period {
        filter = filter.period(period);
    }
    if let Some(id) = params.account_id {
        filter = filter.account(id);
    }
    if let Some(id) = params.card_id {
        filter = filter.card(id);
    }
    if let Some(id) = params.rule_id {
        filter = filter.rule(id);
    }
    if let Some(id) = params.invoice_id {
        filter = filter.invoice(id);
    }
    if let Some(status) = params.status {
        filter = filter.status(status);
    }

    Ok(Json(state.engine.entries(&owner, &filter).await?))
}

/// POST /api/entries - Record a manual entry
pub async fn create_entry(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<NewLedgerEntry>,
) -> Result<Json<LedgerEntry>, AppError> {
    let owner = request_owner(&headers, &state)?;
    Ok(Json(state.engine.record_entry(&owner, &req).await?))
}

/// POST /api/entries/installments - Split a card purchase into installments
pub async fn create_installments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<InstallmentPurchase>,
) -> Result<Json<Vec<LedgerEntry>>, AppError> {
    let owner = request_owner(&headers, &state)?;
    Ok(Json(state.engine.record_installments(&owner, &req).await?))
}

/// POST /api/entries/:id/confirm - Confirm a pending entry
pub async fn confirm_entry(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<LedgerEntry>, AppError> {
    let owner = request_owner(&headers, &state)?;
    Ok(Json(state.engine.confirm_entry(&owner, id).await?))
}

/// DELETE /api/entries/:id - Delete an entry
pub async fn delete_entry(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    let owner = request_owner(&headers, &state)?;
    state.engine.delete_entry(&owner, id).await?;
    Ok(Json(SuccessResponse { success: true }))
}
