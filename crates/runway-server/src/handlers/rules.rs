//! Recurring rule handlers: management, confirmation and adjustments

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use crate::{request_owner, AppError, AppState, SuccessResponse};
use runway_core::{
    Adjustment, AdjustmentMode, AdjustmentOutcome, LedgerEntry, NewRecurringRule, Period,
    RecurringRule,
};

/// Query parameters for listing rules
#[derive(Debug, Deserialize)]
pub struct RulesQuery {
    /// Include paused rules
    #[serde(default)]
    pub all: bool,
}

/// GET /api/rules - List rules (active only unless `all=true`)
pub async fn list_rules(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<RulesQuery>,
) -> Result<Json<Vec<RecurringRule>>, AppError> {
    let owner = request_owner(&headers, &state)?;
    Ok(Json(state.engine.rules(&owner, !params.all).await?))
}

/// POST /api/rules - Create a rule
pub async fn create_rule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<NewRecurringRule>,
) -> Result<Json<RecurringRule>, AppError> {
    let owner = request_owner(&headers, &state)?;
    Ok(Json(state.engine.create_rule(&owner, &req).await?))
}

/// GET /api/rules/:id - Get a rule with its amount history
pub async fn get_rule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<RecurringRule>, AppError> {
    let owner = request_owner(&headers, &state)?;
    Ok(Json(state.engine.rule(&owner, id).await?))
}

/// DELETE /api/rules/:id - Delete a rule; its ledger entries stay
pub async fn delete_rule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    let owner = request_owner(&headers, &state)?;
    state.engine.delete_rule(&owner, id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// Request body for pausing or resuming a rule
#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

/// POST /api/rules/:id/active - Pause or resume a rule
pub async fn set_rule_active(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<SetActiveRequest>,
) -> Result<Json<RecurringRule>, AppError> {
    let owner = request_owner(&headers, &state)?;
    Ok(Json(state.engine.set_rule_active(&owner, id, req.active).await?))
}

/// Request body for confirming an occurrence
#[derive(Debug, Default, Deserialize)]
pub struct ConfirmRequest {
    /// Settlement date; picks the month. Defaults to today.
    pub date: Option<NaiveDate>,
}

/// POST /api/rules/:id/confirm - Turn the month's occurrence into a
/// confirmed entry
pub async fn confirm_rule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<LedgerEntry>, AppError> {
    let owner = request_owner(&headers, &state)?;
    let entry = state.engine.confirm(&owner, id, req.date).await?;
    info!(owner = %owner, rule_id = id, entry_id = entry.id, "Occurrence confirmed");
    Ok(Json(entry))
}

/// Request body for an adjustment
#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub mode: AdjustmentMode,
    pub period: Period,
    pub amount: Option<Decimal>,
    pub note: Option<String>,
}

/// POST /api/rules/:id/adjustments - Override one month, change the amount
/// from a month onward, or skip a month
pub async fn adjust_rule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<AdjustRequest>,
) -> Result<Json<AdjustmentOutcome>, AppError> {
    let owner = request_owner(&headers, &state)?;
    let adjustment = Adjustment {
        mode: req.mode,
        rule_id: id,
        period: req.period,
        amount: req.amount,
        note: req.note,
    };
    Ok(Json(state.engine.apply_adjustment(&owner, &adjustment).await?))
}
