//! Balance handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use super::{parse_ids, today};
use crate::{request_owner, AppError, AppState};
use runway_core::{BalanceReport, ProjectedBalance};

/// Query parameters for the current balance
#[derive(Debug, Deserialize)]
pub struct CurrentBalanceQuery {
    /// Defaults to today
    pub as_of: Option<NaiveDate>,
    /// Comma-separated account IDs; all accounts when absent
    pub accounts: Option<String>,
}

/// GET /api/balances/current - Opening balances plus confirmed entries
pub async fn get_current_balance(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<CurrentBalanceQuery>,
) -> Result<Json<BalanceReport>, AppError> {
    let owner = request_owner(&headers, &state)?;
    let accounts = parse_ids(params.accounts.as_deref())?;
    let as_of = params.as_of.unwrap_or_else(today);
    Ok(Json(
        state
            .engine
            .current_balance(&owner, &accounts, as_of)
            .await?,
    ))
}

/// Query parameters for the projected balance
#[derive(Debug, Deserialize)]
pub struct ProjectedBalanceQuery {
    pub horizon: NaiveDate,
    /// Defaults to today
    pub from: Option<NaiveDate>,
    /// Comma-separated account IDs; all accounts when absent
    pub accounts: Option<String>,
}

/// GET /api/balances/projected - Projected balance at a horizon date
pub async fn get_projected_balance(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ProjectedBalanceQuery>,
) -> Result<Json<ProjectedBalance>, AppError> {
    let owner = request_owner(&headers, &state)?;
    let accounts = parse_ids(params.accounts.as_deref())?;
    let from = params.from.unwrap_or_else(today);
    Ok(Json(
        state
            .engine
            .projected_balance(&owner, &accounts, from, params.horizon)
            .await?,
    ))
}
