//! Month view, indicators, export and upcoming obligations

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, NaiveDate};
use serde::Deserialize;

use super::today;
use crate::{request_owner, AppError, AppState};
use runway_core::export::{export_month as render_month, ExportFormat};
use runway_core::{ConsolidatedIndicators, MonthView, Period, VirtualOccurrence};

/// Default look-ahead for upcoming obligations
const DEFAULT_UPCOMING_DAYS: i64 = 30;

fn parse_period(raw: &str) -> Result<Period, AppError> {
    raw.parse::<Period>()
        .map_err(|e| AppError::bad_request(&e.to_string()))
}

/// GET /api/months/:period - Merged view of a month (YYYY-MM)
pub async fn get_month(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(period): Path<String>,
) -> Result<Json<MonthView>, AppError> {
    let owner = request_owner(&headers, &state)?;
    let period = parse_period(&period)?;
    Ok(Json(state.engine.for_month(&owner, period).await))
}

/// GET /api/months/:period/indicators - Consolidated indicators
pub async fn get_indicators(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(period): Path<String>,
) -> Result<Json<ConsolidatedIndicators>, AppError> {
    let owner = request_owner(&headers, &state)?;
    let period = parse_period(&period)?;
    Ok(Json(
        state.engine.consolidated_indicators(&owner, period).await?,
    ))
}

/// Query parameters for export
#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    /// csv (default) or json
    pub format: Option<String>,
}

/// GET /api/months/:period/export - Download a month view
pub async fn export_month(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(period): Path<String>,
    Query(params): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let owner = request_owner(&headers, &state)?;
    let period = parse_period(&period)?;
    let format: ExportFormat = params
        .format
        .as_deref()
        .unwrap_or("csv")
        .parse()
        .map_err(|e: String| AppError::bad_request(&e))?;

    let view = state.engine.for_month(&owner, period).await;
    let body = render_month(&view, format)?;

    let (content_type, extension) = match format {
        ExportFormat::Csv => ("text/csv; charset=utf-8", "csv"),
        ExportFormat::Json => ("application/json", "json"),
    };
    let disposition = format!("attachment; filename=\"runway-{}.{}\"", period, extension);

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// Query parameters for upcoming obligations
#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// GET /api/upcoming - Virtual occurrences between two dates (next 30 days by
/// default)
pub async fn list_upcoming(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<UpcomingQuery>,
) -> Result<Json<Vec<VirtualOccurrence>>, AppError> {
    let owner = request_owner(&headers, &state)?;
    let from = params.from.unwrap_or_else(today);
    let to = params
        .to
        .unwrap_or_else(|| from + Duration::days(DEFAULT_UPCOMING_DAYS));
    Ok(Json(state.engine.upcoming(&owner, from, to).await?))
}
