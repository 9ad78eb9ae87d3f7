//! Account, card and category handlers

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use serde::Deserialize;

use crate::{request_owner, AppError, AppState};
use runway_core::{Account, Card, Category, NewAccount, NewCard};

/// GET /api/accounts - List accounts
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Account>>, AppError> {
    let owner = request_owner(&headers, &state)?;
    Ok(Json(state.engine.accounts(&owner).await?))
}

/// POST /api/accounts - Create an account
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<NewAccount>,
) -> Result<Json<Account>, AppError> {
    let owner = request_owner(&headers, &state)?;
    Ok(Json(state.engine.create_account(&owner, &req).await?))
}

/// GET /api/cards - List cards
pub async fn list_cards(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Card>>, AppError> {
    let owner = request_owner(&headers, &state)?;
    Ok(Json(state.engine.cards(&owner).await?))
}

/// POST /api/cards - Create a card
pub async fn create_card(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<NewCard>,
) -> Result<Json<Card>, AppError> {
    let owner = request_owner(&headers, &state)?;
    Ok(Json(state.engine.create_card(&owner, &req).await?))
}

/// GET /api/categories - List categories
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Category>>, AppError> {
    let owner = request_owner(&headers, &state)?;
    Ok(Json(state.engine.categories(&owner).await?))
}

/// Request body for creating a category
#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

/// POST /api/categories - Create a category (returns the existing one on a
/// name match)
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<Json<Category>, AppError> {
    let owner = request_owner(&headers, &state)?;
    Ok(Json(state.engine.upsert_category(&owner, &req.name).await?))
}
