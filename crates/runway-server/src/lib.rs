//! Runway Web Server
//!
//! Axum-based REST API over the Runway projection engine.
//!
//! - Every request acts for one owner, named by the `x-runway-owner` header
//!   (the configured owner when absent)
//! - Restrictive CORS policy
//! - Security headers on every response
//! - Sanitized error responses
//! - Background invoice auto-close scheduler

use std::sync::Arc;

use axum::{
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info};

use runway_core::{Database, Engine, EventBus, RunwayConfig, Store};

mod handlers;
mod scheduler;

pub use scheduler::{run_invoice_sweep, start_invoice_scheduler, InvoiceScheduleConfig};

/// Header naming the owner a request acts for
pub const OWNER_HEADER: &str = "x-runway-owner";

/// Longest accepted owner identifier
pub const MAX_OWNER_LEN: usize = 128;

/// Shared application state
pub struct AppState {
    pub engine: Engine,
    pub config: RunwayConfig,
}

impl AppState {
    /// State over `store` with a fresh change bus and the configured engine
    /// settings
    pub fn new(store: Arc<dyn Store>, config: RunwayConfig) -> Arc<Self> {
        let engine = Engine::new(store, EventBus::new(), config.engine.clone());
        Arc::new(Self { engine, config })
    }
}

/// Owner for this request: the `x-runway-owner` header, else the configured
/// default
pub fn request_owner(headers: &HeaderMap, state: &AppState) -> Result<String, AppError> {
    match headers.get(OWNER_HEADER) {
        None => Ok(state.config.owner.clone()),
        Some(value) => {
            let owner = value
                .to_str()
                .map_err(|_| AppError::bad_request("Owner header must be ASCII"))?
                .trim();
            if owner.is_empty() || owner.len() > MAX_OWNER_LEN {
                return Err(AppError::bad_request(&format!(
                    "Owner header must be 1 to {} characters",
                    MAX_OWNER_LEN
                )));
            }
            Ok(owner.to_string())
        }
    }
}

/// Generic success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Reference data
        .route(
            "/accounts",
            get(handlers::list_accounts).post(handlers::create_account),
        )
        .route("/cards", get(handlers::list_cards).post(handlers::create_card))
        .route(
            "/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        // Recurring rules
        .route("/rules", get(handlers::list_rules).post(handlers::create_rule))
        .route(
            "/rules/:id",
            get(handlers::get_rule).delete(handlers::delete_rule),
        )
        .route("/rules/:id/active", post(handlers::set_rule_active))
        .route("/rules/:id/confirm", post(handlers::confirm_rule))
        .route("/rules/:id/adjustments", post(handlers::adjust_rule))
        // Month views
        .route("/months/:period", get(handlers::get_month))
        .route("/months/:period/indicators", get(handlers::get_indicators))
        .route("/months/:period/export", get(handlers::export_month))
        .route("/upcoming", get(handlers::list_upcoming))
        // Ledger
        .route(
            "/entries",
            get(handlers::list_entries).post(handlers::create_entry),
        )
        .route("/entries/installments", post(handlers::create_installments))
        .route("/entries/:id", axum::routing::delete(handlers::delete_entry))
        .route("/entries/:id/confirm", post(handlers::confirm_entry))
        // Balances
        .route("/balances/current", get(handlers::get_current_balance))
        .route("/balances/projected", get(handlers::get_projected_balance))
        // Invoices
        .route(
            "/invoices",
            get(handlers::list_invoices).post(handlers::open_invoice),
        )
        .route("/invoices/close", post(handlers::close_due_invoices))
        .route("/invoices/:id", get(handlers::preview_invoice))
        .route("/invoices/:id/pay", post(handlers::pay_invoice));

    let owner_header = header::HeaderName::from_static(OWNER_HEADER);

    // Build CORS layer
    let cors = if state.config.server.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, owner_header])
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .server
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, owner_header])
    };

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
        ))
}

/// Start the server and, when configured, the invoice scheduler
pub async fn serve(db: Arc<Database>, config: RunwayConfig) -> anyhow::Result<()> {
    let store: Arc<dyn Store> = db;
    let state = AppState::new(store, config);

    if let Some(schedule) = InvoiceScheduleConfig::from_config(&state.config) {
        start_invoice_scheduler(state.clone(), schedule);
    }

    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = create_router(state);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn conflict(msg: &str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        // Engine errors the caller can act on keep their message
        match err.downcast_ref::<runway_core::Error>() {
            Some(runway_core::Error::Validation(msg)) => Self::bad_request(msg),
            Some(runway_core::Error::NotFound(msg)) => {
                Self::not_found(&format!("Not found: {}", msg))
            }
            Some(runway_core::Error::Conflict(msg)) => Self::conflict(msg),
            _ => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                // Return generic message to client
                message: "An internal error occurred".to_string(),
                // Keep full error for logging
                internal: Some(err),
            },
        }
    }
}

#[cfg(test)]
mod tests;
