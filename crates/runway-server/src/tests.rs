//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use runway_core::test_utils::{date, seed, test_db, Fault, FaultyStore, Fixture, OWNER};
use rust_decimal::Decimal;
use tower::ServiceExt;

fn test_config() -> RunwayConfig {
    let mut config = RunwayConfig::default();
    config.owner = OWNER.to_string();
    config.scheduler.auto_close_interval_minutes = 0;
    config
}

fn setup_test_app() -> (Router, Fixture) {
    let db = test_db();
    let fixture = seed(&db, OWNER);
    let state = AppState::new(db, test_config());
    (create_router(state), fixture)
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, get_body_json(response).await)
}

async fn post(app: &Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, get_body_json(response).await)
}

fn decimal(value: &serde_json::Value) -> Decimal {
    match value {
        serde_json::Value::String(s) => s.parse().unwrap(),
        other => other.to_string().parse().unwrap(),
    }
}

/// Rent of 1200 on the 5th, from March 2024, on the fixture account
async fn create_rent(app: &Router, fixture: &Fixture) -> i64 {
    let (status, json) = post(
        app,
        "/api/rules",
        serde_json::json!({
            "description": "Rent",
            "amount": "1200",
            "kind": "expense",
            "category_id": fixture.category.id,
            "target": { "account": fixture.account.id },
            "day_of_month": 5,
            "start_date": "2024-03-01"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json["id"].as_i64().unwrap()
}

// ========== Reference Data Tests ==========

#[tokio::test]
async fn test_list_accounts_for_default_owner() {
    let (app, fixture) = setup_test_app();

    let (status, json) = get(&app, "/api/accounts").await;
    assert_eq!(status, StatusCode::OK);
    let accounts = json.as_array().unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0]["id"], fixture.account.id);
    assert_eq!(accounts[0]["name"], "Checking");
}

#[tokio::test]
async fn test_owner_header_scopes_requests() {
    let (app, _) = setup_test_app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/accounts")
                .header(OWNER_HEADER, "bob")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert!(json.as_array().unwrap().is_empty());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/accounts")
                .header(OWNER_HEADER, "   ")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_card_validation() {
    let (app, fixture) = setup_test_app();

    let (status, json) = post(
        &app,
        "/api/cards",
        serde_json::json!({
            "name": "Amex",
            "closing_day": 32,
            "due_day": 10,
            "payment_account_id": fixture.account.id
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("closing_day"));
}

#[tokio::test]
async fn test_create_category_is_idempotent() {
    let (app, fixture) = setup_test_app();

    let (status, json) = post(
        &app,
        "/api/categories",
        serde_json::json!({ "name": "Housing" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], fixture.category.id);
}

// ========== Rules & Month View Tests ==========

#[tokio::test]
async fn test_rule_projects_into_month() {
    let (app, fixture) = setup_test_app();
    let rule_id = create_rent(&app, &fixture).await;

    let (status, json) = get(&app, "/api/months/2024-03").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["partial"], false);
    let transactions = json["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["is_virtual"], true);
    assert_eq!(transactions[0]["rule_id"], rule_id);
    assert_eq!(transactions[0]["date"], "2024-03-05");
    assert_eq!(transactions[0]["target_name"], "Checking");

    // Before the rule starts
    let (_, json) = get(&app, "/api/months/2024-02").await;
    assert!(json["transactions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_period_is_bad_request() {
    let (app, _) = setup_test_app();

    let (status, json) = get(&app, "/api/months/2024-13").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("month"));
}

#[tokio::test]
async fn test_create_rule_rejects_zero_amount() {
    let (app, fixture) = setup_test_app();

    let (status, _) = post(
        &app,
        "/api/rules",
        serde_json::json!({
            "description": "Nothing",
            "amount": "0",
            "kind": "expense",
            "target": { "account": fixture.account.id },
            "day_of_month": 5,
            "start_date": "2024-03-01"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_rule_is_not_found() {
    let (app, _) = setup_test_app();

    let (status, json) = get(&app, "/api/rules/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("rule 999"));
}

#[tokio::test]
async fn test_confirm_then_adjust_conflicts() {
    let (app, fixture) = setup_test_app();
    let rule_id = create_rent(&app, &fixture).await;

    let (status, entry) = post(
        &app,
        &format!("/api/rules/{}/confirm", rule_id),
        serde_json::json!({ "date": "2024-03-06" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["status"], "confirmed");
    assert_eq!(entry["origin"], "recurring");

    // The confirmed month shows the entry and no virtual row
    let (_, month) = get(&app, "/api/months/2024-03").await;
    let transactions = month["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["is_virtual"], false);

    let (status, json) = post(
        &app,
        &format!("/api/rules/{}/adjustments", rule_id),
        serde_json::json!({ "mode": "this_month_only", "period": "2024-03", "amount": "999" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_adjustment_from_now_on() {
    let (app, fixture) = setup_test_app();
    let rule_id = create_rent(&app, &fixture).await;

    let (status, json) = post(
        &app,
        &format!("/api/rules/{}/adjustments", rule_id),
        serde_json::json!({ "mode": "from_now_on", "period": "2024-05", "amount": "1300" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["type"], "rule");

    let (_, april) = get(&app, "/api/months/2024-04").await;
    assert_eq!(decimal(&april["transactions"][0]["amount"]), Decimal::from(1200));
    let (_, may) = get(&app, "/api/months/2024-05").await;
    assert_eq!(decimal(&may["transactions"][0]["amount"]), Decimal::from(1300));
}

#[tokio::test]
async fn test_pause_rule_hides_occurrences() {
    let (app, fixture) = setup_test_app();
    let rule_id = create_rent(&app, &fixture).await;

    let (status, json) = post(
        &app,
        &format!("/api/rules/{}/active", rule_id),
        serde_json::json!({ "active": false }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["active"], false);

    let (_, month) = get(&app, "/api/months/2024-03").await;
    assert!(month["transactions"].as_array().unwrap().is_empty());

    let (_, active) = get(&app, "/api/rules").await;
    assert!(active.as_array().unwrap().is_empty());
    let (_, all) = get(&app, "/api/rules?all=true").await;
    assert_eq!(all.as_array().unwrap().len(), 1);
}

// ========== Balance Tests ==========

#[tokio::test]
async fn test_balances() {
    let (app, fixture) = setup_test_app();
    create_rent(&app, &fixture).await;

    let (status, json) = get(&app, "/api/balances/current?as_of=2024-03-01").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&json["total"]), Decimal::from(1000));

    let (status, json) = get(
        &app,
        "/api/balances/projected?from=2024-03-01&horizon=2024-03-31",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&json["recurring"]), Decimal::from(-1200));
    assert_eq!(decimal(&json["projected"]), Decimal::from(-200));

    let (status, _) = get(
        &app,
        "/api/balances/projected?from=2024-03-31&horizon=2024-03-01",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/api/balances/current?accounts=999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&app, "/api/balances/current?accounts=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_indicators() {
    let (app, fixture) = setup_test_app();
    create_rent(&app, &fixture).await;

    let (status, json) = get(&app, "/api/months/2024-03/indicators").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&json["opening_balance"]), Decimal::from(1000));
    assert_eq!(
        decimal(&json["expense"]["projected_recurring"]),
        Decimal::from(1200)
    );
    assert_eq!(decimal(&json["savings_rate"]), Decimal::ZERO);
    assert_eq!(
        decimal(&json["projected_closing_balance"]),
        Decimal::from(-200)
    );
}

// ========== Entries Tests ==========

#[tokio::test]
async fn test_entries_roundtrip() {
    let (app, fixture) = setup_test_app();

    let (status, entry) = post(
        &app,
        "/api/entries",
        serde_json::json!({
            "description": "Groceries",
            "amount": "82.40",
            "date": "2024-03-12",
            "kind": "expense",
            "target": { "account": fixture.account.id },
            "status": "pending",
            "origin": "manual"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = entry["id"].as_i64().unwrap();

    let (status, confirmed) = post(
        &app,
        &format!("/api/entries/{}/confirm", id),
        serde_json::json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["status"], "confirmed");

    let (_, listed) = get(&app, "/api/entries?period=2024-03&status=confirmed").await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/entries/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, listed) = get(&app, "/api/entries?period=2024-03").await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_installments_endpoint() {
    let (app, fixture) = setup_test_app();

    let (status, json) = post(
        &app,
        "/api/entries/installments",
        serde_json::json!({
            "description": "Laptop",
            "total_amount": "1000",
            "installments": 3,
            "first_date": "2024-01-31",
            "card_id": fixture.card.id
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(decimal(&entries[0]["amount"]), "333.34".parse::<Decimal>().unwrap());
    assert_eq!(entries[1]["date"], "2024-02-29");

    let (status, _) = post(
        &app,
        "/api/entries/installments",
        serde_json::json!({
            "description": "Laptop",
            "total_amount": "1000",
            "installments": 0,
            "first_date": "2024-01-31",
            "card_id": fixture.card.id
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ========== Invoice Tests ==========

#[tokio::test]
async fn test_invoice_lifecycle() {
    let (app, fixture) = setup_test_app();

    let (status, invoice) = post(
        &app,
        "/api/invoices",
        serde_json::json!({ "card_id": fixture.card.id, "period": "2024-05" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(invoice["status"], "open");
    assert_eq!(invoice["closing_date"], "2024-05-20");
    let id = invoice["id"].as_i64().unwrap();

    post(
        &app,
        "/api/entries",
        serde_json::json!({
            "description": "Books",
            "amount": "60",
            "date": "2024-05-02",
            "kind": "card_expense",
            "target": { "card": fixture.card.id },
            "status": "confirmed",
            "origin": "manual"
        }),
    )
    .await;

    let (status, preview) = get(&app, &format!("/api/invoices/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&preview["total"]), Decimal::from(60));

    // Paying an open invoice is refused
    let (status, _) = post(
        &app,
        &format!("/api/invoices/{}/pay", id),
        serde_json::json!({ "date": "2024-05-28" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, report) = post(
        &app,
        "/api/invoices/close",
        serde_json::json!({ "as_of": "2024-05-21" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["closed"].as_array().unwrap().len(), 1);
    assert!(report["failures"].as_array().unwrap().is_empty());

    let (status, paid) = post(
        &app,
        &format!("/api/invoices/{}/pay", id),
        serde_json::json!({ "date": "2024-05-28" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["invoice"]["status"], "paid");
    assert_eq!(paid["payment"]["origin"], "invoice");
    assert_eq!(decimal(&paid["payment"]["amount"]), Decimal::from(60));

    let (_, listed) = get(&app, "/api/invoices?status=paid").await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invoice_for_unknown_card() {
    let (app, _) = setup_test_app();

    let (status, _) = post(
        &app,
        "/api/invoices",
        serde_json::json!({ "card_id": 999, "period": "2024-05" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ========== Export & Upcoming Tests ==========

#[tokio::test]
async fn test_export_csv() {
    let (app, fixture) = setup_test_app();
    create_rent(&app, &fixture).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/months/2024-03/export?format=csv")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/csv; charset=utf-8"
    );
    assert!(response
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("runway-2024-03.csv"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.contains("Rent"));
}

#[tokio::test]
async fn test_export_unknown_format() {
    let (app, _) = setup_test_app();

    let (status, _) = get(&app, "/api/months/2024-03/export?format=xml").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upcoming() {
    let (app, fixture) = setup_test_app();
    create_rent(&app, &fixture).await;

    let (status, json) = get(&app, "/api/upcoming?from=2024-03-01&to=2024-05-31").await;
    assert_eq!(status, StatusCode::OK);
    let dates: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["date"].as_str().unwrap())
        .collect();
    assert_eq!(dates, vec!["2024-03-05", "2024-04-05", "2024-05-05"]);
}

// ========== Error Handling & Headers ==========

#[tokio::test]
async fn test_store_failure_is_generic_500() {
    let db = test_db();
    seed(&db, OWNER);
    let store = Arc::new(FaultyStore::new(db));
    store.fail(Fault::Accounts);
    let app = create_router(AppState::new(store, test_config()));

    let (status, json) = get(&app, "/api/accounts").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "An internal error occurred");
}

#[tokio::test]
async fn test_month_view_degrades_instead_of_failing() {
    let db = test_db();
    seed(&db, OWNER);
    let store = Arc::new(FaultyStore::new(db));
    store.fail(Fault::Ledger);
    let app = create_router(AppState::new(store, test_config()));

    let (status, json) = get(&app, "/api/months/2024-03").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["partial"], true);
    assert_eq!(json["failures"][0]["source"], "ledger");
}

#[tokio::test]
async fn test_security_headers() {
    let (app, _) = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/accounts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert!(headers.get("content-security-policy").is_some());
}

#[test]
fn test_core_errors_map_to_status() {
    let err: AppError = runway_core::Error::Validation("bad".into()).into();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    let err: AppError = runway_core::Error::NotFound("rule 1".into()).into();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
    let err: AppError = runway_core::Error::Conflict("dup".into()).into();
    assert_eq!(err.status(), StatusCode::CONFLICT);
    let err: AppError = runway_core::Error::Store("down".into()).into();
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

// ========== Scheduler Tests ==========

#[tokio::test]
async fn test_invoice_sweep_opens_and_closes() {
    let db = test_db();
    let fixture = seed(&db, OWNER);
    let state = AppState::new(db.clone(), test_config());

    let report = run_invoice_sweep(&state.engine, OWNER, date(2024, 5, 21)).await;
    assert!(report.failures.is_empty());
    assert_eq!(report.closed.len(), 1);
    assert_eq!(report.closed[0].card_id, fixture.card.id);

    // Nothing left to close on the next sweep
    let again = run_invoice_sweep(&state.engine, OWNER, date(2024, 5, 22)).await;
    assert!(again.closed.is_empty());
}
