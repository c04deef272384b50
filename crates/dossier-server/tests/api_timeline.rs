//! Timeline and seen-state endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use dossier_appointments::{AppointmentEngine, LogOnlyDispatcher};
use dossier_audit::PoolAuditSink;
use dossier_db::{create_pool, DbRuntimeSettings};
use dossier_server::{app, AppState};
use serde_json::{json, Value};
use tower::ServiceExt; // for oneshot

fn make_app() -> Router {
    let pool = create_pool(
        ":memory:",
        DbRuntimeSettings {
            busy_timeout_ms: 1_000,
            pool_max_size: 1,
        },
    )
    .unwrap();
    dossier_db::run_migrations(&pool.get().unwrap()).unwrap();

    let names: HashMap<String, String> =
        [("broker-1".to_string(), "Dana Broker".to_string())].into();

    app(AppState {
        pool: pool.clone(),
        engine: AppointmentEngine::new(Arc::new(LogOnlyDispatcher)),
        audit: Arc::new(PoolAuditSink::new(pool)),
        directory: Arc::new(names),
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn open(app: &Router) {
    let (status, body) = send(
        app,
        "POST",
        "/api/transactions",
        Some(json!({
            "transaction_id": "tx-1",
            "broker_id": "broker-1",
            "client_id": "client-1",
            "address": "12 Harbour St",
            "stage": "BUYER_PREQUALIFY",
            "client_name": "Sam Client"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["entry"]["event"]["type"], "CREATED");
}

#[tokio::test]
async fn health_check_returns_ok() {
    let app = make_app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn duplicate_transaction_is_a_conflict() {
    let app = make_app();
    open(&app).await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/transactions",
        Some(json!({
            "transaction_id": "tx-1",
            "broker_id": "broker-2",
            "client_id": "client-2",
            "stage": "BUYER_PREQUALIFY"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn appended_entries_are_listed_per_audience() {
    let app = make_app();
    open(&app).await;

    let (status, hidden) = send(
        &app,
        "POST",
        "/api/transactions/tx-1/timeline",
        Some(json!({
            "actor_id": "broker-1",
            "note": "Lender called",
            "event": { "type": "NOTE" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{hidden}");
    assert_eq!(hidden["seq"], 2);

    let (status, _) = send(
        &app,
        "POST",
        "/api/transactions/tx-1/timeline",
        Some(json!({
            "actor_id": "broker-1",
            "visible_to_client": true,
            "event": { "type": "DOCUMENT_REQUESTED", "doc_type": "PRE_APPROVAL" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, broker_view) =
        send(&app, "GET", "/api/transactions/tx-1/timeline", None).await;
    assert_eq!(status, StatusCode::OK);
    let broker_view = broker_view.as_array().unwrap();
    assert_eq!(broker_view.len(), 3);
    assert_eq!(broker_view[1]["note"], "Lender called");
    assert_eq!(broker_view[1]["actor_name"], "Dana Broker");

    let (_, client_view) = send(
        &app,
        "GET",
        "/api/transactions/tx-1/timeline?audience=CLIENT&order=NEWEST_FIRST",
        None,
    )
    .await;
    let types: Vec<&str> = client_view
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["event"]["type"].as_str().unwrap())
        .collect();
    assert_eq!(types, vec!["DOCUMENT_REQUESTED", "CREATED"]);

    let (_, feed) = send(&app, "GET", "/api/clients/client-1/feed", None).await;
    assert_eq!(feed.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_transaction_is_not_found() {
    let app = make_app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/transactions/tx-404/timeline",
        Some(json!({ "event": { "type": "NOTE" } })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("tx-404"));

    let (status, _) = send(&app, "GET", "/api/transactions/tx-404/timeline", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "GET",
        "/api/transactions/tx-404/unseen?broker_id=broker-1",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stage_change_is_recorded() {
    let app = make_app();
    open(&app).await;

    let (status, entry) = send(
        &app,
        "POST",
        "/api/transactions/tx-1/stage",
        Some(json!({
            "actor_id": "broker-1",
            "new_stage": "BUYER_SHOP_FOR_PROPERTY",
            "reason": "Pre-approval received"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{entry}");
    assert_eq!(entry["event"]["type"], "STAGE_CHANGE");
    assert_eq!(entry["event"]["previous_stage"], "BUYER_PREQUALIFY");
}

#[tokio::test]
async fn marking_seen_updates_counts_and_status() {
    let app = make_app();
    open(&app).await;

    let (_, note) = send(
        &app,
        "POST",
        "/api/transactions/tx-1/timeline",
        Some(json!({ "actor_id": "client-1", "event": { "type": "NOTE" } })),
    )
    .await;
    let note_id = note["id"].as_str().unwrap().to_string();

    let (_, unseen) = send(
        &app,
        "GET",
        "/api/transactions/tx-1/unseen?broker_id=broker-1",
        None,
    )
    .await;
    assert_eq!(unseen["unseen"], 2);

    for _ in 0..2 {
        let (status, _) = send(
            &app,
            "POST",
            "/api/seen",
            Some(json!({ "broker_id": "broker-1", "entry_id": note_id })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let (_, unseen) = send(
        &app,
        "GET",
        "/api/transactions/tx-1/unseen?broker_id=broker-1",
        None,
    )
    .await;
    assert_eq!(unseen["unseen"], 1);

    let (_, counts) = send(&app, "GET", "/api/brokers/broker-1/unseen", None).await;
    assert_eq!(counts, json!({ "tx-1": 1 }));

    let (status, seen) = send(
        &app,
        "POST",
        "/api/seen/status",
        Some(json!({ "broker_id": "broker-1", "entry_ids": [note_id, "missing"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(seen[&note_id], true);
    assert_eq!(seen["missing"], false);
}
