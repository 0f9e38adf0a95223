// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /api/dashboard (before and after a session)
// - PUT /api/session
// - POST /api/dashboard/refresh (with and without session)
// - POST /api/interactions

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use dashboard_aggregator::aggregate::providers::FixtureProvider;
use dashboard_aggregator::aggregate::sources::default_sources;
use dashboard_aggregator::behavior::{BehaviorEmitter, BehaviorEvent, BehaviorSink};
use dashboard_aggregator::{api, AppState, FetchOrchestrator, RefreshController};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<BehaviorEvent>>,
}

#[async_trait]
impl BehaviorSink for RecordingSink {
    async fn send(&self, ev: &BehaviorEvent) -> Result<()> {
        self.events.lock().expect("events").push(ev.clone());
        Ok(())
    }
}

/// Router over offline demo data, plus the sink it reports interactions to.
fn test_router() -> (Router, Arc<RecordingSink>) {
    let orch = FetchOrchestrator::new(
        default_sources(),
        Arc::new(FixtureProvider::offline_demo()),
        std::time::Duration::from_secs(2),
    )
    .expect("orchestrator");
    let sink = Arc::new(RecordingSink::default());
    let (emitter, _worker) = BehaviorEmitter::spawn(sink.clone(), 16);
    let state = AppState {
        controller: Arc::new(RefreshController::new(Arc::new(orch))),
        emitter,
    };
    (api::router(state), sink)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Json>) -> (StatusCode, Json) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app
        .clone()
        .oneshot(req.body(body).expect("build request"))
        .await
        .expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, v)
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let (app, _) = test_router();
    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");
    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK, "health should be 200");
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    assert_eq!(String::from_utf8(bytes).expect("utf8").trim(), "OK");
}

#[tokio::test]
async fn dashboard_is_idle_before_session() {
    let (app, _) = test_router();
    let (status, v) = call(&app, "GET", "/api/dashboard", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["state"], "idle");
    assert_eq!(v["loading"], false);
    assert!(v["snapshot"].is_null());

    let (status, v) = call(&app, "POST", "/api/dashboard/refresh", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(v["error"].as_str().unwrap_or_default().contains("session"));
}

#[tokio::test]
async fn session_then_refresh_returns_full_snapshot() {
    let (app, _) = test_router();
    let (status, v) = call(
        &app,
        "PUT",
        "/api/session",
        Some(json!({"id": "7", "display_name": "Ada"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["state"], "ready");
    assert_eq!(v["generation"], 1);
    assert_eq!(v["user"]["display_name"], "Ada");

    let entries = v["snapshot"]["entries"].as_object().expect("entries");
    assert_eq!(entries.len(), 8);
    let news = &entries["news"];
    assert_eq!(news["status"], "fulfilled");
    assert_eq!(news["provenance"]["is_live"], false);
    assert_eq!(
        news["provenance"]["registration_hint"],
        "https://newsapi.org/register"
    );
    assert!(news["payload"]["data"]["articles"].is_array());
    assert!(entries["nft"]["provenance"].is_null());

    let (status, v) = call(&app, "POST", "/api/dashboard/refresh", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["generation"], 2);
}

#[tokio::test]
async fn interactions_are_accepted_and_forwarded() {
    let (app, sink) = test_router();

    // Without a session the event is ignored, still 202.
    let (status, _) = call(
        &app,
        "POST",
        "/api/interactions",
        Some(json!({"action": "click", "content_id": 1, "category": "news"})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    call(&app, "PUT", "/api/session", Some(json!({"id": "7"}))).await;
    let (status, _) = call(
        &app,
        "POST",
        "/api/interactions",
        Some(json!({
            "action": "like",
            "content_id": 99,
            "category": "recommendations",
            "content_type": "videos"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let events = sink.events.lock().expect("events").clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].user_id, "7");
    assert_eq!(events[0].action, "like");
    assert_eq!(events[0].content_id, "99");
    assert_eq!(events[0].category, "videos");
}

#[tokio::test]
async fn unknown_interaction_category_is_rejected() {
    let (app, _) = test_router();
    let (status, _) = call(
        &app,
        "POST",
        "/api/interactions",
        Some(json!({"action": "click", "content_id": "x", "category": "weather"})),
    )
    .await;
    assert!(status.is_client_error());
}
