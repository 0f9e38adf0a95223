// tests/http_upstream.rs
//
// Real HTTP against an in-process mock gateway bound to 127.0.0.1:0.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use dashboard_aggregator::aggregate::providers::HttpProvider;
use dashboard_aggregator::aggregate::sources::default_sources;
use dashboard_aggregator::aggregate::types::{Category, FetchError};
use dashboard_aggregator::behavior::{BehaviorEmitter, BehaviorEvent, HttpBehaviorSink};
use dashboard_aggregator::{FetchOrchestrator, UserSession};

async fn news(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!({
        "source": "REAL API DATA",
        "user": q.get("user_id"),
        "articles": [{"id": "n1", "is_static": false}]
    }))
}

async fn jobs_static() -> Json<Value> {
    Json(json!({
        "error": "STATIC DATA - No LinkedIn API Key Found",
        "message": "This is static/mock data.",
        "jobs": [{"id": "j1", "is_static": true}]
    }))
}

async fn nft(Path(user): Path<String>) -> Json<Value> {
    Json(json!({ "nfts": [{"id": format!("token-for-{user}")}] }))
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn not_json() -> &'static str {
    "<html>gateway error</html>"
}

async fn no_list() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn spawn_gateway(behavior_tx: mpsc::UnboundedSender<(String, Value)>) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route("/api/news/trending", get(news))
        .route("/api/jobs/trending", get(jobs_static))
        .route("/api/videos/trending", get(broken))
        .route("/api/deals/trending", get(not_json))
        .route("/api/movies/trending", get(no_list))
        // food left unrouted: 404
        .route("/api/recommendations", get(no_list))
        .route("/api/nft/{user}", get(nft))
        .route(
            "/api/users/{id}/behavior",
            post(move |Path(id): Path<String>, Json(body): Json<Value>| {
                let tx = behavior_tx.clone();
                async move {
                    let _ = tx.send((id, body));
                    StatusCode::CREATED
                }
            }),
        );
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn gateway_responses_map_to_snapshot_entries() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let base = spawn_gateway(tx).await;
    let provider = HttpProvider::new(&base).expect("provider");
    let orch = FetchOrchestrator::new(default_sources(), Arc::new(provider), Duration::from_secs(5))
        .expect("orchestrator");

    let snap = orch
        .run_once(&UserSession::new("u 7", "Ada"), 1)
        .await
        .expect("run");
    assert_eq!(snap.len(), 8);

    let news = snap.get(Category::News).unwrap();
    let payload = news.result.payload().expect("news fulfilled");
    assert_eq!(payload.body["user"], "u 7", "user_id travels as query param");
    assert!(news.provenance.as_ref().unwrap().is_live);

    let jobs = snap.get(Category::Jobs).unwrap();
    let tag = jobs.provenance.as_ref().unwrap();
    assert!(!tag.is_live);
    assert_eq!(tag.reason_message.as_deref(), Some("This is static/mock data."));
    assert_eq!(
        tag.registration_hint.as_deref(),
        Some("https://developer.linkedin.com/")
    );

    assert_eq!(
        snap.get(Category::Videos).unwrap().result.failure(),
        Some(&FetchError::Status { status: 500 })
    );
    assert!(matches!(
        snap.get(Category::Deals).unwrap().result.failure(),
        Some(FetchError::Decode { .. })
    ));
    assert_eq!(
        snap.get(Category::Food).unwrap().result.failure(),
        Some(&FetchError::Status { status: 404 })
    );

    // Missing list field: fulfilled, no data.
    let movies = snap.get(Category::Movies).unwrap();
    assert!(movies.result.payload().unwrap().is_shape_mismatch());

    let nft = snap.get(Category::Nft).unwrap();
    assert_eq!(
        nft.result.payload().unwrap().body["nfts"][0]["id"],
        "token-for-u 7"
    );
    assert!(nft.provenance.is_none());

    assert_eq!(snap.rejected_count(), 3);
}

#[tokio::test]
async fn unreachable_gateway_rejects_every_source() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let provider = HttpProvider::new(&format!("http://{addr}")).expect("provider");
    let orch = FetchOrchestrator::new(default_sources(), Arc::new(provider), Duration::from_secs(5))
        .expect("orchestrator");
    let snap = orch
        .run_once(&UserSession::new("1", "Ada"), 1)
        .await
        .expect("transport failures are not orchestration failures");
    assert_eq!(snap.len(), 8);
    assert_eq!(snap.rejected_count(), 8);
    for (_, e) in snap.entries() {
        assert!(matches!(
            e.result.failure(),
            Some(FetchError::Transport { .. })
        ));
    }
}

#[tokio::test]
async fn behavior_events_are_posted_to_user_endpoint() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let base = spawn_gateway(tx).await;
    let sink = HttpBehaviorSink::new(&base)
        .expect("sink")
        .with_timeout(Duration::from_secs(2));
    let (emitter, _worker) = BehaviorEmitter::spawn(Arc::new(sink), 8);

    emitter.emit(BehaviorEvent::new("42", "bookmark", "n1", "news"));

    let (id, body) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("delivered in time")
        .expect("channel open");
    assert_eq!(id, "42");
    assert_eq!(
        body,
        json!({"action": "bookmark", "content_id": "n1", "category": "news"})
    );
}
