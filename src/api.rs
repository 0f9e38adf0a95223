use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{de, Deserialize, Deserializer};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::aggregate::types::Category;
use crate::behavior::{interaction_category, BehaviorEmitter, BehaviorEvent};
use crate::refresh::{DashboardView, RefreshController, RefreshError};
use crate::session::UserSession;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<RefreshController>,
    pub emitter: BehaviorEmitter,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/dashboard/refresh", post(refresh_dashboard))
        .route("/api/session", put(put_session))
        .route("/api/interactions", post(post_interaction))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn get_dashboard(State(state): State<AppState>) -> Json<DashboardView> {
    Json(state.controller.view())
}

async fn refresh_dashboard(
    State(state): State<AppState>,
) -> Result<Json<DashboardView>, (StatusCode, Json<Value>)> {
    match state.controller.refresh().await {
        Ok(_) => Ok(Json(state.controller.view())),
        Err(e @ RefreshError::NoSession) => Err((
            StatusCode::CONFLICT,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}

async fn put_session(
    State(state): State<AppState>,
    Json(user): Json<UserSession>,
) -> Json<DashboardView> {
    state.controller.set_session(user).await;
    Json(state.controller.view())
}

#[derive(Debug, Deserialize)]
struct InteractionReq {
    action: String,
    #[serde(deserialize_with = "string_or_number")]
    content_id: String,
    category: Category,
    #[serde(default)]
    content_type: Option<String>,
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "content_id must be a string or number, got {other}"
        ))),
    }
}

/// Always 202: interaction tracking is best-effort and never fails the caller.
async fn post_interaction(
    State(state): State<AppState>,
    Json(req): Json<InteractionReq>,
) -> StatusCode {
    let Some(user) = state.controller.session() else {
        tracing::debug!(target: "behavior", "interaction without session ignored");
        return StatusCode::ACCEPTED;
    };
    let category = interaction_category(req.category, req.content_type.as_deref());
    state.emitter.emit(BehaviorEvent::new(
        user.id,
        req.action,
        req.content_id,
        category,
    ));
    StatusCode::ACCEPTED
}
