use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz))
}

/// Health check endpoint — no auth required.
/// Used by systemd post-deploy check and ops scripts.
async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let core_state = *state.core_state.read().await;
    Json(json!({
        "status": "ok",
        "core": core_state.to_string(),
        "mode": state.run_mode.to_string(),
    }))
}
