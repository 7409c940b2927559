use axum::{extract::State, http::StatusCode, middleware, routing::post, Json, Router};
use serde_json::{json, Value};
use tracing::info;

use common::CoreCommand;

use crate::{auth::require_auth, AppState};

pub fn control_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/control/start", post(start))
        .route("/api/control/stop", post(stop))
        .route("/api/control/pause", post(pause))
        .route("/api/control/resume", post(resume))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

async fn start(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    send(state, CoreCommand::Start, "start").await
}

async fn stop(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    send(state, CoreCommand::Stop, "stop").await
}

async fn pause(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    send(state, CoreCommand::Pause, "pause").await
}

async fn resume(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    send(state, CoreCommand::Resume, "resume").await
}

async fn send(state: AppState, command: CoreCommand, name: &str) -> (StatusCode, Json<Value>) {
    info!(command = name, "Control command received");
    let _ = state.command_tx.send(command).await;
    (StatusCode::OK, Json(json!({ "status": "accepted", "command": name })))
}
