use axum::{extract::State, middleware, routing::get, Json, Router};
use serde_json::{json, Value};

use common::{Position, PositionStatus};

use crate::{auth::require_auth, AppState};

pub fn status_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/status", get(get_status))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

/// Status query consumed by the external UI/CLI layer: per-actor run and
/// error counters, core state, and currently open positions.
async fn get_status(State(state): State<AppState>) -> Json<Value> {
    let core_state = *state.core_state.read().await;
    let actors = state.status.report().await;

    let open: Vec<Position> = sqlx::query_as::<_, Position>(
        "SELECT id, account, instrument, direction, entry_price, quantity, stop_loss, \
         take_profit, strategy, status, close_reason, ticket, peak_profit, opened_at, closed_at \
         FROM positions WHERE account = ? AND status = ? ORDER BY opened_at",
    )
    .bind(&state.account)
    .bind(PositionStatus::Open)
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    Json(json!({
        "core": core_state.to_string(),
        "mode": state.run_mode.to_string(),
        "actors": actors,
        "open_positions": open,
        "open_count": open.len(),
    }))
}
