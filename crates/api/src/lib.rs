mod auth;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tokio::sync::{mpsc, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use common::{CoreCommand, CoreState, RunMode, StatusBoard};

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub command_tx: mpsc::Sender<CoreCommand>,
    pub core_state: Arc<RwLock<CoreState>>,
    pub status: StatusBoard,
    pub run_mode: RunMode,
    pub control_token: String,
    pub account: String,
}

/// Build and run the Axum control API.
pub async fn serve(state: AppState, port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    let app = Router::new()
        .merge(routes::status_router(state.clone()))
        .merge(routes::control_router(state.clone()))
        .merge(routes::health_router())
        .with_state(state)
        .layer(cors);

    info!(%addr, "Control API listening");
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
