//!
//! src/server.rs  Andrew Belles  Oct 6th, 2025
//!
//! Read-only viewer over the persisted snapshot. Only ever reads files the
//! store has fully committed; a missing or unreadable file is shown as a
//! placeholder, never as a server error.
//!

use std::net::SocketAddr;

use axum::{extract::State, response::Html, routing::get, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::store::{RecordStore, StoreView};
use crate::CrawlerError;

pub const PLACEHOLDER_WAITING: &str = "waiting for first crawl";
pub const PLACEHOLDER_READ_ERROR: &str = "read error";

const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Clone)]
pub struct AppState {
    pub store: RecordStore,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

fn placeholder(updated_at: &str) -> Value {
    json!({ "updated_at": updated_at, "songs": [] })
}

/// GET /api/data
pub async fn get_data(State(state): State<AppState>) -> Json<Value> {
    match state.store.read_view() {
        StoreView::Ready(v) => Json(v),
        StoreView::Missing => Json(placeholder(PLACEHOLDER_WAITING)),
        StoreView::Unreadable(reason) => {
            warn!(reason = %reason, path = %state.store.path().display(), "server.data.unreadable");
            Json(placeholder(PLACEHOLDER_READ_ERROR))
        }
    }
}

/// GET /
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/data", get(get_data))
        .route("/health", get(health_check))
        .with_state(state)
}

pub async fn serve(
    addr: SocketAddr,
    store: RecordStore,
    shutdown: CancellationToken
) -> Result<(), CrawlerError> {
    let app = build_router(AppState { store });
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "server.listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("server.stop");
    Ok(())
}
