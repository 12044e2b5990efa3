// src/server.rs

//! Read-only HTTP status endpoint.
//!
//! - `GET /`: service name, configured sources
//! - `GET /status`: scheduler progress and the last cycle of every source
//! - `GET /snapshots/{name}`: stored snapshot of one source

use std::future::Future;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use serde_json::json;

use crate::error::Result;
use crate::models::Config;
use crate::pipeline::{StatusBoard, StatusReport};
use crate::storage::LocalStorage;

#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    status: Arc<StatusBoard>,
    storage: LocalStorage,
}

impl AppState {
    pub fn new(config: Arc<Config>, status: Arc<StatusBoard>, storage: LocalStorage) -> Self {
        Self {
            config,
            status,
            storage,
        }
    }

    fn source_names(&self) -> Vec<&str> {
        self.config.sources.iter().map(|s| s.name.as_str()).collect()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/status", get(status))
        .route("/snapshots/{name}", get(snapshot))
        .with_state(state)
}

/// Bind `0.0.0.0:<port>` and serve until `shutdown` resolves.
pub async fn serve(
    port: u16,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    log::info!("Status server listening on port {}", port);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    log::info!("Status server closed");
    Ok(())
}

async fn index(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "message": "Listing Watch",
        "sources": state.source_names(),
        "status": "running",
    }))
}

#[derive(Serialize)]
struct StatusResponse<'a> {
    status: &'static str,
    sources: Vec<&'a str>,
    interval_secs: u64,
    #[serde(flatten)]
    report: StatusReport,
}

async fn status(State(state): State<AppState>) -> Response {
    let body = StatusResponse {
        status: "active",
        sources: state.source_names(),
        interval_secs: state.config.monitor.interval_secs,
        report: state.status.report(),
    };
    Json(body).into_response()
}

async fn snapshot(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let Some(source) = state.config.sources.iter().find(|s| s.name == name) else {
        return not_found(format!("Unknown source: {name}"));
    };

    let snapshot = match state.storage.read_snapshot(source).await {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => return not_found(format!("No snapshot stored for {name}")),
        Err(e) => {
            log::warn!("[{}] {}", name, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    match snapshot.to_json() {
        Ok(bytes) => ([(header::CONTENT_TYPE, "application/json")], bytes).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

fn not_found(message: String) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
}
