//! Liveness HTTP surface, for uptime monitors that keep a free host awake.
//!
//! - `GET /` answers with a plain-text banner
//! - `GET /ping` answers with JSON describing the process and the session

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::sync::watch;

use crate::{ControllerStatus, TetherError};

/// State shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    started: Instant,
    status: watch::Receiver<ControllerStatus>,
}

impl AppState {
    pub fn new(status: watch::Receiver<ControllerStatus>) -> Self {
        Self {
            started: Instant::now(),
            status,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ping", get(ping))
        .with_state(state)
}

/// Binds `addr` and serves until the process exits.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), TetherError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(TetherError::Http)?;
    tracing::info!(%addr, "liveness endpoint listening");
    axum::serve(listener, router(state))
        .await
        .map_err(TetherError::Http)
}

async fn index() -> &'static str {
    "tether is running"
}

async fn ping(State(state): State<AppState>) -> Json<Value> {
    let status = state.status.borrow().clone();
    Json(json!({
        "status": "alive",
        "message": "Bot is running",
        "uptime": format_uptime(state.started.elapsed()),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "session": {
            "state": status.state.as_str(),
            "identity": status.identity,
            "attempt": status.attempt,
            "last_disconnect": status.last_disconnect,
            "backoff_secs": status.backoff.map(|d| d.as_secs()),
            "sessions_started": status.sessions_started,
        },
    }))
}

/// Formats a duration as `"{h}h {m}m {s}s"`.
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}
