//! Liveness endpoint tests, driven through the router without a socket.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tether::ControllerStatus;
use tether::http::{AppState, router};
use tether_session::SessionState;
use tokio::sync::watch;
use tower::ServiceExt;

fn status(state: SessionState) -> ControllerStatus {
    ControllerStatus {
        state,
        identity: "Bot".into(),
        attempt: 0,
        last_disconnect: None,
        backoff: None,
        sessions_started: 0,
    }
}

async fn get(state: AppState, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let code = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (code, body.to_vec())
}

#[tokio::test]
async fn test_index_returns_banner() {
    let (_tx, rx) = watch::channel(status(SessionState::Idle));

    let (code, body) = get(AppState::new(rx), "/").await;

    assert_eq!(code, StatusCode::OK);
    assert_eq!(body, b"tether is running");
}

#[tokio::test]
async fn test_ping_reports_alive_with_session() {
    let (_tx, rx) = watch::channel(ControllerStatus {
        identity: "Bot2".into(),
        sessions_started: 4,
        ..status(SessionState::Active)
    });

    let (code, body) = get(AppState::new(rx), "/ping").await;
    let json: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(code, StatusCode::OK);
    assert_eq!(json["status"], "alive");
    assert_eq!(json["message"], "Bot is running");
    assert!(json["uptime"].as_str().unwrap().ends_with('s'));
    assert!(chrono::DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).is_ok());
    assert_eq!(json["session"]["state"], "active");
    assert_eq!(json["session"]["identity"], "Bot2");
    assert_eq!(json["session"]["sessions_started"], 4);
    assert!(json["session"]["backoff_secs"].is_null());
}

#[tokio::test]
async fn test_ping_reflects_latest_status() {
    let (tx, rx) = watch::channel(status(SessionState::Active));
    let state = AppState::new(rx);

    tx.send_replace(ControllerStatus {
        attempt: 3,
        last_disconnect: Some("throttled".into()),
        backoff: Some(Duration::from_secs(61)),
        ..status(SessionState::Backoff)
    });
    let (_, body) = get(state, "/ping").await;
    let json: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["session"]["state"], "backoff");
    assert_eq!(json["session"]["attempt"], 3);
    assert_eq!(json["session"]["last_disconnect"], "throttled");
    assert_eq!(json["session"]["backoff_secs"], 61);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (_tx, rx) = watch::channel(status(SessionState::Idle));

    let (code, _) = get(AppState::new(rx), "/nope").await;

    assert_eq!(code, StatusCode::NOT_FOUND);
}
