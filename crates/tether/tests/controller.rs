//! End-to-end tests for the session controller.
//!
//! The controller runs against the in-memory transport, with the occupancy
//! gate driven by hand through a `watch` channel. Time is virtual
//! (`start_paused`), so backoff delays of minutes complete instantly and
//! can still be measured exactly.

use std::time::Duration;

use tether::{ControllerStatus, SessionController, Settings, TetherError};
use tether_protocol::{BridgeCommand, ControlState};
use tether_session::SessionState;
use tether_transport::TransportEvent;
use tether_transport::memory::{self, MemoryPeer, MemoryServer};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

// =========================================================================
// Harness
// =========================================================================

struct Harness {
    server: MemoryServer,
    gate: watch::Sender<bool>,
    status: watch::Receiver<ControllerStatus>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<(), TetherError>>,
}

/// Builds settings from the required sections plus `extra` JSON members.
fn settings(extra: &str) -> Settings {
    let sep = if extra.is_empty() { "" } else { "," };
    Settings::from_json(&format!(
        r#"{{
            "account": {{ "username": "Bot" }},
            "server": {{ "host": "mc.example.net" }},
            "http": {{ "enabled": false }}
            {sep} {extra}
        }}"#
    ))
    .unwrap()
}

fn start(settings: Settings, gate_open: bool) -> Harness {
    let (transport, server) = memory::pair();
    let (gate, gate_rx) = watch::channel(gate_open);
    let (shutdown, shutdown_rx) = watch::channel(false);
    let controller = SessionController::new(transport, settings, gate_rx).with_shutdown(shutdown_rx);
    let status = controller.status();
    let task = tokio::spawn(controller.run());
    Harness {
        server,
        gate,
        status,
        shutdown,
        task,
    }
}

impl Harness {
    async fn accept(&mut self) -> MemoryPeer {
        tokio::time::timeout(Duration::from_secs(3600), self.server.accept())
            .await
            .expect("controller should connect")
            .expect("transport alive")
    }

    async fn expect_no_connect(&mut self, within: Duration) {
        let result = tokio::time::timeout(within, self.server.accept()).await;
        assert!(result.is_err(), "controller connected unexpectedly");
    }

    async fn wait_state(&mut self, state: SessionState) -> ControllerStatus {
        self.status
            .wait_for(|s| s.state == state)
            .await
            .expect("controller alive")
            .clone()
    }
}

fn chat(text: &str) -> BridgeCommand {
    BridgeCommand::Chat { text: text.into() }
}

// =========================================================================
// Happy path
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_empty_server_connect_auth_active() {
    let mut h = start(
        settings(r#""auth": { "enabled": true, "password": "pw" }"#),
        true,
    );

    let mut peer = h.accept().await;
    assert_eq!(peer.request.username, "Bot");
    assert_eq!(peer.request.host, "mc.example.net");
    assert_eq!(peer.request.port, 25565);

    peer.emit(TransportEvent::Ready);
    assert_eq!(peer.next_command().await, Some(chat("/register pw pw")));
    peer.chat("Server", "You have successfully registered!");
    assert_eq!(peer.next_command().await, Some(chat("/login pw")));
    peer.chat("Server", "You have successfully logged in.");

    let status = h.wait_state(SessionState::Active).await;
    assert_eq!(status.identity, "Bot");
    assert_eq!(status.attempt, 0);
    assert_eq!(status.sessions_started, 1);
}

#[tokio::test(start_paused = true)]
async fn test_occupied_server_never_spawns() {
    let mut h = start(settings(""), false);

    h.expect_no_connect(Duration::from_secs(3600)).await;
    assert_eq!(h.status.borrow().state, SessionState::Idle);

    h.gate.send(true).unwrap();
    let peer = h.accept().await;
    assert_eq!(peer.request.username, "Bot");
}

#[tokio::test(start_paused = true)]
async fn test_occupancy_change_does_not_evict_active_session() {
    let mut h = start(settings(""), true);
    let peer = h.accept().await;
    peer.emit(TransportEvent::Ready);
    h.wait_state(SessionState::Active).await;

    h.gate.send(false).unwrap();
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(h.status.borrow().state, SessionState::Active);
    assert!(peer.is_alive());
}

// =========================================================================
// Auth failures
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_auth_failure_still_goes_active_by_default() {
    let mut h = start(
        settings(r#""auth": { "enabled": true, "password": "pw" }"#),
        true,
    );
    let mut peer = h.accept().await;
    peer.emit(TransportEvent::Ready);
    peer.next_command().await;
    peer.chat("Server", "already registered");
    peer.next_command().await;
    peer.chat("Server", "Invalid password");

    h.wait_state(SessionState::Active).await;
    assert!(peer.is_alive());
}

#[tokio::test(start_paused = true)]
async fn test_auth_silence_times_out_then_goes_active() {
    let mut h = start(
        settings(r#""auth": { "enabled": true, "password": "pw", "reply-timeout-secs": 10 }"#),
        true,
    );
    let peer = h.accept().await;
    let began = Instant::now();
    peer.emit(TransportEvent::Ready);

    h.wait_state(SessionState::Active).await;
    assert!(began.elapsed() >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_required_auth_failure_ends_session() {
    let mut h = start(
        settings(r#""auth": { "enabled": true, "password": "pw", "required": true }"#),
        true,
    );
    let mut peer = h.accept().await;
    peer.emit(TransportEvent::Ready);
    peer.next_command().await;
    peer.chat("Server", "Invalid command");

    let status = h.wait_state(SessionState::Backoff).await;
    assert_eq!(status.attempt, 1);
    assert!(status.last_disconnect.unwrap().contains("registration rejected"));
    assert_eq!(peer.next_command().await, Some(BridgeCommand::Quit));
}

#[tokio::test(start_paused = true)]
async fn test_join_banner_is_not_taken_for_auth_reply() {
    let mut h = start(
        settings(r#""auth": { "enabled": true, "password": "pw", "required": true }"#),
        true,
    );
    let mut peer = h.accept().await;
    peer.emit(TransportEvent::Ready);
    peer.chat("Server", "Welcome to the server!");

    assert_eq!(peer.next_command().await, Some(chat("/register pw pw")));
    peer.chat("Server", "You have successfully registered!");
    assert_eq!(peer.next_command().await, Some(chat("/login pw")));
    peer.chat("Server", "You have successfully logged in.");

    let status = h.wait_state(SessionState::Active).await;
    assert_eq!(status.last_disconnect, None);
}

#[tokio::test(start_paused = true)]
async fn test_kick_during_auth_abandons_negotiation() {
    let mut h = start(
        settings(r#""auth": { "enabled": true, "password": "pw" }"#),
        true,
    );
    let mut peer = h.accept().await;
    peer.emit(TransportEvent::Ready);
    peer.next_command().await;
    peer.emit(TransportEvent::Kicked {
        reason: "You are banned".into(),
    });

    let status = h.wait_state(SessionState::Backoff).await;
    assert_eq!(status.sessions_started, 0, "never reached Active");
    assert_eq!(status.last_disconnect.as_deref(), Some("You are banned"));
}

// =========================================================================
// Identity conflict
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_duplicate_login_rotates_identity_without_retry() {
    let mut h = start(settings(""), true);
    let peer = h.accept().await;
    peer.emit(TransportEvent::Ready);
    h.wait_state(SessionState::Active).await;

    peer.emit(TransportEvent::Kicked {
        reason: "duplicate_login".into(),
    });

    let status = h.wait_state(SessionState::Idle).await;
    assert_eq!(status.identity, "Bot1");
    assert_eq!(status.backoff, None);
    h.expect_no_connect(Duration::from_secs(3600)).await;
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_login_respawns_after_occupancy_cycle() {
    let mut h = start(settings(""), true);
    let peer = h.accept().await;
    peer.emit(TransportEvent::Ready);
    h.wait_state(SessionState::Active).await;
    peer.emit(TransportEvent::Ended {
        reason: "You logged in from another location".into(),
    });
    h.wait_state(SessionState::Idle).await;

    h.gate.send(false).unwrap();
    h.expect_no_connect(Duration::from_secs(60)).await;
    h.gate.send(true).unwrap();

    let peer = h.accept().await;
    assert_eq!(peer.request.username, "Bot1");
}

// =========================================================================
// Backoff
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_throttled_end_waits_floor_on_every_attempt() {
    let mut h = start(settings(""), true);
    let peer = h.accept().await;
    peer.emit(TransportEvent::Ready);
    h.wait_state(SessionState::Active).await;

    let ended = Instant::now();
    peer.emit(TransportEvent::Ended {
        reason: "throttled: please wait".into(),
    });
    let status = h.wait_state(SessionState::Backoff).await;
    assert_eq!(status.attempt, 1);

    let peer = h.accept().await;
    let waited = ended.elapsed();
    assert!(waited >= Duration::from_secs(60), "waited {waited:?}");
    assert!(waited < Duration::from_secs(64), "waited {waited:?}");

    // Second attempt fails before spawning, still throttled.
    let ended = Instant::now();
    peer.emit(TransportEvent::Kicked {
        reason: "Connection throttled! Please wait before reconnecting.".into(),
    });
    let status = h.wait_state(SessionState::Backoff).await;
    assert_eq!(status.attempt, 2);

    h.accept().await;
    let waited = ended.elapsed();
    assert!(waited >= Duration::from_secs(60), "waited {waited:?}");
    assert!(waited < Duration::from_secs(64), "waited {waited:?}");
}

#[tokio::test(start_paused = true)]
async fn test_refused_connects_back_off_exponentially_with_same_identity() {
    let mut h = start(settings(r#""reconnect": { "max-jitter-ms": 0 }"#), false);
    h.server.refuse_next("connection refused");
    h.server.refuse_next("connection refused");

    let started = Instant::now();
    h.gate.send(true).unwrap();
    let peer = h.accept().await;

    // 5s after the first refusal, 10s after the second.
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(15), "waited {waited:?}");
    assert!(waited < Duration::from_secs(16), "waited {waited:?}");
    assert_eq!(peer.request.username, "Bot");
    assert_eq!(h.status.borrow().attempt, 2);
}

#[tokio::test(start_paused = true)]
async fn test_reaching_active_resets_attempt() {
    let mut h = start(settings(r#""reconnect": { "max-jitter-ms": 0 }"#), true);
    h.server.refuse_next("connection refused");

    let peer = h.accept().await;
    assert_eq!(h.status.borrow().attempt, 1);
    peer.emit(TransportEvent::Ready);

    let status = h.wait_state(SessionState::Active).await;
    assert_eq!(status.attempt, 0);
}

#[tokio::test(start_paused = true)]
async fn test_spawn_timeout_closes_connection_and_backs_off() {
    let settings = Settings::from_json(
        r#"{
            "account": { "username": "Bot" },
            "server": { "host": "mc.example.net", "spawn-timeout-secs": 10 },
            "http": { "enabled": false }
        }"#,
    )
    .unwrap();
    let mut h = start(settings, true);
    let started = Instant::now();
    let mut peer = h.accept().await;

    assert_eq!(peer.next_command().await, Some(BridgeCommand::Quit));
    assert!(started.elapsed() >= Duration::from_secs(10));
    let status = h.wait_state(SessionState::Backoff).await;
    assert_eq!(status.attempt, 1);
    assert_eq!(status.last_disconnect.as_deref(), Some("spawn timed out"));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_disabled_parks_after_end() {
    let mut h = start(settings(r#""reconnect": { "enabled": false }"#), true);
    let peer = h.accept().await;
    peer.emit(TransportEvent::Ready);
    h.wait_state(SessionState::Active).await;

    peer.emit(TransportEvent::Ended {
        reason: "socketClosed".into(),
    });

    h.wait_state(SessionState::Idle).await;
    h.expect_no_connect(Duration::from_secs(3600)).await;
}

// =========================================================================
// Presence and teardown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_presence_messages_stop_at_kick() {
    let mut h = start(
        settings(
            r#""presence": { "messages": { "enabled": true, "repeat": true, "interval-secs": 10, "lines": ["hi"] } }"#,
        ),
        true,
    );
    let mut peer = h.accept().await;
    peer.emit(TransportEvent::Ready);
    h.wait_state(SessionState::Active).await;

    assert_eq!(peer.next_command().await, Some(chat("hi")));
    peer.emit(TransportEvent::Kicked {
        reason: "bye".into(),
    });
    h.wait_state(SessionState::Backoff).await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(
        peer.drain_commands().is_empty(),
        "nothing written after the kick"
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_releases_controls_before_quit() {
    let mut h = start(
        settings(r#""presence": { "anti-idle": { "enabled": true } }"#),
        true,
    );
    let mut peer = h.accept().await;
    peer.emit(TransportEvent::Ready);
    h.wait_state(SessionState::Active).await;
    assert_eq!(
        peer.next_command().await,
        Some(BridgeCommand::Control {
            control: ControlState::Jump,
            state: true
        })
    );

    h.shutdown.send(true).unwrap();
    h.task.await.unwrap().unwrap();

    assert_eq!(
        peer.drain_commands(),
        vec![
            BridgeCommand::Control {
                control: ControlState::Jump,
                state: false
            },
            BridgeCommand::Quit
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_backoff_stops_promptly() {
    let mut h = start(settings(""), true);
    h.server.refuse_next("connection refused");
    h.wait_state(SessionState::Backoff).await;

    h.shutdown.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(1), h.task)
        .await
        .expect("stops without waiting out the delay")
        .unwrap()
        .unwrap();
}
