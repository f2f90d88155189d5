//! The session controller: one async loop that owns the connection.
//!
//! The controller is the only thing that touches the connection, the
//! presence timers, and the lifecycle state. Each pass through
//! [`SessionController::run`] handles one state:
//!
//! ```text
//!   Idle            wait for the occupancy gate, then connect
//!   Connecting      wait for the spawn (bounded by spawn-timeout)
//!   Authenticating  run the /register + /login exchange
//!   Active          select! over connection events and presence timers
//!   Ending          stop presence, close the connection, pick the outcome
//!   Backoff         sleep out the reconnect delay
//! ```
//!
//! Every wait also listens for shutdown. Because events and timers are
//! handled in the same `select!`, a presence timer can never run between
//! a disconnect and the teardown that follows it.

use std::time::Duration;

use tether_presence::PresenceMaintainer;
use tether_session::{
    AuthError, AuthNegotiator, EndOutcome, Identity, Lifecycle, Session, SessionEnd,
    SessionError, SessionState, WaitError, wait_for_event,
};
use tether_transport::{Connection, Transport, TransportEvent};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{Settings, TetherError};

/// A snapshot of the controller, published after every step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerStatus {
    pub state: SessionState,
    /// The identity of the current session, or of the next one.
    pub identity: String,
    pub attempt: u32,
    pub last_disconnect: Option<String>,
    /// The reconnect delay being waited out, while in Backoff.
    pub backoff: Option<Duration>,
    /// Sessions that reached Active.
    pub sessions_started: u64,
}

enum Flow {
    Continue,
    Shutdown,
}

/// Drives the session lifecycle against a [`Transport`].
pub struct SessionController<T: Transport> {
    transport: T,
    settings: Settings,
    lifecycle: Lifecycle,
    negotiator: AuthNegotiator,
    presence: PresenceMaintainer,
    session: Option<Session<T::Connection>>,
    gate: watch::Receiver<bool>,
    gate_open: bool,
    shutdown: Option<watch::Receiver<bool>>,
    status: watch::Sender<ControllerStatus>,
    backoff_until: Option<Instant>,
    sessions_started: u64,
}

impl<T: Transport> SessionController<T> {
    /// Creates a controller. `gate` carries spawn authorization from the
    /// occupancy gate (`true` = the server is empty).
    pub fn new(transport: T, settings: Settings, gate: watch::Receiver<bool>) -> Self {
        let lifecycle = Lifecycle::new(settings.account.username.clone(), settings.backoff_policy())
            .with_reconnect(settings.reconnect.enabled);
        let negotiator = settings.negotiator();
        let presence = PresenceMaintainer::new(settings.presence.clone());
        let (status, _) = watch::channel(ControllerStatus {
            state: lifecycle.state(),
            identity: lifecycle.identity().username(),
            attempt: 0,
            last_disconnect: None,
            backoff: None,
            sessions_started: 0,
        });

        Self {
            transport,
            settings,
            lifecycle,
            negotiator,
            presence,
            session: None,
            gate,
            gate_open: true,
            shutdown: None,
            status,
            backoff_until: None,
            sessions_started: 0,
        }
    }

    /// Stops the controller once `shutdown` reads `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Subscribes to status snapshots.
    pub fn status(&self) -> watch::Receiver<ControllerStatus> {
        self.status.subscribe()
    }

    /// Runs until shutdown.
    pub async fn run(mut self) -> Result<(), TetherError> {
        info!(
            identity = %self.lifecycle.identity(),
            host = %self.settings.server.host,
            port = self.settings.server.port,
            "session controller started"
        );

        loop {
            self.publish();
            if self.shutdown_signalled() {
                break;
            }
            let flow = match self.lifecycle.state() {
                SessionState::Idle => self.run_idle().await?,
                SessionState::Connecting => self.run_connecting().await?,
                SessionState::Authenticating => self.run_authenticating().await?,
                SessionState::Active => self.run_active().await?,
                SessionState::Backoff => self.run_backoff().await?,
                SessionState::Ending => {
                    // end_session passes through Ending synchronously.
                    return Err(SessionError::InvalidTransition {
                        from: SessionState::Ending,
                        event: "resume",
                    }
                    .into());
                }
            };
            if let Flow::Shutdown = flow {
                break;
            }
        }

        self.close_for_shutdown();
        self.publish();
        info!("session controller stopped");
        Ok(())
    }

    // ---- States ----

    async fn run_idle(&mut self) -> Result<Flow, TetherError> {
        loop {
            let authorized = *self.gate.borrow_and_update();
            self.lifecycle.observe_occupancy(authorized);

            if self.lifecycle.is_parked() {
                info!("reconnect disabled; waiting for shutdown");
                wait_shutdown(&mut self.shutdown).await;
                return Ok(Flow::Shutdown);
            }
            if self.lifecycle.may_spawn(authorized) {
                self.lifecycle.begin_connect(authorized)?;
                return Ok(Flow::Continue);
            }
            debug!(authorized, gate = ?self.lifecycle.spawn_gate(), "spawn not authorized; waiting");

            tokio::select! {
                changed = self.gate.changed(), if self.gate_open => {
                    if changed.is_err() {
                        // The gate's last value is final.
                        self.gate_open = false;
                    }
                }
                _ = wait_shutdown(&mut self.shutdown) => return Ok(Flow::Shutdown),
            }
        }
    }

    async fn run_connecting(&mut self) -> Result<Flow, TetherError> {
        let identity = self.lifecycle.identity();
        let request = self.settings.connect_request(&identity);
        info!(
            %identity,
            host = %request.host,
            port = request.port,
            attempt = self.lifecycle.reconnect().attempt,
            "connecting"
        );

        let connected = tokio::select! {
            result = self.transport.connect(&request) => result,
            _ = wait_shutdown(&mut self.shutdown) => return Ok(Flow::Shutdown),
        };
        let (connection, events) = match connected {
            Ok(pair) => pair,
            Err(e) => {
                warn!(%identity, error = %e, "connect failed");
                self.end_session(SessionEnd::Failed(e.to_string()))?;
                return Ok(Flow::Continue);
            }
        };
        let session = self.session.insert(Session::new(identity, connection, events));

        let deadline = Instant::now() + self.settings.spawn_timeout();
        let spawned = tokio::select! {
            result = wait_for_event(&mut session.events, deadline, |event| {
                matches!(event, TransportEvent::Ready).then_some(())
            }) => result,
            _ = wait_shutdown(&mut self.shutdown) => return Ok(Flow::Shutdown),
        };

        match spawned {
            Ok(()) => {
                info!(identity = %self.lifecycle.identity(), "spawned");
                self.lifecycle.on_ready()?;
            }
            Err(WaitError::Timeout) => {
                warn!(
                    timeout_secs = self.settings.server.spawn_timeout_secs,
                    "no spawn before timeout"
                );
                self.end_session(SessionEnd::Failed("spawn timed out".into()))?;
            }
            Err(WaitError::Interrupted(event)) => self.end_session(end_from_event(event))?,
        }
        Ok(Flow::Continue)
    }

    async fn run_authenticating(&mut self) -> Result<Flow, TetherError> {
        if !self.settings.auth.enabled {
            self.activate()?;
            return Ok(Flow::Continue);
        }
        let Some(session) = self.session.as_mut() else {
            return Err(missing_session(SessionState::Authenticating));
        };

        let password = &self.settings.auth.password;
        let result = tokio::select! {
            result = self.negotiator.negotiate(&session.connection, &mut session.events, password) => result,
            _ = wait_shutdown(&mut self.shutdown) => return Ok(Flow::Shutdown),
        };

        match result {
            Ok(()) => self.activate()?,
            Err(AuthError::Interrupted(event)) => {
                warn!(%event, "connection ended during auth");
                self.end_session(end_from_event(event))?;
            }
            Err(e) if self.settings.auth.required => {
                warn!(error = %e, "auth failed; ending session");
                self.end_session(SessionEnd::Failed(format!("auth failed: {e}")))?;
            }
            Err(e) => {
                warn!(error = %e, "auth failed; continuing without it");
                self.activate()?;
            }
        }
        Ok(Flow::Continue)
    }

    async fn run_active(&mut self) -> Result<Flow, TetherError> {
        let Some(session) = self.session.as_mut() else {
            return Err(missing_session(SessionState::Active));
        };

        tokio::select! {
            biased;

            event = session.events.recv() => {
                let event = event.unwrap_or_else(|| TransportEvent::Ended {
                    reason: "event stream closed".into(),
                });
                self.on_active_event(event)?;
            }
            action = self.presence.next_action() => {
                if let Some(session) = &self.session {
                    self.presence.fire(action, &session.connection);
                }
            }
            _ = wait_shutdown(&mut self.shutdown) => return Ok(Flow::Shutdown),
        }
        Ok(Flow::Continue)
    }

    async fn run_backoff(&mut self) -> Result<Flow, TetherError> {
        let deadline = self.backoff_until.unwrap_or_else(Instant::now);
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                self.backoff_until = None;
                self.lifecycle.on_backoff_elapsed()?;
                Ok(Flow::Continue)
            }
            _ = wait_shutdown(&mut self.shutdown) => Ok(Flow::Shutdown),
        }
    }

    // ---- Transitions with side effects ----

    fn activate(&mut self) -> Result<(), TetherError> {
        let Some(session) = &self.session else {
            return Err(missing_session(SessionState::Authenticating));
        };
        self.lifecycle.on_authenticated()?;
        self.presence.start(&session.connection);
        self.sessions_started += 1;
        info!(identity = %session.identity, "session active");
        Ok(())
    }

    fn on_active_event(&mut self, event: TransportEvent) -> Result<(), TetherError> {
        match event {
            TransportEvent::Chat { sender, text } => debug!(%sender, %text, "chat"),
            TransportEvent::GoalReached => {
                let position = self.session.as_ref().and_then(|s| s.connection.position());
                info!(position = ?position, "goal reached");
            }
            TransportEvent::Died => warn!("died; respawning"),
            TransportEvent::Error { message } => warn!(%message, "connection error"),
            TransportEvent::Ready => debug!("respawned"),
            TransportEvent::Kicked { .. } | TransportEvent::Ended { .. } => {
                self.end_session(end_from_event(event))?;
            }
        }
        Ok(())
    }

    /// Tears the session down and decides what comes next.
    ///
    /// Presence stops before the connection closes, so no timer write can
    /// race the close.
    fn end_session(&mut self, end: SessionEnd) -> Result<(), TetherError> {
        self.lifecycle.begin_ending(&end)?;

        if let Some(session) = self.session.take() {
            self.presence.stop(&session.connection);
            session.connection.close();
            info!(
                identity = %session.identity,
                uptime_secs = session.uptime().as_secs(),
                "session closed"
            );
        }

        match self.lifecycle.finish_ending()? {
            EndOutcome::Retry(delay) => {
                self.backoff_until = Some(Instant::now() + delay);
                info!(
                    attempt = self.lifecycle.reconnect().attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    reason = %end.reason(),
                    "reconnect scheduled"
                );
            }
            EndOutcome::Suppressed => info!(
                next_identity = %self.lifecycle.identity(),
                "identity conflict; not reconnecting until the server has been occupied and emptied"
            ),
            EndOutcome::Stopped => info!("reconnect disabled; not reconnecting"),
        }
        Ok(())
    }

    fn close_for_shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            self.presence.stop(&session.connection);
            session.connection.close();
            info!(identity = %session.identity, "session closed for shutdown");
        }
    }

    // ---- Helpers ----

    fn shutdown_signalled(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    fn publish(&self) {
        let reconnect = self.lifecycle.reconnect();
        let identity: Identity = match &self.session {
            Some(session) => session.identity.clone(),
            None => self.lifecycle.identity(),
        };
        let state = self.lifecycle.state();
        self.status.send_replace(ControllerStatus {
            state,
            identity: identity.username(),
            attempt: reconnect.attempt,
            last_disconnect: reconnect.last_reason.clone(),
            backoff: if state == SessionState::Backoff {
                reconnect.last_delay
            } else {
                None
            },
            sessions_started: self.sessions_started,
        });
    }
}

/// Resolves once shutdown is requested. Pends forever without a shutdown
/// channel, or if its sender goes away without requesting one.
async fn wait_shutdown(shutdown: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = shutdown {
        if rx.wait_for(|&stop| stop).await.is_ok() {
            return;
        }
    }
    std::future::pending::<()>().await
}

fn end_from_event(event: TransportEvent) -> SessionEnd {
    match event {
        TransportEvent::Kicked { reason } => SessionEnd::Kicked(reason),
        TransportEvent::Ended { reason } => SessionEnd::Ended(reason),
        other => SessionEnd::Failed(other.to_string()),
    }
}

fn missing_session(from: SessionState) -> TetherError {
    SessionError::InvalidTransition {
        from,
        event: "use missing session",
    }
    .into()
}
