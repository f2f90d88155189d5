//! Session types: the data that describes one connection to the game.

use std::fmt;
use std::time::Duration;

use tether_transport::{Connection, EventStream};
use tokio::time::Instant;

use crate::Identity;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where the controller is in a session's lifecycle.
///
/// ```text
///   Idle ──→ Connecting ──→ Authenticating ──→ Active
///    ↑           │                │               │
///    │           └────────────────┴───────────────┘
///    │                           ↓
///    │                        Ending ──→ Backoff
///    │                          │           │
///    └──────────────────────────┴───────────┘
/// ```
///
/// `Connecting`, `Authenticating`, and `Active` are the only states in
/// which a connection exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Connecting,
    Authenticating,
    Active,
    /// Teardown in progress: presence is stopped and the connection is
    /// being closed.
    Ending,
    /// Waiting out the reconnect delay.
    Backoff,
}

impl SessionState {
    /// Whether a connection exists in this state.
    pub fn has_connection(self) -> bool {
        matches!(self, Self::Connecting | Self::Authenticating | Self::Active)
    }

    /// Whether `self → next` is an edge of the lifecycle graph.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, Authenticating)
                | (Authenticating, Active)
                | (Connecting | Authenticating | Active, Ending)
                | (Ending, Backoff | Idle)
                | (Backoff, Idle)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Active => "active",
            Self::Ending => "ending",
            Self::Backoff => "backoff",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ReconnectState
// ---------------------------------------------------------------------------

/// Bookkeeping that survives across sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconnectState {
    /// Consecutive sessions that ended without this one being reset by a
    /// successful login.
    pub attempt: u32,
    pub last_reason: Option<String>,
    pub last_delay: Option<Duration>,
}

// ---------------------------------------------------------------------------
// SessionEnd
// ---------------------------------------------------------------------------

/// How a session came to an end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The server kicked us.
    Kicked(String),
    /// The connection closed.
    Ended(String),
    /// The connection could not be set up (refused, spawn timeout, or a
    /// failed login when login is required).
    Failed(String),
}

impl SessionEnd {
    pub fn reason(&self) -> &str {
        match self {
            Self::Kicked(r) | Self::Ended(r) | Self::Failed(r) => r,
        }
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kicked(r) => write!(f, "kicked: {r}"),
            Self::Ended(r) => write!(f, "ended: {r}"),
            Self::Failed(r) => write!(f, "failed: {r}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One live connection to the game, under one identity.
///
/// Owned exclusively by the controller. The lifecycle state and the
/// attempt counter live on [`Lifecycle`](crate::Lifecycle), which outlives
/// individual sessions.
#[derive(Debug)]
pub struct Session<C> {
    pub identity: Identity,
    pub connection: C,
    pub events: EventStream,
    pub opened_at: Instant,
}

impl<C: Connection> Session<C> {
    pub fn new(identity: Identity, connection: C, events: EventStream) -> Self {
        Self {
            identity,
            connection,
            events,
            opened_at: Instant::now(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.connection.is_alive()
    }

    pub fn uptime(&self) -> Duration {
        self.opened_at.elapsed()
    }
}
