//! Transport abstraction layer for Tether.
//!
//! Provides the [`Transport`], [`Connection`], and [`Movement`] traits that
//! stand between the session controller and whatever actually speaks the
//! game protocol.
//!
//! A transport opens one game connection per call and hands back two
//! things: a [`Connection`] for outbound writes, and an [`EventStream`] of
//! inbound [`TransportEvent`]s. The controller owns both exclusively.
//!
//! # Feature Flags
//!
//! - `websocket` (default): [`BridgeTransport`], a JSON-over-WebSocket
//!   link to a game bridge process, via `tokio-tungstenite`
//! - `memory`: [`memory::MemoryTransport`], an in-process transport for
//!   tests and dry runs

mod connection;
mod error;
#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use connection::{ChannelConnection, LinkState};
pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::BridgeTransport;

use std::fmt;
use std::future::Future;

use tether_protocol::{ConnectRequest, ControlState, Goal, Position};
use tokio::sync::mpsc;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Something that happened on a game connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The player spawned; the connection is usable.
    Ready,
    /// A chat line. `sender` is whatever the server attributes it to,
    /// which may be the server itself.
    Chat { sender: String, text: String },
    /// The server kicked us.
    Kicked { reason: String },
    /// The connection ended.
    Ended { reason: String },
    /// A non-fatal error report.
    Error { message: String },
    /// The pathfinder reached its goal.
    GoalReached,
    /// The player died and respawned.
    Died,
}

impl TransportEvent {
    /// Returns `true` for events after which the connection is gone.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Kicked { .. } | Self::Ended { .. })
    }
}

impl fmt::Display for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str("ready"),
            Self::Chat { sender, text } => write!(f, "chat <{sender}> {text}"),
            Self::Kicked { reason } => write!(f, "kicked: {reason}"),
            Self::Ended { reason } => write!(f, "ended: {reason}"),
            Self::Error { message } => write!(f, "error: {message}"),
            Self::GoalReached => f.write_str("goal reached"),
            Self::Died => f.write_str("died"),
        }
    }
}

/// Inbound events for one connection. Closed when the connection is gone.
pub type EventStream = mpsc::UnboundedReceiver<TransportEvent>;

/// Opens game connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Requests a new game connection.
    ///
    /// Resolves once the link is established, which is NOT the same as the
    /// player being in the world: wait for [`TransportEvent::Ready`] on the
    /// returned stream for that.
    fn connect(
        &self,
        request: &ConnectRequest,
    ) -> impl Future<Output = Result<(Self::Connection, EventStream), TransportError>> + Send;
}

/// Hands goals to the pathfinder. Planning the route is the bridge's job.
pub trait Movement {
    fn set_goal(&self, goal: Goal) -> Result<(), TransportError>;
}

/// A single game connection.
///
/// Every write is a non-blocking enqueue. Implementations must refuse
/// writes once the connection is no longer alive, so that a timer firing
/// after teardown can never reach the wire.
pub trait Connection: Movement + Send + Sync + 'static {
    /// Sends a chat line (or slash command) as the player.
    fn send_chat(&self, text: &str) -> Result<(), TransportError>;

    /// Presses (`true`) or releases (`false`) a control.
    fn set_control_state(
        &self,
        control: ControlState,
        active: bool,
    ) -> Result<(), TransportError>;

    /// The player's last known position, if the game has reported one.
    fn position(&self) -> Option<Position>;

    /// Whether writes can still reach the game.
    fn is_alive(&self) -> bool;

    /// Closes the connection. Idempotent.
    fn close(&self);

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
