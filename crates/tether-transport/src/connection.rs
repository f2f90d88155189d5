//! A [`Connection`] backed by an outbound command channel.
//!
//! Both transports share this type. The connection itself never touches a
//! socket: writes are pushed onto an unbounded channel and a writer task
//! (WebSocket) or a test peer (memory) drains them. That keeps every write
//! non-blocking, which is what the controller's single event loop needs.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tether_protocol::{BridgeCommand, ControlState, Goal, Position};
use tokio::sync::mpsc;

use crate::{Connection, ConnectionId, Movement, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// State shared between a connection handle and the task feeding it events.
#[derive(Debug)]
pub struct LinkState {
    alive: AtomicBool,
    position: RwLock<Option<Position>>,
}

impl LinkState {
    pub fn new() -> Self {
        Self {
            alive: AtomicBool::new(true),
            position: RwLock::new(None),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Marks the link dead. Returns `true` if it was alive before the call.
    pub fn mark_dead(&self) -> bool {
        self.alive.swap(false, Ordering::AcqRel)
    }

    pub fn set_position(&self, position: Position) {
        if let Ok(mut slot) = self.position.write() {
            *slot = Some(position);
        }
    }

    pub fn position(&self) -> Option<Position> {
        self.position.read().ok().and_then(|slot| *slot)
    }
}

impl Default for LinkState {
    fn default() -> Self {
        Self::new()
    }
}

/// A connection whose writes are queued as [`BridgeCommand`]s.
#[derive(Debug)]
pub struct ChannelConnection {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<BridgeCommand>,
    link: Arc<LinkState>,
}

impl ChannelConnection {
    /// Creates a connection with a fresh id.
    pub fn new(
        outbound: mpsc::UnboundedSender<BridgeCommand>,
        link: Arc<LinkState>,
    ) -> Self {
        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        Self { id, outbound, link }
    }

    /// Queues a command, refusing if the link is already dead.
    fn enqueue(&self, command: BridgeCommand) -> Result<(), TransportError> {
        if !self.link.is_alive() {
            return Err(TransportError::ConnectionClosed(format!(
                "{} is no longer alive",
                self.id
            )));
        }
        self.outbound.send(command).map_err(|_| {
            self.link.mark_dead();
            TransportError::ConnectionClosed(format!(
                "{} writer has stopped",
                self.id
            ))
        })
    }
}

impl Movement for ChannelConnection {
    fn set_goal(&self, goal: Goal) -> Result<(), TransportError> {
        self.enqueue(BridgeCommand::Goal { goal })
    }
}

impl Connection for ChannelConnection {
    fn send_chat(&self, text: &str) -> Result<(), TransportError> {
        self.enqueue(BridgeCommand::Chat {
            text: text.to_string(),
        })
    }

    fn set_control_state(
        &self,
        control: ControlState,
        active: bool,
    ) -> Result<(), TransportError> {
        self.enqueue(BridgeCommand::Control {
            control,
            state: active,
        })
    }

    fn position(&self) -> Option<Position> {
        self.link.position()
    }

    fn is_alive(&self) -> bool {
        self.link.is_alive()
    }

    fn close(&self) {
        if self.link.mark_dead() {
            tracing::debug!(id = %self.id, "closing connection");
            // Bypasses `enqueue`: the link is already marked dead, but the
            // writer still needs the quit to hang up cleanly.
            let _ = self.outbound.send(BridgeCommand::Quit);
        }
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
