//! In-process transport for tests and dry runs.
//!
//! [`pair`] returns a [`MemoryTransport`] (handed to the code under test)
//! and a [`MemoryServer`] (kept by the test). Every successful `connect`
//! surfaces on the server as a [`MemoryPeer`], which plays the game side:
//! it emits [`TransportEvent`]s and observes the [`BridgeCommand`]s the
//! connection wrote.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tether_protocol::{BridgeCommand, ConnectRequest, Position};
use tokio::sync::mpsc;

use crate::{
    ChannelConnection, EventStream, LinkState, Transport, TransportError,
    TransportEvent,
};

/// Creates a connected transport/server pair.
pub fn pair() -> (MemoryTransport, MemoryServer) {
    let (peer_tx, peer_rx) = mpsc::unbounded_channel();
    let refusals = Arc::new(Mutex::new(VecDeque::new()));
    (
        MemoryTransport {
            peers: peer_tx,
            refusals: Arc::clone(&refusals),
        },
        MemoryServer {
            peers: peer_rx,
            refusals,
        },
    )
}

/// The client half: implements [`Transport`].
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    refusals: Arc<Mutex<VecDeque<String>>>,
}

impl Transport for MemoryTransport {
    type Connection = ChannelConnection;

    async fn connect(
        &self,
        request: &ConnectRequest,
    ) -> Result<(ChannelConnection, EventStream), TransportError> {
        let refusal = self
            .refusals
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        if let Some(reason) = refusal {
            return Err(TransportError::ConnectFailed(reason));
        }

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let link = Arc::new(LinkState::new());

        let peer = MemoryPeer {
            request: request.clone(),
            events: event_tx,
            commands: cmd_rx,
            link: Arc::clone(&link),
        };
        self.peers.send(peer).map_err(|_| {
            TransportError::ConnectFailed("memory server dropped".into())
        })?;

        Ok((ChannelConnection::new(cmd_tx, link), event_rx))
    }
}

/// The test half: receives one [`MemoryPeer`] per connection.
#[derive(Debug)]
pub struct MemoryServer {
    peers: mpsc::UnboundedReceiver<MemoryPeer>,
    refusals: Arc<Mutex<VecDeque<String>>>,
}

impl MemoryServer {
    /// Waits for the next connection attempt to arrive.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peers.recv().await
    }

    /// Makes the next `connect` call fail with `reason`.
    pub fn refuse_next(&self, reason: impl Into<String>) {
        if let Ok(mut queue) = self.refusals.lock() {
            queue.push_back(reason.into());
        }
    }
}

/// The game side of one in-memory connection.
#[derive(Debug)]
pub struct MemoryPeer {
    /// What the client asked to connect with.
    pub request: ConnectRequest,
    events: mpsc::UnboundedSender<TransportEvent>,
    commands: mpsc::UnboundedReceiver<BridgeCommand>,
    link: Arc<LinkState>,
}

impl MemoryPeer {
    /// Delivers an event to the client. Terminal events kill the link
    /// first, the same way the WebSocket reader does.
    pub fn emit(&self, event: TransportEvent) {
        if event.is_terminal() {
            self.link.mark_dead();
        }
        let _ = self.events.send(event);
    }

    /// Shorthand for a chat line.
    pub fn chat(&self, sender: &str, text: &str) {
        self.emit(TransportEvent::Chat {
            sender: sender.to_string(),
            text: text.to_string(),
        });
    }

    /// Waits for the next command the client wrote.
    pub async fn next_command(&mut self) -> Option<BridgeCommand> {
        self.commands.recv().await
    }

    /// Returns a command that is already queued, without waiting.
    pub fn try_next_command(&mut self) -> Option<BridgeCommand> {
        self.commands.try_recv().ok()
    }

    /// Drains every queued command.
    pub fn drain_commands(&mut self) -> Vec<BridgeCommand> {
        std::iter::from_fn(|| self.commands.try_recv().ok()).collect()
    }

    /// Reports a player position to the client.
    pub fn set_position(&self, position: Position) {
        self.link.set_position(position);
    }

    /// Whether the client still considers this link usable.
    pub fn is_alive(&self) -> bool {
        self.link.is_alive()
    }
}
