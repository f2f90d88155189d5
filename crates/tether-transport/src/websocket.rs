//! Game bridge transport over WebSocket, using `tokio-tungstenite`.
//!
//! Each [`Transport::connect`] call opens a fresh WebSocket to the bridge,
//! sends a `connect` command, and splits the socket into two tasks:
//!
//! ```text
//!   ChannelConnection ──cmd channel──→ write_loop ──→ socket
//!   socket ──→ read_loop ──event channel──→ EventStream (controller)
//! ```
//!
//! Position reports never reach the controller as events; the read loop
//! stores them on the shared [`LinkState`] instead.

use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tether_protocol::{
    BridgeCommand, BridgeEvent, Codec, ConnectRequest, JsonCodec, Position,
    ProtocolError,
};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::{
    ChannelConnection, EventStream, LinkState, Transport, TransportError,
    TransportEvent,
};

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// A [`Transport`] that reaches the game through a bridge process.
#[derive(Debug, Clone)]
pub struct BridgeTransport {
    url: String,
    codec: JsonCodec,
}

impl BridgeTransport {
    /// Creates a transport for the bridge at `url` (e.g. `ws://127.0.0.1:4600`).
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            codec: JsonCodec,
        }
    }

    /// The bridge URL this transport dials.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for BridgeTransport {
    type Connection = ChannelConnection;

    async fn connect(
        &self,
        request: &ConnectRequest,
    ) -> Result<(ChannelConnection, EventStream), TransportError> {
        let (ws, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| {
                TransportError::ConnectFailed(format!("bridge {}: {e}", self.url))
            })?;
        let (mut sink, stream) = ws.split();

        let hello =
            encode_text(&self.codec, &BridgeCommand::Connect(request.clone()))?;
        sink.send(hello).await.map_err(|e| {
            TransportError::ConnectFailed(format!("bridge {}: {e}", self.url))
        })?;

        tracing::debug!(
            url = %self.url,
            username = %request.username,
            host = %request.host,
            port = request.port,
            "bridge link opened"
        );

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let link = Arc::new(LinkState::new());

        tokio::spawn(write_loop(sink, cmd_rx, self.codec));
        tokio::spawn(read_loop(stream, event_tx, Arc::clone(&link), self.codec));

        Ok((ChannelConnection::new(cmd_tx, link), event_rx))
    }
}

/// Encodes a command as a WebSocket text frame.
fn encode_text(
    codec: &JsonCodec,
    command: &BridgeCommand,
) -> Result<Message, TransportError> {
    let bytes = codec.encode(command)?;
    let text = String::from_utf8(bytes).map_err(|e| {
        ProtocolError::InvalidMessage(format!("encoded command is not UTF-8: {e}"))
    })?;
    Ok(Message::Text(text.into()))
}

/// Drains queued commands onto the socket until quit or the handle drops.
async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut commands: mpsc::UnboundedReceiver<BridgeCommand>,
    codec: JsonCodec,
) {
    while let Some(command) = commands.recv().await {
        let quit = matches!(command, BridgeCommand::Quit);
        match encode_text(&codec, &command) {
            Ok(msg) => {
                if let Err(e) = sink.send(msg).await {
                    tracing::debug!(error = %e, "bridge write failed");
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping unencodable command");
                continue;
            }
        }
        if quit {
            break;
        }
    }
    let _ = sink.close().await;
}

/// Translates bridge frames into transport events until the link ends.
async fn read_loop(
    mut stream: SplitStream<WsStream>,
    events: mpsc::UnboundedSender<TransportEvent>,
    link: Arc<LinkState>,
    codec: JsonCodec,
) {
    let reason = loop {
        let bytes = match stream.next().await {
            Some(Ok(Message::Text(text))) => text.as_str().as_bytes().to_vec(),
            Some(Ok(Message::Binary(data))) => data.to_vec(),
            Some(Ok(Message::Close(_))) | None => break "bridge closed".to_string(),
            Some(Ok(_)) => continue, // ping/pong/frame
            Some(Err(e)) => break format!("bridge read failed: {e}"),
        };

        let bridge_event: BridgeEvent = match codec.decode(&bytes) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring undecodable bridge event");
                continue;
            }
        };

        let Some(event) = translate(bridge_event, &link) else {
            continue;
        };
        let terminal = event.is_terminal();
        if terminal {
            link.mark_dead();
        }
        if events.send(event).is_err() || terminal {
            // Either the controller dropped the session or the game
            // connection is over; nothing left to report.
            return;
        }
    };

    link.mark_dead();
    let _ = events.send(TransportEvent::Ended { reason });
}

/// Maps a bridge event to a transport event. Position updates are absorbed
/// into the link state and produce no event.
fn translate(event: BridgeEvent, link: &LinkState) -> Option<TransportEvent> {
    match event {
        BridgeEvent::Spawn => Some(TransportEvent::Ready),
        BridgeEvent::Chat { username, message } => Some(TransportEvent::Chat {
            sender: username,
            text: message,
        }),
        BridgeEvent::Position { x, y, z } => {
            link.set_position(Position::new(x, y, z));
            None
        }
        BridgeEvent::Kicked { reason } => Some(TransportEvent::Kicked { reason }),
        BridgeEvent::End { reason } => Some(TransportEvent::Ended { reason }),
        BridgeEvent::Error { message } => Some(TransportEvent::Error { message }),
        BridgeEvent::GoalReached => Some(TransportEvent::GoalReached),
        BridgeEvent::Death => Some(TransportEvent::Died),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_position_updates_link_without_event() {
        let link = LinkState::new();

        let event = translate(
            BridgeEvent::Position {
                x: 3.0,
                y: 70.0,
                z: -8.0,
            },
            &link,
        );

        assert_eq!(event, None);
        assert_eq!(link.position(), Some(Position::new(3.0, 70.0, -8.0)));
    }

    #[test]
    fn test_translate_chat_renames_fields() {
        let event = translate(
            BridgeEvent::Chat {
                username: "Server".into(),
                message: "hi".into(),
            },
            &LinkState::new(),
        );

        assert_eq!(
            event,
            Some(TransportEvent::Chat {
                sender: "Server".into(),
                text: "hi".into()
            })
        );
    }

    #[test]
    fn test_translate_spawn_is_ready() {
        assert_eq!(
            translate(BridgeEvent::Spawn, &LinkState::new()),
            Some(TransportEvent::Ready)
        );
    }

    #[test]
    fn test_encode_text_produces_json_text_frame() {
        let msg = encode_text(&JsonCodec, &BridgeCommand::Quit).unwrap();
        assert_eq!(msg, Message::Text(r#"{"op":"quit"}"#.into()));
    }
}
