use tether_protocol::ProtocolError;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The bridge or the game server refused the connection.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The connection was closed. Writes after this point are dropped.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// A bridge message could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
