//! Unified error type for Tether.

use tether_protocol::ProtocolError;
use tether_session::{AuthError, SessionError};
use tether_transport::TransportError;

use crate::{ConfigError, OccupancyError};

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TetherError {
    /// Bad or unreadable settings. Fatal at startup.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A transport-level error (bridge connect, send).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A lifecycle ordering error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A failed chat-auth negotiation.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A failed occupancy poll.
    #[error(transparent)]
    Occupancy(#[from] OccupancyError),

    /// Binding or serving the HTTP liveness surface failed.
    #[error("http server: {0}")]
    Http(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let tether_err: TetherError = err.into();
        assert!(matches!(tether_err, TetherError::Transport(_)));
        assert!(tether_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let tether_err: TetherError = err.into();
        assert!(matches!(tether_err, TetherError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::NotAuthorized;
        let tether_err: TetherError = err.into();
        assert!(matches!(tether_err, TetherError::Session(_)));
    }

    #[test]
    fn test_from_auth_error() {
        let tether_err: TetherError = AuthError::Timeout.into();
        assert!(matches!(tether_err, TetherError::Auth(_)));
    }

    #[test]
    fn test_from_config_error() {
        let err = ConfigError::Invalid("server.port must not be 0".into());
        let tether_err: TetherError = err.into();
        assert!(matches!(tether_err, TetherError::Config(_)));
        assert!(tether_err.to_string().contains("server.port"));
    }
}
