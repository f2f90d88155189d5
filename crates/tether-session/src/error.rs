//! Error types for the session layer.

use tether_transport::{TransportError, TransportEvent};

use crate::SessionState;

/// Why a [`wait_for_event`](crate::wait_for_event) call gave up.
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("deadline passed")]
    Timeout,

    /// The connection ended first. Carries the terminal event.
    #[error("connection ended: {0}")]
    Interrupted(TransportEvent),
}

/// Why a chat-based auth negotiation did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The server refused the `/register` command.
    #[error("registration rejected: {0}")]
    RegistrationRejected(String),

    /// The server refused the `/login` command (wrong password, unknown
    /// account).
    #[error("login rejected: {0}")]
    LoginRejected(String),

    /// A reply arrived that matched none of the known outcomes.
    #[error("unexpected auth reply: {0}")]
    UnexpectedReply(String),

    /// No matching reply arrived before the deadline.
    #[error("timed out waiting for an auth reply")]
    Timeout,

    /// The connection ended while a reply was pending.
    #[error("auth interrupted: {0}")]
    Interrupted(TransportEvent),

    /// Writing the auth command failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<WaitError> for AuthError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Timeout => Self::Timeout,
            WaitError::Interrupted(event) => Self::Interrupted(event),
        }
    }
}

/// Errors from the session lifecycle state machine.
///
/// These are programming or ordering errors, not network failures: the
/// controller only hits them if it asks for a transition the current
/// state does not allow.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A session is already connecting, authenticating, or active.
    /// Only one session may exist at a time.
    #[error("a session is already {0}")]
    AlreadyActive(SessionState),

    /// The occupancy gate (or a pending identity conflict) does not allow
    /// a spawn right now.
    #[error("spawning is not authorized")]
    NotAuthorized,

    /// The requested event has no transition out of the current state.
    #[error("cannot {event} while {from}")]
    InvalidTransition {
        from: SessionState,
        event: &'static str,
    },
}
