//! Error types for the protocol layer.
//!
//! Each crate in Tether defines its own error enum. When you see a
//! `ProtocolError`, you know the problem is in serialization or packet
//! framing, not in networking or session management.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields, or an
    /// unknown `op` tag from a newer bridge.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A `VarInt` ran past its five-byte maximum.
    #[error("varint is too long")]
    VarIntTooLong,

    /// The packet ended before a field was complete.
    #[error("packet truncated while reading {0}")]
    Truncated(&'static str),

    /// The message is well-formed but violates protocol rules, e.g. a
    /// status response with an unexpected packet id.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
