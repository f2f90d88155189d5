//! Codec trait and implementations for the bridge link.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The transport layer doesn't care HOW bridge messages are serialized;
//! it just needs something that implements the [`Codec`] trait.
//!
//! Currently we provide [`JsonCodec`], which is what the bridge speaks.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// ## Trait bounds explained
///
/// - `Send + Sync` → safe to share between the reader and writer tasks
///   of a single link.
/// - `'static` → the codec owns everything it needs, so it can live inside
///   a spawned task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// This is behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use tether_protocol::{BridgeCommand, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let bytes = codec
///     .encode(&BridgeCommand::Chat { text: "hi".into() })
///     .unwrap();
/// let decoded: BridgeCommand = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, BridgeCommand::Chat { text: "hi".into() });
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
