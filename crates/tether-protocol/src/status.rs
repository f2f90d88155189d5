//! Server status ping ("server list ping") packet codec.
//!
//! The Occupancy Gate asks the game server how many players are online
//! before allowing a spawn. That query uses the game's own status protocol,
//! not the bridge, so we frame it here.
//!
//! # Wire format
//!
//! Every packet is `VarInt length` + `VarInt packet id` + fields:
//!
//! ```text
//! → Handshake      [len][0x00][VarInt protocol][String host][u16 port][VarInt 1]
//! → Status request [len][0x00]
//! ← Status response[len][0x00][String json]
//! ```
//!
//! A `VarInt` is a little-endian base-128 integer: seven payload bits per
//! byte, high bit set on every byte except the last, at most five bytes.

use serde::Deserialize;

use crate::ProtocolError;

/// `next state` value in the handshake that selects the status flow.
const NEXT_STATE_STATUS: i32 = 1;

/// Packet id shared by the handshake, status request, and status response.
const PACKET_ID: i32 = 0x00;

/// Longest encoding of a 32-bit `VarInt`.
const VARINT_MAX_BYTES: u32 = 5;

// ---------------------------------------------------------------------------
// VarInt
// ---------------------------------------------------------------------------

/// Appends `value` to `buf` as a `VarInt`.
///
/// Negative numbers are encoded through their two's-complement bit
/// pattern, so `-1` always takes the full five bytes.
pub fn write_varint(buf: &mut Vec<u8>, value: i32) {
    let mut bits = value as u32;
    loop {
        if bits & !0x7F == 0 {
            buf.push(bits as u8);
            return;
        }
        buf.push((bits & 0x7F) as u8 | 0x80);
        bits >>= 7;
    }
}

/// Incremental `VarInt` decoder, fed one byte at a time.
///
/// Useful when reading from a socket where the length prefix has to be
/// decoded before we know how many more bytes to wait for.
#[derive(Debug, Default)]
pub struct VarIntAccumulator {
    value: u32,
    consumed: u32,
}

impl VarIntAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the next byte. Returns `Ok(Some(value))` once the final byte
    /// has been seen, `Ok(None)` while more bytes are needed.
    pub fn push(&mut self, byte: u8) -> Result<Option<i32>, ProtocolError> {
        if self.consumed >= VARINT_MAX_BYTES {
            return Err(ProtocolError::VarIntTooLong);
        }
        self.value |= u32::from(byte & 0x7F) << (7 * self.consumed);
        self.consumed += 1;
        if byte & 0x80 == 0 {
            Ok(Some(self.value as i32))
        } else if self.consumed == VARINT_MAX_BYTES {
            Err(ProtocolError::VarIntTooLong)
        } else {
            Ok(None)
        }
    }
}

/// Reads a `VarInt` from the front of `data`.
///
/// Returns the value and the number of bytes consumed.
pub fn read_varint(data: &[u8]) -> Result<(i32, usize), ProtocolError> {
    let mut acc = VarIntAccumulator::new();
    for (i, byte) in data.iter().enumerate() {
        if let Some(value) = acc.push(*byte)? {
            return Ok((value, i + 1));
        }
    }
    Err(ProtocolError::Truncated("varint"))
}

// ---------------------------------------------------------------------------
// Outbound packets
// ---------------------------------------------------------------------------

/// Wraps a packet body with its `VarInt` length prefix.
fn frame(body: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 2);
    write_varint(&mut out, body.len() as i32);
    out.extend_from_slice(&body);
    out
}

/// Builds the framed handshake packet that opens a status exchange.
///
/// `protocol_version` may be `-1`; servers answer status requests for any
/// version and report their own in the response.
pub fn handshake_packet(host: &str, port: u16, protocol_version: i32) -> Vec<u8> {
    let mut body = Vec::with_capacity(host.len() + 10);
    write_varint(&mut body, PACKET_ID);
    write_varint(&mut body, protocol_version);
    write_varint(&mut body, host.len() as i32);
    body.extend_from_slice(host.as_bytes());
    body.extend_from_slice(&port.to_be_bytes());
    write_varint(&mut body, NEXT_STATE_STATUS);
    frame(body)
}

/// Builds the framed (empty) status request packet.
pub fn status_request_packet() -> Vec<u8> {
    let mut body = Vec::with_capacity(1);
    write_varint(&mut body, PACKET_ID);
    frame(body)
}

// ---------------------------------------------------------------------------
// Inbound packet
// ---------------------------------------------------------------------------

/// The parts of the status JSON we care about.
///
/// The real document also carries a description, favicon, and sample
/// player list; serde skips unknown fields by default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub version: Option<StatusVersion>,
    pub players: StatusPlayers,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusVersion {
    pub name: String,
    pub protocol: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusPlayers {
    pub max: u32,
    pub online: u32,
}

/// Decodes a status response packet body (everything after the length
/// prefix).
#[cfg(feature = "json")]
pub fn decode_status_response(body: &[u8]) -> Result<StatusResponse, ProtocolError> {
    let (packet_id, mut offset) = read_varint(body)?;
    if packet_id != PACKET_ID {
        return Err(ProtocolError::InvalidMessage(format!(
            "expected status response packet 0x00, got {packet_id:#04x}"
        )));
    }

    let (len, used) = read_varint(&body[offset..])?;
    offset += used;
    let len = usize::try_from(len).map_err(|_| {
        ProtocolError::InvalidMessage(format!("negative string length {len}"))
    })?;
    let json = body
        .get(offset..offset + len)
        .ok_or(ProtocolError::Truncated("status json"))?;

    serde_json::from_slice(json).map_err(ProtocolError::Decode)
}
