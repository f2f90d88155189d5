//! Wire protocol for Tether.
//!
//! This crate defines the "language" Tether speaks on its two links:
//!
//! - **Bridge types** ([`BridgeCommand`], [`BridgeEvent`], [`Goal`], ...):
//!   JSON messages exchanged with the game bridge.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages
//!   are converted to/from bytes.
//! - **Status ping** ([`status`]): the game's own server-list-ping
//!   packets, used to ask a server how many players are online.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer sits below transport. It doesn't know about
//! connections or sessions; it only knows how to frame and parse messages.
//!
//! ```text
//! Protocol (types, bytes) → Transport (links, events) → Session (lifecycle)
//! ```

mod codec;
mod error;
pub mod status;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use status::StatusResponse;
pub use types::{
    BlockPos, BridgeCommand, BridgeEvent, ConnectRequest, ControlState, Goal,
    Position,
};
