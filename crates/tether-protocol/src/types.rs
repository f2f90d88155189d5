//! Core protocol types for Tether's bridge wire format.
//!
//! Tether never speaks the game protocol itself. A bridge process owns the
//! real game connection and exchanges small JSON messages with us over a
//! WebSocket. This module defines every type that travels on that link:
//!
//! - [`BridgeCommand`]: what we ask the bridge to do (connect, chat, ...)
//! - [`BridgeEvent`]: what the bridge reports back (spawn, chat, kick, ...)
//! - the geometry and control types those messages carry.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A continuous position in the world, as reported by the game.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The block this position rounds to.
    ///
    /// Rounding (not truncation) matches how the game reports "standing on"
    /// coordinates, so the roam loop measures offsets from the block the
    /// player visibly occupies.
    pub fn to_block(self) -> BlockPos {
        BlockPos {
            x: self.x.round() as i64,
            y: self.y.round() as i64,
            z: self.z.round() as i64,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

/// An integer block coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl BlockPos {
    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Movement goals and control states
// ---------------------------------------------------------------------------

/// A goal handed to the bridge's pathfinder.
///
/// Tether decides WHERE to go; the bridge decides HOW to get there.
///
/// `#[serde(tag = "kind")]` produces internally tagged JSON:
///   `{ "kind": "near", "target": {...}, "radius": 1 }`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Goal {
    /// Stand exactly on this block.
    Block { target: BlockPos },

    /// Get within `radius` blocks of the target.
    Near { target: BlockPos, radius: u32 },
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block { target } => write!(f, "block {target}"),
            Self::Near { target, radius } => {
                write!(f, "near {target} (r={radius})")
            }
        }
    }
}

/// A held input control on the player.
///
/// Controls are level-triggered: once set to `true` they stay pressed until
/// explicitly released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlState {
    Forward,
    Back,
    Left,
    Right,
    Jump,
    Sprint,
    Sneak,
}

impl ControlState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Back => "back",
            Self::Left => "left",
            Self::Right => "right",
            Self::Jump => "jump",
            Self::Sprint => "sprint",
            Self::Sneak => "sneak",
        }
    }
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Connect request
// ---------------------------------------------------------------------------

/// Everything the bridge needs to open a game connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRequest {
    /// The identity to log in as (base name plus rotation suffix).
    pub username: String,

    /// Account password, for online-mode accounts. `None` for offline mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Account type understood by the bridge (`"offline"`, `"microsoft"`, ...).
    pub auth: String,

    pub host: String,
    pub port: u16,

    /// Game version string. `None` lets the bridge auto-detect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

// ---------------------------------------------------------------------------
// BridgeCommand, client → bridge
// ---------------------------------------------------------------------------

/// A command sent from Tether to the bridge.
///
/// `#[serde(tag = "op")]` gives every message an `op` discriminator:
///   `{ "op": "chat", "text": "hello" }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BridgeCommand {
    /// Open the game connection. Always the first command on a link.
    Connect(ConnectRequest),

    /// Send a chat line (or a slash command) as the player.
    Chat { text: String },

    /// Press or release a control.
    Control { control: ControlState, state: bool },

    /// Hand a goal to the pathfinder.
    Goal { goal: Goal },

    /// Leave the game and close the link.
    Quit,
}

// ---------------------------------------------------------------------------
// BridgeEvent, bridge → client
// ---------------------------------------------------------------------------

/// An event reported by the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// The player has spawned into the world. The connection is ready.
    Spawn,

    /// A chat line from anyone, including the server itself.
    Chat { username: String, message: String },

    /// The player's current position.
    Position { x: f64, y: f64, z: f64 },

    /// The server kicked the player. Always followed by the link closing.
    Kicked { reason: String },

    /// The game connection ended.
    End { reason: String },

    /// A non-fatal error from the bridge or the game client.
    Error { message: String },

    /// The pathfinder reached its current goal.
    GoalReached,

    /// The player died (and was respawned by the game).
    Death,
}

// =========================================================================
// Tests
// =========================================================================
