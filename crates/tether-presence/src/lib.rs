//! Presence for Tether: the recurring actions that keep an active session
//! looking like a player.
//!
//! - **Messages**: a list of chat lines, either sent once on entering
//!   Active or cycled one per interval
//! - **Roam**: every interval, walk to a random block near the current
//!   position (skipped when a fixed position goal is configured)
//! - **Anti-idle**: hold jump (and optionally sneak) for the whole session
//!
//! # Integration
//!
//! The maintainer sits inside the controller's `tokio::select!` loop next
//! to the connection's event stream:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(event) = events.recv() => { /* may end the session */ }
//!         action = presence.next_action() => {
//!             presence.fire(action, &conn);
//!         }
//!     }
//! }
//! ```
//!
//! Because the timers live in the same loop as event handling, a timer can
//! never fire while teardown is half done. `fire` still re-checks liveness
//! right before each write.

mod config;
mod maintainer;
mod ticker;

pub use config::{AntiIdleConfig, MessageConfig, PositionConfig, PresenceConfig, RoamConfig};
pub use maintainer::{PresenceAction, PresenceMaintainer, roam_target};
pub use ticker::{TickInfo, Ticker};
