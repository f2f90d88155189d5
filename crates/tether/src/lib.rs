//! # Tether
//!
//! Keeps an automated game client connected to a server: connects when the
//! server is empty, logs in through the server's chat-command auth plugin,
//! keeps the session looking busy, and reconnects with backoff when it
//! drops.
//!
//! ## Layers
//!
//! ```text
//! tether            controller, occupancy gate, settings, HTTP liveness
//! tether-presence   chat / roam / anti-idle timers
//! tether-session    lifecycle state machine, backoff, identities, auth
//! tether-transport  Transport / Connection traits, WebSocket bridge
//! tether-protocol   bridge wire types, status ping codec
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tether::{OccupancyGate, SessionController, Settings};
//! use tether_transport::BridgeTransport;
//!
//! # async fn run() -> Result<(), tether::TetherError> {
//! let settings = Settings::load("settings.json".as_ref())?;
//! let transport = BridgeTransport::new(settings.bridge.url.clone());
//! let gate = OccupancyGate::always_open();
//! SessionController::new(transport, settings, gate).run().await
//! # }
//! ```

pub mod cli;
mod config;
mod controller;
mod error;
pub mod http;
mod occupancy;

pub use config::{
    AccountSettings, AuthSettings, BridgeSettings, ConfigError, DEFAULT_SETTINGS_PATH,
    HttpSettings, OccupancySettings, ReconnectSettings, SETTINGS_ENV, ServerSettings, Settings,
};
pub use controller::{ControllerStatus, SessionController};
pub use error::TetherError;
pub use occupancy::{OccupancyError, OccupancyGate, SlpProbe, StatusProbe};
