//! Settings file loading and validation.
//!
//! Settings live in a JSON file with kebab-case keys. Only `account` and
//! `server` are required; every other section falls back to defaults.
//!
//! ```json
//! {
//!   "account": { "username": "Bot" },
//!   "server": { "host": "mc.example.net", "port": 25565, "version": "1.20.1" },
//!   "auth": { "enabled": true, "password": "hunter2" },
//!   "presence": { "anti-idle": { "enabled": true } }
//! }
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tether_presence::PresenceConfig;
use tether_protocol::ConnectRequest;
use tether_session::{AuthNegotiator, BackoffPolicy, Identity, SystemSenders};

/// Default settings file name, relative to the working directory.
pub const DEFAULT_SETTINGS_PATH: &str = "settings.json";

/// Environment variable that overrides the settings path.
pub const SETTINGS_ENV: &str = "TETHER_SETTINGS";

/// Errors from loading or validating settings. These are the only errors
/// that stop the process.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    pub account: AccountSettings,
    pub server: ServerSettings,
    #[serde(default)]
    pub bridge: BridgeSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub reconnect: ReconnectSettings,
    #[serde(default)]
    pub occupancy: OccupancySettings,
    #[serde(default)]
    pub http: HttpSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AccountSettings {
    /// Base identity. Rotated identities append a number.
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_account_auth")]
    pub auth: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerSettings {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub version: Option<String>,
    /// Protocol number sent in the status ping handshake.
    #[serde(default = "default_protocol")]
    pub protocol: i32,
    #[serde(default = "default_spawn_timeout_secs")]
    pub spawn_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BridgeSettings {
    pub url: String,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:4600".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AuthSettings {
    pub enabled: bool,
    pub password: String,
    pub reply_timeout_secs: u64,
    /// Senders whose chat lines count as auth replies. Empty accepts the
    /// first line from anyone.
    pub system_senders: Vec<String>,
    /// End the session when negotiation fails instead of carrying on.
    pub required: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            password: String::new(),
            reply_timeout_secs: 10,
            system_senders: Vec::new(),
            required: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ReconnectSettings {
    pub enabled: bool,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
    pub throttle_floor_secs: u64,
    pub max_jitter_ms: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_delay_secs: 5,
            max_delay_secs: 300,
            throttle_floor_secs: 60,
            max_jitter_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OccupancySettings {
    /// When `false`, spawning is always authorized.
    pub enabled: bool,
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for OccupancySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HttpSettings {
    pub enabled: bool,
    pub bind: SocketAddr,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: SocketAddr::from(([0, 0, 0, 0], 5000)),
        }
    }
}

fn default_account_auth() -> String {
    "offline".to_string()
}

fn default_port() -> u16 {
    25565
}

fn default_protocol() -> i32 {
    -1
}

fn default_spawn_timeout_secs() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Settings {
    /// Reads, parses, and validates a settings file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parses and validates settings from a JSON string.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.account.username.trim().is_empty() {
            return invalid("account.username must not be empty");
        }
        if self.server.host.trim().is_empty() {
            return invalid("server.host must not be empty");
        }
        if self.server.port == 0 {
            return invalid("server.port must not be 0");
        }
        if self.auth.enabled && self.auth.password.is_empty() {
            return invalid("auth.password is required when auth is enabled");
        }
        let messages = &self.presence.messages;
        if messages.enabled && messages.repeat {
            if messages.lines.is_empty() {
                return invalid("presence.messages.lines must not be empty in repeat mode");
            }
            if messages.interval_secs == 0 {
                return invalid("presence.messages.interval-secs must be positive");
            }
        }
        if self.presence.roam.enabled && self.presence.roam.interval_secs == 0 {
            return invalid("presence.roam.interval-secs must be positive");
        }
        if self.occupancy.enabled && self.occupancy.interval_secs == 0 {
            return invalid("occupancy.interval-secs must be positive");
        }
        if self.reconnect.base_delay_secs > self.reconnect.max_delay_secs {
            return invalid("reconnect.base-delay-secs must not exceed max-delay-secs");
        }
        Ok(())
    }

    // ---- Derived values ----

    /// The connect request for `identity`.
    pub fn connect_request(&self, identity: &Identity) -> ConnectRequest {
        ConnectRequest {
            username: identity.username(),
            password: self.account.password.clone(),
            auth: self.account.auth.clone(),
            host: self.server.host.clone(),
            port: self.server.port,
            version: self.server.version.clone(),
        }
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_secs(self.reconnect.base_delay_secs),
            max_delay: Duration::from_secs(self.reconnect.max_delay_secs),
            throttle_floor: Duration::from_secs(self.reconnect.throttle_floor_secs),
            max_jitter: Duration::from_millis(self.reconnect.max_jitter_ms),
        }
    }

    pub fn negotiator(&self) -> AuthNegotiator {
        let negotiator = AuthNegotiator::new(Duration::from_secs(self.auth.reply_timeout_secs));
        if self.auth.system_senders.is_empty() {
            negotiator
        } else {
            negotiator.with_matcher(SystemSenders::new(&self.auth.system_senders))
        }
    }

    pub fn spawn_timeout(&self) -> Duration {
        Duration::from_secs(self.server.spawn_timeout_secs)
    }
}
