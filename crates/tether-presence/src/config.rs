//! Presence settings, as they appear under `presence` in the settings file.

use std::time::Duration;

use serde::Deserialize;
use tether_protocol::BlockPos;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PresenceConfig {
    pub messages: MessageConfig,
    pub roam: RoamConfig,
    pub anti_idle: AntiIdleConfig,
    pub position: PositionConfig,
}

/// Chat lines to send while active.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct MessageConfig {
    pub enabled: bool,
    /// Cycle through `lines` one per interval. When `false`, every line is
    /// sent once, in order, on entering Active.
    pub repeat: bool,
    pub interval_secs: u64,
    pub lines: Vec<String>,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            repeat: false,
            interval_secs: 60,
            lines: Vec::new(),
        }
    }
}

impl MessageConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Random wandering around the current position.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RoamConfig {
    pub enabled: bool,
    /// Horizontal reach in blocks, each axis.
    pub radius: u32,
    pub interval_secs: u64,
}

impl Default for RoamConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            radius: 8,
            interval_secs: 30,
        }
    }
}

impl RoamConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Controls held down for the whole session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AntiIdleConfig {
    pub enabled: bool,
    pub sneak: bool,
}

/// A fixed block to walk to. Takes precedence over roaming.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PositionConfig {
    pub enabled: bool,
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl PositionConfig {
    pub fn target(&self) -> BlockPos {
        BlockPos::new(self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_gives_defaults() {
        let config: PresenceConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(config, PresenceConfig::default());
        assert_eq!(config.messages.interval_secs, 60);
        assert_eq!(config.roam.radius, 8);
        assert_eq!(config.roam.interval_secs, 30);
    }

    #[test]
    fn test_kebab_case_keys_parse() {
        let config: PresenceConfig = serde_json::from_str(
            r#"{
                "messages": { "enabled": true, "repeat": true, "interval-secs": 5, "lines": ["a", "b"] },
                "anti-idle": { "enabled": true, "sneak": true },
                "position": { "enabled": true, "x": 10, "y": 64, "z": -3 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.messages.interval(), Duration::from_secs(5));
        assert_eq!(config.messages.lines, vec!["a", "b"]);
        assert!(config.anti_idle.sneak);
        assert_eq!(config.position.target(), BlockPos::new(10, 64, -3));
        assert!(!config.roam.enabled);
    }
}
