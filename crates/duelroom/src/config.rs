//! Server configuration, loaded from `duelroom.toml`.
//!
//! Every section and field has a default, so an empty file (or no file
//! at all) is a valid configuration:
//!
//! ```toml
//! listen = "0.0.0.0:8080"
//!
//! [round]
//! duration_secs = 60
//! starting_health = 1000
//! hand = ["fireball", "holylight"]
//!
//! [limits]
//! idle_timeout_secs = 0   # 0 disables the idle timeout
//! handshake_timeout_secs = 10
//! room_queue = 64
//! ```
//!
//! Command-line flags override file values; see `src/main.rs`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use duelroom_protocol::Ability;
use duelroom_room::RoomSettings;
use duelroom_transport::DEFAULT_HANDSHAKE_TIMEOUT;
use serde::{Deserialize, Serialize};

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub listen: String,
    pub round: RoundConfig,
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            round: RoundConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

/// The `[round]` section: how a duel plays out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    pub duration_secs: u64,
    pub starting_health: u32,
    pub hand: Vec<Ability>,
}

impl Default for RoundConfig {
    fn default() -> Self {
        let room = RoomSettings::default();
        Self {
            duration_secs: room.round_duration.as_secs(),
            starting_health: room.starting_health,
            hand: room.hand,
        }
    }
}

/// The `[limits]` section: connection and queue limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Close connections that send nothing for this long. 0 disables.
    pub idle_timeout_secs: u64,
    /// How long a new peer has to finish the WebSocket upgrade.
    pub handshake_timeout_secs: u64,
    /// Capacity of each room actor's command queue.
    pub room_queue: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 0,
            handshake_timeout_secs: DEFAULT_HANDSHAKE_TIMEOUT.as_secs(),
            room_queue: RoomSettings::default().channel_size,
        }
    }
}

impl ServerConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Rejects configurations the server can't run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "listen must be an IP:PORT address, got {:?}",
                self.listen
            )));
        }
        if self.round.duration_secs == 0 {
            return Err(ConfigError::Invalid(
                "round.duration_secs must be > 0".into(),
            ));
        }
        if self.round.starting_health == 0 {
            return Err(ConfigError::Invalid(
                "round.starting_health must be > 0".into(),
            ));
        }
        if self.round.hand.is_empty() {
            return Err(ConfigError::Invalid("round.hand must not be empty".into()));
        }
        if self.limits.handshake_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "limits.handshake_timeout_secs must be > 0".into(),
            ));
        }
        if self.limits.room_queue == 0 {
            return Err(ConfigError::Invalid("limits.room_queue must be > 0".into()));
        }
        Ok(())
    }

    /// The settings every room is created with.
    pub fn room_settings(&self) -> RoomSettings {
        RoomSettings {
            round_duration: Duration::from_secs(self.round.duration_secs),
            starting_health: self.round.starting_health,
            hand: self.round.hand.clone(),
            channel_size: self.limits.room_queue,
        }
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.limits.handshake_timeout_secs)
    }

    /// The idle timeout, or `None` when disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        match self.limits.idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default_config() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = ServerConfig::from_toml_str(
            r#"
            [round]
            duration_secs = 90
            "#,
        )
        .unwrap();
        assert_eq!(config.round.duration_secs, 90);
        assert_eq!(config.round.starting_health, 1000);
        assert_eq!(config.listen, "0.0.0.0:8080");
    }

    #[test]
    fn test_full_file_parses_every_field() {
        let config = ServerConfig::from_toml_str(
            r#"
            listen = "127.0.0.1:9000"

            [round]
            duration_secs = 30
            starting_health = 500
            hand = ["fireball"]

            [limits]
            idle_timeout_secs = 120
            handshake_timeout_secs = 5
            room_queue = 16
            "#,
        )
        .unwrap();

        let settings = config.room_settings();
        assert_eq!(settings.round_duration, Duration::from_secs(30));
        assert_eq!(settings.starting_health, 500);
        assert_eq!(settings.hand, vec![Ability::Fireball]);
        assert_eq!(settings.channel_size, 16);
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(120)));
        assert_eq!(config.handshake_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_validate_rejects_zero_handshake_timeout() {
        let mut config = ServerConfig::default();
        config.limits.handshake_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_ability_is_parse_error() {
        let result = ServerConfig::from_toml_str(
            r#"
            [round]
            hand = ["meteor"]
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_rejects_zero_duration() {
        let mut config = ServerConfig::default();
        config.round.duration_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_bad_listen_address() {
        let config = ServerConfig {
            listen: "not-an-address".into(),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_hand() {
        let mut config = ServerConfig::default();
        config.round.hand.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_idle_timeout_zero_is_disabled() {
        assert_eq!(ServerConfig::default().idle_timeout(), None);
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let result = ServerConfig::load(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
