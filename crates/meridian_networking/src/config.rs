//! Session configuration.
//!
//! Loaded once from TOML at startup. Every field has a default, so a file
//! only needs to list what it changes:
//!
//! ```toml
//! [world]
//! max_entities = 4096
//!
//! [replication]
//! max_messages_per_poll = 64
//! ```

use meridian_core::WorldConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Replication tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Transport events drained per `poll` call.
    pub max_messages_per_poll: usize,
    /// Send a newly granted connection every host-owned entity.
    pub seed_new_peers: bool,
    /// Forward client inits and updates to the other clients (host only).
    /// Ownership transfers are always forwarded.
    pub relay: bool,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            max_messages_per_poll: crate::DEFAULT_POLL_BATCH,
            seed_new_peers: true,
            relay: true,
        }
    }
}

/// Everything a peer needs to start a session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// World sizing.
    pub world: WorldConfig,
    /// Replication tuning.
    pub replication: ReplicationConfig,
}

impl SessionConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `Parse` for malformed TOML and `Invalid` for bad values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, otherwise as
    /// [`Self::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` for a zero entity capacity or poll batch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world.max_entities == 0 {
            return Err(ConfigError::Invalid("world.max_entities must be at least 1".into()));
        }
        if self.world.max_entities > u32::MAX as usize {
            return Err(ConfigError::Invalid(format!(
                "world.max_entities must fit in a u32, got {}",
                self.world.max_entities
            )));
        }
        if self.replication.max_messages_per_poll == 0 {
            return Err(ConfigError::Invalid(
                "replication.max_messages_per_poll must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.world.max_entities, 10_000);
        assert_eq!(config.replication.max_messages_per_poll, 32);
        assert!(config.replication.seed_new_peers);
        assert!(config.replication.relay);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_document() {
        let config = SessionConfig::from_toml_str(
            "[world]\nmax_entities = 128\n\n[replication]\nrelay = false\n",
        )
        .unwrap();

        assert_eq!(config.world.max_entities, 128);
        assert!(!config.replication.relay);
        assert_eq!(config.replication.max_messages_per_poll, 32);
    }

    #[test]
    fn test_rejects_zero_values() {
        assert!(matches!(
            SessionConfig::from_toml_str("[world]\nmax_entities = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SessionConfig::from_toml_str("[replication]\nmax_messages_per_poll = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            SessionConfig::from_toml_str("[world\nmax_entities = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            SessionConfig::load("/nonexistent/meridian.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
