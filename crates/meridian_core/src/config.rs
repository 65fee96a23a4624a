//! World configuration, loaded once at startup.

use serde::{Deserialize, Serialize};

/// Sizing of a [`World`](crate::World).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Maximum number of simultaneously alive entities.
    pub max_entities: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            max_entities: crate::DEFAULT_MAX_ENTITIES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(WorldConfig::default().max_entities, 10_000);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: WorldConfig = toml::from_str("max_entities = 64").unwrap();
        assert_eq!(config.max_entities, 64);

        let empty: WorldConfig = toml::from_str("").unwrap();
        assert_eq!(empty, WorldConfig::default());
    }
}
