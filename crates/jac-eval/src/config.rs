//! Run configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::ObjectStore;

/// Store global holding a JSON object of [`RunConfig`] overrides.
pub const RUN_CONFIG_GLOBAL: &str = "RUN_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Per-run budget shared by loop iterations, ability calls and walker steps.
    pub loop_limit: u64,
    /// Nesting bound for ability calls and nested walker spawns.
    pub max_call_depth: usize,
    /// Realm stamped on new objects.
    pub realm: String,
    /// Module label in runtime-error positions.
    pub file_name: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            loop_limit: 10_000,
            max_call_depth: 64,
            realm: "default".to_string(),
            file_name: "main.jac".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed {RUN_CONFIG_GLOBAL}: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl RunConfig {
    /// Defaults overlaid with the store's `RUN_CONFIG` global, if any.
    pub fn from_store(store: &dyn ObjectStore) -> Result<Self, ConfigError> {
        match store.get_global(RUN_CONFIG_GLOBAL) {
            None => Ok(Self::default()),
            Some(value) => Ok(serde_json::from_value(value.to_json())?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::value::Value;

    #[test]
    fn absent_global_gives_defaults() {
        let store = MemoryStore::new();
        assert_eq!(RunConfig::from_store(&store).unwrap(), RunConfig::default());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let mut store = MemoryStore::new();
        let json = serde_json::json!({ "loop_limit": 50 });
        store.save_global(RUN_CONFIG_GLOBAL, Value::from_json(&json));
        let config = RunConfig::from_store(&store).unwrap();
        assert_eq!(config.loop_limit, 50);
        assert_eq!(config.max_call_depth, 64);
        assert_eq!(config.realm, "default");
    }

    #[test]
    fn malformed_global_is_an_error() {
        let mut store = MemoryStore::new();
        store.save_global(RUN_CONFIG_GLOBAL, Value::str("not an object"));
        assert!(matches!(
            RunConfig::from_store(&store),
            Err(ConfigError::Malformed(_))
        ));
    }
}
