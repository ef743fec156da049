//! Configuration types for the access-control engine
//!
//! Loading (files, environment) is the caller's concern; these are the
//! validated shapes the core consumes.

use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Storage backend selection
    #[serde(default)]
    pub store: StoreConfig,

    /// Secret the administrative surface requires; `None` disables the
    /// check. Consumed by the layer in front of the core, not the core
    /// itself.
    #[serde(default)]
    pub admin_secret: Option<String>,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.store.validate()?;
        if let Some(secret) = &self.admin_secret
            && secret.is_empty()
        {
            return Err(crate::Error::Other(
                "admin secret must not be empty when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Storage backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Durable file-backed store
    File {
        /// Path to the store document
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } if path.is_empty() => Err(crate::Error::Other(
                "file store path cannot be empty".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Get the backend type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.store.type_name(), "memory");
    }

    #[test]
    fn empty_file_path_is_rejected() {
        let config = Config {
            store: StoreConfig::File {
                path: String::new(),
            },
            admin_secret: None,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn store_config_deserializes_tagged() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"type": "file", "path": "/var/lib/gatehouse/store.json"}"#)
                .unwrap();
        assert_eq!(config.type_name(), "file");
    }
}
