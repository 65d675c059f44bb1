//! Node config file (spec §6): YAML with fields `{port, rpc, store}`.
//!
//! Grounded on `original_source/types/app.go`'s `AppConfig{Port, RPC,
//! Store{Type, Path}}` (`gopkg.in/yaml.v2` lowercases untagged exported
//! field names, so the on-disk keys are already `port`/`rpc`/`store`) and
//! `original_source/main.go`'s `readAppConfigFile` (viper-backed file load).

use std::path::Path;

use config::{Config as ConfigLoader, Environment};
use serde::Deserialize;

use tss_types::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    Mock,
    Badger,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    #[serde(rename = "type")]
    pub store_type: StoreType,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub port: u16,
    pub rpc: u16,
    pub store: StoreSettings,
}

impl AppConfig {
    /// Loads `path` as YAML, then layers `TSS_*` environment overrides on
    /// top (e.g. `TSS_STORE_PATH`), matching the original's viper-style
    /// config/env merge.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let parsed: serde_yaml::Value = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;

        ConfigLoader::builder()
            .add_source(ConfigLoader::try_from(&parsed).map_err(|e| ConfigError::Parse(e.to_string()))?)
            .add_source(Environment::with_prefix("TSS").separator("_"))
            .build()
            .map_err(|e| ConfigError::Parse(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn rpc_port(&self, override_port: Option<u16>) -> u16 {
        override_port.filter(|p| *p != 0).unwrap_or(self.rpc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    #[test]
    fn loads_mock_store_config() {
        let file = write_config(
            "port: 11111\nrpc: 8080\nstore:\n  type: mock\n",
        );
        let config = AppConfig::load(file.path()).expect("load");
        assert_eq!(config.port, 11111);
        assert_eq!(config.rpc, 8080);
        assert!(matches!(config.store.store_type, StoreType::Mock));
        assert_eq!(config.store.path, None);
    }

    #[test]
    fn loads_badger_store_config_with_path() {
        let file = write_config(
            "port: 11111\nrpc: 8080\nstore:\n  type: badger\n  path: /tmp/tss-db\n",
        );
        let config = AppConfig::load(file.path()).expect("load");
        assert!(matches!(config.store.store_type, StoreType::Badger));
        assert_eq!(config.store.path.as_deref(), Some("/tmp/tss-db"));
    }

    #[test]
    fn explicit_port_flag_overrides_configured_rpc_port() {
        let file = write_config("port: 11111\nrpc: 8080\nstore:\n  type: mock\n");
        let config = AppConfig::load(file.path()).expect("load");
        assert_eq!(config.rpc_port(Some(9090)), 9090);
        assert_eq!(config.rpc_port(None), 8080);
        assert_eq!(config.rpc_port(Some(0)), 8080, "port=0 means unset, per the original's `if port != 0`");
    }
}
