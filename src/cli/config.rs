//! Configuration file handling
//!
//! A JSON object; every field is optional. No configuration file means all
//! defaults (seeded store, warn-level logging).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::observability::Severity;
use crate::storage::SeedConfig;

use super::errors::{CliError, CliResult};

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Seed for the generated store
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Load the store from `<dir>/<table>.json` files instead of seeding
    #[serde(default)]
    pub fixtures_dir: Option<PathBuf>,

    #[serde(default = "default_users")]
    pub users: usize,

    #[serde(default = "default_products")]
    pub products: usize,

    #[serde(default = "default_orders")]
    pub orders: usize,

    /// trace | info | warn | error
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_seed() -> u64 {
    42
}
fn default_users() -> usize {
    50
}
fn default_products() -> usize {
    40
}
fn default_orders() -> usize {
    200
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            fixtures_dir: None,
            users: default_users(),
            products: default_products(),
            orders: default_orders(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Loads `path` when given, otherwise the defaults
    pub fn resolve(path: Option<&Path>) -> CliResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> CliResult<()> {
        self.severity()?;

        if self.fixtures_dir.is_none() {
            if self.users == 0 {
                return Err(CliError::config_error("users must be > 0"));
            }
            if self.products == 0 {
                return Err(CliError::config_error("products must be > 0"));
            }
        }

        Ok(())
    }

    /// Minimum log severity
    pub fn severity(&self) -> CliResult<Severity> {
        self.log_level
            .parse::<Severity>()
            .map_err(|e| CliError::config_error(format!("Invalid log_level: {}", e)))
    }

    /// Generator settings for a seeded store
    pub fn seed_config(&self) -> SeedConfig {
        SeedConfig {
            seed: self.seed,
            users: self.users,
            products: self.products,
            orders: self.orders,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::errors::CliErrorCode;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, value: serde_json::Value) -> PathBuf {
        let path = dir.path().join("storeql.json");
        fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[test]
    fn test_empty_object_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, json!({}));
        let config = Config::load(&path).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.seed_config(), SeedConfig::default());
    }

    #[test]
    fn test_no_path_gives_defaults() {
        assert_eq!(Config::resolve(None).unwrap(), Config::default());
    }

    #[test]
    fn test_overrides() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, json!({"seed": 7, "orders": 10, "log_level": "info"}));
        let config = Config::load(&path).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.orders, 10);
        assert_eq!(config.users, 50);
        assert_eq!(config.severity().unwrap(), Severity::Info);
    }

    #[test]
    fn test_rejects_bad_log_level() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, json!({"log_level": "loud"}));
        let err = Config::load(&path).unwrap_err();
        assert_eq!(err.code(), CliErrorCode::ConfigError);
    }

    #[test]
    fn test_rejects_zero_users() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, json!({"users": 0}));
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_rejects_unknown_field() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, json!({"data_dir": "/tmp"}));
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.code(), CliErrorCode::ConfigError);
    }
}
