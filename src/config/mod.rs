//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::storage::StorageConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding one SQLite store per period
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,

    /// Directory receiving `<period>.json` and `index.json`
    #[serde(default = "default_publication_root")]
    pub publication_root: PathBuf,

    /// Directory of downloaded snapshot files
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_data_root() -> PathBuf {
    PathBuf::from("./data")
}

fn default_publication_root() -> PathBuf {
    PathBuf::from("./docs")
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from("./data/raw")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            publication_root: default_publication_root(),
            raw_dir: default_raw_dir(),
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise use defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, path) in [
            ("data_root", &self.data_root),
            ("publication_root", &self.publication_root),
            ("raw_dir", &self.raw_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{} must not be empty",
                    name
                )));
            }
        }

        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Unknown log level '{}'",
                self.log_level
            )));
        }

        Ok(())
    }

    /// Storage paths for the ingestion and export layers.
    pub fn storage(&self) -> StorageConfig {
        StorageConfig::new(self.data_root.clone(), self.publication_root.clone())
    }
}
