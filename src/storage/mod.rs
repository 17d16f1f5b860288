//! Per-period record stores on the local filesystem.
//!
//! Layout under the data root:
//! - `<period>.db` SQLite store for each period (e.g. `2025-12.db`)
//!
//! Layout under the publication root:
//! - `<period>.json` export document for each period
//! - `index.json` manifest of all exported periods

mod sqlite;

pub use sqlite::PeriodStore;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::models::PeriodKey;

/// File extension of period stores.
pub const STORE_EXTENSION: &str = "db";

/// Name of the cross-period manifest.
pub const INDEX_FILENAME: &str = "index.json";

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage unavailable at {path}: {reason}")]
    StorageUnavailable { path: PathBuf, reason: String },

    #[error("Write failed for {key}: {reason}")]
    WriteFailed { key: String, reason: String },

    #[error("Read failed: {0}")]
    ReadFailed(#[from] rusqlite::Error),

    #[error("Invalid stored value: {0}")]
    InvalidData(String),

    #[error("Store discovery failed: {0}")]
    Discovery(String),
}

impl StorageError {
    pub(crate) fn unavailable(path: &Path, reason: impl ToString) -> Self {
        StorageError::StorageUnavailable {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Configuration for storage paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Directory holding one store per period
    pub data_root: PathBuf,

    /// Directory receiving export documents and the index
    pub publication_root: PathBuf,
}

impl StorageConfig {
    pub fn new(data_root: PathBuf, publication_root: PathBuf) -> Self {
        Self {
            data_root,
            publication_root,
        }
    }

    /// Path of the store for a period.
    pub fn store_path(&self, period: &PeriodKey) -> PathBuf {
        self.data_root
            .join(format!("{}.{}", period.as_str(), STORE_EXTENSION))
    }

    /// Path of the export document for a period.
    pub fn export_path(&self, period: &PeriodKey) -> PathBuf {
        self.publication_root
            .join(format!("{}.json", period.as_str()))
    }

    /// Path of the cross-period index.
    pub fn index_path(&self) -> PathBuf {
        self.publication_root.join(INDEX_FILENAME)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"), PathBuf::from("./docs"))
    }
}

/// Find every period that has a store under the data root, oldest first.
///
/// Files whose stem is not a `YYYY-MM` key are skipped.
pub fn list_periods(config: &StorageConfig) -> Result<Vec<PeriodKey>, StorageError> {
    let dir = &config.data_root;
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let root = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = format!("{}/*.{}", root, STORE_EXTENSION);
    let paths = glob::glob(&pattern).map_err(|e| StorageError::Discovery(e.to_string()))?;

    let mut periods = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| StorageError::Discovery(e.to_string()))?;
        if !path.is_file() {
            continue;
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        match PeriodKey::parse(stem) {
            Ok(period) => periods.push(period),
            Err(e) => warn!("Skipping {:?}: {}", path, e),
        }
    }

    periods.sort();
    debug!("Found {} period stores in {:?}", periods.len(), dir);
    Ok(periods)
}
