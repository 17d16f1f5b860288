//! JSON publication of period aggregates.
//!
//! Writes one document per period plus an index of all exported periods.
//! Both are regenerated in full on every run.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::calculate::aggregate_period;
use crate::models::{PeriodExport, PeriodIndex, PeriodKey};
use crate::storage::{list_periods, PeriodStore, StorageConfig, StorageError};

/// Errors that can occur while exporting.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A period that could not be exported.
#[derive(Debug)]
pub struct PeriodFailure {
    pub period: PeriodKey,
    pub error: ExportError,
}

/// Outcome of exporting every period.
#[derive(Debug, Default)]
pub struct ExportSummary {
    /// Periods written, oldest first
    pub exported: Vec<PeriodKey>,

    /// Periods that failed, with the reason
    pub failures: Vec<PeriodFailure>,

    /// Index written for this run, if any period was exported
    pub index: Option<PeriodIndex>,

    /// Why the index could not be written, when periods were exported
    pub index_error: Option<ExportError>,
}

impl ExportSummary {
    /// True when no store was found at all.
    pub fn is_empty(&self) -> bool {
        self.exported.is_empty() && self.failures.is_empty()
    }
}

/// Serialize `value` as pretty JSON and write it, creating parent directories.
fn write_json<T: Serialize>(value: &T, destination: &Path) -> Result<(), ExportError> {
    let json = serde_json::to_string_pretty(value)?;

    let write_failed = |source: std::io::Error| ExportError::WriteFailed {
        path: destination.to_path_buf(),
        source,
    };
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(write_failed)?;
    }
    fs::write(destination, json).map_err(write_failed)?;

    Ok(())
}

/// Exports period stores under a data root to a publication root.
pub struct Exporter {
    config: StorageConfig,
}

impl Exporter {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Aggregate a store and write the result to `destination`.
    pub fn export_period(
        &self,
        store: &PeriodStore,
        destination: &Path,
    ) -> Result<PeriodExport, ExportError> {
        let export = aggregate_period(store)?;
        write_json(&export, destination)?;

        info!(
            "Exported {} formats to {:?}",
            export.formats.len(),
            destination
        );
        Ok(export)
    }

    /// Open, export, and close the store for one period.
    fn export_one(&self, period: &PeriodKey) -> Result<PeriodExport, ExportError> {
        let store = PeriodStore::open(&self.config, period)?;
        let export = self.export_period(&store, &self.config.export_path(period))?;
        if let Err(e) = store.close() {
            warn!("Failed to close store for {}: {}", period, e);
        }
        Ok(export)
    }

    /// Export every period store and rebuild the index.
    ///
    /// A failing period is recorded in the summary and does not stop the
    /// others. The index lists only the periods exported in this run and is
    /// written only if there is at least one. A failed index write is kept in
    /// [`ExportSummary::index_error`] alongside the exported periods.
    pub fn export_all(&self) -> Result<ExportSummary, ExportError> {
        let periods = list_periods(&self.config)?;
        let mut summary = ExportSummary::default();

        if periods.is_empty() {
            warn!(
                "No period stores found in {:?}, nothing to export",
                self.config.data_root
            );
            return Ok(summary);
        }

        for period in periods {
            match self.export_one(&period) {
                Ok(_) => {
                    info!("Exported {}", period);
                    summary.exported.push(period);
                }
                Err(e) => {
                    error!("Failed to export {}: {}", period, e);
                    summary.failures.push(PeriodFailure { period, error: e });
                }
            }
        }

        if let Some(index) = PeriodIndex::from_periods(summary.exported.iter().cloned()) {
            match write_json(&index, &self.config.index_path()) {
                Ok(()) => {
                    info!("Created index with {} periods", index.periods.len());
                    summary.index = Some(index);
                }
                Err(e) => {
                    error!("Failed to write index: {}", e);
                    summary.index_error = Some(e);
                }
            }
        }

        Ok(summary)
    }
}
