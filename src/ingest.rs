//! Ingestion of parsed snapshots into a period store.
//!
//! Each snapshot becomes one upsert. A bad snapshot is counted and skipped;
//! only failing to open the period's store stops a run.

use thiserror::Error;
use tracing::{info, warn};

use crate::models::PeriodKey;
use crate::snapshot::SnapshotCount;
use crate::storage::{PeriodStore, StorageConfig, StorageError};

/// Format and rating threshold derived from a snapshot filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotMeta {
    pub format_name: String,
    pub rating_threshold: Option<u32>,
}

/// Split a snapshot filename into format name and rating threshold.
///
/// `gen9ou-1500.json.gz` becomes `("gen9ou", Some(1500))`. The split is on the
/// last `-`, so format names may contain dashes. A missing or non-numeric
/// suffix leaves the threshold undefined.
pub fn parse_snapshot_filename(filename: &str) -> SnapshotMeta {
    let base = filename
        .strip_suffix(".json.gz")
        .or_else(|| filename.strip_suffix(".json"))
        .unwrap_or(filename);

    match base.rsplit_once('-') {
        Some((format_name, rating)) => {
            let numeric = !rating.is_empty() && rating.bytes().all(|b| b.is_ascii_digit());
            let rating_threshold = if numeric { rating.parse().ok() } else { None };
            SnapshotMeta {
                format_name: format_name.to_string(),
                rating_threshold,
            }
        }
        None => SnapshotMeta {
            format_name: base.to_string(),
            rating_threshold: None,
        },
    }
}

/// Why a single snapshot was not stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestFailure {
    #[error("Could not extract rating threshold for {format_name}")]
    MissingThreshold { format_name: String },

    #[error("Could not read battle count from {filename}")]
    MissingBattleCount { filename: String },

    #[error("Failed to store {key}: {reason}")]
    StoreRejected { key: String, reason: String },
}

/// Result of ingesting one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Success,
    Failed(IngestFailure),
}

/// Success/failure counts for an ingest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestTally {
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<IngestFailure>,
}

impl IngestTally {
    pub fn record(&mut self, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::Success => self.succeeded += 1,
            IngestOutcome::Failed(failure) => {
                self.failed += 1;
                self.failures.push(failure);
            }
        }
    }

    /// True when items were attempted and none were stored.
    pub fn is_total_failure(&self) -> bool {
        self.succeeded == 0 && self.failed > 0
    }
}

/// Store one (format, threshold, count) triple.
pub fn ingest(
    store: &PeriodStore,
    format_name: &str,
    rating_threshold: Option<u32>,
    num_battles: u64,
) -> IngestOutcome {
    let Some(rating_threshold) = rating_threshold else {
        return IngestOutcome::Failed(IngestFailure::MissingThreshold {
            format_name: format_name.to_string(),
        });
    };

    match store.upsert(format_name, rating_threshold, num_battles) {
        Ok(()) => {
            info!(
                "  ✓ {}-{}: {} battles",
                format_name, rating_threshold, num_battles
            );
            IngestOutcome::Success
        }
        Err(e) => {
            let reason = match e {
                StorageError::WriteFailed { reason, .. } => reason,
                other => other.to_string(),
            };
            IngestOutcome::Failed(IngestFailure::StoreRejected {
                key: format!("{}-{}", format_name, rating_threshold),
                reason,
            })
        }
    }
}

/// Parse a snapshot's filename and store its count.
pub fn ingest_snapshot(store: &PeriodStore, snapshot: &SnapshotCount) -> IngestOutcome {
    let Some(num_battles) = snapshot.num_battles else {
        return IngestOutcome::Failed(IngestFailure::MissingBattleCount {
            filename: snapshot.filename.clone(),
        });
    };

    let meta = parse_snapshot_filename(&snapshot.filename);
    ingest(store, &meta.format_name, meta.rating_threshold, num_battles)
}

/// Ingest every snapshot, continuing past failures.
pub fn ingest_all<'a, I>(store: &PeriodStore, snapshots: I) -> IngestTally
where
    I: IntoIterator<Item = &'a SnapshotCount>,
{
    let mut tally = IngestTally::default();

    for snapshot in snapshots {
        let outcome = ingest_snapshot(store, snapshot);
        if let IngestOutcome::Failed(failure) = &outcome {
            warn!("  ✗ {}: {}", snapshot.filename, failure);
        }
        tally.record(outcome);
    }

    info!(
        "Ingested {} snapshots, {} failed",
        tally.succeeded, tally.failed
    );
    tally
}

/// Open the period's store and ingest every snapshot into it.
///
/// Fails only if the store cannot be opened.
pub fn ingest_period(
    config: &StorageConfig,
    period: &PeriodKey,
    snapshots: &[SnapshotCount],
) -> Result<IngestTally, StorageError> {
    let store = PeriodStore::open(config, period)?;
    info!("Ingesting {} snapshots into {}", snapshots.len(), period);

    let tally = ingest_all(&store, snapshots);

    if let Err(e) = store.close() {
        warn!("Failed to close store for {}: {}", period, e);
    }
    Ok(tally)
}
