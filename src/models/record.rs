//! Stored battle-count records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Battle count for one (format, rating threshold) pair within a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatRecord {
    /// Battle format, e.g. "gen9ou"
    pub format_name: String,

    /// Minimum matchmaking rating included in the snapshot
    pub rating_threshold: u32,

    /// Number of battles at or above the threshold
    pub num_battles: u64,

    /// When the pair was first written
    pub created_at: DateTime<Utc>,

    /// When the count was last written
    pub updated_at: DateTime<Utc>,
}

impl StatRecord {
    /// The `format-threshold` label used in logs and snapshot filenames.
    pub fn label(&self) -> String {
        format!("{}-{}", self.format_name, self.rating_threshold)
    }
}
