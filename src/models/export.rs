//! Publication documents derived from a period's records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::PeriodKey;

/// Battle totals for one format, summed across rating thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatAggregate {
    /// Format name
    pub name: String,

    /// Sum of battles over every threshold for this format
    pub total_battles: u64,

    /// Share of the period's battles, 0.00 to 100.00
    pub percentage: f64,

    /// Battles per rating threshold
    pub by_rating: BTreeMap<u32, u64>,
}

/// Everything published for one period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodExport {
    /// Grand total across all formats
    pub total_battles: u64,

    /// Distinct thresholds seen in the period, ascending
    pub rating_thresholds: Vec<u32>,

    /// Formats in the order they were first seen
    pub formats: Vec<FormatAggregate>,
}

impl PeriodExport {
    /// Look up a format by name.
    pub fn format(&self, name: &str) -> Option<&FormatAggregate> {
        self.formats.iter().find(|f| f.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

/// Manifest of every exported period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodIndex {
    /// All periods, newest first
    pub periods: Vec<PeriodKey>,

    /// The newest period
    pub latest: PeriodKey,
}

impl PeriodIndex {
    /// Build an index from a set of periods. Returns `None` when there are none.
    pub fn from_periods<I>(periods: I) -> Option<Self>
    where
        I: IntoIterator<Item = PeriodKey>,
    {
        let mut periods: Vec<PeriodKey> = periods.into_iter().collect();
        periods.sort_by(|a, b| b.cmp(a));
        periods.dedup();

        let latest = periods.first()?.clone();
        Some(Self { periods, latest })
    }
}
