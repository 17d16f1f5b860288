//! Aggregation of a period's records into its export document.
//!
//! Records are grouped by format across rating thresholds:
//! - per-format battle totals and per-threshold breakdowns
//! - each format's share of the period's battles
//! - the set of thresholds seen in the period

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::models::{FormatAggregate, PeriodExport, StatRecord};
use crate::storage::{PeriodStore, StorageError};

/// Share of `part` in `whole` as a percentage rounded to two decimals.
///
/// Rounds half-up on the exact ratio, so 1/8 gives 12.50 and 1/16 gives 6.25.
/// Returns 0 when `whole` is 0.
pub fn calculate_percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }

    let part = u128::from(part);
    let whole = u128::from(whole);
    let hundredths = (part * 20_000 + whole) / (whole * 2);
    hundredths as f64 / 100.0
}

/// Group records by format in a single pass.
///
/// Formats keep the order in which they first appear in `records`. Fails with
/// [`StorageError::InvalidData`] if a format or period total overflows `u64`.
pub fn aggregate_records(records: &[StatRecord]) -> Result<PeriodExport, StorageError> {
    let mut formats: Vec<FormatAggregate> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut thresholds: BTreeSet<u32> = BTreeSet::new();

    for record in records {
        thresholds.insert(record.rating_threshold);

        let idx = *positions
            .entry(record.format_name.as_str())
            .or_insert_with(|| {
                formats.push(FormatAggregate {
                    name: record.format_name.clone(),
                    total_battles: 0,
                    percentage: 0.0,
                    by_rating: BTreeMap::new(),
                });
                formats.len() - 1
            });

        let format = &mut formats[idx];
        format.total_battles = format
            .total_battles
            .checked_add(record.num_battles)
            .ok_or_else(|| {
                StorageError::InvalidData(format!(
                    "battle total for {} overflows at {}",
                    record.format_name,
                    record.label()
                ))
            })?;
        format
            .by_rating
            .insert(record.rating_threshold, record.num_battles);
    }

    let total_battles = formats
        .iter()
        .try_fold(0u64, |sum, f| sum.checked_add(f.total_battles))
        .ok_or_else(|| StorageError::InvalidData("period battle total overflows".to_string()))?;
    for format in &mut formats {
        format.percentage = calculate_percentage(format.total_battles, total_battles);
    }

    Ok(PeriodExport {
        total_battles,
        rating_thresholds: thresholds.into_iter().collect(),
        formats,
    })
}

/// Aggregate everything currently in a period store.
pub fn aggregate_period(store: &PeriodStore) -> Result<PeriodExport, StorageError> {
    let records = store.all_records()?;
    aggregate_records(&records)
}
