//! SQLite-backed store for one period's stat records.
//!
//! Each period lives in its own database file with a single `formats` table.
//! `(name, rating_threshold)` is unique, so every write is an upsert.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::{StorageConfig, StorageError};
use crate::models::{PeriodKey, StatRecord};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS formats (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        rating_threshold INTEGER NOT NULL CHECK (rating_threshold >= 0),
        num_battles INTEGER NOT NULL CHECK (num_battles >= 0),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE(name, rating_threshold)
    );
";

const UPSERT: &str = "
    INSERT INTO formats (name, rating_threshold, num_battles, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?4)
    ON CONFLICT(name, rating_threshold) DO UPDATE SET
        num_battles = excluded.num_battles,
        updated_at = excluded.updated_at
";

const SELECT_COLUMNS: &str =
    "SELECT name, rating_threshold, num_battles, created_at, updated_at FROM formats";

/// Row as stored, before range checks.
struct RawRecord {
    name: String,
    rating_threshold: i64,
    num_battles: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            rating_threshold: row.get(1)?,
            num_battles: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    fn into_record(self) -> Result<StatRecord, StorageError> {
        let rating_threshold = u32::try_from(self.rating_threshold).map_err(|_| {
            StorageError::InvalidData(format!(
                "rating threshold {} for {} is out of range",
                self.rating_threshold, self.name
            ))
        })?;
        let num_battles = u64::try_from(self.num_battles).map_err(|_| {
            StorageError::InvalidData(format!(
                "battle count {} for {}-{} is negative",
                self.num_battles, self.name, rating_threshold
            ))
        })?;

        Ok(StatRecord {
            format_name: self.name,
            rating_threshold,
            num_battles,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Durable record store for a single period.
///
/// The connection is released when the store is dropped, so early returns
/// through `?` never leak it. [`PeriodStore::close`] releases it explicitly
/// and reports any error from doing so.
pub struct PeriodStore {
    conn: Connection,
    path: PathBuf,
}

impl PeriodStore {
    /// Open (or create) the store for a period under the data root.
    pub fn open(config: &StorageConfig, period: &PeriodKey) -> Result<Self, StorageError> {
        Self::open_path(config.store_path(period))
    }

    /// Open (or create) a store at an explicit path.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::unavailable(path, e))?;
        }

        let conn = Connection::open(path).map_err(|e| StorageError::unavailable(path, e))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| StorageError::unavailable(path, e))?;

        info!("Opened period store {:?}", path);

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert a record, or overwrite the count of an existing
    /// (format, threshold) pair.
    ///
    /// The write is a single statement, so a failure leaves the store as it was.
    pub fn upsert(
        &self,
        format_name: &str,
        rating_threshold: u32,
        num_battles: u64,
    ) -> Result<(), StorageError> {
        let key = format!("{}-{}", format_name, rating_threshold);

        if format_name.trim().is_empty() {
            return Err(StorageError::WriteFailed {
                key,
                reason: "format name is empty".to_string(),
            });
        }

        let battles = i64::try_from(num_battles).map_err(|_| StorageError::WriteFailed {
            key: key.clone(),
            reason: format!("battle count {} exceeds storage range", num_battles),
        })?;

        self.conn
            .execute(
                UPSERT,
                params![format_name, i64::from(rating_threshold), battles, Utc::now()],
            )
            .map_err(|e| StorageError::WriteFailed {
                key: key.clone(),
                reason: e.to_string(),
            })?;

        debug!("Upserted {} = {} in {:?}", key, num_battles, self.path);
        Ok(())
    }

    /// Every record in the period, ordered by format name then threshold.
    pub fn all_records(&self) -> Result<Vec<StatRecord>, StorageError> {
        let sql = format!("{} ORDER BY name, rating_threshold", SELECT_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], RawRecord::from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }

        debug!("Read {} records from {:?}", records.len(), self.path);
        Ok(records)
    }

    /// Point lookup of one (format, threshold) pair.
    pub fn record_for(
        &self,
        format_name: &str,
        rating_threshold: u32,
    ) -> Result<Option<StatRecord>, StorageError> {
        let sql = format!(
            "{} WHERE name = ?1 AND rating_threshold = ?2",
            SELECT_COLUMNS
        );
        let raw = self
            .conn
            .query_row(
                &sql,
                params![format_name, i64::from(rating_threshold)],
                RawRecord::from_row,
            )
            .optional()?;

        raw.map(RawRecord::into_record).transpose()
    }

    /// Sum of battles across every record; 0 for an empty store.
    pub fn total_battles(&self) -> Result<u64, StorageError> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(num_battles), 0) FROM formats",
            [],
            |row| row.get(0),
        )?;

        u64::try_from(total)
            .map_err(|_| StorageError::InvalidData(format!("battle total {} is negative", total)))
    }

    /// Distinct format names, regardless of threshold.
    pub fn distinct_formats(&self) -> Result<BTreeSet<String>, StorageError> {
        let mut stmt = self.conn.prepare("SELECT DISTINCT name FROM formats")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(names)
    }

    /// Number of (format, threshold) pairs stored.
    pub fn record_count(&self) -> Result<usize, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM formats", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Release the connection.
    pub fn close(self) -> Result<(), StorageError> {
        let Self { conn, path } = self;
        conn.close()
            .map_err(|(_, e)| StorageError::unavailable(&path, e))?;
        debug!("Closed period store {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn open_temp(temp_dir: &TempDir) -> PeriodStore {
        PeriodStore::open_path(temp_dir.path().join("2025-12.db")).unwrap()
    }

    #[test]
    fn test_open_creates_missing_directories() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig::new(
            temp_dir.path().join("nested").join("data"),
            temp_dir.path().join("docs"),
        );
        let period = PeriodKey::parse("2025-12").unwrap();

        let store = PeriodStore::open(&config, &period).unwrap();
        assert_eq!(store.path(), config.store_path(&period).as_path());
        assert!(config.store_path(&period).exists());
        store.close().unwrap();
    }

    #[test]
    fn test_open_rejects_non_database_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("2025-12.db");
        std::fs::write(&path, vec![b'x'; 4096]).unwrap();

        let err = PeriodStore::open_path(&path).err().unwrap();
        assert!(matches!(err, StorageError::StorageUnavailable { .. }));
    }

    #[test]
    fn test_upsert_then_lookup() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_temp(&temp_dir);

        store.upsert("gen9ou", 1500, 50000).unwrap();

        let record = store.record_for("gen9ou", 1500).unwrap().unwrap();
        assert_eq!(record.format_name, "gen9ou");
        assert_eq!(record.rating_threshold, 1500);
        assert_eq!(record.num_battles, 50000);
    }

    #[test]
    fn test_record_for_missing_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_temp(&temp_dir);

        store.upsert("gen9ou", 1500, 1).unwrap();
        assert!(store.record_for("gen9ou", 1760).unwrap().is_none());
        assert!(store.record_for("gen9uu", 1500).unwrap().is_none());
    }

    #[test]
    fn test_repeated_identical_upsert_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_temp(&temp_dir);

        store.upsert("gen9ou", 1500, 50000).unwrap();
        let first = store.record_for("gen9ou", 1500).unwrap().unwrap();
        store.upsert("gen9ou", 1500, 50000).unwrap();
        let second = store.record_for("gen9ou", 1500).unwrap().unwrap();

        assert_eq!(store.all_records().unwrap().len(), 1);
        assert_eq!(second.num_battles, 50000);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[test]
    fn test_rewrite_refreshes_updated_at_only() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_temp(&temp_dir);

        store.upsert("gen9ou", 1500, 50000).unwrap();
        let first = store.record_for("gen9ou", 1500).unwrap().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(20));
        store.upsert("gen9ou", 1500, 50000).unwrap();
        let second = store.record_for("gen9ou", 1500).unwrap().unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
        assert_eq!(first.created_at, first.updated_at);
    }

    #[test]
    fn test_upsert_replaces_count_without_touching_others() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_temp(&temp_dir);

        store.upsert("gen9ou", 1500, 50000).unwrap();
        store.upsert("gen9ou", 1760, 25000).unwrap();
        store.upsert("gen9ou", 1500, 61000).unwrap();

        let records = store.all_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(store.record_for("gen9ou", 1500).unwrap().unwrap().num_battles, 61000);
        assert_eq!(store.record_for("gen9ou", 1760).unwrap().unwrap().num_battles, 25000);
    }

    #[test]
    fn test_upsert_rejects_empty_format() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_temp(&temp_dir);

        let err = store.upsert("", 1500, 10).unwrap_err();
        assert!(matches!(err, StorageError::WriteFailed { .. }));
        assert!(store.all_records().unwrap().is_empty());
    }

    #[test]
    fn test_upsert_rejects_out_of_range_count() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_temp(&temp_dir);

        store.upsert("gen9ou", 0, 5).unwrap();
        let err = store.upsert("gen9ou", 0, u64::MAX).unwrap_err();
        assert!(matches!(err, StorageError::WriteFailed { .. }));
        assert_eq!(store.record_for("gen9ou", 0).unwrap().unwrap().num_battles, 5);
    }

    #[test]
    fn test_all_records_ordering() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_temp(&temp_dir);

        store.upsert("gen9vgc2025regg", 1500, 30000).unwrap();
        store.upsert("gen9ou", 1760, 25000).unwrap();
        store.upsert("gen9ou", 0, 90000).unwrap();
        store.upsert("gen9ou", 1500, 50000).unwrap();

        let labels: Vec<String> = store
            .all_records()
            .unwrap()
            .iter()
            .map(|r| format!("{}-{}", r.format_name, r.rating_threshold))
            .collect();
        assert_eq!(
            labels,
            vec!["gen9ou-0", "gen9ou-1500", "gen9ou-1760", "gen9vgc2025regg-1500"]
        );
    }

    #[test]
    fn test_total_battles_matches_records() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_temp(&temp_dir);
        assert_eq!(store.total_battles().unwrap(), 0);

        store.upsert("gen9ou", 1500, 50000).unwrap();
        store.upsert("gen9ou", 1760, 25000).unwrap();
        store.upsert("gen9vgc2025regg", 1500, 30000).unwrap();
        store.upsert("gen9ou", 1760, 20000).unwrap();

        let summed: u64 = store.all_records().unwrap().iter().map(|r| r.num_battles).sum();
        assert_eq!(store.total_battles().unwrap(), summed);
        assert_eq!(summed, 100000);
    }

    #[test]
    fn test_distinct_formats_and_count() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_temp(&temp_dir);

        store.upsert("gen9ou", 1500, 1).unwrap();
        store.upsert("gen9ou", 1760, 1).unwrap();
        store.upsert("gen1ou", 0, 1).unwrap();

        let formats: Vec<String> = store.distinct_formats().unwrap().into_iter().collect();
        assert_eq!(formats, vec!["gen1ou".to_string(), "gen9ou".to_string()]);
        assert_eq!(store.record_count().unwrap(), 3);
    }

    #[test]
    fn test_records_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("2024-01.db");

        {
            let store = PeriodStore::open_path(&path).unwrap();
            store.upsert("gen8ou", 1630, 777).unwrap();
            store.close().unwrap();
        }

        let store = PeriodStore::open_path(&path).unwrap();
        assert_eq!(store.record_for("gen8ou", 1630).unwrap().unwrap().num_battles, 777);
    }
}
