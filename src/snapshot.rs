//! Local snapshot files.
//!
//! A snapshot is one downloaded stats file (`<format>-<rating>.json.gz` or
//! `.json`). Only `info["number of battles"]` is read from it.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while reading snapshot files.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No battle count in {0}")]
    MissingBattleCount(PathBuf),

    #[error("Invalid snapshot directory pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// A snapshot filename paired with its battle count, if one could be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotCount {
    pub filename: String,
    pub num_battles: Option<u64>,
}

impl SnapshotCount {
    pub fn new(filename: impl Into<String>, num_battles: Option<u64>) -> Self {
        Self {
            filename: filename.into(),
            num_battles,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SnapshotDocument {
    #[serde(default)]
    info: Option<SnapshotInfo>,
}

#[derive(Debug, Deserialize)]
struct SnapshotInfo {
    #[serde(rename = "number of battles", default)]
    number_of_battles: Option<u64>,
}

/// Every `*.json.gz` and `*.json` file directly under `dir`, sorted by name.
pub fn list_snapshot_files(dir: &Path) -> Result<Vec<PathBuf>, SnapshotError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let root = glob::Pattern::escape(&dir.to_string_lossy());
    let mut files = Vec::new();
    for suffix in ["json.gz", "json"] {
        for entry in glob::glob(&format!("{}/*.{}", root, suffix))? {
            let path = entry.map_err(|e| e.into_error())?;
            if path.is_file() {
                files.push(path);
            }
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!("Found {} snapshot files in {:?}", files.len(), dir);
    Ok(files)
}

/// Read the battle count from one snapshot, decompressing `.gz` files.
pub fn read_battle_count(path: &Path) -> Result<u64, SnapshotError> {
    let file = File::open(path)?;
    let reader: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let document: SnapshotDocument = serde_json::from_reader(reader)?;
    document
        .info
        .and_then(|info| info.number_of_battles)
        .ok_or_else(|| SnapshotError::MissingBattleCount(path.to_path_buf()))
}

/// Read every snapshot under `dir`.
///
/// A file that cannot be read yields `num_battles: None` so the ingest step
/// can count it as a failure without stopping.
pub fn load_snapshots(dir: &Path) -> Result<Vec<SnapshotCount>, SnapshotError> {
    let files = list_snapshot_files(dir)?;
    let mut snapshots = Vec::with_capacity(files.len());

    for path in files {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let num_battles = match read_battle_count(&path) {
            Ok(count) => Some(count),
            Err(e) => {
                warn!("Failed to parse {}: {}", filename, e);
                None
            }
        };
        snapshots.push(SnapshotCount::new(filename, num_battles));
    }

    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_gz(path: &Path, body: &str) {
        let file = File::create(path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(body.as_bytes()).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn test_read_gzip_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gen9ou-1500.json.gz");
        write_gz(
            &path,
            r#"{"info": {"metagame": "gen9ou", "cutoff": 1500, "number of battles": 50000}, "data": {}}"#,
        );

        assert_eq!(read_battle_count(&path).unwrap(), 50000);
    }

    #[test]
    fn test_read_plain_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gen9vgc2025regg-1760.json");
        std::fs::write(&path, r#"{"info": {"number of battles": 1234}}"#).unwrap();

        assert_eq!(read_battle_count(&path).unwrap(), 1234);
    }

    #[test]
    fn test_missing_info_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gen9ou-0.json");
        std::fs::write(&path, r#"{"data": {}}"#).unwrap();

        let err = read_battle_count(&path).unwrap_err();
        assert!(matches!(err, SnapshotError::MissingBattleCount(_)));
    }

    #[test]
    fn test_corrupt_gzip_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gen9ou-0.json.gz");
        std::fs::write(&path, b"not gzip at all").unwrap();

        assert!(read_battle_count(&path).is_err());
    }

    #[test]
    fn test_list_snapshot_files_filters_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        for name in ["gen9ubers-0.json.gz", "gen9ou-1500.json", "notes.txt", "gen1ou-0.json.gz"] {
            std::fs::write(dir.join(name), b"").unwrap();
        }

        let names: Vec<String> = list_snapshot_files(dir)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["gen1ou-0.json.gz", "gen9ou-1500.json", "gen9ubers-0.json.gz"]
        );
    }

    #[test]
    fn test_load_snapshots_keeps_unreadable_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        write_gz(
            &dir.join("gen9ou-1500.json.gz"),
            r#"{"info": {"number of battles": 10}}"#,
        );
        std::fs::write(dir.join("gen9ou-1760.json.gz"), b"garbage").unwrap();

        let snapshots = load_snapshots(dir).unwrap();
        assert_eq!(
            snapshots,
            vec![
                SnapshotCount::new("gen9ou-1500.json.gz", Some(10)),
                SnapshotCount::new("gen9ou-1760.json.gz", None),
            ]
        );
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_snapshots(&temp_dir.path().join("raw")).unwrap().is_empty());
    }
}
