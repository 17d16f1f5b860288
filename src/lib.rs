//! # Showdown Stats
//!
//! Per-period battle statistics store and JSON exporter for Pokemon Showdown
//! usage snapshots.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (records, period keys, export documents)
//! - **storage**: One SQLite store per period, with upsert semantics
//! - **snapshot**: Reading battle counts from downloaded snapshot files
//! - **ingest**: Filename parsing and per-snapshot ingestion with failure tallies
//! - **calculate**: Aggregation of a period's records by format
//! - **export**: Per-period JSON documents and the cross-period index
//! - **config**: Configuration loading and validation

pub mod calculate;
pub mod config;
pub mod export;
pub mod ingest;
pub mod models;
pub mod snapshot;
pub mod storage;

pub use models::*;
