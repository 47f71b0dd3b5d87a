//! Repository layer for SQLite persistence.
//!
//! All access goes through a single `SnapshotStore` connection acquired at
//! the start of a run and released when the store is dropped, on every exit
//! path. There is no ambient or shared connection state.

mod snapshot;

pub use snapshot::SnapshotStore;

use chrono::NaiveDate;
use thiserror::Error;

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors from the snapshot store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure (open, query, or write).
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Country counts (or their completion marker) already exist for the
    /// date. Signals a concurrent or repeated derivation; existing rows are
    /// left untouched.
    #[error("Country counts already committed for {date}")]
    CountsConflict { date: NaiveDate },

    /// The file's checksum was recorded by an earlier ingestion run.
    #[error("File already ingested: {filename} ({checksum})")]
    AlreadyIngested { filename: String, checksum: String },
}

/// Render a date the way the store keys it (`YYYY-MM-DD` text columns).
pub(crate) fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a date column written by `date_key`.
pub(crate) fn parse_date_key(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}
