//! Domain model types shared across the ingestion and backfill pipelines.

use chrono::NaiveDate;
use serde::Deserialize;

/// A single relay observation parsed from a snapshot file.
///
/// Columns beyond these are ignored; the upstream export format has grown
/// fields over the years and older files carry fewer of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelayRow {
    pub fingerprint: String,
    pub nickname: String,
    /// IPv4 or IPv6 literal as published upstream.
    #[serde(alias = "address")]
    pub ip: String,
}

/// Identity of one ingested snapshot file.
///
/// The checksum is the idempotency key for re-runs: a file whose contents
/// were already recorded is skipped no matter where it now lives on disk.
#[derive(Debug, Clone)]
pub struct FileStamp {
    pub filename: String,
    pub date: NaiveDate,
    /// Lowercase hex SHA-256 of the raw file contents.
    pub checksum: String,
}

/// Per-date observability counters from one backfill pass.
///
/// `relays_seen` counts every relay row for the date; `geolocated` only
/// those whose IP resolved to a country. The difference is the number of
/// unresolved addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateStats {
    pub relays_seen: u64,
    pub geolocated: u64,
}
