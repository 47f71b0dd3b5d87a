//! relaystats - Tor relay snapshot store and country statistics backfill.
//!
//! Maintains a date-partitioned SQLite store of relay snapshots and derives
//! per-date per-country relay counts from relay IP addresses via offline
//! GeoIP lookups.

pub mod backfill;
pub mod cli;
pub mod config;
pub mod geo;
pub mod ingest;
pub mod models;
pub mod repository;
