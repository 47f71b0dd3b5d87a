//! Snapshot store: date-partitioned relay snapshots and derived country
//! counts over a single SQLite connection.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::{params, params_from_iter, types::Value, Connection, Transaction};

use super::{date_key, parse_date_key, Result, StoreError};
use crate::models::{DateStats, FileStamp, RelayRow};

/// Rows per multi-row INSERT. Keeps statements well under SQLite's bind
/// parameter limit while still writing a date in a handful of statements.
const INSERT_CHUNK_ROWS: usize = 500;

/// SQLite-backed store for relay snapshots and derived country counts.
///
/// Holds the run's one connection; callers pass the store by reference to
/// the ingestion coordinator and the backfill job.
pub struct SnapshotStore {
    conn: Connection,
}

impl SnapshotStore {
    /// Open (or create) the store at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store, mainly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS dates (
                date TEXT PRIMARY KEY
            );
            CREATE TABLE IF NOT EXISTS relays (
                date TEXT NOT NULL,
                ip TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                nickname TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_relays_date ON relays(date);
            CREATE TABLE IF NOT EXISTS country_counts (
                date TEXT NOT NULL,
                cc TEXT NOT NULL,
                count INTEGER NOT NULL,
                PRIMARY KEY (date, cc)
            );
            CREATE TABLE IF NOT EXISTS country_backfill_done (
                date TEXT PRIMARY KEY,
                relays_seen INTEGER NOT NULL,
                geolocated INTEGER NOT NULL,
                completed_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS ingested_files (
                checksum TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                date TEXT NOT NULL,
                row_count INTEGER NOT NULL,
                ingested_at TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    /// Dates that have relay snapshots but no completed country derivation,
    /// in ascending order.
    ///
    /// The completion marker table, not the presence of count rows, decides
    /// membership: a date whose relays all failed geolocation is done and
    /// stays out of this list even though it has zero count rows.
    pub fn dates_missing_country_data(&self) -> Result<Vec<NaiveDate>> {
        let mut stmt = self.conn.prepare(
            "SELECT d.date
             FROM dates d
             LEFT JOIN country_backfill_done b ON d.date = b.date
             WHERE b.date IS NULL
             ORDER BY d.date",
        )?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys.iter().filter_map(|s| parse_date_key(s)).collect())
    }

    /// Visit every relay IP recorded for a date.
    ///
    /// Streams from a cursor; only one row is held in memory at a time.
    pub fn for_each_relay_ip<F>(&self, date: NaiveDate, mut f: F) -> Result<()>
    where
        F: FnMut(&str),
    {
        let mut stmt = self.conn.prepare("SELECT ip FROM relays WHERE date = ?1")?;
        let mut rows = stmt.query(params![date_key(date)])?;
        while let Some(row) = rows.next()? {
            let ip: String = row.get(0)?;
            f(&ip);
        }
        Ok(())
    }

    /// Commit one date's derived country counts and its completion marker
    /// in a single transaction.
    ///
    /// The marker row's primary key is the conflict guard: if the date was
    /// already derived (by this or a racing invocation) the insert fails,
    /// the transaction rolls back, and existing rows are untouched. An
    /// empty `counts` map writes only the marker, recording that the date
    /// was processed with no geolocatable relays.
    pub fn insert_country_counts(
        &mut self,
        date: NaiveDate,
        counts: &BTreeMap<String, u64>,
        stats: DateStats,
    ) -> Result<()> {
        let tx = self.conn.transaction()?;

        let marker = tx.execute(
            "INSERT INTO country_backfill_done (date, relays_seen, geolocated, completed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                date_key(date),
                stats.relays_seen as i64,
                stats.geolocated as i64,
                Utc::now().to_rfc3339(),
            ],
        );
        match marker {
            Err(e) if is_conflict(&e) => return Err(StoreError::CountsConflict { date }),
            other => {
                other?;
            }
        }

        let rows: Vec<(&String, &u64)> = counts.iter().collect();
        for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
            if let Err(e) = insert_count_chunk(&tx, date, chunk) {
                if is_conflict(&e) {
                    return Err(StoreError::CountsConflict { date });
                }
                return Err(e.into());
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Append one snapshot file's relay rows, registering its date.
    ///
    /// The file ledger insert is the idempotency guard: a checksum recorded
    /// by an earlier run fails its primary key, the transaction rolls back,
    /// and `AlreadyIngested` is returned with nothing written.
    pub fn record_relay_rows(&mut self, stamp: &FileStamp, rows: &[RelayRow]) -> Result<()> {
        let tx = self.conn.transaction()?;

        let ledger = tx.execute(
            "INSERT INTO ingested_files (checksum, filename, date, row_count, ingested_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                stamp.checksum,
                stamp.filename,
                date_key(stamp.date),
                rows.len() as i64,
                Utc::now().to_rfc3339(),
            ],
        );
        match ledger {
            Err(e) if is_conflict(&e) => {
                return Err(StoreError::AlreadyIngested {
                    filename: stamp.filename.clone(),
                    checksum: stamp.checksum.clone(),
                })
            }
            other => {
                other?;
            }
        }

        tx.execute(
            "INSERT OR IGNORE INTO dates (date) VALUES (?1)",
            params![date_key(stamp.date)],
        )?;

        for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
            insert_relay_chunk(&tx, stamp.date, chunk)?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Idempotency probe for the ingestion coordinator's skip path.
    pub fn is_file_ingested(&self, checksum: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM ingested_files WHERE checksum = ?1",
            params![checksum],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Committed country counts for a date.
    pub fn country_counts_for_date(&self, date: NaiveDate) -> Result<BTreeMap<String, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT cc, count FROM country_counts WHERE date = ?1")?;
        let mut counts = BTreeMap::new();
        let mut rows = stmt.query(params![date_key(date)])?;
        while let Some(row) = rows.next()? {
            let cc: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            counts.insert(cc, count as u64);
        }
        Ok(counts)
    }

    /// Number of known snapshot dates.
    pub fn count_dates(&self) -> Result<u64> {
        self.count_table("dates")
    }

    /// Number of relay snapshot rows across all dates.
    pub fn count_relays(&self) -> Result<u64> {
        self.count_table("relays")
    }

    /// Number of files recorded in the ingestion ledger.
    pub fn count_ingested_files(&self) -> Result<u64> {
        self.count_table("ingested_files")
    }

    fn count_table(&self, table: &str) -> Result<u64> {
        // Table names come from the constants above, never from input.
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }
}

/// Whether an error is a primary-key/uniqueness violation.
fn is_conflict(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn insert_count_chunk(
    tx: &Transaction<'_>,
    date: NaiveDate,
    chunk: &[(&String, &u64)],
) -> std::result::Result<(), rusqlite::Error> {
    let placeholders = vec!["(?, ?, ?)"; chunk.len()].join(", ");
    let sql = format!(
        "INSERT INTO country_counts (date, cc, count) VALUES {}",
        placeholders
    );
    let key = date_key(date);
    let mut args: Vec<Value> = Vec::with_capacity(chunk.len() * 3);
    for (cc, count) in chunk {
        args.push(Value::from(key.clone()));
        args.push(Value::from((*cc).clone()));
        args.push(Value::from(**count as i64));
    }
    tx.execute(&sql, params_from_iter(args))?;
    Ok(())
}

fn insert_relay_chunk(
    tx: &Transaction<'_>,
    date: NaiveDate,
    chunk: &[RelayRow],
) -> std::result::Result<(), rusqlite::Error> {
    let placeholders = vec!["(?, ?, ?, ?)"; chunk.len()].join(", ");
    let sql = format!(
        "INSERT INTO relays (date, ip, fingerprint, nickname) VALUES {}",
        placeholders
    );
    let key = date_key(date);
    let mut args: Vec<Value> = Vec::with_capacity(chunk.len() * 4);
    for row in chunk {
        args.push(Value::from(key.clone()));
        args.push(Value::from(row.ip.clone()));
        args.push(Value::from(row.fingerprint.clone()));
        args.push(Value::from(row.nickname.clone()));
    }
    tx.execute(&sql, params_from_iter(args))?;
    Ok(())
}
