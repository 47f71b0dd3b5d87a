//! Ingestion coordinator: loads dated relay snapshot CSV files into the
//! snapshot store.
//!
//! Locations are processed strictly in order, one fully before the next.
//! Within a location each file stands alone: a bad file is logged and
//! skipped, never aborting the rest. Files already recorded (by content
//! checksum) are no-ops, so a crashed or repeated run is safe to re-invoke.

mod reader;

pub use reader::{parse_snapshot_rows, snapshot_date_from_filename};

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::FileStamp;
use crate::repository::{SnapshotStore, StoreError};

/// Per-location processing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationState {
    Pending,
    InProgress,
    Done,
}

/// Why a single file could not be ingested.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Filename carries no snapshot date")]
    UndatedFilename,

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Rows were written for the file's date.
    Loaded(usize),
    /// The file's checksum was already in the ledger.
    Skipped,
}

/// Outcome of one coordinator run across all locations.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub files_loaded: usize,
    pub files_skipped: usize,
    pub rows_loaded: usize,
    /// Files (or locations) that failed, with the error message.
    pub failures: Vec<(PathBuf, String)>,
}

impl IngestReport {
    /// True when every file in every location ingested or was already
    /// recorded.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Progress events for the caller's console output.
pub enum IngestEvent<'a> {
    LocationStarted(&'a Path),
    LocationFinished(&'a Path, LocationState),
    FileFinished(&'a Path, FileOutcome),
}

/// Sequential driver over an ordered list of snapshot directories.
pub struct IngestCoordinator<'a> {
    store: &'a mut SnapshotStore,
}

impl<'a> IngestCoordinator<'a> {
    pub fn new(store: &'a mut SnapshotStore) -> Self {
        Self { store }
    }

    /// Process every location in order. `progress` receives per-location
    /// and per-file events as work proceeds.
    pub fn run<F>(&mut self, locations: &[PathBuf], mut progress: F) -> IngestReport
    where
        F: FnMut(IngestEvent<'_>),
    {
        let mut report = IngestReport::default();
        let mut states = vec![LocationState::Pending; locations.len()];

        for (i, dir) in locations.iter().enumerate() {
            states[i] = LocationState::InProgress;
            progress(IngestEvent::LocationStarted(dir));

            if let Err(err) = self.ingest_location(dir, &mut report, &mut progress) {
                tracing::error!("Failed to read location {}: {}", dir.display(), err);
                report.failures.push((dir.clone(), err.to_string()));
            }

            states[i] = LocationState::Done;
            progress(IngestEvent::LocationFinished(dir, states[i]));
        }

        report
    }

    /// Ingest every snapshot file in one directory, in filename order.
    fn ingest_location<F>(
        &mut self,
        dir: &Path,
        report: &mut IngestReport,
        progress: &mut F,
    ) -> std::io::Result<()>
    where
        F: FnMut(IngestEvent<'_>),
    {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
            })
            .collect();
        files.sort();

        for path in &files {
            match self.ingest_file(path) {
                Ok(outcome) => {
                    match outcome {
                        FileOutcome::Loaded(rows) => {
                            report.files_loaded += 1;
                            report.rows_loaded += rows;
                        }
                        FileOutcome::Skipped => report.files_skipped += 1,
                    }
                    progress(IngestEvent::FileFinished(path, outcome));
                }
                Err(err) => {
                    tracing::warn!("Skipping {}: {}", path.display(), err);
                    report.failures.push((path.clone(), err.to_string()));
                }
            }
        }

        Ok(())
    }

    /// Ingest a single snapshot file.
    ///
    /// The content checksum is computed first so an already-recorded file
    /// is skipped before any parsing. A checksum race lost to another
    /// invocation between the probe and the write also counts as skipped.
    fn ingest_file(&mut self, path: &Path) -> Result<FileOutcome, IngestError> {
        let bytes = fs::read(path)?;
        let checksum = hex::encode(Sha256::digest(&bytes));

        if self.store.is_file_ingested(&checksum)? {
            return Ok(FileOutcome::Skipped);
        }

        let date = snapshot_date_from_filename(path).ok_or(IngestError::UndatedFilename)?;
        let rows = parse_snapshot_rows(&bytes)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let stamp = FileStamp {
            filename,
            date,
            checksum,
        };
        match self.store.record_relay_rows(&stamp, &rows) {
            Ok(()) => Ok(FileOutcome::Loaded(rows.len())),
            Err(StoreError::AlreadyIngested { .. }) => Ok(FileOutcome::Skipped),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::TempDir;

    use super::*;

    fn write_file(dir: &Path, name: &str, contents: &str) {
        let mut f = fs::File::create(dir.join(name)).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    fn snapshot_csv(ips: &[&str]) -> String {
        let mut s = String::from("fingerprint,nickname,ip\n");
        for (i, ip) in ips.iter().enumerate() {
            s.push_str(&format!("FP{:04},relay{},{}\n", i, i, ip));
        }
        s
    }

    #[test]
    fn test_ingest_directory() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "relays-2024-01-15.csv", &snapshot_csv(&["1.1.1.1", "2.2.2.2"]));
        write_file(tmp.path(), "relays-2024-01-16.csv", &snapshot_csv(&["3.3.3.3"]));

        let mut store = SnapshotStore::open_in_memory().unwrap();
        let report =
            IngestCoordinator::new(&mut store).run(&[tmp.path().to_path_buf()], |_| {});

        assert!(report.is_success());
        assert_eq!(report.files_loaded, 2);
        assert_eq!(report.rows_loaded, 3);
        assert_eq!(store.count_dates().unwrap(), 2);
        assert_eq!(store.count_relays().unwrap(), 3);
    }

    #[test]
    fn test_rerun_adds_nothing() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "relays-2024-01-15.csv", &snapshot_csv(&["1.1.1.1"]));

        let mut store = SnapshotStore::open_in_memory().unwrap();
        let locations = [tmp.path().to_path_buf()];
        IngestCoordinator::new(&mut store).run(&locations, |_| {});
        let rows_after_first = store.count_relays().unwrap();

        let report = IngestCoordinator::new(&mut store).run(&locations, |_| {});
        assert!(report.is_success());
        assert_eq!(report.files_loaded, 0);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(store.count_relays().unwrap(), rows_after_first);
    }

    #[test]
    fn test_bad_file_does_not_abort_location() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "relays-2024-01-15.csv", "not,a,relay\nsnapshot\n");
        write_file(tmp.path(), "relays-2024-01-16.csv", &snapshot_csv(&["1.1.1.1"]));
        write_file(tmp.path(), "undated.csv", &snapshot_csv(&["2.2.2.2"]));

        let mut store = SnapshotStore::open_in_memory().unwrap();
        let report =
            IngestCoordinator::new(&mut store).run(&[tmp.path().to_path_buf()], |_| {});

        assert!(!report.is_success());
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.files_loaded, 1);
        assert_eq!(store.count_relays().unwrap(), 1);
    }

    #[test]
    fn test_missing_location_recorded_and_rest_processed() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "relays-2024-01-15.csv", &snapshot_csv(&["1.1.1.1"]));

        let mut store = SnapshotStore::open_in_memory().unwrap();
        let locations = [PathBuf::from("/nonexistent/snapshots"), tmp.path().to_path_buf()];
        let report = IngestCoordinator::new(&mut store).run(&locations, |_| {});

        assert!(!report.is_success());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.files_loaded, 1);
    }

    #[test]
    fn test_same_content_under_new_name_skipped() {
        let tmp = TempDir::new().unwrap();
        let csv = snapshot_csv(&["1.1.1.1"]);
        write_file(tmp.path(), "relays-2024-01-15.csv", &csv);

        let mut store = SnapshotStore::open_in_memory().unwrap();
        let locations = [tmp.path().to_path_buf()];
        IngestCoordinator::new(&mut store).run(&locations, |_| {});

        // Identical bytes under a different dated name: checksum dedupe.
        write_file(tmp.path(), "relays-2024-01-15-copy.csv", &csv);
        let report = IngestCoordinator::new(&mut store).run(&locations, |_| {});
        assert_eq!(report.files_skipped, 2);
        assert_eq!(store.count_relays().unwrap(), 1);
    }
}
