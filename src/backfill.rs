//! Country backfill job: derives per-country relay counts for every date
//! that has relay snapshots but no committed derivation yet.
//!
//! The job is re-runnable. A date that failed before its commit stays in
//! the missing set and is retried from scratch next run; a committed date
//! is never revisited. Two racing invocations are arbitrated by the store's
//! atomic insert-with-conflict-detection, not by in-process locking.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::geo::CountryResolver;
use crate::models::DateStats;
use crate::repository::{Result, SnapshotStore, StoreError};

/// Result of deriving one date, handed to the progress callback after its
/// commit.
#[derive(Debug, Clone, Copy)]
pub struct DateOutcome {
    pub date: NaiveDate,
    pub stats: DateStats,
    /// Number of distinct countries committed for the date.
    pub countries: usize,
}

/// Outcome of one backfill run.
#[derive(Debug, Default)]
pub struct BackfillReport {
    /// Dates committed this run, including zero-country dates.
    pub dates_processed: usize,
    /// Subset of processed dates that produced no count rows.
    pub dates_empty: usize,
    /// Dates that aborted with a conflict, with the error message.
    pub failures: Vec<(NaiveDate, String)>,
}

impl BackfillReport {
    /// True when every missing date either committed counts or was marked
    /// done with none.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Sequential driver over the missing-date set.
pub struct BackfillJob<'a, R: CountryResolver> {
    store: &'a mut SnapshotStore,
    resolver: &'a R,
}

impl<'a, R: CountryResolver> BackfillJob<'a, R> {
    pub fn new(store: &'a mut SnapshotStore, resolver: &'a R) -> Self {
        Self { store, resolver }
    }

    /// Process every date missing country data, ascending. `progress` runs
    /// after each date commits.
    ///
    /// A conflict on one date is recorded and the run continues; store
    /// failures that prevent any progress propagate immediately.
    pub fn run<F>(&mut self, mut progress: F) -> Result<BackfillReport>
    where
        F: FnMut(&DateOutcome),
    {
        let missing = self.store.dates_missing_country_data()?;
        let mut report = BackfillReport::default();

        for date in missing {
            match self.process_date(date) {
                Ok(outcome) => {
                    report.dates_processed += 1;
                    if outcome.countries == 0 {
                        report.dates_empty += 1;
                    }
                    progress(&outcome);
                }
                Err(err @ StoreError::CountsConflict { .. }) => {
                    tracing::warn!("Skipping {}: {}", date, err);
                    report.failures.push((date, err.to_string()));
                }
                Err(err) => return Err(err),
            }
        }

        Ok(report)
    }

    /// Aggregate and commit a single date.
    ///
    /// An IP that fails to resolve counts toward `relays_seen` only; it is
    /// never an error and never aborts the date. The commit always happens,
    /// even for an empty counter map, so the date's completion is recorded
    /// and it leaves the missing set.
    fn process_date(&mut self, date: NaiveDate) -> Result<DateOutcome> {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        let mut stats = DateStats::default();

        let resolver = self.resolver;
        self.store.for_each_relay_ip(date, |ip| {
            stats.relays_seen += 1;
            if let Some(cc) = resolver.resolve(ip) {
                stats.geolocated += 1;
                *counts.entry(cc).or_insert(0) += 1;
            }
        })?;

        self.store.insert_country_counts(date, &counts, stats)?;

        Ok(DateOutcome {
            date,
            stats,
            countries: counts.len(),
        })
    }
}
