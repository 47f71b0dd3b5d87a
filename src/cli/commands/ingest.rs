//! Snapshot ingestion command.

use std::path::PathBuf;

use console::style;

use crate::config::Settings;
use crate::ingest::{FileOutcome, IngestCoordinator, IngestEvent};
use crate::repository::SnapshotStore;

/// Load relay snapshot files from the configured (or given) directories.
pub fn cmd_ingest(settings: &Settings, dirs: &[PathBuf]) -> anyhow::Result<()> {
    let locations: &[PathBuf] = if dirs.is_empty() {
        &settings.snapshot_dirs
    } else {
        dirs
    };
    if locations.is_empty() {
        anyhow::bail!("No snapshot directories given (flag or snapshot_dirs in config)");
    }

    let mut store = SnapshotStore::open(&settings.database)?;
    let mut coordinator = IngestCoordinator::new(&mut store);

    let report = coordinator.run(locations, |event| match event {
        IngestEvent::LocationStarted(dir) => {
            println!("{} Processing location: {}", style("→").cyan(), dir.display());
        }
        IngestEvent::FileFinished(path, FileOutcome::Loaded(rows)) => {
            println!(
                "  {} {} ({} rows)",
                style("✓").green(),
                path.display(),
                rows
            );
        }
        IngestEvent::FileFinished(path, FileOutcome::Skipped) => {
            println!(
                "  {} {} (already ingested)",
                style("·").dim(),
                path.display()
            );
        }
        IngestEvent::LocationFinished(..) => {}
    });

    println!(
        "\n{} {} file(s) loaded, {} skipped, {} rows",
        style("✓").green(),
        report.files_loaded,
        report.files_skipped,
        report.rows_loaded
    );

    if !report.is_success() {
        for (path, err) in &report.failures {
            println!("  {} {}: {}", style("✗").red(), path.display(), err);
        }
        anyhow::bail!("{} file(s) failed to ingest", report.failures.len());
    }

    Ok(())
}
