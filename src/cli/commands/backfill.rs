//! Country-count backfill command.

use std::path::Path;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::backfill::BackfillJob;
use crate::config::Settings;
use crate::geo::MaxmindResolver;
use crate::repository::SnapshotStore;

/// Derive per-country relay counts for every date missing them.
pub fn cmd_backfill(settings: &Settings, geoip: Option<&Path>) -> anyhow::Result<()> {
    let geoip_path = geoip
        .map(Path::to_path_buf)
        .or_else(|| settings.geoip.clone())
        .ok_or_else(|| {
            anyhow::anyhow!("No GeoIP database given (--geoip or geoip in config)")
        })?;

    println!("{} Loading GeoIP database...", style("→").cyan());
    let resolver = MaxmindResolver::open(&geoip_path)?;

    let mut store = SnapshotStore::open(&settings.database)?;
    let missing = store.dates_missing_country_data()?;
    if missing.is_empty() {
        println!("{} No dates missing country data", style("✓").green());
        return Ok(());
    }
    println!(
        "{} {} date(s) without country data",
        style("→").cyan(),
        missing.len()
    );

    let pb = ProgressBar::new(missing.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan} {pos}/{len} {msg}")
            .unwrap(),
    );

    let mut job = BackfillJob::new(&mut store, &resolver);
    let report = job.run(|outcome| {
        pb.inc(1);
        pb.set_message(format!(
            "{}: {} relays, {} geolocated, {} countries",
            outcome.date, outcome.stats.relays_seen, outcome.stats.geolocated, outcome.countries
        ));
    })?;
    pb.finish_and_clear();

    println!(
        "{} {} date(s) processed, {} with no geolocatable relays",
        style("✓").green(),
        report.dates_processed,
        report.dates_empty
    );

    if !report.is_success() {
        for (date, err) in &report.failures {
            println!("  {} {}: {}", style("✗").red(), date, err);
        }
        anyhow::bail!("{} date(s) aborted", report.failures.len());
    }

    Ok(())
}
