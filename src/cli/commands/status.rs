//! Store status command.

use console::style;

use crate::config::Settings;
use crate::repository::SnapshotStore;

/// Summarize store contents and pending backfill work.
pub fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let store = SnapshotStore::open(&settings.database)?;

    let dates = store.count_dates()?;
    let relays = store.count_relays()?;
    let files = store.count_ingested_files()?;
    let missing = store.dates_missing_country_data()?;

    println!("{} Database: {}", style("→").cyan(), settings.database.display());
    println!("  {} snapshot date(s)", dates);
    println!("  {} relay row(s)", relays);
    println!("  {} ingested file(s)", files);

    if missing.is_empty() {
        println!("  {} all dates have country data", style("✓").green());
    } else {
        println!(
            "  {} {} date(s) missing country data ({} .. {})",
            style("!").yellow(),
            missing.len(),
            missing.first().map(|d| d.to_string()).unwrap_or_default(),
            missing.last().map(|d| d.to_string()).unwrap_or_default()
        );
    }

    Ok(())
}
