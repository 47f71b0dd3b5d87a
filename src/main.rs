//! relaystats - Tor relay snapshot store and country statistics backfill.
//!
//! Ingests dated relay snapshot CSV files into a SQLite store and derives
//! per-country relay counts for each snapshot date via offline GeoIP lookup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if relaystats::cli::is_verbose() {
        "relaystats=info"
    } else {
        "relaystats=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    relaystats::cli::run()
}
