//! Runtime settings: where the database, GeoIP data, and snapshot input
//! directories live.
//!
//! Layering, lowest priority first: built-in defaults, then an optional
//! TOML config file (`relaystats.toml` in the working directory unless a
//! path is given), then CLI flags and environment variables applied by the
//! command layer. `~` in configured paths is expanded.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Config file searched for in the working directory when `--config` is
/// not given.
pub const DEFAULT_CONFIG_FILE: &str = "relaystats.toml";

/// Default database filename when neither config nor flags name one.
pub const DEFAULT_DATABASE: &str = "relaystats.db";

/// On-disk config file shape. Every field is optional; missing values
/// fall back to defaults or must arrive via flags.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    database: Option<String>,
    geoip: Option<String>,
    snapshot_dirs: Vec<String>,
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// SQLite database path.
    pub database: PathBuf,
    /// GeoLite2/GeoIP2 `.mmdb` path, required only by the backfill job.
    pub geoip: Option<PathBuf>,
    /// Ordered snapshot input directories.
    pub snapshot_dirs: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            geoip: None,
            snapshot_dirs: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from the given config file, or from
    /// `relaystats.toml` if present, or defaults.
    ///
    /// An explicitly named config file must exist and parse; the implicit
    /// one is simply skipped when absent.
    pub fn load(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let (path, required) = match config_path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !path.exists() {
            if required {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)?;
        let file: FileConfig = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))?;

        Ok(Self {
            database: file
                .database
                .as_deref()
                .map(expand_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE)),
            geoip: file.geoip.as_deref().map(expand_path),
            snapshot_dirs: file.snapshot_dirs.iter().map(|d| expand_path(d)).collect(),
        })
    }

    /// Apply a CLI/env database override.
    pub fn with_database(mut self, database: Option<&Path>) -> Self {
        if let Some(db) = database {
            self.database = db.to_path_buf();
        }
        self
    }
}

/// Expand `~` and environment-style home prefixes in a configured path.
fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_defaults_without_config_file() {
        let settings = Settings::default();
        assert_eq!(settings.database, PathBuf::from(DEFAULT_DATABASE));
        assert!(settings.geoip.is_none());
        assert!(settings.snapshot_dirs.is_empty());
    }

    #[test]
    fn test_load_config_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("relaystats.toml");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(
            f,
            r#"
database = "/var/lib/relaystats/relays.db"
geoip = "/var/lib/geoip/GeoLite2-Country.mmdb"
snapshot_dirs = ["/data/historical", "/data/current"]
"#
        )
        .unwrap();

        let settings = Settings::load(Some(path.as_path())).unwrap();
        assert_eq!(
            settings.database,
            PathBuf::from("/var/lib/relaystats/relays.db")
        );
        assert_eq!(
            settings.snapshot_dirs,
            vec![
                PathBuf::from("/data/historical"),
                PathBuf::from("/data/current")
            ]
        );
    }

    #[test]
    fn test_explicit_config_must_exist() {
        assert!(Settings::load(Some(Path::new("/nonexistent/relaystats.toml"))).is_err());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("relaystats.toml");
        fs::write(&path, "databse = \"typo.db\"\n").unwrap();
        assert!(Settings::load(Some(path.as_path())).is_err());
    }

    #[test]
    fn test_database_override_wins() {
        let settings = Settings::default().with_database(Some(Path::new("other.db")));
        assert_eq!(settings.database, PathBuf::from("other.db"));
    }
}
