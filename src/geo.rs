//! Offline IP-to-country resolution backed by a MaxMind GeoIP database.
//!
//! Unresolved addresses are an expected, frequent outcome (reserved ranges,
//! addresses missing from the database, records without country data), so
//! the lookup returns `Option` rather than treating them as errors. Only
//! opening the database file can fail.

use std::net::IpAddr;
use std::path::Path;

use maxminddb::geoip2;
use thiserror::Error;

/// Errors opening the GeoIP database. Fatal for any run that needs
/// geolocation; there is no partial mode without it.
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("Cannot open GeoIP database {path}: {source}")]
    Open {
        path: String,
        source: maxminddb::MaxMindDBError,
    },
}

/// Point lookup from an IP address literal to a lowercase ISO 3166-1
/// alpha-2 country code.
pub trait CountryResolver {
    /// Resolve an address to a country code.
    ///
    /// Returns `None` when the address is malformed, absent from the
    /// database, or maps to a record without country data.
    fn resolve(&self, ip: &str) -> Option<String>;
}

/// Resolver over a GeoLite2/GeoIP2 `.mmdb` file, loaded once per run.
///
/// Lookups are read-only against the loaded buffer and safe to share.
pub struct MaxmindResolver {
    reader: maxminddb::Reader<Vec<u8>>,
}

impl MaxmindResolver {
    /// Load the database file into memory.
    pub fn open(path: &Path) -> Result<Self, GeoError> {
        let reader = maxminddb::Reader::open_readfile(path).map_err(|source| GeoError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self { reader })
    }
}

impl CountryResolver for MaxmindResolver {
    fn resolve(&self, ip: &str) -> Option<String> {
        let addr: IpAddr = ip.parse().ok()?;
        let record: geoip2::Country = self.reader.lookup(addr).ok()?;
        record
            .country
            .and_then(|c| c.iso_code)
            .map(|code| code.to_ascii_lowercase())
    }
}
