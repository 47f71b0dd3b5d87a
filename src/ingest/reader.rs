//! Snapshot file reading: partition-date extraction from filenames and CSV
//! row parsing.

use std::path::Path;

use chrono::NaiveDate;

use crate::models::RelayRow;

/// Extract the partition date from a snapshot filename.
///
/// Accepts `relays-YYYY-MM-DD.csv` and bare `YYYY-MM-DD.csv`.
pub fn snapshot_date_from_filename(path: &Path) -> Option<NaiveDate> {
    let stem = path.file_stem()?.to_str()?;
    let candidate = stem.strip_prefix("relays-").unwrap_or(stem);
    NaiveDate::parse_from_str(candidate, "%Y-%m-%d").ok()
}

/// Parse relay rows from raw CSV bytes.
///
/// A header row is required; extra columns are ignored so older and newer
/// upstream export formats both load.
pub fn parse_snapshot_rows(bytes: &[u8]) -> Result<Vec<RelayRow>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(bytes);
    reader.deserialize().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_from_prefixed_filename() {
        let date = snapshot_date_from_filename(Path::new("/data/relays-2024-01-15.csv"));
        assert_eq!(
            date,
            Some(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );
    }

    #[test]
    fn test_date_from_bare_filename() {
        let date = snapshot_date_from_filename(Path::new("2023-12-31.csv"));
        assert_eq!(
            date,
            Some(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap())
        );
    }

    #[test]
    fn test_undated_filename_rejected() {
        assert_eq!(snapshot_date_from_filename(Path::new("relays.csv")), None);
        assert_eq!(
            snapshot_date_from_filename(Path::new("relays-2024-13-99.csv")),
            None
        );
    }

    #[test]
    fn test_parse_rows_with_extra_columns() {
        let csv = b"fingerprint,nickname,ip,or_port,flags\n\
            ABCD,alpha,1.2.3.4,9001,Running\n\
            EF01,beta,2001:db8::1,443,Exit\n";
        let rows = parse_snapshot_rows(csv).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ip, "1.2.3.4");
        assert_eq!(rows[1].ip, "2001:db8::1");
        assert_eq!(rows[1].nickname, "beta");
    }

    #[test]
    fn test_parse_rows_address_alias() {
        let csv = b"fingerprint,nickname,address\nABCD,alpha,1.2.3.4\n";
        let rows = parse_snapshot_rows(csv).unwrap();
        assert_eq!(rows[0].ip, "1.2.3.4");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let csv = b"fingerprint,nickname\nABCD,alpha\n";
        assert!(parse_snapshot_rows(csv).is_err());
    }
}
