//! Tabular source reader: loads a recorded telemetry file into raw
//! records for the normalizer. The whole file is read up front; recorded
//! sessions are small enough for that.

use anyhow::{Context, Result};
use replay_model::RawRecord;
use std::path::Path;

pub fn load_records(path: &Path) -> Result<Vec<RawRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening telemetry file {}", path.display()))?;
    let headers = rdr
        .headers()
        .with_context(|| format!("reading header row of {}", path.display()))?
        .clone();

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row.with_context(|| format!("reading row of {}", path.display()))?;
        let rec: RawRecord = headers.iter().zip(row.iter()).collect();
        records.push(rec);
    }
    log::info!("loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_header_and_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,voltage,current").unwrap();
        writeln!(file, "0.0,48.1,-2.0").unwrap();
        writeln!(file, "0.5,48.0,-1.9").unwrap();

        let records = load_records(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("timestamp"), Some("0.0"));
        assert_eq!(records[1].get("current"), Some("-1.9"));
    }

    #[test]
    fn short_rows_are_tolerated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,voltage,current").unwrap();
        writeln!(file, "0.0,48.1").unwrap();

        let records = load_records(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("voltage"), Some("48.1"));
        assert_eq!(records[0].get("current"), None);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_records(Path::new("/nonexistent/telemetry.csv")).unwrap_err();
        assert!(err.to_string().contains("telemetry.csv"));
    }
}
