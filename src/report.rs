//! CSV report emission
//!
//! One row per `(source, minute)` bucket with the bucket's average,
//! labeled by the representative event timestamp converted to local
//! time and truncated to the minute.

use crate::pipeline::types::AggregateRecord;
use chrono::{DateTime, Local, Utc};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const HEADER: &str = "sourceId,timestamp,average";

/// Write the aggregate report to `path`
pub fn write_report(path: &Path, records: &[AggregateRecord]) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "{}", HEADER)?;
    for record in records {
        // {:?} keeps the trailing .0 on whole-number averages without
        // rounding fractional ones
        writeln!(
            writer,
            "{},{},{:?}",
            record.source_id,
            format_minute(record.window_millis),
            record.average
        )?;
    }
    writer.flush()?;

    log::info!("📝 Wrote {} report rows to {}", records.len(), path.display());
    Ok(())
}

/// Epoch millis -> local time, minute resolution
fn format_minute(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "1970-01-01 00:00".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use tempfile::tempdir;

    #[test]
    fn writes_header_and_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.csv");

        let records = vec![
            AggregateRecord {
                source_id: "loc-1".to_string(),
                window_millis: 1700000000000,
                average: 5.0,
            },
            AggregateRecord {
                source_id: "loc-2".to_string(),
                window_millis: 1700000060000,
                average: 21.5,
            },
        ];

        write_report(&path, &records).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "sourceId,timestamp,average");
        assert!(lines[1].starts_with("loc-1,"));
        assert!(lines[1].ends_with(",5.0"));
        assert!(lines[2].starts_with("loc-2,"));
        assert!(lines[2].ends_with(",21.5"));
    }

    #[test]
    fn whole_number_averages_keep_their_decimal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.csv");

        let records = vec![AggregateRecord {
            source_id: "loc-1".to_string(),
            window_millis: 1700000000000,
            average: 15.0,
        }];
        write_report(&path, &records).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.lines().nth(1).unwrap().ends_with(",15.0"));
    }

    #[test]
    fn empty_report_is_header_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.csv");
        write_report(&path, &[]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), "sourceId,timestamp,average");
    }

    #[test]
    fn timestamp_is_minute_resolution_local_time() {
        // 1700000000000 ms = 2023-11-14 22:13:20 UTC; seconds must be
        // truncated away whatever the local zone is.
        let formatted = format_minute(1700000000000);
        assert_eq!(formatted.len(), "YYYY-MM-DD HH:MM".len());

        let expected = DateTime::<Utc>::from_timestamp_millis(1700000000000)
            .unwrap()
            .with_timezone(&Local);
        assert!(formatted.ends_with(&format!("{:02}", expected.minute())));
    }
}
