//! Canonical CSV writing for Silver output
//!
//! Output files are the completion marker for idempotent reruns, so a file
//! must never exist half-written: rows go to a `.partial` sibling that is
//! renamed into place only after the writer has finished.

use crate::constants::{OUTPUT_TIMESTAMP_FORMAT, PARTIAL_SUFFIX};
use crate::error::{EtlError, Result};
use crate::models::TripRecord;

use polars::prelude::{Column, CsvWriter, DataFrame, PlSmallStr, SerWriter};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Writes canonical trip rows for one output unit
#[derive(Debug)]
pub struct CanonicalWriter {
    output_path: PathBuf,
}

impl CanonicalWriter {
    /// Create a new canonical writer
    pub fn new(output_path: PathBuf) -> Self {
        Self { output_path }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Sibling path rows are staged in before the final rename
    pub fn partial_path(&self) -> PathBuf {
        let mut name = self
            .output_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".");
        name.push(PARTIAL_SUFFIX);
        self.output_path.with_file_name(name)
    }

    /// Write rows to the output path and return the number written
    pub fn write(&self, records: &[TripRecord]) -> Result<usize> {
        let mut df = canonical_frame(records)?;

        if let Some(parent) = self.output_path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.write_error(e))?;
        }

        let partial = self.partial_path();
        debug!("Writing {} rows to {}", df.height(), partial.display());

        let staged = File::create(&partial)
            .map_err(|e| self.write_error(e))
            .and_then(|mut file| {
                CsvWriter::new(&mut file)
                    .include_header(true)
                    .finish(&mut df)
                    .map_err(|e| self.write_error(e))?;
                file.sync_all().map_err(|e| self.write_error(e))
            });

        if let Err(e) = staged {
            if partial.exists() {
                if let Err(cleanup) = fs::remove_file(&partial) {
                    warn!("Failed to remove {}: {}", partial.display(), cleanup);
                }
            }
            return Err(e);
        }

        fs::rename(&partial, &self.output_path).map_err(|e| self.write_error(e))?;
        debug!("Committed {}", self.output_path.display());

        Ok(df.height())
    }

    fn write_error(&self, reason: impl std::fmt::Display) -> EtlError {
        EtlError::OutputWrite {
            path: self.output_path.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Render a duration the way sources write it: `695`, not `695.0`
pub fn format_duration(seconds: f64) -> String {
    if seconds.is_finite() && seconds.fract() == 0.0 && seconds.abs() < i64::MAX as f64 {
        (seconds as i64).to_string()
    } else {
        seconds.to_string()
    }
}

/// Build the four-column output frame; durations and timestamps are rendered as text
pub fn canonical_frame(records: &[TripRecord]) -> Result<DataFrame> {
    let format_time = |t: Option<chrono::NaiveDateTime>| {
        t.map(|t| t.format(OUTPUT_TIMESTAMP_FORMAT).to_string())
    };

    let durations: Vec<Option<String>> = records
        .iter()
        .map(|r| r.trip_duration.map(format_duration))
        .collect();
    let starts: Vec<Option<String>> = records.iter().map(|r| format_time(r.start_time)).collect();
    let stations: Vec<Option<String>> =
        records.iter().map(|r| r.start_station_name.clone()).collect();
    let user_types: Vec<Option<String>> = records.iter().map(|r| r.user_type.clone()).collect();

    let columns = vec![
        Column::new(PlSmallStr::from_static("trip_duration"), durations),
        Column::new(PlSmallStr::from_static("start_time"), starts),
        Column::new(PlSmallStr::from_static("start_station_name"), stations),
        Column::new(PlSmallStr::from_static("user_type"), user_types),
    ];

    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn sample_records() -> Vec<TripRecord> {
        let start = NaiveDate::from_ymd_opt(2019, 6, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        vec![
            TripRecord {
                trip_duration: Some(600.0),
                start_time: Some(start),
                start_station_name: Some("Pier 40".to_string()),
                user_type: Some("Subscriber".to_string()),
                ..TripRecord::default()
            },
            TripRecord {
                start_time: Some(start),
                ..TripRecord::default()
            },
        ]
    }

    #[test]
    fn test_canonical_frame_columns() {
        let df = canonical_frame(&sample_records()).unwrap();
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();

        assert_eq!(
            names,
            vec!["trip_duration", "start_time", "start_station_name", "user_type"]
        );
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn test_write_is_atomic() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("silver").join("2019-citibike.csv");
        let writer = CanonicalWriter::new(output.clone());

        let written = writer.write(&sample_records()).unwrap();
        assert_eq!(written, 2);
        assert!(output.exists());
        assert!(!writer.partial_path().exists());

        let content = fs::read_to_string(&output).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("trip_duration,start_time,start_station_name,user_type")
        );
        assert_eq!(
            lines.next(),
            Some("600,2019-06-01 08:00:00,Pier 40,Subscriber")
        );
        assert_eq!(lines.next(), Some(",2019-06-01 08:00:00,,"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(695.0), "695");
        assert_eq!(format_duration(695.5), "695.5");
        assert_eq!(format_duration(0.25), "0.25");
        assert_eq!(format_duration(3723.0), "3723");
    }

    #[test]
    fn test_partial_path() {
        let writer = CanonicalWriter::new(PathBuf::from("/tmp/silver/2019-citibike.csv"));
        assert_eq!(
            writer.partial_path(),
            PathBuf::from("/tmp/silver/2019-citibike.csv.partial")
        );
    }
}
