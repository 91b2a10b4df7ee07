//! Timestamp resolution across historical export formats
//!
//! Start and stop times appear as `2019-01-01 00:01:47`, `9/1/2014 00:00:25`
//! or `2016-01-01 00:00:41.3450` depending on era and vendor, sometimes within
//! one year. Each value is tried against the configured formats in order.
//! Unparsable values become null and are tallied; rows are never dropped here
//! so that their nulls reach the quality metrics.

use crate::constants::MIN_TIMESTAMP_LEN;
use crate::models::{RawTrip, TripRecord};
use chrono::NaiveDateTime;
use tracing::debug;

use super::schema::NormalizedTable;
use super::stats::{IssueTally, QualityIssue};

/// Parses timestamps with an ordered list of formats
#[derive(Debug, Clone)]
pub struct TemporalResolver {
    formats: Vec<String>,
}

impl TemporalResolver {
    pub fn new(formats: Vec<String>) -> Self {
        Self { formats }
    }

    /// Resolve one timestamp value
    ///
    /// `Ok(None)` means the value was absent; `Err` carries the issue that
    /// forced a present value to null.
    pub fn resolve_timestamp(
        &self,
        raw: Option<&str>,
    ) -> std::result::Result<Option<NaiveDateTime>, QualityIssue> {
        let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(None);
        };

        if is_corrupt_timestamp(value) {
            return Err(QualityIssue::CorruptTimestamp);
        }

        self.formats
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
            .map(Some)
            .ok_or(QualityIssue::UnparsableTimestamp)
    }

    /// Resolve both timestamps of a row and fill a missing duration
    pub fn resolve_row(&self, raw: RawTrip, issues: &mut IssueTally) -> TripRecord {
        let start_time = self.resolve_or_tally(raw.start_time.as_deref(), issues);
        let stop_time = self.resolve_or_tally(raw.stop_time.as_deref(), issues);

        let trip_duration = raw
            .trip_duration
            .or_else(|| derive_duration_seconds(start_time, stop_time));

        TripRecord {
            trip_duration,
            start_time,
            stop_time,
            start_station_name: raw.start_station_name,
            user_type: raw.user_type,
            start_station_id: raw.start_station_id,
            end_station_id: raw.end_station_id,
            bike_id: raw.bike_id,
            ride_id: raw.ride_id,
        }
    }

    /// Resolve every row of a normalized table, merging coercion and timestamp issues
    pub fn resolve_table(&self, table: NormalizedTable) -> (Vec<TripRecord>, IssueTally) {
        let mut issues = table.issues;
        let records: Vec<TripRecord> = table
            .rows
            .into_iter()
            .map(|raw| self.resolve_row(raw, &mut issues))
            .collect();

        debug!(
            "Resolved timestamps for {} rows ({} issues: {})",
            records.len(),
            issues.total(),
            issues.summary()
        );

        (records, issues)
    }

    fn resolve_or_tally(&self, raw: Option<&str>, issues: &mut IssueTally) -> Option<NaiveDateTime> {
        match self.resolve_timestamp(raw) {
            Ok(resolved) => resolved,
            Err(issue) => {
                issues.record(issue);
                None
            }
        }
    }
}

/// Values from corrupted fixed-width exports: too short or only zero digits
pub fn is_corrupt_timestamp(value: &str) -> bool {
    if value.chars().count() < MIN_TIMESTAMP_LEN {
        return true;
    }
    let mut digits = value.chars().filter(|c| c.is_ascii_digit()).peekable();
    digits.peek().is_some() && digits.all(|c| c == '0')
}

/// Whole seconds between start and stop; null unless both are known
pub fn derive_duration_seconds(
    start: Option<NaiveDateTime>,
    stop: Option<NaiveDateTime>,
) -> Option<f64> {
    let (start, stop) = (start?, stop?);
    Some((stop - start).num_seconds() as f64)
}
