//! Core data structures for the bike-share ETL.
//!
//! Defines the canonical column vocabulary, the typed trip record carried
//! through the Silver stage, year partitions and output units, and the
//! per-year quality metrics record.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Every column the Silver stage understands after normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CanonicalColumn {
    TripDuration,
    StartTime,
    StopTime,
    StartStationName,
    UserType,
    StartStationId,
    EndStationId,
    BikeId,
    RideId,
}

impl CanonicalColumn {
    pub const ALL: [CanonicalColumn; 9] = [
        CanonicalColumn::TripDuration,
        CanonicalColumn::StartTime,
        CanonicalColumn::StopTime,
        CanonicalColumn::StartStationName,
        CanonicalColumn::UserType,
        CanonicalColumn::StartStationId,
        CanonicalColumn::EndStationId,
        CanonicalColumn::BikeId,
        CanonicalColumn::RideId,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalColumn::TripDuration => "trip_duration",
            CanonicalColumn::StartTime => "start_time",
            CanonicalColumn::StopTime => "stop_time",
            CanonicalColumn::StartStationName => "start_station_name",
            CanonicalColumn::UserType => "user_type",
            CanonicalColumn::StartStationId => "start_station_id",
            CanonicalColumn::EndStationId => "end_station_id",
            CanonicalColumn::BikeId => "bike_id",
            CanonicalColumn::RideId => "ride_id",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|column| column.as_str() == name)
    }
}

impl fmt::Display for CanonicalColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Columns present in a normalized table, resolved once per file
pub type ColumnSet = BTreeSet<CanonicalColumn>;

/// A row after column normalization; timestamps are still unparsed text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTrip {
    pub trip_duration: Option<f64>,
    pub start_time: Option<String>,
    pub stop_time: Option<String>,
    pub start_station_name: Option<String>,
    pub user_type: Option<String>,
    pub start_station_id: Option<i64>,
    pub end_station_id: Option<i64>,
    pub bike_id: Option<i64>,
    pub ride_id: Option<i64>,
}

/// A row with resolved timestamps, carried through dedup and quality filtering
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripRecord {
    pub trip_duration: Option<f64>,
    pub start_time: Option<NaiveDateTime>,
    pub stop_time: Option<NaiveDateTime>,
    pub start_station_name: Option<String>,
    pub user_type: Option<String>,
    pub start_station_id: Option<i64>,
    pub end_station_id: Option<i64>,
    pub bike_id: Option<i64>,
    pub ride_id: Option<i64>,
}

/// Source files sharing a 4-digit year prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearPartition {
    pub year: u16,
    pub files: Vec<PathBuf>,
}

/// One output file's worth of work: a whole year or one chunk of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputUnit {
    pub year: u16,
    /// 1-based chunk number, `None` when the year is written as one file
    pub chunk: Option<usize>,
    pub files: Vec<PathBuf>,
    pub output_path: PathBuf,
}

impl OutputUnit {
    pub fn label(&self) -> String {
        match self.chunk {
            Some(chunk) => format!("{} chunk {}", self.year, chunk),
            None => self.year.to_string(),
        }
    }
}

/// Lifecycle of an output unit
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionState {
    Discovered,
    SkippedExisting,
    Processing,
    Completed(QualityMetrics),
    NoValidData,
}

/// Per-year quality metrics, persisted with upsert by `year`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub year: String,
    pub raw_records: usize,
    pub after_parsing: usize,
    pub after_dedup: usize,
    pub after_quality: usize,
    pub final_records: usize,
    pub duplicates_removed: usize,
    pub quality_filtered: usize,
    pub null_duration_final: usize,
    pub null_start_time_final: usize,
    pub null_station_final: usize,
    pub null_user_type_final: usize,
    pub pct_trip_duration_final: f64,
    pub pct_start_time_final: f64,
    pub pct_start_station_name_final: f64,
    pub pct_user_type_final: f64,
    pub process_timestamp: String,
}

impl QualityMetrics {
    /// Share of raw rows that reached the canonical output
    pub fn retention_pct(&self) -> f64 {
        if self.raw_records == 0 {
            0.0
        } else {
            (self.final_records as f64 / self.raw_records as f64) * 100.0
        }
    }

    /// Stage counts must reconcile exactly
    pub fn is_conserved(&self) -> bool {
        self.after_parsing.checked_sub(self.duplicates_removed) == Some(self.after_dedup)
            && self.after_dedup.checked_sub(self.quality_filtered) == Some(self.after_quality)
            && self.after_quality == self.final_records
    }
}
