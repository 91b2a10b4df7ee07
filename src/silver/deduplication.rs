//! Trip deduplication using the strongest available identity key
//!
//! Newer exports carry a per-ride identifier; older ones do not. When a
//! ride id is present and populated for enough rows it is the key. Otherwise
//! a composite key is assembled from whichever of start time, stop time, bike
//! and start station the source carried, with sentinel placeholders for
//! missing values so rows missing the same fields still compare equal.

use crate::constants::{OUTPUT_TIMESTAMP_FORMAT, sentinels};
use crate::models::{CanonicalColumn, ColumnSet, TripRecord};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, info};

/// Columns a composite key can be built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyColumn {
    StartTime,
    StopTime,
    BikeId,
    StartStationId,
}

impl KeyColumn {
    /// Key components in key order
    pub const ALL: [KeyColumn; 4] = [
        KeyColumn::StartTime,
        KeyColumn::StopTime,
        KeyColumn::BikeId,
        KeyColumn::StartStationId,
    ];

    pub fn column(&self) -> CanonicalColumn {
        match self {
            KeyColumn::StartTime => CanonicalColumn::StartTime,
            KeyColumn::StopTime => CanonicalColumn::StopTime,
            KeyColumn::BikeId => CanonicalColumn::BikeId,
            KeyColumn::StartStationId => CanonicalColumn::StartStationId,
        }
    }

    /// Key text for one record, or the column's sentinel when null
    fn component(&self, record: &TripRecord) -> String {
        let value = match self {
            KeyColumn::StartTime => record
                .start_time
                .map(|t| t.format(OUTPUT_TIMESTAMP_FORMAT).to_string()),
            KeyColumn::StopTime => record
                .stop_time
                .map(|t| t.format(OUTPUT_TIMESTAMP_FORMAT).to_string()),
            KeyColumn::BikeId => record.bike_id.map(|id| id.to_string()),
            KeyColumn::StartStationId => record.start_station_id.map(|id| id.to_string()),
        };
        value.unwrap_or_else(|| self.sentinel().to_string())
    }

    fn sentinel(&self) -> &'static str {
        match self {
            KeyColumn::StartTime => sentinels::NULL_START,
            KeyColumn::StopTime => sentinels::NULL_STOP,
            KeyColumn::BikeId => sentinels::NULL_BIKE,
            KeyColumn::StartStationId => sentinels::NULL_STATION,
        }
    }
}

/// Which identity key deduplication used
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupStrategy {
    /// Ride id alone
    RideId,
    /// Present subset of start time, stop time, bike id, start station id
    Composite(Vec<KeyColumn>),
    /// No key material; rows passed through untouched
    PassThrough,
}

impl fmt::Display for DedupStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupStrategy::RideId => f.write_str("ride_id"),
            DedupStrategy::Composite(columns) => {
                let names: Vec<&str> = columns.iter().map(|c| c.column().as_str()).collect();
                write!(f, "composite({})", names.join(", "))
            }
            DedupStrategy::PassThrough => f.write_str("pass-through"),
        }
    }
}

/// Rows kept by deduplication and how they were keyed
#[derive(Debug, Clone)]
pub struct DedupOutcome {
    pub records: Vec<TripRecord>,
    pub strategy: DedupStrategy,
    pub duplicates_removed: usize,
}

/// Pick the identity key for a table
pub fn choose_strategy(
    records: &[TripRecord],
    columns: &ColumnSet,
    ride_id_min_population: f64,
) -> DedupStrategy {
    if columns.contains(&CanonicalColumn::RideId) && !records.is_empty() {
        let populated = records.iter().filter(|r| r.ride_id.is_some()).count();
        let share = populated as f64 / records.len() as f64;
        if share >= ride_id_min_population {
            return DedupStrategy::RideId;
        }
        debug!(
            "ride_id populated for {:.1}% of rows, below threshold; using composite key",
            share * 100.0
        );
    }

    let present: Vec<KeyColumn> = KeyColumn::ALL
        .into_iter()
        .filter(|key| columns.contains(&key.column()))
        .collect();

    if present.is_empty() {
        DedupStrategy::PassThrough
    } else {
        DedupStrategy::Composite(present)
    }
}

/// Remove duplicate trips, keeping the first occurrence of each key
pub fn deduplicate_trips(
    records: Vec<TripRecord>,
    columns: &ColumnSet,
    ride_id_min_population: f64,
) -> DedupOutcome {
    let strategy = choose_strategy(&records, columns, ride_id_min_population);
    let input_count = records.len();

    let kept: Vec<TripRecord> = match &strategy {
        DedupStrategy::PassThrough => records,
        DedupStrategy::RideId => {
            let mut seen = HashSet::new();
            records
                .into_iter()
                .filter(|record| match record.ride_id {
                    Some(id) => seen.insert(id),
                    None => true,
                })
                .collect()
        }
        DedupStrategy::Composite(key_columns) => {
            let mut seen = HashSet::new();
            records
                .into_iter()
                .filter(|record| seen.insert(composite_key(record, key_columns)))
                .collect()
        }
    };

    let duplicates_removed = input_count - kept.len();
    info!(
        "Deduplication ({}): {} -> {} rows ({} duplicates removed)",
        strategy,
        input_count,
        kept.len(),
        duplicates_removed
    );

    DedupOutcome {
        records: kept,
        strategy,
        duplicates_removed,
    }
}

/// Key built from the given columns with sentinel placeholders for nulls
pub fn composite_key(record: &TripRecord, key_columns: &[KeyColumn]) -> Vec<String> {
    key_columns.iter().map(|key| key.component(record)).collect()
}

/// Tuple of (distinct_keys, duplicate_groups, total_duplicates) under a strategy
pub fn analyze_duplicate_patterns(
    records: &[TripRecord],
    strategy: &DedupStrategy,
) -> (usize, usize, usize) {
    let mut groups: HashMap<Vec<String>, usize> = HashMap::new();

    for record in records {
        let key = match strategy {
            DedupStrategy::PassThrough => return (records.len(), 0, 0),
            DedupStrategy::RideId => match record.ride_id {
                Some(id) => vec![id.to_string()],
                None => continue,
            },
            DedupStrategy::Composite(columns) => composite_key(record, columns),
        };
        *groups.entry(key).or_insert(0) += 1;
    }

    let distinct = groups.len();
    let duplicate_groups = groups.values().filter(|&&count| count > 1).count();
    let total_duplicates = groups.values().map(|&count| count.saturating_sub(1)).sum();

    (distinct, duplicate_groups, total_duplicates)
}
