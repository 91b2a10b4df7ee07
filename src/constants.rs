//! Application constants for the bike-share ETL
//!
//! Canonical column vocabulary, historical column aliases, missing-value
//! tokens, timestamp formats and store table names.

// =============================================================================
// Canonical Schema
// =============================================================================

/// Columns written to every canonical per-year file, in output order
pub const CANONICAL_OUTPUT_COLUMNS: &[&str] =
    &["trip_duration", "start_time", "start_station_name", "user_type"];

/// Columns of which a source file must carry at least one to be usable
pub const REQUIRED_ANY_OF: &[&str] = &["trip_duration", "start_time", "stop_time"];

// =============================================================================
// Column Aliases
// =============================================================================

/// Historical column aliases (already case-folded) and their canonical names
pub const DEFAULT_SYNONYMS: &[(&str, &str)] = &[
    ("tripduration", "trip_duration"),
    ("trip_duration_seconds", "trip_duration"),
    ("duration_sec", "trip_duration"),
    ("ride_length", "trip_duration"),
    ("bikeid", "bike_id"),
    ("starttime", "start_time"),
    ("started_at", "start_time"),
    ("stoptime", "stop_time"),
    ("ended_at", "stop_time"),
    ("usertype", "user_type"),
    ("member_casual", "user_type"),
];

// =============================================================================
// Parsing
// =============================================================================

/// Tokens read as missing values in source files
pub const DEFAULT_NULL_VALUES: &[&str] = &["", "\\N", "NULL"];

/// Timestamp formats, attempted in order (first match wins)
pub const DEFAULT_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Shortest string that can hold a date; anything shorter is corrupt
pub const MIN_TIMESTAMP_LEN: usize = 10;

/// Format used when writing timestamps to canonical output
pub const OUTPUT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// =============================================================================
// Deduplication
// =============================================================================

/// Minimum share of rows with a ride id before it is trusted as identity key
pub const DEFAULT_RIDE_ID_MIN_POPULATION: f64 = 0.5;

/// Composite-key placeholders for missing components
pub mod sentinels {
    pub const NULL_START: &str = "NULL_START";
    pub const NULL_STOP: &str = "NULL_STOP";
    pub const NULL_BIKE: &str = "NULL_BIKE";
    pub const NULL_STATION: &str = "NULL_STATION";
}

// =============================================================================
// Year Partitions and Output
// =============================================================================

/// Files per chunk before a year is split into several output units
pub const DEFAULT_CHUNK_SIZE: usize = 15;

/// Middle part of output names: `{year}-{prefix}.csv`
pub const DEFAULT_OUTPUT_PREFIX: &str = "citibike";

/// Suffix of in-flight output files, renamed into place on success
pub const PARTIAL_SUFFIX: &str = "partial";

pub const DEFAULT_SOURCE_DIR: &str = "data/bronze";
pub const DEFAULT_SILVER_DIR: &str = "data/silver";
pub const DEFAULT_DATABASE_PATH: &str = "data/database.db";

// =============================================================================
// Trip Store
// =============================================================================

pub mod tables {
    pub const TRIPS: &str = "trips";
    pub const LOADED_FILES: &str = "loaded_files";
    pub const QUALITY_METRICS: &str = "silver_quality_metrics";
    pub const TRIPS_PER_STATION_DAY: &str = "trips_per_station_day";
    pub const AVG_DURATION_BY_HOUR: &str = "avg_duration_by_hour";
    pub const TOP_STATIONS_MONTHLY: &str = "top_stations_monthly";
    pub const USER_TYPE_SUMMARY: &str = "user_type_summary";
}

/// Rows per prepared-statement batch between progress updates while loading
pub const LOAD_PROGRESS_INTERVAL: usize = 10_000;

/// Number of stations kept per month in the monthly ranking
pub const TOP_STATIONS_PER_MONTH: usize = 10;
