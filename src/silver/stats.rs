//! Quality accounting for the Silver stage
//!
//! Row-level problems are never errors: each one is recorded as a tagged
//! [`QualityIssue`] in an [`IssueTally`]. Stage checkpoints are collected in
//! [`StageCounts`] and folded into the persisted [`QualityMetrics`] record.

use crate::models::{QualityMetrics, TripRecord};
use std::collections::BTreeMap;
use std::fmt;

/// Why a value was nulled or a row was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QualityIssue {
    /// Identifier text that is not an integer
    UnparsableIdentifier,
    /// Duration text that is neither a number nor a clock duration
    UnparsableDuration,
    /// Timestamp that is all zeros or too short to hold a date
    CorruptTimestamp,
    /// Timestamp matching none of the known formats
    UnparsableTimestamp,
    /// Zero or negative duration (row dropped)
    NonPositiveDuration,
    /// Stop before start (row dropped)
    TemporalInversion,
}

impl QualityIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityIssue::UnparsableIdentifier => "unparsable_identifier",
            QualityIssue::UnparsableDuration => "unparsable_duration",
            QualityIssue::CorruptTimestamp => "corrupt_timestamp",
            QualityIssue::UnparsableTimestamp => "unparsable_timestamp",
            QualityIssue::NonPositiveDuration => "non_positive_duration",
            QualityIssue::TemporalInversion => "temporal_inversion",
        }
    }

    /// Issues that remove the row rather than null one value
    pub fn drops_row(&self) -> bool {
        matches!(
            self,
            QualityIssue::NonPositiveDuration | QualityIssue::TemporalInversion
        )
    }
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Occurrence counts per quality issue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueTally {
    counts: BTreeMap<QualityIssue, usize>,
}

impl IssueTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, issue: QualityIssue) {
        *self.counts.entry(issue).or_insert(0) += 1;
    }

    pub fn count(&self, issue: QualityIssue) -> usize {
        self.counts.get(&issue).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn merge(&mut self, other: &IssueTally) {
        for (issue, count) in &other.counts {
            *self.counts.entry(*issue).or_insert(0) += count;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (QualityIssue, usize)> + '_ {
        self.counts.iter().map(|(issue, count)| (*issue, *count))
    }

    /// One-line rendering for logs, e.g. `corrupt_timestamp=3, temporal_inversion=1`
    pub fn summary(&self) -> String {
        if self.counts.is_empty() {
            return "none".to_string();
        }
        self.counts
            .iter()
            .map(|(issue, count)| format!("{issue}={count}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Row counts at the four Silver checkpoints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    /// Rows read from source files before any transform
    pub raw: usize,
    /// Rows after normalization and timestamp resolution
    pub after_parsing: usize,
    /// Rows after deduplication
    pub after_dedup: usize,
    /// Rows after quality filtering
    pub after_quality: usize,
}

impl StageCounts {
    pub fn duplicates_removed(&self) -> usize {
        self.after_parsing.saturating_sub(self.after_dedup)
    }

    pub fn quality_filtered(&self) -> usize {
        self.after_dedup.saturating_sub(self.after_quality)
    }

    pub fn merge(&mut self, other: &StageCounts) {
        self.raw += other.raw;
        self.after_parsing += other.after_parsing;
        self.after_dedup += other.after_dedup;
        self.after_quality += other.after_quality;
    }
}

/// Null counts of the four canonical columns among final rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NullCounts {
    pub trip_duration: usize,
    pub start_time: usize,
    pub start_station_name: usize,
    pub user_type: usize,
}

impl NullCounts {
    pub fn from_records(records: &[TripRecord]) -> Self {
        records.iter().fold(Self::default(), |mut acc, record| {
            acc.trip_duration += usize::from(record.trip_duration.is_none());
            acc.start_time += usize::from(record.start_time.is_none());
            acc.start_station_name += usize::from(record.start_station_name.is_none());
            acc.user_type += usize::from(record.user_type.is_none());
            acc
        })
    }

    pub fn merge(&mut self, other: &NullCounts) {
        self.trip_duration += other.trip_duration;
        self.start_time += other.start_time;
        self.start_station_name += other.start_station_name;
        self.user_type += other.user_type;
    }
}

/// Build the persisted metrics record from stage counts and final null counts
pub fn build_quality_metrics(
    year: &str,
    stages: &StageCounts,
    nulls: &NullCounts,
    process_timestamp: String,
) -> QualityMetrics {
    let final_records = stages.after_quality;
    QualityMetrics {
        year: year.to_string(),
        raw_records: stages.raw,
        after_parsing: stages.after_parsing,
        after_dedup: stages.after_dedup,
        after_quality: stages.after_quality,
        final_records,
        duplicates_removed: stages.duplicates_removed(),
        quality_filtered: stages.quality_filtered(),
        null_duration_final: nulls.trip_duration,
        null_start_time_final: nulls.start_time,
        null_station_final: nulls.start_station_name,
        null_user_type_final: nulls.user_type,
        pct_trip_duration_final: null_percentage(nulls.trip_duration, final_records),
        pct_start_time_final: null_percentage(nulls.start_time, final_records),
        pct_start_station_name_final: null_percentage(nulls.start_station_name, final_records),
        pct_user_type_final: null_percentage(nulls.user_type, final_records),
        process_timestamp,
    }
}

/// Percentage rounded to two decimals; zero rows yields 0.0
pub fn null_percentage(nulls: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = (nulls as f64 / total as f64) * 100.0;
    (pct * 100.0).round() / 100.0
}
