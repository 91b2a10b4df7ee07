//! Quality filtering for trip records
//!
//! Two row-level predicates, ANDed: duration must be null or strictly
//! positive, and when both timestamps are known the stop must not precede the
//! start. Missing values are tolerated; only contradictory values drop a row.

use crate::models::TripRecord;
use tracing::{debug, info};

use super::stats::{IssueTally, QualityIssue};

/// Rows surviving the filter and why the others were dropped
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub records: Vec<TripRecord>,
    pub removed: usize,
    pub issues: IssueTally,
}

/// Apply quality filters to trip records
///
/// # Arguments
///
/// * `records` - Deduplicated records in input order
///
/// # Returns
///
/// The surviving records with per-reason drop counts
pub fn apply_quality_filter(records: Vec<TripRecord>) -> FilterOutcome {
    let input_count = records.len();
    let mut outcome = FilterOutcome {
        records: Vec::with_capacity(input_count),
        ..FilterOutcome::default()
    };

    for record in records {
        match passes_quality_filter(&record) {
            Ok(()) => outcome.records.push(record),
            Err(issue) => {
                outcome.removed += 1;
                outcome.issues.record(issue);
            }
        }
    }

    info!(
        "Quality filtering complete: {} -> {} rows ({} filtered out: {})",
        input_count,
        outcome.records.len(),
        outcome.removed,
        outcome.issues.summary()
    );

    outcome
}

/// Check one record; the first failing predicate names the issue
pub fn passes_quality_filter(record: &TripRecord) -> Result<(), QualityIssue> {
    if let Some(duration) = record.trip_duration {
        if duration <= 0.0 || duration.is_nan() {
            debug!("Dropping trip with non-positive duration {}", duration);
            return Err(QualityIssue::NonPositiveDuration);
        }
    }

    if let (Some(start), Some(stop)) = (record.start_time, record.stop_time) {
        if stop < start {
            debug!("Dropping trip ending before it starts: {} > {}", start, stop);
            return Err(QualityIssue::TemporalInversion);
        }
    }

    Ok(())
}
