//! Tests for quality filtering

use super::*;
use crate::silver::quality_filter::{apply_quality_filter, passes_quality_filter};
use crate::silver::stats::QualityIssue;

#[test]
fn test_valid_trip_passes() {
    let record = create_trip(Some(1), at(8, 0, 0), at(8, 10, 0));
    assert_eq!(passes_quality_filter(&record), Ok(()));
}

#[test]
fn test_non_positive_duration_is_dropped() {
    let mut zero = create_trip(None, at(8, 0, 0), at(8, 10, 0));
    zero.trip_duration = Some(0.0);
    let mut negative = zero.clone();
    negative.trip_duration = Some(-12.0);

    assert_eq!(passes_quality_filter(&zero), Err(QualityIssue::NonPositiveDuration));
    assert_eq!(passes_quality_filter(&negative), Err(QualityIssue::NonPositiveDuration));
}

#[test]
fn test_stop_before_start_is_dropped() {
    let mut record = create_trip(None, at(8, 10, 0), at(8, 0, 0));
    record.trip_duration = Some(600.0);

    assert_eq!(passes_quality_filter(&record), Err(QualityIssue::TemporalInversion));
}

#[test]
fn test_zero_length_interval_is_not_an_inversion() {
    let mut record = create_trip(None, at(8, 0, 0), at(8, 0, 0));
    record.trip_duration = None;
    assert_eq!(passes_quality_filter(&record), Ok(()));
}

#[test]
fn test_nulls_are_tolerated() {
    let record = TripRecord {
        start_time: Some(at(8, 0, 0)),
        ..TripRecord::default()
    };
    assert_eq!(passes_quality_filter(&record), Ok(()));
    assert_eq!(passes_quality_filter(&TripRecord::default()), Ok(()));
}

#[test]
fn test_apply_quality_filter_counts_reasons() {
    let mut inverted = create_trip(None, at(9, 0, 0), at(8, 0, 0));
    inverted.trip_duration = Some(60.0);
    let mut negative = create_trip(None, at(8, 0, 0), at(8, 5, 0));
    negative.trip_duration = Some(-1.0);

    let records = vec![
        create_trip(Some(1), at(8, 0, 0), at(8, 10, 0)),
        inverted,
        negative,
        create_trip(Some(2), at(10, 0, 0), at(10, 30, 0)),
    ];

    let outcome = apply_quality_filter(records);
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.removed, 2);
    assert_eq!(outcome.issues.count(QualityIssue::TemporalInversion), 1);
    assert_eq!(outcome.issues.count(QualityIssue::NonPositiveDuration), 1);

    for record in &outcome.records {
        assert!(record.trip_duration.is_none_or(|d| d > 0.0));
    }
}
