//! Tests for trip deduplication

use super::*;
use crate::models::{CanonicalColumn, ColumnSet};
use crate::silver::deduplication::{
    DedupStrategy, KeyColumn, analyze_duplicate_patterns, choose_strategy, composite_key,
    deduplicate_trips,
};

fn all_columns() -> ColumnSet {
    CanonicalColumn::ALL.into_iter().collect()
}

fn legacy_columns() -> ColumnSet {
    CanonicalColumn::ALL
        .into_iter()
        .filter(|c| *c != CanonicalColumn::RideId)
        .collect()
}

#[test]
fn test_shared_ride_id_keeps_first() {
    let mut first = create_trip(Some(1), at(8, 0, 0), at(8, 10, 0));
    first.user_type = Some("member".to_string());
    let mut second = create_trip(Some(1), at(9, 0, 0), at(9, 10, 0));
    second.user_type = Some("casual".to_string());

    let outcome = deduplicate_trips(vec![first, second], &all_columns(), 0.5);

    assert_eq!(outcome.strategy, DedupStrategy::RideId);
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.duplicates_removed, 1);
    assert_eq!(outcome.records[0].user_type.as_deref(), Some("member"));
}

#[test]
fn test_null_ride_ids_are_kept() {
    let records = vec![
        create_trip(Some(1), at(8, 0, 0), at(8, 10, 0)),
        create_trip(Some(2), at(8, 0, 0), at(8, 10, 0)),
        create_trip(None, at(8, 0, 0), at(8, 10, 0)),
        create_trip(None, at(8, 0, 0), at(8, 10, 0)),
    ];

    let outcome = deduplicate_trips(records, &all_columns(), 0.5);
    assert_eq!(outcome.strategy, DedupStrategy::RideId);
    assert_eq!(outcome.records.len(), 4);
}

#[test]
fn test_sparse_ride_id_falls_back_to_composite_key() {
    let records = vec![
        create_trip(Some(1), at(8, 0, 0), at(8, 10, 0)),
        create_trip(None, at(8, 0, 0), at(8, 10, 0)),
        create_trip(None, at(9, 0, 0), at(9, 10, 0)),
    ];

    let strategy = choose_strategy(&records, &all_columns(), 0.5);
    assert!(matches!(strategy, DedupStrategy::Composite(_)));

    let outcome = deduplicate_trips(records, &all_columns(), 0.5);
    assert_eq!(outcome.records.len(), 2);
}

#[test]
fn test_composite_key_uses_present_columns_only() {
    let columns: ColumnSet = [CanonicalColumn::StartTime, CanonicalColumn::BikeId]
        .into_iter()
        .collect();

    let strategy = choose_strategy(&[], &columns, 0.5);
    assert_eq!(
        strategy,
        DedupStrategy::Composite(vec![KeyColumn::StartTime, KeyColumn::BikeId])
    );
}

#[test]
fn test_composite_key_sentinels() {
    let mut record = create_trip(None, at(8, 0, 0), at(8, 10, 0));
    record.stop_time = None;
    record.bike_id = None;

    let key = composite_key(&record, &KeyColumn::ALL);
    assert_eq!(key, vec!["2019-06-01 08:00:00", "NULL_STOP", "NULL_BIKE", "435"]);
}

#[test]
fn test_rows_missing_the_same_fields_collide() {
    let mut a = create_trip(None, at(8, 0, 0), at(8, 10, 0));
    a.stop_time = None;
    a.start_station_name = Some("A".to_string());
    let mut b = a.clone();
    b.start_station_name = Some("B".to_string());

    let outcome = deduplicate_trips(vec![a, b], &legacy_columns(), 0.5);
    assert_eq!(outcome.records.len(), 1);
}

#[test]
fn test_no_key_columns_passes_through() {
    let columns: ColumnSet = [CanonicalColumn::TripDuration, CanonicalColumn::UserType]
        .into_iter()
        .collect();
    let records = vec![
        create_trip(None, at(8, 0, 0), at(8, 10, 0)),
        create_trip(None, at(8, 0, 0), at(8, 10, 0)),
    ];

    let outcome = deduplicate_trips(records, &columns, 0.5);
    assert_eq!(outcome.strategy, DedupStrategy::PassThrough);
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.duplicates_removed, 0);
}

#[test]
fn test_deduplication_is_idempotent() {
    let records = vec![
        create_trip(None, at(8, 0, 0), at(8, 10, 0)),
        create_trip(None, at(8, 0, 0), at(8, 10, 0)),
        create_trip(None, at(8, 5, 0), at(8, 15, 0)),
        create_trip(None, at(8, 5, 0), at(8, 15, 0)),
        create_trip(None, at(9, 0, 0), at(9, 30, 0)),
    ];

    let once = deduplicate_trips(records, &legacy_columns(), 0.5);
    assert_eq!(once.records.len(), 3);

    let twice = deduplicate_trips(once.records.clone(), &legacy_columns(), 0.5);
    assert_eq!(twice.records, once.records);
    assert_eq!(twice.duplicates_removed, 0);
}

#[test]
fn test_analyze_duplicate_patterns() {
    let records = vec![
        create_trip(Some(1), at(8, 0, 0), at(8, 10, 0)),
        create_trip(Some(1), at(8, 0, 0), at(8, 10, 0)),
        create_trip(Some(1), at(8, 0, 0), at(8, 10, 0)),
        create_trip(Some(2), at(8, 0, 0), at(8, 10, 0)),
    ];

    let (distinct, groups, duplicates) =
        analyze_duplicate_patterns(&records, &DedupStrategy::RideId);
    assert_eq!(distinct, 2);
    assert_eq!(groups, 1);
    assert_eq!(duplicates, 2);
}
