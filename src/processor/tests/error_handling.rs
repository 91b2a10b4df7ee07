//! Error handling integration tests

use super::*;
use crate::error::EtlError;
use crate::models::PartitionState;
use crate::processor::{UnitOutcome, YearBatchProcessor};
use crate::store::TripStore;
use crate::store::metrics::fetch_metrics;

#[test]
fn test_nonexistent_source_dir() {
    let temp_dir = TempDir::new().unwrap();
    let (_, config) = test_layout(&temp_dir);
    let missing = temp_dir.path().join("nonexistent");

    let processor = YearBatchProcessor::new(config.with_source_dir(&missing)).unwrap();
    let store = TripStore::open_in_memory().unwrap();

    match processor.run(&store).unwrap_err() {
        EtlError::SourceDirNotFound { path } => assert_eq!(path, missing),
        other => panic!("Expected SourceDirNotFound error, got {other}"),
    }
}

#[test]
fn test_invalid_config_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let (_, config) = test_layout(&temp_dir);

    assert!(YearBatchProcessor::new(config.with_chunk_size(0)).is_err());
}

#[test]
fn test_bad_file_is_skipped_and_year_continues() {
    let temp_dir = TempDir::new().unwrap();
    let (bronze, config) = test_layout(&temp_dir);
    write_file(&bronze, "2015-01.csv", "usertype,gender\n", &["Subscriber,1"]);
    write_file(
        &bronze,
        "2015-02.csv",
        LEGACY_HEADER,
        &["60,2015-02-01 10:00:00,2015-02-01 10:01:00,1,A,1,Subscriber"],
    );

    let processor = YearBatchProcessor::new(config).unwrap();
    let store = TripStore::open_in_memory().unwrap();
    let summary = processor.run(&store).unwrap();

    assert_eq!(summary.files_failed(), 1);
    assert_eq!(summary.files_read(), 1);
    let metrics = summary.partitions[0].metrics().unwrap();
    // Rows of the rejected file are still counted as raw input
    assert_eq!(metrics.raw_records, 2);
    assert_eq!(metrics.after_parsing, 1);
}

#[test]
fn test_year_without_valid_rows_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let (bronze, config) = test_layout(&temp_dir);
    write_file(
        &bronze,
        "2013-07.csv",
        LEGACY_HEADER,
        &["-1,2013-07-01 10:00:00,2013-07-01 10:01:00,1,A,1,Subscriber"],
    );
    write_file(&bronze, "2014-01.csv", "", &[]);

    let processor = YearBatchProcessor::new(config.clone()).unwrap();
    let store = TripStore::open_in_memory().unwrap();
    let summary = processor.run(&store).unwrap();

    assert_eq!(summary.years_without_data(), 2);
    assert!(summary
        .partitions
        .iter()
        .all(|p| p.state == PartitionState::NoValidData));
    assert!(!config.silver_dir.join("2013-citibike.csv").exists());
    assert!(fetch_metrics(store.connection()).unwrap().is_empty());
}

#[test]
fn test_write_failure_is_reported_not_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let (bronze, config) = test_layout(&temp_dir);
    write_file(
        &bronze,
        "2015-01.csv",
        LEGACY_HEADER,
        &["60,2015-01-01 10:00:00,2015-01-01 10:01:00,1,A,1,Subscriber"],
    );
    write_file(
        &bronze,
        "2016-01.csv",
        LEGACY_HEADER,
        &["60,2016-01-01 10:00:00,2016-01-01 10:01:00,1,A,1,Subscriber"],
    );

    // A plain file where the silver directory should be makes every write fail
    std::fs::write(&config.silver_dir, "not a directory").unwrap();

    let processor = YearBatchProcessor::new(config).unwrap();
    let store = TripStore::open_in_memory().unwrap();
    let summary = processor.run(&store).unwrap();

    assert_eq!(summary.partitions.len(), 2);
    assert_eq!(summary.write_failures(), 2);
    assert!(matches!(
        summary.partitions[0].units[0].outcome,
        UnitOutcome::WriteFailed(_)
    ));
    assert!(fetch_metrics(store.connection()).unwrap().is_empty());
}
