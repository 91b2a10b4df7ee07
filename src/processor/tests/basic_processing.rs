//! Basic processing integration tests

use super::*;
use crate::models::PartitionState;
use crate::processor::{UnitOutcome, YearBatchProcessor};
use crate::silver::{DedupStrategy, KeyColumn, QualityIssue};
use crate::store::TripStore;
use crate::store::metrics::fetch_metrics;

#[test]
fn test_legacy_year_to_canonical_output() {
    let temp_dir = TempDir::new().unwrap();
    let (bronze, config) = test_layout(&temp_dir);
    write_file(
        &bronze,
        "2014-09-citibike-tripdata.csv",
        LEGACY_HEADER,
        &["695,2014-09-01 00:00:25,2014-09-01 00:11:58,72,Broadway & W 58 St,21409,Subscriber"],
    );

    let processor = YearBatchProcessor::new(config.clone()).unwrap();
    let store = TripStore::open_in_memory().unwrap();
    let summary = processor.run(&store).unwrap();

    assert_eq!(summary.years_completed(), 1);
    let output = config.silver_dir.join("2014-citibike.csv");
    let lines = read_lines(&output);
    assert_eq!(
        lines,
        vec![
            "trip_duration,start_time,start_station_name,user_type",
            "695,2014-09-01 00:00:25,Broadway & W 58 St,Subscriber",
        ]
    );

    let metrics = fetch_metrics(store.connection()).unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].year, "2014");
    assert_eq!(metrics[0].raw_records, 1);
    assert_eq!(metrics[0].final_records, 1);
}

#[test]
fn test_reordered_header_keeps_duration_unchanged() {
    let temp_dir = TempDir::new().unwrap();
    let (bronze, config) = test_layout(&temp_dir);
    write_file(
        &bronze,
        "2014-09.csv",
        "starttime,stoptime,tripduration,start station name,usertype\n",
        &[
            "2014-09-01 00:00:25,2014-09-01 00:11:58,695,Broadway,Subscriber",
            "2014-09-01 01:00:00,2014-09-01 01:00:30,30.5,Broadway,Customer",
        ],
    );

    let processor = YearBatchProcessor::new(config.clone()).unwrap();
    let store = TripStore::open_in_memory().unwrap();
    processor.run(&store).unwrap();

    let lines = read_lines(&config.silver_dir.join("2014-citibike.csv"));
    assert_eq!(
        lines,
        vec![
            "trip_duration,start_time,start_station_name,user_type",
            "695,2014-09-01 00:00:25,Broadway,Subscriber",
            "30.5,2014-09-01 01:00:00,Broadway,Customer",
        ]
    );
}

#[test]
fn test_ride_id_duplicates_across_files_of_a_year() {
    let temp_dir = TempDir::new().unwrap();
    let (bronze, config) = test_layout(&temp_dir);
    write_file(
        &bronze,
        "202101-divvy-tripdata.csv",
        MODERN_HEADER,
        &[
            "1,2021-01-01 08:00:00,2021-01-01 08:10:00,Clark St,member",
            "2,2021-01-01 09:00:00,2021-01-01 09:20:00,Lake Shore,casual",
        ],
    );
    write_file(
        &bronze,
        "202102-divvy-tripdata.csv",
        MODERN_HEADER,
        &["1,2021-01-01 08:00:00,2021-01-01 08:10:00,Clark St,member"],
    );

    let processor = YearBatchProcessor::new(config).unwrap();
    let store = TripStore::open_in_memory().unwrap();
    let summary = processor.run(&store).unwrap();

    let metrics = summary.partitions[0].metrics().unwrap();
    assert_eq!(metrics.raw_records, 3);
    assert_eq!(metrics.duplicates_removed, 1);
    assert_eq!(metrics.final_records, 2);
    // Durations are derived from the timestamps
    assert_eq!(metrics.null_duration_final, 0);
    assert!(metrics.is_conserved());
}

#[test]
fn test_quality_filter_and_null_duration_metrics() {
    let temp_dir = TempDir::new().unwrap();
    let (bronze, config) = test_layout(&temp_dir);
    write_file(
        &bronze,
        "2019-q1.csv",
        LEGACY_HEADER,
        &[
            "600,2019-01-01 08:00:00,2019-01-01 08:10:00,1,A,10,Subscriber",
            "600,2019-01-01 09:10:00,2019-01-01 09:00:00,1,A,11,Subscriber",
            "0,2019-01-01 10:00:00,2019-01-01 10:00:00,1,A,12,Customer",
        ],
    );
    write_file(
        &bronze,
        "2019-q2.csv",
        "started_at,member_casual\n",
        &["2019-04-01 08:00:00,member"],
    );

    let processor = YearBatchProcessor::new(config.clone()).unwrap();
    let store = TripStore::open_in_memory().unwrap();
    let summary = processor.run(&store).unwrap();

    let report = &summary.partitions[0];
    let metrics = report.metrics().unwrap();
    assert_eq!(metrics.after_parsing, 4);
    assert_eq!(metrics.quality_filtered, 2);
    assert_eq!(metrics.final_records, 2);
    assert_eq!(metrics.null_duration_final, 1);
    assert_eq!(metrics.pct_trip_duration_final, 50.0);
    assert!(metrics.is_conserved());

    let lines = read_lines(&config.silver_dir.join("2019-citibike.csv"));
    assert_eq!(lines.len(), 3);
    assert!(lines.contains(&",2019-04-01 08:00:00,,member".to_string()));
}

#[test]
fn test_output_invariants_hold() {
    let temp_dir = TempDir::new().unwrap();
    let (bronze, config) = test_layout(&temp_dir);
    write_file(
        &bronze,
        "2016-tripdata.csv",
        LEGACY_HEADER,
        &[
            "300,1/1/2016 00:00:41,1/1/2016 00:05:41,1,A,1,Subscriber",
            "-5,2016-01-01 00:00:41.3450,2016-01-01 00:10:00,2,B,2,Customer",
            ",2016-01-01 01:00:00,2016-01-01 00:59:00,3,C,3,Customer",
            "120,0000-00-00 00:00:00,2016-01-01 02:00:00,4,D,4,Subscriber",
        ],
    );

    let processor = YearBatchProcessor::new(config.clone()).unwrap();
    let store = TripStore::open_in_memory().unwrap();
    processor.run(&store).unwrap();

    let lines = read_lines(&config.silver_dir.join("2016-citibike.csv"));
    assert_eq!(lines.len(), 3);
    for line in &lines[1..] {
        let duration = line.split(',').next().unwrap();
        if !duration.is_empty() {
            assert!(duration.parse::<f64>().unwrap() > 0.0);
        }
    }
}

#[test]
fn test_unit_outcome_reports_rows_written() {
    let temp_dir = TempDir::new().unwrap();
    let (bronze, config) = test_layout(&temp_dir);
    write_file(
        &bronze,
        "2015-a.csv",
        LEGACY_HEADER,
        &["60,2015-05-01 10:00:00,2015-05-01 10:01:00,1,A,1,Subscriber"],
    );

    let processor = YearBatchProcessor::new(config).unwrap();
    let partition = crate::models::YearPartition {
        year: 2015,
        files: vec![bronze.join("2015-a.csv")],
    };
    let report = processor.process_partition(&partition);

    assert!(matches!(report.state, PartitionState::Completed(_)));
    assert_eq!(report.units[0].outcome, UnitOutcome::Written(1));
    assert_eq!(report.files_read(), 1);
}

#[test]
fn test_quality_issues_reach_partition_report() {
    let temp_dir = TempDir::new().unwrap();
    let (bronze, config) = test_layout(&temp_dir);
    write_file(
        &bronze,
        "2014-09.csv",
        LEGACY_HEADER,
        &[
            "695,2014-09-01 00:00:25,2014-09-01 00:11:58,72,Broadway,abc,Subscriber",
            "300,0000-00-00 00:00:00,2014-09-01 01:05:00,72,Broadway,5,Customer",
            "300,2014-09-01 02:10:00,2014-09-01 02:00:00,72,Broadway,6,Customer",
        ],
    );

    let processor = YearBatchProcessor::new(config).unwrap();
    let store = TripStore::open_in_memory().unwrap();
    let summary = processor.run(&store).unwrap();

    let report = &summary.partitions[0];
    let issues = report.issues();
    assert_eq!(issues.count(QualityIssue::UnparsableIdentifier), 1);
    assert_eq!(issues.count(QualityIssue::CorruptTimestamp), 1);
    assert_eq!(issues.count(QualityIssue::TemporalInversion), 1);
    assert_eq!(issues.total(), 3);

    assert_eq!(
        report.strategies(),
        vec![&DedupStrategy::Composite(KeyColumn::ALL.to_vec())]
    );
    assert_eq!(report.metrics().unwrap().final_records, 2);
}
