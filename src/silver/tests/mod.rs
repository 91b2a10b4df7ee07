//! Tests for the Silver stage components

pub mod deduplication_tests;
pub mod quality_filter_tests;

// Test helper functions and fixtures
use crate::models::TripRecord;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;

/// Build a string-typed frame from named columns of optional values
pub fn text_frame(columns: &[(&str, Vec<Option<&str>>)]) -> DataFrame {
    let columns: Vec<Column> = columns
        .iter()
        .map(|(name, values)| Column::new(PlSmallStr::from(*name), values.clone()))
        .collect();
    DataFrame::new(columns).unwrap()
}

/// Timestamp on 2019-06-01 at the given time
pub fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, 6, 1)
        .unwrap()
        .and_hms_opt(hour, minute, second)
        .unwrap()
}

/// A complete, valid trip record
pub fn create_trip(ride_id: Option<i64>, start: NaiveDateTime, stop: NaiveDateTime) -> TripRecord {
    TripRecord {
        trip_duration: Some((stop - start).num_seconds() as f64),
        start_time: Some(start),
        stop_time: Some(stop),
        start_station_name: Some("W 21 St & 6 Ave".to_string()),
        user_type: Some("Subscriber".to_string()),
        start_station_id: Some(435),
        end_station_id: Some(509),
        bike_id: Some(33_423),
        ride_id,
    }
}
