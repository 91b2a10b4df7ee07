//! Gold aggregate tables built from loaded trips
//!
//! All four tables are dropped and rebuilt inside one transaction, so readers
//! never observe a partially refreshed set. Only trips with a start time
//! contribute; the trips table itself is left untouched.

use crate::constants::{TOP_STATIONS_PER_MONTH, tables};
use crate::error::Result;
use std::time::Instant;
use tracing::{debug, info};

use super::TripStore;

/// Row counts of the rebuilt aggregate tables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateSummary {
    pub source_trips: u64,
    pub station_days: u64,
    pub hours: u64,
    pub monthly_rankings: u64,
    pub user_types: u64,
}

/// Rebuilds the Gold tables
#[derive(Debug, Default)]
pub struct Aggregator;

impl Aggregator {
    pub fn new() -> Self {
        Self
    }

    /// Drop and recreate every aggregate table in one transaction
    pub fn rebuild(&self, store: &mut TripStore) -> Result<AggregateSummary> {
        let start = Instant::now();
        let tx = store.connection_mut().transaction()?;

        for (table, select) in aggregate_definitions() {
            debug!("Rebuilding {}", table);
            tx.execute_batch(&format!(
                "DROP TABLE IF EXISTS {table}; CREATE TABLE {table} AS {select};"
            ))?;
        }

        let count = |table: &str| -> rusqlite::Result<u64> {
            tx.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n.max(0) as u64)
        };

        let summary = AggregateSummary {
            source_trips: tx
                .query_row(
                    &format!(
                        "SELECT COUNT(*) FROM {} WHERE start_time IS NOT NULL",
                        tables::TRIPS
                    ),
                    [],
                    |row| row.get::<_, i64>(0),
                )?
                .max(0) as u64,
            station_days: count(tables::TRIPS_PER_STATION_DAY)?,
            hours: count(tables::AVG_DURATION_BY_HOUR)?,
            monthly_rankings: count(tables::TOP_STATIONS_MONTHLY)?,
            user_types: count(tables::USER_TYPE_SUMMARY)?,
        };

        tx.commit()?;
        info!(
            "Rebuilt gold tables from {} trips in {:.2}s",
            summary.source_trips,
            start.elapsed().as_secs_f64()
        );

        Ok(summary)
    }
}

/// Table name and defining query for each aggregate
fn aggregate_definitions() -> [(&'static str, String); 4] {
    let trips = tables::TRIPS;
    [
        (
            tables::TRIPS_PER_STATION_DAY,
            format!(
                "SELECT start_station_name,
                        DATE(start_time) AS trip_date,
                        COUNT(*) AS trip_count
                 FROM {trips}
                 WHERE start_time IS NOT NULL
                 GROUP BY start_station_name, trip_date"
            ),
        ),
        (
            tables::AVG_DURATION_BY_HOUR,
            format!(
                "SELECT CAST(strftime('%H', start_time) AS INTEGER) AS hour,
                        AVG(trip_duration) AS avg_duration,
                        COUNT(*) AS trip_count
                 FROM {trips}
                 WHERE start_time IS NOT NULL
                 GROUP BY hour"
            ),
        ),
        (
            tables::TOP_STATIONS_MONTHLY,
            format!(
                "SELECT year_month, start_station_name, trip_count, rank
                 FROM (
                     SELECT year_month, start_station_name, trip_count,
                            ROW_NUMBER() OVER (
                                PARTITION BY year_month
                                ORDER BY trip_count DESC, start_station_name
                            ) AS rank
                     FROM (
                         SELECT strftime('%Y-%m', start_time) AS year_month,
                                start_station_name,
                                COUNT(*) AS trip_count
                         FROM {trips}
                         WHERE start_time IS NOT NULL AND start_station_name IS NOT NULL
                         GROUP BY year_month, start_station_name
                     )
                 )
                 WHERE rank <= {TOP_STATIONS_PER_MONTH}"
            ),
        ),
        (
            tables::USER_TYPE_SUMMARY,
            format!(
                "SELECT user_type,
                        COUNT(*) AS total_trips,
                        AVG(trip_duration) AS avg_duration,
                        MIN(trip_duration) AS min_duration,
                        MAX(trip_duration) AS max_duration
                 FROM {trips}
                 WHERE start_time IS NOT NULL
                 GROUP BY user_type"
            ),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    fn store_with_trips(rows: &[(Option<f64>, Option<&str>, Option<&str>, Option<&str>)]) -> TripStore {
        let store = TripStore::open_in_memory().unwrap();
        for (duration, start, station, user_type) in rows {
            store
                .connection()
                .execute(
                    "INSERT INTO trips VALUES (?1, ?2, ?3, ?4)",
                    params![duration, start, station, user_type],
                )
                .unwrap();
        }
        store
    }

    fn fixture() -> TripStore {
        store_with_trips(&[
            (Some(600.0), Some("2019-06-01 08:05:00"), Some("Pier 40"), Some("Subscriber")),
            (Some(300.0), Some("2019-06-01 08:45:00"), Some("Pier 40"), Some("Customer")),
            (Some(900.0), Some("2019-06-02 17:10:00"), Some("W 21 St"), Some("Subscriber")),
            (None, Some("2019-07-01 17:30:00"), Some("W 21 St"), Some("Subscriber")),
            (Some(100.0), None, Some("Pier 40"), Some("Customer")),
        ])
    }

    #[test]
    fn test_rebuild_counts() {
        let mut store = fixture();
        let summary = Aggregator::new().rebuild(&mut store).unwrap();

        assert_eq!(summary.source_trips, 4);
        assert_eq!(summary.station_days, 3);
        assert_eq!(summary.hours, 2);
        assert_eq!(summary.monthly_rankings, 3);
        assert_eq!(summary.user_types, 2);

        // Rows without a start time stay in the trips table
        assert_eq!(store.trip_count().unwrap(), 5);
    }

    #[test]
    fn test_hourly_and_user_type_values() {
        let mut store = fixture();
        Aggregator::new().rebuild(&mut store).unwrap();
        let conn = store.connection();

        let (avg, count): (f64, i64) = conn
            .query_row(
                "SELECT avg_duration, trip_count FROM avg_duration_by_hour WHERE hour = 8",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(avg, 450.0);
        assert_eq!(count, 2);

        let (total, min, max): (i64, f64, f64) = conn
            .query_row(
                "SELECT total_trips, min_duration, max_duration
                 FROM user_type_summary WHERE user_type = 'Subscriber'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(min, 600.0);
        assert_eq!(max, 900.0);
    }

    #[test]
    fn test_monthly_ranking() {
        let mut store = fixture();
        Aggregator::new().rebuild(&mut store).unwrap();

        let mut stmt = store
            .connection()
            .prepare(
                "SELECT start_station_name, trip_count, rank FROM top_stations_monthly
                 WHERE year_month = '2019-06' ORDER BY rank",
            )
            .unwrap();
        let ranking: Vec<(String, i64, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();

        assert_eq!(
            ranking,
            vec![
                ("Pier 40".to_string(), 2, 1),
                ("W 21 St".to_string(), 1, 2)
            ]
        );
    }

    #[test]
    fn test_rebuild_is_repeatable() {
        let mut store = fixture();
        let first = Aggregator::new().rebuild(&mut store).unwrap();
        let second = Aggregator::new().rebuild(&mut store).unwrap();
        assert_eq!(first, second);
    }
}
