//! Read-only text report over the trip store
//!
//! Prints the same views a dashboard would chart: total trips, busiest
//! stations, duration by hour of day, the latest month's ranking, the user
//! type summary and the latest quality metrics per year.

use crate::constants::tables;
use crate::error::{EtlError, Result};
use crate::models::QualityMetrics;
use crate::store::TripStore;
use crate::store::metrics::fetch_metrics;

use colored::*;
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

/// Busiest station over the whole history
#[derive(Debug, Clone, PartialEq)]
pub struct StationTotal {
    pub station: String,
    pub total_trips: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourlyDuration {
    pub hour: i64,
    pub avg_duration: Option<f64>,
    pub trip_count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyStation {
    pub year_month: String,
    pub station: String,
    pub trip_count: i64,
    pub rank: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserTypeStats {
    pub user_type: String,
    pub total_trips: i64,
    pub avg_duration: Option<f64>,
    pub min_duration: Option<f64>,
    pub max_duration: Option<f64>,
}

/// Everything the report prints
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub total_trips: u64,
    pub top_stations: Vec<StationTotal>,
    pub hourly: Vec<HourlyDuration>,
    pub latest_month: Vec<MonthlyStation>,
    pub user_types: Vec<UserTypeStats>,
    pub quality: Vec<QualityMetrics>,
}

impl Report {
    /// Open the database read-only and collect every view
    pub fn from_database(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EtlError::configuration(format!(
                "database not found at {}",
                path.display()
            )));
        }
        let store = TripStore::open_read_only(path)?;
        Self::collect(&store)
    }

    /// Collect views from an open store; missing aggregate tables yield empty sections
    pub fn collect(store: &TripStore) -> Result<Self> {
        let conn = store.connection();
        let mut report = Report {
            total_trips: store.trip_count()?,
            quality: fetch_metrics(conn)?,
            ..Report::default()
        };

        if store.has_table(tables::TRIPS_PER_STATION_DAY)? {
            report.top_stations = top_stations(conn)?;
        }
        if store.has_table(tables::AVG_DURATION_BY_HOUR)? {
            report.hourly = hourly_durations(conn)?;
        }
        if store.has_table(tables::TOP_STATIONS_MONTHLY)? {
            report.latest_month = latest_month_ranking(conn)?;
        }
        if store.has_table(tables::USER_TYPE_SUMMARY)? {
            report.user_types = user_type_summary(conn)?;
        }

        debug!(
            "Report collected: {} stations, {} hours, {} user types",
            report.top_stations.len(),
            report.hourly.len(),
            report.user_types.len()
        );
        Ok(report)
    }

    pub fn print(&self) {
        println!("{}", "Bike-share Trip Report".bright_green().bold());
        println!(
            "  {} {}",
            "Total trips:".bright_cyan(),
            self.total_trips.to_string().bright_white().bold()
        );

        section("Top 10 stations by total trips");
        if self.top_stations.is_empty() {
            println!("  {}", "no aggregate data, run `gold` first".dimmed());
        }
        for (idx, station) in self.top_stations.iter().enumerate() {
            println!("  {:>2}. {:<45} {:>10}", idx + 1, station.station, station.total_trips);
        }

        section("Average trip duration by hour");
        for hour in &self.hourly {
            println!(
                "  {:02}:00  {:>10} s  {:>10} trips",
                hour.hour,
                format_optional(hour.avg_duration),
                hour.trip_count
            );
        }

        if let Some(first) = self.latest_month.first() {
            section(&format!("Top stations in {}", first.year_month));
            for station in &self.latest_month {
                println!(
                    "  {:>2}. {:<45} {:>10}",
                    station.rank, station.station, station.trip_count
                );
            }
        }

        section("User types");
        for user_type in &self.user_types {
            println!(
                "  {:<12} {:>10} trips  avg {:>10} s  min {:>8}  max {:>10}",
                user_type.user_type,
                user_type.total_trips,
                format_optional(user_type.avg_duration),
                format_optional(user_type.min_duration),
                format_optional(user_type.max_duration)
            );
        }

        section("Silver quality metrics");
        for metrics in &self.quality {
            println!(
                "  {}  {:>10} raw  {:>10} final  {:>5.1}% retained  {:>8} dup  {:>8} filtered  ({})",
                metrics.year.bright_cyan(),
                metrics.raw_records,
                metrics.final_records,
                metrics.retention_pct(),
                metrics.duplicates_removed,
                metrics.quality_filtered,
                metrics.process_timestamp.dimmed()
            );
        }
    }
}

fn section(title: &str) {
    println!("\n{}", title.bright_yellow());
}

fn format_optional(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.1}"))
        .unwrap_or_else(|| "-".to_string())
}

fn top_stations(conn: &Connection) -> Result<Vec<StationTotal>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT start_station_name, SUM(trip_count) AS total_trips
         FROM {}
         WHERE start_station_name IS NOT NULL
         GROUP BY start_station_name
         ORDER BY total_trips DESC, start_station_name
         LIMIT 10",
        tables::TRIPS_PER_STATION_DAY
    ))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(StationTotal {
                station: row.get(0)?,
                total_trips: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn hourly_durations(conn: &Connection) -> Result<Vec<HourlyDuration>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT CAST(hour AS INTEGER) AS hour, avg_duration, trip_count
         FROM {}
         WHERE hour IS NOT NULL
         ORDER BY hour",
        tables::AVG_DURATION_BY_HOUR
    ))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(HourlyDuration {
                hour: row.get(0)?,
                avg_duration: row.get(1)?,
                trip_count: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn latest_month_ranking(conn: &Connection) -> Result<Vec<MonthlyStation>> {
    let table = tables::TOP_STATIONS_MONTHLY;
    let mut stmt = conn.prepare(&format!(
        "SELECT year_month, start_station_name, trip_count, rank
         FROM {table}
         WHERE year_month = (SELECT MAX(year_month) FROM {table})
           AND rank <= 10
         ORDER BY rank"
    ))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(MonthlyStation {
                year_month: row.get(0)?,
                station: row.get(1)?,
                trip_count: row.get(2)?,
                rank: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn user_type_summary(conn: &Connection) -> Result<Vec<UserTypeStats>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT user_type, total_trips, avg_duration, min_duration, max_duration
         FROM {}
         WHERE user_type IS NOT NULL
         ORDER BY total_trips DESC",
        tables::USER_TYPE_SUMMARY
    ))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(UserTypeStats {
                user_type: row.get(0)?,
                total_trips: row.get(1)?,
                avg_duration: row.get(2)?,
                min_duration: row.get(3)?,
                max_duration: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
