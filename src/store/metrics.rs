//! Persistence of per-year Silver quality metrics
//!
//! One row per year, replaced on every run that reprocesses the year.

use crate::constants::tables;
use crate::error::{EtlError, Result};
use crate::models::QualityMetrics;
use rusqlite::{Connection, Row, params};
use tracing::debug;

pub(crate) fn ensure_metrics_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            year TEXT PRIMARY KEY,
            raw_records INTEGER NOT NULL,
            after_parsing INTEGER NOT NULL,
            after_dedup INTEGER NOT NULL,
            after_quality INTEGER NOT NULL,
            final_records INTEGER NOT NULL,
            duplicates_removed INTEGER NOT NULL,
            quality_filtered INTEGER NOT NULL,
            null_duration_final INTEGER NOT NULL,
            null_start_time_final INTEGER NOT NULL,
            null_station_final INTEGER NOT NULL,
            null_user_type_final INTEGER NOT NULL,
            pct_trip_duration_final REAL NOT NULL,
            pct_start_time_final REAL NOT NULL,
            pct_start_station_name_final REAL NOT NULL,
            pct_user_type_final REAL NOT NULL,
            process_timestamp TEXT NOT NULL
        );",
        tables::QUALITY_METRICS
    ))?;
    Ok(())
}

/// Insert or replace the metrics row for `metrics.year`
///
/// Failures are reported as [`EtlError::MetricsPersist`], which aborts the run.
pub fn upsert_metrics(conn: &Connection, metrics: &QualityMetrics) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} (
            year, raw_records, after_parsing, after_dedup, after_quality,
            final_records, duplicates_removed, quality_filtered,
            null_duration_final, null_start_time_final, null_station_final,
            null_user_type_final, pct_trip_duration_final, pct_start_time_final,
            pct_start_station_name_final, pct_user_type_final, process_timestamp
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
        ON CONFLICT(year) DO UPDATE SET
            raw_records = excluded.raw_records,
            after_parsing = excluded.after_parsing,
            after_dedup = excluded.after_dedup,
            after_quality = excluded.after_quality,
            final_records = excluded.final_records,
            duplicates_removed = excluded.duplicates_removed,
            quality_filtered = excluded.quality_filtered,
            null_duration_final = excluded.null_duration_final,
            null_start_time_final = excluded.null_start_time_final,
            null_station_final = excluded.null_station_final,
            null_user_type_final = excluded.null_user_type_final,
            pct_trip_duration_final = excluded.pct_trip_duration_final,
            pct_start_time_final = excluded.pct_start_time_final,
            pct_start_station_name_final = excluded.pct_start_station_name_final,
            pct_user_type_final = excluded.pct_user_type_final,
            process_timestamp = excluded.process_timestamp",
        tables::QUALITY_METRICS
    );

    conn.execute(
        &sql,
        params![
            metrics.year,
            metrics.raw_records as i64,
            metrics.after_parsing as i64,
            metrics.after_dedup as i64,
            metrics.after_quality as i64,
            metrics.final_records as i64,
            metrics.duplicates_removed as i64,
            metrics.quality_filtered as i64,
            metrics.null_duration_final as i64,
            metrics.null_start_time_final as i64,
            metrics.null_station_final as i64,
            metrics.null_user_type_final as i64,
            metrics.pct_trip_duration_final,
            metrics.pct_start_time_final,
            metrics.pct_start_station_name_final,
            metrics.pct_user_type_final,
            metrics.process_timestamp,
        ],
    )
    .map_err(|e| EtlError::MetricsPersist {
        year: metrics.year.clone(),
        reason: e.to_string(),
    })?;

    debug!("Persisted quality metrics for {}", metrics.year);
    Ok(())
}

/// All persisted metrics rows, ordered by year
pub fn fetch_metrics(conn: &Connection) -> Result<Vec<QualityMetrics>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT year, raw_records, after_parsing, after_dedup, after_quality,
                final_records, duplicates_removed, quality_filtered,
                null_duration_final, null_start_time_final, null_station_final,
                null_user_type_final, pct_trip_duration_final, pct_start_time_final,
                pct_start_station_name_final, pct_user_type_final, process_timestamp
         FROM {} ORDER BY year",
        tables::QUALITY_METRICS
    ))?;

    let metrics = stmt
        .query_map([], metrics_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(metrics)
}

fn metrics_from_row(row: &Row<'_>) -> rusqlite::Result<QualityMetrics> {
    let count = |idx: usize| -> rusqlite::Result<usize> {
        row.get::<_, i64>(idx).map(|v| v.max(0) as usize)
    };

    Ok(QualityMetrics {
        year: row.get(0)?,
        raw_records: count(1)?,
        after_parsing: count(2)?,
        after_dedup: count(3)?,
        after_quality: count(4)?,
        final_records: count(5)?,
        duplicates_removed: count(6)?,
        quality_filtered: count(7)?,
        null_duration_final: count(8)?,
        null_start_time_final: count(9)?,
        null_station_final: count(10)?,
        null_user_type_final: count(11)?,
        pct_trip_duration_final: row.get(12)?,
        pct_start_time_final: row.get(13)?,
        pct_start_station_name_final: row.get(14)?,
        pct_user_type_final: row.get(15)?,
        process_timestamp: row.get(16)?,
    })
}
