//! Schema normalization for heterogeneous trip files
//!
//! Source files from different years name the same attribute differently
//! (`tripduration`, `duration_sec`, `ride_length`, ...). The normalizer folds
//! header names, maps known aliases through an injected [`SynonymTable`],
//! drops columns outside the canonical vocabulary, and converts the surviving
//! columns into typed [`RawTrip`] rows. Column presence is resolved here, once,
//! and carried in [`NormalizedTable::columns`].

use crate::config::{SynonymTable, fold_column_name};
use crate::constants::REQUIRED_ANY_OF;
use crate::error::{EtlError, Result};
use crate::models::{CanonicalColumn, ColumnSet, RawTrip};
use polars::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use super::stats::{IssueTally, QualityIssue};

/// A source table mapped onto the canonical vocabulary
#[derive(Debug, Clone, Default)]
pub struct NormalizedTable {
    /// Canonical columns the source actually carried
    pub columns: ColumnSet,
    pub rows: Vec<RawTrip>,
    /// Values nulled during type coercion
    pub issues: IssueTally,
}

impl NormalizedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: CanonicalColumn) -> bool {
        self.columns.contains(&column)
    }
}

/// Maps raw headers to canonical names using an immutable synonym table
#[derive(Debug, Clone)]
pub struct SchemaNormalizer {
    synonyms: SynonymTable,
}

impl Default for SchemaNormalizer {
    fn default() -> Self {
        Self::new(SynonymTable::default())
    }
}

impl SchemaNormalizer {
    pub fn new(synonyms: SynonymTable) -> Self {
        Self { synonyms }
    }

    /// Canonical name for a raw header (folded, then alias-resolved)
    pub fn canonical_name(&self, raw: &str) -> String {
        let folded = fold_column_name(raw);
        self.synonyms.resolve(&folded).to_string()
    }

    /// Rename columns to canonical names and drop everything else
    ///
    /// When two headers map to the same canonical name the first one wins.
    /// Applying this to an already-normalized frame returns an identical frame.
    pub fn normalize_columns(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(df.width());

        for column in df.get_columns() {
            let name = self.canonical_name(column.name().as_str());

            if CanonicalColumn::from_name(&name).is_none() {
                debug!("Dropping non-canonical column '{}'", column.name());
                continue;
            }
            if !seen.insert(name.clone()) {
                debug!(
                    "Dropping column '{}': '{}' already mapped from an earlier header",
                    column.name(),
                    name
                );
                continue;
            }

            let mut renamed = column.clone();
            renamed.rename(PlSmallStr::from(name.as_str()));
            columns.push(renamed);
        }

        Ok(DataFrame::new(columns)?)
    }

    /// Normalize column names and convert the frame into typed rows
    pub fn normalize(&self, df: &DataFrame) -> Result<NormalizedTable> {
        let normalized = self.normalize_columns(df)?;
        let mut table = NormalizedTable {
            columns: ColumnSet::new(),
            rows: vec![RawTrip::default(); df.height()],
            issues: IssueTally::new(),
        };

        for column in normalized.get_columns() {
            let Some(canonical) = CanonicalColumn::from_name(column.name().as_str()) else {
                continue;
            };
            table.columns.insert(canonical);

            let text = column.cast(&DataType::String)?;
            let values = text.str()?;

            for (row, value) in table.rows.iter_mut().zip(values.into_iter()) {
                let value = value.map(str::trim).filter(|v| !v.is_empty());
                assign_value(row, canonical, value, &mut table.issues);
            }
        }

        Ok(table)
    }
}

/// Store one text value on a row, coercing by column type
fn assign_value(
    row: &mut RawTrip,
    column: CanonicalColumn,
    value: Option<&str>,
    issues: &mut IssueTally,
) {
    match column {
        CanonicalColumn::TripDuration => {
            row.trip_duration = value.and_then(|v| {
                let parsed = parse_duration_seconds(v);
                if parsed.is_none() {
                    issues.record(QualityIssue::UnparsableDuration);
                }
                parsed
            });
        }
        CanonicalColumn::StartTime => row.start_time = value.map(str::to_string),
        CanonicalColumn::StopTime => row.stop_time = value.map(str::to_string),
        CanonicalColumn::StartStationName => row.start_station_name = value.map(str::to_string),
        CanonicalColumn::UserType => row.user_type = value.map(str::to_string),
        CanonicalColumn::StartStationId => row.start_station_id = coerce_or_tally(value, issues),
        CanonicalColumn::EndStationId => row.end_station_id = coerce_or_tally(value, issues),
        CanonicalColumn::BikeId => row.bike_id = coerce_or_tally(value, issues),
        CanonicalColumn::RideId => row.ride_id = coerce_or_tally(value, issues),
    }
}

fn coerce_or_tally(value: Option<&str>, issues: &mut IssueTally) -> Option<i64> {
    let value = value?;
    let coerced = coerce_identifier(value);
    if coerced.is_none() {
        issues.record(QualityIssue::UnparsableIdentifier);
    }
    coerced
}

/// Coerce identifier text to an integer; integral floats like `"72.0"` are accepted
pub fn coerce_identifier(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<i64>() {
        return Some(id);
    }
    let float = raw.parse::<f64>().ok()?;
    if float.is_finite() && float.fract() == 0.0 && float.abs() < i64::MAX as f64 {
        Some(float as i64)
    } else {
        None
    }
}

/// Parse a duration in seconds from plain numbers or `[-]H:MM:SS` / `M:SS` clock text
pub fn parse_duration_seconds(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let plain = raw.replace(',', "");
    if let Ok(seconds) = plain.parse::<f64>() {
        return seconds.is_finite().then_some(seconds);
    }

    let (sign, clock) = match raw.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, raw),
    };
    let parts: Vec<&str> = clock.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (h.parse::<u64>().ok()?, m.parse::<u64>().ok()?, s.parse::<f64>().ok()?),
        [m, s] => (0, m.parse::<u64>().ok()?, s.parse::<f64>().ok()?),
        _ => return None,
    };
    if minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some(sign * ((hours * 3600 + minutes * 60) as f64 + seconds))
}

/// Fail a file that carries none of the columns needed to describe a trip
pub fn check_required_columns(columns: &ColumnSet, path: &Path) -> Result<()> {
    let usable = REQUIRED_ANY_OF
        .iter()
        .filter_map(|name| CanonicalColumn::from_name(name))
        .any(|column| columns.contains(&column));

    if usable {
        Ok(())
    } else {
        Err(EtlError::MissingRequiredColumns {
            path: path.to_path_buf(),
            required: REQUIRED_ANY_OF.join(", "),
        })
    }
}
