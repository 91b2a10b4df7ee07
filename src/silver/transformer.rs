//! Silver transform orchestration
//!
//! Files are parsed one at a time (normalize, check required columns, resolve
//! timestamps); deduplication and quality filtering then run once over the
//! concatenated rows of an output unit.

use crate::config::EtlConfig;
use crate::error::Result;
use crate::models::{ColumnSet, TripRecord};
use polars::prelude::DataFrame;
use std::path::Path;
use tracing::{Level, debug, enabled};

use super::deduplication::{
    DedupStrategy, analyze_duplicate_patterns, choose_strategy, deduplicate_trips,
};
use super::quality_filter::apply_quality_filter;
use super::schema::{SchemaNormalizer, check_required_columns};
use super::stats::{IssueTally, NullCounts};
use super::temporal::TemporalResolver;

/// One source file after normalization and timestamp resolution
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub columns: ColumnSet,
    pub records: Vec<TripRecord>,
    pub issues: IssueTally,
}

/// Rows of an output unit after deduplication and filtering
#[derive(Debug, Clone)]
pub struct CleanedRows {
    pub records: Vec<TripRecord>,
    pub strategy: DedupStrategy,
    pub after_dedup: usize,
    pub after_quality: usize,
    pub issues: IssueTally,
    pub nulls: NullCounts,
}

/// Applies the Silver stages with the run's configuration
#[derive(Debug, Clone)]
pub struct SilverTransformer {
    normalizer: SchemaNormalizer,
    resolver: TemporalResolver,
    ride_id_min_population: f64,
}

impl SilverTransformer {
    pub fn new(
        normalizer: SchemaNormalizer,
        resolver: TemporalResolver,
        ride_id_min_population: f64,
    ) -> Self {
        Self {
            normalizer,
            resolver,
            ride_id_min_population,
        }
    }

    pub fn from_config(config: &EtlConfig) -> Self {
        Self::new(
            SchemaNormalizer::new(config.synonyms.clone()),
            TemporalResolver::new(config.timestamp_formats.clone()),
            config.ride_id_min_population,
        )
    }

    /// Normalize and resolve one raw frame read from `path`
    pub fn parse_frame(&self, df: &DataFrame, path: &Path) -> Result<ParsedFile> {
        let table = self.normalizer.normalize(df)?;
        check_required_columns(&table.columns, path)?;

        let columns = table.columns.clone();
        let (records, issues) = self.resolver.resolve_table(table);
        debug!(
            "Parsed {}: {} rows, columns [{}]",
            path.display(),
            records.len(),
            columns
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(ParsedFile {
            columns,
            records,
            issues,
        })
    }

    /// Deduplicate and filter the concatenated rows of a unit
    pub fn clean(&self, records: Vec<TripRecord>, columns: &ColumnSet) -> CleanedRows {
        if enabled!(Level::DEBUG) {
            let strategy = choose_strategy(&records, columns, self.ride_id_min_population);
            let (distinct, groups, duplicates) = analyze_duplicate_patterns(&records, &strategy);
            debug!(
                "Duplicate patterns ({}): {} distinct keys, {} duplicate groups, {} duplicates",
                strategy, distinct, groups, duplicates
            );
        }

        let dedup = deduplicate_trips(records, columns, self.ride_id_min_population);
        let after_dedup = dedup.records.len();

        let filtered = apply_quality_filter(dedup.records);
        let after_quality = filtered.records.len();
        let nulls = NullCounts::from_records(&filtered.records);

        CleanedRows {
            records: filtered.records,
            strategy: dedup.strategy,
            after_dedup,
            after_quality,
            issues: filtered.issues,
            nulls,
        }
    }
}
