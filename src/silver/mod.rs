//! Silver stage: turning heterogeneous trip files into canonical rows
//!
//! # Pipeline
//!
//! 1. **Schema normalization** ([`schema`]): fold headers, resolve aliases,
//!    keep only canonical columns, coerce identifiers and durations
//! 2. **Timestamp resolution** ([`temporal`]): multi-format parsing, corrupt
//!    value detection, duration back-fill from start/stop
//! 3. **Deduplication** ([`deduplication`]): ride id when populated, composite
//!    key otherwise, pass-through when neither is available
//! 4. **Quality filtering** ([`quality_filter`]): drop non-positive durations
//!    and temporal inversions
//!
//! Row-level problems never fail a file. They are recorded as
//! [`QualityIssue`]s and surface through [`stats`] in the per-year metrics.

pub mod deduplication;
pub mod quality_filter;
pub mod schema;
pub mod stats;
pub mod temporal;
pub mod transformer;

#[cfg(test)]
pub mod tests;

pub use deduplication::{DedupOutcome, DedupStrategy, KeyColumn, analyze_duplicate_patterns, deduplicate_trips};
pub use quality_filter::{FilterOutcome, apply_quality_filter, passes_quality_filter};
pub use schema::{NormalizedTable, SchemaNormalizer, check_required_columns};
pub use stats::{IssueTally, NullCounts, QualityIssue, StageCounts, build_quality_metrics};
pub use temporal::TemporalResolver;
pub use transformer::{CleanedRows, ParsedFile, SilverTransformer};
