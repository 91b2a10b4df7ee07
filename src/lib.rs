//! Bike-share ETL Library
//!
//! Batch pipeline for a decade of bike-share trip exports whose column
//! layout drifts over time.
//!
//! This library provides tools for:
//! - Normalizing drifting raw headers onto one canonical trip schema
//! - Resolving timestamps across several historical formats
//! - Deduplicating and quality-filtering trips per year
//! - Writing canonical per-year CSV files with quality metrics
//! - Loading canonical files into SQLite exactly once
//! - Rebuilding aggregate tables and printing a text report

pub mod config;
pub mod constants;
pub mod error;
pub mod models;

pub mod cli;
pub mod processor;
pub mod silver;
pub mod store;

// Re-export commonly used types
pub use config::{EtlConfig, SynonymTable, YearRange};
pub use error::{EtlError, Result};
pub use models::{CanonicalColumn, PartitionState, QualityMetrics, TripRecord};
pub use processor::{SilverRunSummary, YearBatchProcessor};
pub use silver::SilverTransformer;
pub use store::{Aggregator, TripLoader, TripStore};
