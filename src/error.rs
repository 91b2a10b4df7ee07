//! Error handling for bike-share ETL operations.
//!
//! Row-level problems never surface here; they are tallied as quality issues.
//! These variants cover file-level failures (caught and logged by the year
//! processor) and structural failures that abort a run.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Trip store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Source directory not found: {path}")]
    SourceDirNotFound { path: PathBuf },

    #[error("File {path} has none of the required columns ({required})")]
    MissingRequiredColumns { path: PathBuf, required: String },

    #[error("Failed to write canonical output {path}: {reason}")]
    OutputWrite { path: PathBuf, reason: String },

    #[error("Failed to persist quality metrics for year {year}: {reason}")]
    MetricsPersist { year: String, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Invalid regex: {0}")]
    Regex(#[from] regex::Error),
}

impl EtlError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Structural failures abort the whole run instead of being absorbed
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EtlError::SourceDirNotFound { .. }
                | EtlError::Store(_)
                | EtlError::MetricsPersist { .. }
                | EtlError::Configuration { .. }
                | EtlError::ConfigParse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
