//! Configuration management and validation.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then command-line overrides applied by the CLI. The synonym table lives
//! here as immutable data handed to the schema normalizer.

use crate::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_DATABASE_PATH, DEFAULT_NULL_VALUES, DEFAULT_OUTPUT_PREFIX,
    DEFAULT_RIDE_ID_MIN_POPULATION, DEFAULT_SILVER_DIR, DEFAULT_SOURCE_DIR, DEFAULT_SYNONYMS,
    DEFAULT_TIMESTAMP_FORMATS,
};
use crate::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Mapping from case-folded historical column names to canonical names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct SynonymTable {
    aliases: BTreeMap<String, String>,
}

impl From<BTreeMap<String, String>> for SynonymTable {
    fn from(raw: BTreeMap<String, String>) -> Self {
        let aliases = raw
            .into_iter()
            .map(|(alias, canonical)| (fold_column_name(&alias), canonical))
            .collect();
        Self { aliases }
    }
}

impl From<SynonymTable> for BTreeMap<String, String> {
    fn from(table: SynonymTable) -> Self {
        table.aliases
    }
}

impl SynonymTable {
    /// Build a table from alias/canonical pairs; aliases are folded on insert
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let aliases = pairs
            .into_iter()
            .map(|(alias, canonical)| (fold_column_name(alias), canonical.to_string()))
            .collect();
        Self { aliases }
    }

    /// Resolve a folded column name, passing unknown names through
    pub fn resolve<'a>(&'a self, folded: &'a str) -> &'a str {
        self.aliases
            .get(folded)
            .map(String::as_str)
            .unwrap_or(folded)
    }

    /// Add or replace one alias
    pub fn with_alias(mut self, alias: &str, canonical: &str) -> Self {
        self.aliases
            .insert(fold_column_name(alias), canonical.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

impl Default for SynonymTable {
    fn default() -> Self {
        Self::from_pairs(DEFAULT_SYNONYMS.iter().copied())
    }
}

/// Case-fold a raw header: strip BOM, trim, lowercase, spaces to underscores
pub fn fold_column_name(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}')
        .trim()
        .to_lowercase()
        .replace(' ', "_")
}

/// Inclusive range of years to process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub from: u16,
    pub to: u16,
}

impl YearRange {
    pub fn contains(&self, year: u16) -> bool {
        (self.from..=self.to).contains(&year)
    }
}

/// Global configuration for the ETL run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    /// Directory of flattened raw CSV files (bronze)
    pub source_dir: PathBuf,

    /// Directory receiving canonical per-year files (silver)
    pub silver_dir: PathBuf,

    /// SQLite database holding trips, ledger, metrics and gold tables
    pub database_path: PathBuf,

    /// Middle part of output file names
    pub output_prefix: String,

    /// Split years with more files than `chunk_size` into several outputs
    pub chunking_enabled: bool,

    /// Files per output chunk
    pub chunk_size: usize,

    /// Only process years inside this range
    pub years: Option<YearRange>,

    /// Tokens read as missing values
    pub null_values: Vec<String>,

    /// Timestamp formats tried in order
    pub timestamp_formats: Vec<String>,

    /// Share of populated ride ids needed to deduplicate on ride id alone
    pub ride_id_min_population: f64,

    /// Historical column aliases
    pub synonyms: SynonymTable,

    /// Show progress bars during long loops
    pub show_progress: bool,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
            silver_dir: PathBuf::from(DEFAULT_SILVER_DIR),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
            chunking_enabled: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            years: None,
            null_values: DEFAULT_NULL_VALUES.iter().map(|s| s.to_string()).collect(),
            timestamp_formats: DEFAULT_TIMESTAMP_FORMATS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ride_id_min_population: DEFAULT_RIDE_ID_MIN_POPULATION,
            synonyms: SynonymTable::default(),
            show_progress: true,
        }
    }
}

impl EtlConfig {
    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: EtlConfig = toml::from_str(&contents)?;
        debug!("Loaded configuration from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(EtlError::configuration("chunk_size must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.ride_id_min_population) {
            return Err(EtlError::configuration(format!(
                "ride_id_min_population must be within [0, 1], got {}",
                self.ride_id_min_population
            )));
        }
        if let Some(range) = self.years {
            if range.from > range.to {
                return Err(EtlError::configuration(format!(
                    "year range is inverted: {} > {}",
                    range.from, range.to
                )));
            }
        }
        if self.timestamp_formats.is_empty() {
            return Err(EtlError::configuration(
                "at least one timestamp format is required",
            ));
        }
        if self.output_prefix.trim().is_empty() {
            return Err(EtlError::configuration("output_prefix must not be empty"));
        }
        Ok(())
    }

    pub fn with_source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = dir.into();
        self
    }

    pub fn with_silver_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.silver_dir = dir.into();
        self
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Always write one output file per year
    pub fn without_chunking(mut self) -> Self {
        self.chunking_enabled = false;
        self
    }

    pub fn with_years(mut self, from: u16, to: u16) -> Self {
        self.years = Some(YearRange { from, to });
        self
    }

    pub fn with_synonyms(mut self, synonyms: SynonymTable) -> Self {
        self.synonyms = synonyms;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }
}
