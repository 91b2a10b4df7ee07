//! File discovery for bronze trip exports
//!
//! Scans the source directory (non-recursive) for `*.csv` files and groups
//! them into year partitions by their 4-digit file-name prefix.

use crate::config::YearRange;
use crate::error::{EtlError, Result};
use crate::models::YearPartition;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File names must start with a 4-digit year
const YEAR_PREFIX_PATTERN: &str = r"^(\d{4})";

/// File discovery component for year-prefixed trip files
#[derive(Debug)]
pub struct FileDiscovery {
    source_dir: PathBuf,
    years: Option<YearRange>,
    ignored_count: usize,
}

impl FileDiscovery {
    /// Create a new file discovery instance
    pub fn new(source_dir: PathBuf) -> Self {
        Self {
            source_dir,
            years: None,
            ignored_count: 0,
        }
    }

    /// Restrict discovery to an inclusive year range
    pub fn with_years(mut self, years: Option<YearRange>) -> Self {
        self.years = years;
        self
    }

    /// CSV files skipped because they lacked a year prefix or fell outside the range
    pub fn ignored_count(&self) -> usize {
        self.ignored_count
    }

    /// Discover year partitions in ascending year order
    ///
    /// Files within a partition are sorted by file name.
    pub fn discover_partitions(&mut self) -> Result<Vec<YearPartition>> {
        if !self.source_dir.is_dir() {
            return Err(EtlError::SourceDirNotFound {
                path: self.source_dir.clone(),
            });
        }

        let pattern = self.source_dir.join("*.csv");
        let pattern = pattern.to_string_lossy();
        debug!("Searching for CSV files matching: {}", pattern);

        let year_pattern = Regex::new(YEAR_PREFIX_PATTERN)?;
        let mut by_year: BTreeMap<u16, Vec<PathBuf>> = BTreeMap::new();
        self.ignored_count = 0;

        for entry in glob::glob(&pattern)? {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    self.ignored_count += 1;
                    continue;
                }
            };

            let Some(year) = year_prefix(&year_pattern, &path) else {
                debug!("Ignoring {}: no 4-digit year prefix", path.display());
                self.ignored_count += 1;
                continue;
            };

            if self.years.is_some_and(|range| !range.contains(year)) {
                debug!("Ignoring {}: year {} outside range", path.display(), year);
                self.ignored_count += 1;
                continue;
            }

            by_year.entry(year).or_default().push(path);
        }

        let partitions: Vec<YearPartition> = by_year
            .into_iter()
            .map(|(year, mut files)| {
                files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
                YearPartition { year, files }
            })
            .collect();

        debug!(
            "Found {} year partitions ({} files, {} ignored)",
            partitions.len(),
            partitions.iter().map(|p| p.files.len()).sum::<usize>(),
            self.ignored_count
        );

        Ok(partitions)
    }
}

/// Year encoded in the first four characters of a file name
pub fn year_prefix(pattern: &Regex, path: &Path) -> Option<u16> {
    let name = path.file_name()?.to_str()?;
    pattern
        .captures(name)
        .and_then(|captures| captures.get(1))
        .and_then(|year| year.as_str().parse().ok())
}
