//! Loading canonical Silver files into the trip store
//!
//! A `loaded_files` ledger keyed by file name makes reruns incremental. Each
//! file's inserts and its ledger row commit in one transaction, so a crash
//! mid-file leaves nothing behind and the next run retries the whole file.

use crate::constants::{CANONICAL_OUTPUT_COLUMNS, LOAD_PROGRESS_INTERVAL, tables};
use crate::error::{EtlError, Result};
use crate::processor::reader::read_raw_frame;

use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::DataFrame;
use rusqlite::{OptionalExtension, params};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::TripStore;

/// Outcome of one loader run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub files_loaded: usize,
    /// Already present in the ledger
    pub files_already_loaded: usize,
    /// Unreadable or missing canonical columns
    pub files_skipped: usize,
    pub rows_inserted: usize,
}

impl LoadSummary {
    pub fn files_seen(&self) -> usize {
        self.files_loaded + self.files_already_loaded + self.files_skipped
    }
}

/// Loads canonical per-year CSV files into the `trips` table
#[derive(Debug)]
pub struct TripLoader {
    silver_dir: PathBuf,
    null_values: Vec<String>,
    show_progress: bool,
}

impl TripLoader {
    pub fn new(silver_dir: PathBuf, null_values: Vec<String>) -> Self {
        Self {
            silver_dir,
            null_values,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Canonical files in the silver directory, sorted by name
    pub fn discover_files(&self) -> Result<Vec<PathBuf>> {
        if !self.silver_dir.is_dir() {
            return Err(EtlError::SourceDirNotFound {
                path: self.silver_dir.clone(),
            });
        }

        let pattern = self.silver_dir.join("*.csv");
        let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())?
            .filter_map(|entry| entry.ok())
            .collect();
        files.sort();
        Ok(files)
    }

    /// Load every file not yet in the ledger
    pub fn load(&self, store: &mut TripStore) -> Result<LoadSummary> {
        let files = self.discover_files()?;
        let mut summary = LoadSummary::default();

        let pb = if self.show_progress {
            let pb = ProgressBar::new(files.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            pb
        } else {
            ProgressBar::hidden()
        };
        pb.set_message("Loading silver files");

        for path in &files {
            let filename = file_name(path);
            pb.set_message(format!("Loading: {}", filename));

            if is_loaded(store, &filename)? {
                debug!("Skipping {}: already loaded", filename);
                summary.files_already_loaded += 1;
                pb.inc(1);
                continue;
            }

            let df = match read_raw_frame(path, &self.null_values) {
                Ok(df) => df,
                Err(e) => {
                    warn!("Skipping {}: {}", filename, e);
                    summary.files_skipped += 1;
                    pb.inc(1);
                    continue;
                }
            };

            let missing = missing_canonical_columns(&df);
            if !missing.is_empty() {
                warn!(
                    "Skipping {}: missing canonical columns [{}]",
                    filename,
                    missing.join(", ")
                );
                summary.files_skipped += 1;
                pb.inc(1);
                continue;
            }

            let rows = insert_file(store, &filename, &df)?;
            info!("Loaded {} rows from {}", rows, filename);
            summary.files_loaded += 1;
            summary.rows_inserted += rows;
            pb.inc(1);
        }

        pb.finish_with_message("All silver files processed");
        Ok(summary)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Whether the ledger already records `filename`
pub fn is_loaded(store: &TripStore, filename: &str) -> Result<bool> {
    let found: Option<String> = store
        .connection()
        .query_row(
            &format!("SELECT filename FROM {} WHERE filename = ?1", tables::LOADED_FILES),
            [filename],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Canonical column names absent from a frame
pub fn missing_canonical_columns(df: &DataFrame) -> Vec<&'static str> {
    let present: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
    CANONICAL_OUTPUT_COLUMNS
        .iter()
        .copied()
        .filter(|column| !present.contains(column))
        .collect()
}

/// Insert one file's rows and its ledger entry in a single transaction
fn insert_file(store: &mut TripStore, filename: &str, df: &DataFrame) -> Result<usize> {
    let durations = df.column("trip_duration")?.str()?;
    let starts = df.column("start_time")?.str()?;
    let stations = df.column("start_station_name")?.str()?;
    let user_types = df.column("user_type")?.str()?;

    let tx = store.connection_mut().transaction()?;
    let mut inserted = 0;
    {
        let mut stmt = tx.prepare_cached(&format!(
            "INSERT INTO {} (trip_duration, start_time, start_station_name, user_type)
             VALUES (?1, ?2, ?3, ?4)",
            tables::TRIPS
        ))?;

        for idx in 0..df.height() {
            let duration = durations.get(idx).and_then(|d| d.trim().parse::<f64>().ok());
            stmt.execute(params![
                duration,
                starts.get(idx),
                stations.get(idx),
                user_types.get(idx),
            ])?;
            inserted += 1;

            if inserted % LOAD_PROGRESS_INTERVAL == 0 {
                debug!("{}: {} rows inserted", filename, inserted);
            }
        }
    }

    tx.execute(
        &format!(
            "INSERT INTO {} (filename, rows, loaded_at) VALUES (?1, ?2, ?3)",
            tables::LOADED_FILES
        ),
        params![
            filename,
            inserted as i64,
            Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
        ],
    )?;
    tx.commit()?;

    Ok(inserted)
}
