//! Integration tests for the processor module
//!
//! Runs the Silver stage end to end over small bronze directories.

pub mod basic_processing;
pub mod error_handling;

use crate::config::EtlConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const LEGACY_HEADER: &str = "tripduration,starttime,stoptime,start station id,start station name,bikeid,usertype\n";
pub const MODERN_HEADER: &str = "ride_id,started_at,ended_at,start_station_name,member_casual\n";

/// Bronze and silver directories inside a temp dir, with a quiet config
pub fn test_layout(temp_dir: &TempDir) -> (PathBuf, EtlConfig) {
    let bronze = temp_dir.path().join("bronze");
    let silver = temp_dir.path().join("silver");
    fs::create_dir_all(&bronze).unwrap();

    let config = EtlConfig::default()
        .with_source_dir(&bronze)
        .with_silver_dir(&silver)
        .with_database_path(temp_dir.path().join("trips.db"))
        .with_progress(false);

    (bronze, config)
}

pub fn write_file(dir: &Path, name: &str, header: &str, rows: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut content = header.to_string();
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    fs::write(&path, content).unwrap();
    path
}

pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}
