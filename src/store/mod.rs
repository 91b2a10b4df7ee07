//! SQLite trip store
//!
//! One database file holds the loaded trips, the ledger of loaded canonical
//! files, per-year Silver quality metrics and the Gold aggregate tables.
//! Schema creation is idempotent; multi-statement writes run in transactions.

pub mod aggregator;
pub mod loader;
pub mod metrics;

pub use aggregator::{AggregateSummary, Aggregator};
pub use loader::{LoadSummary, TripLoader};

use crate::constants::tables;
use crate::error::Result;
use rusqlite::{Connection, OpenFlags};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Handle on the trip database
#[derive(Debug)]
pub struct TripStore {
    conn: Connection,
}

impl TripStore {
    /// Open (creating if needed) a database file and ensure the schema exists
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        debug!("Opened trip store at {}", path.display());
        Self::from_connection(conn)
    }

    /// Open an existing database without write access
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {trips} (
                trip_duration REAL,
                start_time TEXT,
                start_station_name TEXT,
                user_type TEXT
            );
            CREATE TABLE IF NOT EXISTS {loaded} (
                filename TEXT PRIMARY KEY,
                rows INTEGER NOT NULL,
                loaded_at TEXT NOT NULL
            );",
            trips = tables::TRIPS,
            loaded = tables::LOADED_FILES,
        ))?;
        metrics::ensure_metrics_table(&self.conn)?;
        Ok(())
    }

    /// Total rows in the trips table
    pub fn trip_count(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", tables::TRIPS),
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    /// Whether a table exists (gold tables only appear after aggregation)
    pub fn has_table(&self, name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
