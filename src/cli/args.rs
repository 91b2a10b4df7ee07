//! Command-line argument definitions for the bike-share ETL
//!
//! Defines the CLI interface using the clap derive API. Shared options are
//! global so they can follow any subcommand.

use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for the bike-share trip ETL
///
/// Flattens yearly trip exports into canonical per-year files, loads them
/// into a SQLite trip store and builds aggregate tables for reporting.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "bikeshare-etl",
    version,
    about = "Clean, load and aggregate historical bike-share trip exports",
    long_about = "Normalizes a decade of bike-share trip CSV exports with drifting schemas into one \
                  canonical per-year format, records per-year quality metrics, loads the results \
                  into SQLite and rebuilds aggregate tables for reporting."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Available subcommands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Normalize bronze files into canonical per-year CSVs
    Silver,
    /// Load canonical CSVs into the trip store
    Load,
    /// Rebuild aggregate tables from loaded trips
    Gold,
    /// Run silver, load and gold in order
    Run,
    /// Print a text report from the trip store
    Report,
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Silver => "silver",
            Commands::Load => "load",
            Commands::Gold => "gold",
            Commands::Run => "run",
            Commands::Report => "report",
        }
    }
}

/// Options shared by every subcommand
#[derive(Debug, Clone, Default, ClapArgs)]
pub struct CommonArgs {
    /// TOML configuration file; CLI flags override its values
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Directory of raw (bronze) CSV files
    #[arg(long = "source", value_name = "DIR", global = true)]
    pub source: Option<PathBuf>,

    /// Directory for canonical (silver) CSV files
    #[arg(long = "silver-dir", value_name = "DIR", global = true)]
    pub silver_dir: Option<PathBuf>,

    /// SQLite database path
    #[arg(long = "database", value_name = "FILE", global = true)]
    pub database: Option<PathBuf>,

    /// First year to process (inclusive)
    #[arg(long = "from-year", value_name = "YEAR", global = true, requires = "to_year")]
    pub from_year: Option<u16>,

    /// Last year to process (inclusive)
    #[arg(long = "to-year", value_name = "YEAR", global = true, requires = "from_year")]
    pub to_year: Option<u16>,

    /// Files per output chunk
    #[arg(long = "chunk-size", value_name = "N", global = true)]
    pub chunk_size: Option<usize>,

    /// Write one output file per year regardless of file count
    #[arg(long = "no-chunking", global = true)]
    pub no_chunking: bool,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short = 'q', long = "quiet", global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable progress bars
    #[arg(long = "no-progress", global = true)]
    pub no_progress: bool,
}

impl CommonArgs {
    /// Get log level based on verbosity settings
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }

    /// Layer configuration: defaults, then the optional file, then CLI flags
    pub fn to_config(&self) -> Result<EtlConfig> {
        let mut config = match &self.config {
            Some(path) => EtlConfig::from_toml_file(path)?,
            None => EtlConfig::default(),
        };

        if let Some(source) = &self.source {
            config = config.with_source_dir(source);
        }
        if let Some(silver_dir) = &self.silver_dir {
            config = config.with_silver_dir(silver_dir);
        }
        if let Some(database) = &self.database {
            config = config.with_database_path(database);
        }
        if let (Some(from), Some(to)) = (self.from_year, self.to_year) {
            config = config.with_years(from, to);
        }
        if let Some(chunk_size) = self.chunk_size {
            config = config.with_chunk_size(chunk_size);
        }
        if self.no_chunking {
            config = config.without_chunking();
        }
        if self.no_progress || self.quiet {
            config = config.with_progress(false);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject flag combinations clap cannot express
    pub fn validate(&self) -> Result<()> {
        if let Some(0) = self.chunk_size {
            return Err(EtlError::configuration("--chunk-size must be at least 1"));
        }
        Ok(())
    }
}
