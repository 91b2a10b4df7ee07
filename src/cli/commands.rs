//! Command implementations for the bike-share ETL CLI
//!
//! Sets up logging, layers configuration, and dispatches each subcommand to
//! the processor, loader, aggregator or report.

use crate::cli::args::{Args, Commands, CommonArgs};
use crate::cli::report::Report;
use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use crate::processor::{SilverRunSummary, YearBatchProcessor};
use crate::store::{AggregateSummary, Aggregator, LoadSummary, TripLoader, TripStore};

use colored::*;
use std::time::Instant;
use tracing::{debug, info};

/// Main command runner
///
/// 1. Set up logging
/// 2. Layer configuration (defaults, file, flags)
/// 3. Run the requested stage(s)
pub fn run(args: Args) -> Result<()> {
    setup_logging(&args.common)?;
    debug!("Command line arguments: {:?}", args);

    args.common.validate()?;
    let config = args.common.to_config()?;
    debug!("Loaded configuration: {:?}", config);

    let start_time = Instant::now();
    info!("Starting {} command", args.command.name());

    match args.command {
        Commands::Silver => {
            run_silver(&config)?;
        }
        Commands::Load => {
            run_load(&config)?;
        }
        Commands::Gold => {
            run_gold(&config)?;
        }
        Commands::Run => {
            run_silver(&config)?;
            run_load(&config)?;
            run_gold(&config)?;
        }
        Commands::Report => run_report(&config)?,
    }

    info!(
        "{} finished in {:.1}s",
        args.command.name(),
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Set up structured logging on stderr
pub fn setup_logging(args: &CommonArgs) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("bikeshare_etl={}", log_level)));

    let result = if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    result.map_err(|e| EtlError::configuration(format!("failed to initialize logging: {e}")))?;

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Normalize bronze files into canonical per-year outputs
pub fn run_silver(config: &EtlConfig) -> Result<SilverRunSummary> {
    let store = TripStore::open(&config.database_path)?;
    let processor = YearBatchProcessor::new(config.clone())?;
    processor.run(&store)
}

/// Load canonical outputs into the trip store
pub fn run_load(config: &EtlConfig) -> Result<LoadSummary> {
    println!("\n{}", "Loading silver files".bright_green().bold());
    let mut store = TripStore::open(&config.database_path)?;
    let loader = TripLoader::new(config.silver_dir.clone(), config.null_values.clone())
        .with_progress(config.show_progress);

    let summary = loader.load(&mut store)?;
    let total_trips = store.trip_count()?;

    println!(
        "  {} {} loaded, {} already loaded ({} seen)",
        "Files:".bright_cyan(),
        summary.files_loaded.to_string().bright_white().bold(),
        summary.files_already_loaded,
        summary.files_seen()
    );
    if summary.files_skipped > 0 {
        println!(
            "  {} {}",
            "Files skipped:".bright_red(),
            summary.files_skipped.to_string().bright_red().bold()
        );
    }
    println!(
        "  {} {} (~{} total in store)",
        "Rows inserted:".bright_cyan(),
        summary.rows_inserted.to_string().bright_white(),
        format_approx(total_trips).bright_white().bold()
    );

    Ok(summary)
}

/// Rebuild aggregate tables
pub fn run_gold(config: &EtlConfig) -> Result<AggregateSummary> {
    println!("\n{}", "Building aggregate tables".bright_green().bold());
    let mut store = TripStore::open(&config.database_path)?;
    let summary = Aggregator::new().rebuild(&mut store)?;

    println!(
        "  {} {} trips with a start time",
        "Source:".bright_cyan(),
        summary.source_trips.to_string().bright_white().bold()
    );
    println!(
        "  {} {} station-days, {} hours, {} monthly rankings, {} user types",
        "Tables:".bright_cyan(),
        summary.station_days,
        summary.hours,
        summary.monthly_rankings,
        summary.user_types
    );

    Ok(summary)
}

/// Print the read-only report
pub fn run_report(config: &EtlConfig) -> Result<()> {
    let report = Report::from_database(&config.database_path)?;
    report.print();
    Ok(())
}

/// Round large counts for the final summary, e.g. `12.3M`
pub fn format_approx(count: u64) -> String {
    const UNITS: &[(u64, &str)] = &[(1_000_000_000, "B"), (1_000_000, "M"), (1_000, "K")];
    for (scale, suffix) in UNITS {
        if count >= *scale {
            return format!("{:.1}{}", count as f64 / *scale as f64, suffix);
        }
    }
    count.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_format_approx() {
        assert_eq!(format_approx(999), "999");
        assert_eq!(format_approx(12_345), "12.3K");
        assert_eq!(format_approx(12_300_000), "12.3M");
        assert_eq!(format_approx(2_000_000_000), "2.0B");
    }

    #[test]
    fn test_stages_share_one_database() {
        let temp_dir = TempDir::new().unwrap();
        let bronze = temp_dir.path().join("bronze");
        fs::create_dir_all(&bronze).unwrap();
        fs::write(
            bronze.join("2019-01.csv"),
            "tripduration,starttime,stoptime,start station name,usertype\n\
             600,2019-01-01 08:00:00,2019-01-01 08:10:00,Pier 40,Subscriber\n",
        )
        .unwrap();

        let config = EtlConfig::default()
            .with_source_dir(&bronze)
            .with_silver_dir(temp_dir.path().join("silver"))
            .with_database_path(temp_dir.path().join("db").join("trips.db"))
            .with_progress(false);

        let silver = run_silver(&config).unwrap();
        assert_eq!(silver.years_completed(), 1);

        let load = run_load(&config).unwrap();
        assert_eq!(load.rows_inserted, 1);

        let gold = run_gold(&config).unwrap();
        assert_eq!(gold.source_trips, 1);

        run_report(&config).unwrap();
    }
}
