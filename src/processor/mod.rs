//! Year batch processing for the Silver stage
//!
//! Orchestrates discovery, per-file parsing, unit-level deduplication and
//! filtering, canonical output writing and quality metrics persistence.
//! Output file existence is the completion marker: a unit whose output exists
//! is never reprocessed.

pub mod discovery;
pub mod reader;
pub mod writer;

#[cfg(test)]
pub mod tests;

use self::{discovery::FileDiscovery, reader::read_raw_frame, writer::CanonicalWriter};

use crate::config::EtlConfig;
use crate::error::Result;
use crate::models::{ColumnSet, OutputUnit, PartitionState, QualityMetrics, TripRecord, YearPartition};
use crate::silver::{
    DedupStrategy, IssueTally, NullCounts, SilverTransformer, StageCounts, build_quality_metrics,
};
use crate::store::{TripStore, metrics::upsert_metrics};

use chrono::Local;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How one output unit ended
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    /// Output already existed; nothing was read
    SkippedExisting,
    /// Every file failed or no row survived; nothing was written
    NoValidData,
    /// Output written with this many rows
    Written(usize),
    /// Rows were ready but the output could not be written
    WriteFailed(String),
}

/// Counters for one processed output unit
#[derive(Debug, Clone)]
pub struct UnitReport {
    pub unit: OutputUnit,
    pub outcome: UnitOutcome,
    pub stages: StageCounts,
    pub nulls: NullCounts,
    pub issues: IssueTally,
    pub strategy: Option<DedupStrategy>,
    pub files_read: usize,
    pub files_failed: usize,
}

impl UnitReport {
    fn new(unit: OutputUnit, outcome: UnitOutcome) -> Self {
        Self {
            unit,
            outcome,
            stages: StageCounts::default(),
            nulls: NullCounts::default(),
            issues: IssueTally::new(),
            strategy: None,
            files_read: 0,
            files_failed: 0,
        }
    }
}

/// Result of processing every unit of one year
#[derive(Debug, Clone)]
pub struct PartitionReport {
    pub year: u16,
    pub state: PartitionState,
    pub units: Vec<UnitReport>,
}

impl PartitionReport {
    pub fn metrics(&self) -> Option<&QualityMetrics> {
        match &self.state {
            PartitionState::Completed(metrics) => Some(metrics),
            _ => None,
        }
    }

    pub fn files_read(&self) -> usize {
        self.units.iter().map(|u| u.files_read).sum()
    }

    pub fn files_failed(&self) -> usize {
        self.units.iter().map(|u| u.files_failed).sum()
    }

    /// Quality issues tallied across every unit of the year
    pub fn issues(&self) -> IssueTally {
        let mut tally = IssueTally::new();
        for unit in &self.units {
            tally.merge(&unit.issues);
        }
        tally
    }

    /// Distinct dedup strategies the year's units used
    pub fn strategies(&self) -> Vec<&DedupStrategy> {
        let mut strategies: Vec<&DedupStrategy> = Vec::new();
        for strategy in self.units.iter().filter_map(|u| u.strategy.as_ref()) {
            if !strategies.contains(&strategy) {
                strategies.push(strategy);
            }
        }
        strategies
    }

    pub fn write_failures(&self) -> Vec<&UnitReport> {
        self.units
            .iter()
            .filter(|u| matches!(u.outcome, UnitOutcome::WriteFailed(_)))
            .collect()
    }
}

/// Summary of a whole Silver run
#[derive(Debug, Clone, Default)]
pub struct SilverRunSummary {
    pub partitions: Vec<PartitionReport>,
    pub elapsed: Duration,
}

impl SilverRunSummary {
    fn count_state(&self, predicate: impl Fn(&PartitionState) -> bool) -> usize {
        self.partitions.iter().filter(|p| predicate(&p.state)).count()
    }

    pub fn years_completed(&self) -> usize {
        self.count_state(|s| matches!(s, PartitionState::Completed(_)))
    }

    pub fn years_skipped(&self) -> usize {
        self.count_state(|s| matches!(s, PartitionState::SkippedExisting))
    }

    pub fn years_without_data(&self) -> usize {
        self.count_state(|s| matches!(s, PartitionState::NoValidData))
    }

    pub fn files_read(&self) -> usize {
        self.partitions.iter().map(|p| p.files_read()).sum()
    }

    pub fn files_failed(&self) -> usize {
        self.partitions.iter().map(|p| p.files_failed()).sum()
    }

    pub fn write_failures(&self) -> usize {
        self.partitions.iter().map(|p| p.write_failures().len()).sum()
    }

    pub fn rows_written(&self) -> usize {
        self.partitions
            .iter()
            .filter_map(|p| p.metrics())
            .map(|m| m.final_records)
            .sum()
    }
}

/// Main processor for the Silver stage
#[derive(Debug)]
pub struct YearBatchProcessor {
    config: EtlConfig,
    transformer: SilverTransformer,
}

impl YearBatchProcessor {
    /// Create a new processor from a validated configuration
    pub fn new(config: EtlConfig) -> Result<Self> {
        config.validate()?;
        let transformer = SilverTransformer::from_config(&config);
        Ok(Self {
            config,
            transformer,
        })
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    /// Discover partitions, process each year and persist its metrics
    ///
    /// Per-file and per-year write failures are logged and reported; a
    /// metrics persistence failure aborts the run.
    pub fn run(&self, store: &TripStore) -> Result<SilverRunSummary> {
        let start_time = Instant::now();
        println!("{}", "Starting Silver processing".bright_green().bold());
        println!(
            "  {} {}",
            "Source:".bright_cyan(),
            self.config.source_dir.display()
        );
        println!(
            "  {} {}",
            "Output:".bright_cyan(),
            self.config.silver_dir.display()
        );

        let mut discovery =
            FileDiscovery::new(self.config.source_dir.clone()).with_years(self.config.years);
        let partitions = discovery.discover_partitions()?;
        println!(
            "  {} {} years ({} files)",
            "Found".bright_green(),
            partitions.len().to_string().bright_white().bold(),
            partitions
                .iter()
                .map(|p| p.files.len())
                .sum::<usize>()
                .to_string()
                .bright_white()
                .bold()
        );

        let mut summary = SilverRunSummary::default();
        for partition in &partitions {
            let report = self.process_partition(partition);

            if let Some(metrics) = report.metrics() {
                upsert_metrics(store.connection(), metrics)?;
            }
            print_partition_summary(&report);
            summary.partitions.push(report);
        }

        summary.elapsed = start_time.elapsed();
        print_run_summary(&summary);
        Ok(summary)
    }

    /// Split a year into output units
    ///
    /// Years with more files than `chunk_size` are split into consecutive
    /// chunks (1-based) unless chunking is disabled.
    pub fn plan_units(&self, partition: &YearPartition) -> Vec<OutputUnit> {
        let chunk_size = self.config.chunk_size.max(1);
        if !self.config.chunking_enabled || partition.files.len() <= chunk_size {
            return vec![OutputUnit {
                year: partition.year,
                chunk: None,
                files: partition.files.clone(),
                output_path: self.output_path(partition.year, None),
            }];
        }

        partition
            .files
            .chunks(chunk_size)
            .enumerate()
            .map(|(idx, files)| OutputUnit {
                year: partition.year,
                chunk: Some(idx + 1),
                files: files.to_vec(),
                output_path: self.output_path(partition.year, Some(idx + 1)),
            })
            .collect()
    }

    /// `{year}-{prefix}.csv`, or `{year}-{prefix}_{n}.csv` for chunk `n`
    pub fn output_path(&self, year: u16, chunk: Option<usize>) -> PathBuf {
        let name = match chunk {
            Some(n) => format!("{}-{}_{}.csv", year, self.config.output_prefix, n),
            None => format!("{}-{}.csv", year, self.config.output_prefix),
        };
        self.config.silver_dir.join(name)
    }

    /// Process every unit of a year and fold the written units into year metrics
    pub fn process_partition(&self, partition: &YearPartition) -> PartitionReport {
        info!(
            "Processing year {} ({} files)",
            partition.year,
            partition.files.len()
        );

        let mut units: Vec<UnitReport> = self
            .plan_units(partition)
            .into_iter()
            .map(|unit| {
                debug!("{} -> {:?}", unit.label(), PartitionState::Discovered);
                self.process_unit(unit)
            })
            .collect();

        // Year metrics replace the stored row, so units kept from an earlier
        // run contribute the rows already in their outputs
        if units
            .iter()
            .any(|u| matches!(u.outcome, UnitOutcome::Written(_)))
        {
            for unit in units
                .iter_mut()
                .filter(|u| u.outcome == UnitOutcome::SkippedExisting)
            {
                self.count_existing_output(unit);
            }
        }

        let state = year_state(partition.year, &units);
        PartitionReport {
            year: partition.year,
            state,
            units,
        }
    }

    /// Process one output unit from raw files to canonical CSV
    pub fn process_unit(&self, unit: OutputUnit) -> UnitReport {
        if unit.output_path.exists() {
            info!(
                "Skipping {}: output {} already exists",
                unit.label(),
                unit.output_path.display()
            );
            return UnitReport::new(unit, UnitOutcome::SkippedExisting);
        }

        debug!("{} -> {:?}", unit.label(), PartitionState::Processing);
        let mut report = UnitReport::new(unit, UnitOutcome::NoValidData);
        let mut records: Vec<TripRecord> = Vec::new();
        let mut columns = ColumnSet::new();

        let pb = self.progress_bar(report.unit.files.len());
        pb.set_message(format!("Processing {}", report.unit.label()));

        for path in &report.unit.files {
            if let Some(name) = path.file_name() {
                pb.set_message(format!("Processing: {}", name.to_string_lossy()));
            }

            let df = match read_raw_frame(path, &self.config.null_values) {
                Ok(df) => df,
                Err(e) => {
                    warn!("Failed to read {}: {}", path.display(), e);
                    report.files_failed += 1;
                    pb.inc(1);
                    continue;
                }
            };
            report.stages.raw += df.height();

            match self.transformer.parse_frame(&df, path) {
                Ok(parsed) => {
                    report.files_read += 1;
                    report.issues.merge(&parsed.issues);
                    columns.extend(parsed.columns);
                    records.extend(parsed.records);
                }
                Err(e) => {
                    warn!("Skipped file {}: {}", path.display(), e);
                    report.files_failed += 1;
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        report.stages.after_parsing = records.len();
        if records.is_empty() {
            info!("{}: no valid data", report.unit.label());
            return report;
        }

        let cleaned = self.transformer.clean(records, &columns);
        report.stages.after_dedup = cleaned.after_dedup;
        report.stages.after_quality = cleaned.after_quality;
        report.nulls = cleaned.nulls;
        report.issues.merge(&cleaned.issues);
        info!(
            "{}: dedup strategy {}, quality issues: {}",
            report.unit.label(),
            cleaned.strategy,
            report.issues.summary()
        );
        report.strategy = Some(cleaned.strategy);

        if cleaned.records.is_empty() {
            info!("{}: no rows survived quality filtering", report.unit.label());
            return report;
        }

        let writer = CanonicalWriter::new(report.unit.output_path.clone());
        report.outcome = match writer.write(&cleaned.records) {
            Ok(rows) => {
                info!(
                    "{}: wrote {} rows to {}",
                    report.unit.label(),
                    rows,
                    report.unit.output_path.display()
                );
                UnitOutcome::Written(rows)
            }
            Err(e) => {
                warn!("{}: {}", report.unit.label(), e);
                UnitOutcome::WriteFailed(e.to_string())
            }
        };

        report
    }

    /// Fill a skipped unit's counters from the canonical rows it already holds
    fn count_existing_output(&self, report: &mut UnitReport) {
        let path = &report.unit.output_path;
        let df = match read_raw_frame(path, &self.config.null_values) {
            Ok(df) => df,
            Err(e) => {
                warn!("Could not count existing output {}: {}", path.display(), e);
                return;
            }
        };

        let rows = df.height();
        let nulls_in = |name: &str| df.column(name).map(|c| c.null_count()).unwrap_or(rows);
        report.stages = StageCounts {
            raw: rows,
            after_parsing: rows,
            after_dedup: rows,
            after_quality: rows,
        };
        report.nulls = NullCounts {
            trip_duration: nulls_in("trip_duration"),
            start_time: nulls_in("start_time"),
            start_station_name: nulls_in("start_station_name"),
            user_type: nulls_in("user_type"),
        };
        debug!(
            "{}: counted {} rows already in {}",
            report.unit.label(),
            rows,
            path.display()
        );
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb
    }
}

/// Year state from its unit outcomes
///
/// Metrics sum the units written this run plus the counted rows of units
/// whose output already existed.
fn year_state(year: u16, units: &[UnitReport]) -> PartitionState {
    let mut stages = StageCounts::default();
    let mut nulls = NullCounts::default();
    let mut written = 0;

    for unit in units {
        match unit.outcome {
            UnitOutcome::Written(_) => written += 1,
            UnitOutcome::SkippedExisting => {}
            _ => continue,
        }
        stages.merge(&unit.stages);
        nulls.merge(&unit.nulls);
    }

    if written > 0 {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        return PartitionState::Completed(build_quality_metrics(
            &year.to_string(),
            &stages,
            &nulls,
            timestamp,
        ));
    }

    if !units.is_empty()
        && units
            .iter()
            .all(|u| u.outcome == UnitOutcome::SkippedExisting)
    {
        PartitionState::SkippedExisting
    } else {
        PartitionState::NoValidData
    }
}

fn print_partition_summary(report: &PartitionReport) {
    let year = report.year.to_string();
    match &report.state {
        PartitionState::Completed(metrics) => {
            println!(
                "  {} {} rows in, {} rows out ({:.1}% retained, {} duplicates, {} filtered)",
                format!("{year}:").bright_cyan(),
                metrics.raw_records.to_string().bright_white(),
                metrics.final_records.to_string().bright_white().bold(),
                metrics.retention_pct(),
                metrics.duplicates_removed,
                metrics.quality_filtered
            );
        }
        PartitionState::SkippedExisting => {
            println!(
                "  {} {}",
                format!("{year}:").bright_cyan(),
                "already processed, skipped".dimmed()
            );
        }
        _ => {
            println!(
                "  {} {}",
                format!("{year}:").bright_cyan(),
                "no valid data".bright_yellow()
            );
        }
    }

    let strategies = report.strategies();
    if !strategies.is_empty() {
        let names: Vec<String> = strategies.iter().map(|s| s.to_string()).collect();
        println!("    {} {}", "Dedup key:".dimmed(), names.join(", "));
    }

    let issues = report.issues();
    if !issues.is_empty() {
        let counts: Vec<String> = issues
            .iter()
            .map(|(issue, count)| {
                let effect = if issue.drops_row() { "dropped" } else { "nulled" };
                format!("{issue}={count} ({effect})")
            })
            .collect();
        println!("    {} {}", "Quality issues:".bright_yellow(), counts.join(", "));
    }

    for failed in report.write_failures() {
        if let UnitOutcome::WriteFailed(reason) = &failed.outcome {
            println!(
                "    {} {}: {}",
                "Write failed:".bright_red(),
                failed.unit.label(),
                reason
            );
        }
    }
}

fn print_run_summary(summary: &SilverRunSummary) {
    println!("\n{}", "Silver Summary".bright_green().bold());
    println!(
        "  {} {:.1}s",
        "Time elapsed:".bright_cyan(),
        summary.elapsed.as_secs_f64()
    );
    println!(
        "  {} {} completed, {} skipped, {} without data",
        "Years:".bright_cyan(),
        summary.years_completed().to_string().bright_white(),
        summary.years_skipped(),
        summary.years_without_data()
    );
    println!(
        "  {} {}",
        "Files processed:".bright_cyan(),
        summary.files_read().to_string().bright_white()
    );
    if summary.files_failed() > 0 {
        println!(
            "  {} {}",
            "Files failed:".bright_red(),
            summary.files_failed().to_string().bright_red().bold()
        );
    }
    if summary.write_failures() > 0 {
        println!(
            "  {} {}",
            "Output writes failed:".bright_red(),
            summary.write_failures().to_string().bright_red().bold()
        );
    }
    println!(
        "  {} {}",
        "Rows written:".bright_cyan(),
        summary.rows_written().to_string().bright_white().bold()
    );
}
