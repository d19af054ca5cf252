// src/main.rs

use clap::Parser;
use formharvest::aggregate::{merge_results, MergeReport};
use formharvest::config::{CommandLineInput, HarvestConfig};
use formharvest::dispatch::{dispatch_all, pool_size, DispatchReport};
use formharvest::driver::SerffDriverFactory;
use formharvest::error::HarvestError;
use formharvest::extract::PartitionStats;
use formharvest::input::load_records;
use formharvest::model::{PartitionIdentity, Record, WorkUnit};
use formharvest::partition::build_partitions;
use formharvest::pipeline::{RecordSource, ResultMerger, WorkDispatcher, WorkPlanner};
use formharvest::reclaim::reclaim_scratch;
use formharvest::score::{FleschScorer, PdfiumTextExtractor};
use formharvest::worker::WorkerEnv;
use log::LevelFilter;
use log4rs::{
    append::console::ConsoleAppender,
    append::file::FileAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
    Config,
};
use std::collections::HashSet;
use std::fs;
use std::sync::{Arc, Mutex};

/// Sets up logging configuration.
fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let log_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };

    let log_file_path = std::env::temp_dir().join("formharvest.log");
    if let Some(parent) = log_file_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let pattern = if verbose {
        "{d(%Y-%m-%d %H:%M:%S)} [{l}] - {m}{n}"
    } else {
        "{m}{n}"
    };

    let stdout_appender = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(pattern)))
        .build();

    let file_appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} [{l}] - {m}{n}",
        )))
        .build(&log_file_path)?;

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout_appender)))
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Debug)))
                .build("file", Box::new(file_appender)),
        )
        .build(
            Root::builder()
                .appender("stdout")
                .appender("file")
                .build(log_level),
        )?;

    log4rs::init_config(config)?;
    log::info!("Logging initialized. Log file: {}", log_file_path.display());
    Ok(())
}

/// Executes the four-stage harvest pipeline: load → plan → dispatch → merge.
async fn execute_pipeline(config: &HarvestConfig) -> Result<(), HarvestError> {
    let job = HarvestJob::new(config);

    let records = job.load()?;
    let units = job.plan(records);
    let expected: Vec<PartitionIdentity> = units.iter().map(|u| u.identity.clone()).collect();

    let dispatched = job.dispatch(units).await;
    let merged = job.merge(&expected)?;
    job.report_completion(&dispatched, &merged)?;

    Ok(())
}

/// Orchestrates loading, partitioning, harvesting and merging.
struct HarvestJob<'a> {
    config: &'a HarvestConfig,
}

impl<'a> HarvestJob<'a> {
    fn new(config: &'a HarvestConfig) -> Self {
        Self { config }
    }

    /// Reports completion to the user with stats and any shortfalls.
    fn report_completion(
        &self,
        dispatched: &DispatchReport,
        merged: &MergeReport,
    ) -> Result<(), HarvestError> {
        let totals = dispatched
            .completed
            .iter()
            .fold(PartitionStats::default(), |mut acc, report| {
                acc.records_processed += report.stats.records_processed;
                acc.records_skipped += report.stats.records_skipped;
                acc.items_extracted += report.stats.items_extracted;
                acc.scores_computed += report.stats.scores_computed;
                acc.null_scores += report.stats.null_scores;
                acc.attachment_timeouts += report.stats.attachment_timeouts;
                acc.degraded_sessions += report.stats.degraded_sessions;
                acc
            });

        println!("📄 Harvested {}", totals);

        if totals.degraded_sessions > 0 {
            eprintln!(
                "⚠️  {} session flow(s) degraded to unauthenticated access.",
                totals.degraded_sessions
            );
        }

        for failure in &dispatched.failed {
            eprintln!("⚠️  Partition failed: {}", failure);
        }

        if merged.is_complete() {
            println!(
                "✓ Merged {} partition file(s), {} row(s)",
                merged.merged_files, merged.rows
            );
            println!("✅ Results saved to {}", self.config.output.display());
            Ok(())
        } else {
            eprintln!(
                "⚠️  {} written with {} partition(s) missing. Re-run with --resume to fill the gaps.",
                self.config.output.display(),
                merged.missing.len()
            );
            Err(HarvestError::IncompleteRun {
                missing: merged.missing.clone(),
            })
        }
    }
}

impl RecordSource for HarvestJob<'_> {
    fn load(&self) -> Result<Vec<Record>, HarvestError> {
        log::info!("Loading records from {}", self.config.input.display());
        let records = load_records(&self.config.input, self.config.filter.as_deref())?;
        log::info!("Loaded {} record(s)", records.len());
        Ok(records)
    }
}

impl WorkPlanner for HarvestJob<'_> {
    fn plan(&self, records: Vec<Record>) -> Vec<WorkUnit> {
        build_partitions(records, self.config.chunk_policy)
    }
}

#[async_trait::async_trait]
impl WorkDispatcher for HarvestJob<'_> {
    async fn dispatch(&self, units: Vec<WorkUnit>) -> DispatchReport {
        let workers = pool_size(units.len(), self.config.worker_cap);

        let env = Arc::new(WorkerEnv {
            factory: Arc::new(SerffDriverFactory::new(self.config.driver_options.clone())),
            extractor: Arc::new(PdfiumTextExtractor::new()),
            scorer: Arc::new(FleschScorer),
            tuning: self.config.tuning.clone(),
            work_dir: self.config.work_dir.clone(),
            scratch_root: self.config.scratch_root.clone(),
            checkpoint_every: self.config.checkpoint_every,
            resume: self.config.resume,
            live_scratch: Mutex::new(HashSet::new()),
        });

        let report = dispatch_all(units, Arc::clone(&env), workers).await;

        // Final sweep: with no workers live, everything left is stale.
        reclaim_scratch(
            std::slice::from_ref(&self.config.scratch_root),
            &HashSet::new(),
        );

        report
    }
}

impl ResultMerger for HarvestJob<'_> {
    fn merge(&self, expected: &[PartitionIdentity]) -> Result<MergeReport, HarvestError> {
        merge_results(
            &self.config.work_dir,
            expected,
            &self.config.output,
            self.config.tuning.score_attachments,
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CommandLineInput::parse();

    setup_logging(cli.verbose)?;

    let config = HarvestConfig::resolve(cli)?;

    execute_pipeline(&config).await?;

    Ok(())
}
