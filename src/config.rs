// src/config.rs
use crate::constants::{
    DEFAULT_CHECKPOINT_EVERY, DEFAULT_CHUNK_SIZE, DEFAULT_DOWNLOAD_WAIT_SECS,
    DEFAULT_PAGE_WAIT_SECS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WORKER_CAP,
};
use crate::driver::DriverOptions;
use crate::error::HarvestError;
use crate::extract::PipelineTuning;
use crate::partition::ChunkPolicy;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Stable scratch root under the system temp directory.
///
/// Deliberately constant across runs: reclamation scans this root, and a
/// per-run root would put a crashed run's leftover scratch directories
/// out of reach of every later run. Per-worker uniqueness comes from the
/// scratch-dir naming, not from the root.
fn default_scratch_root() -> PathBuf {
    std::env::temp_dir().join("formharvest")
}

/// Parsed and validated command-line input.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CommandLineInput {
    /// CSV of filing pages to harvest (columns: page_url, state, serf_num)
    pub input: PathBuf,

    /// Secondary CSV joined on serf_num; only matching records are kept
    #[arg(long)]
    pub filter: Option<PathBuf>,

    /// Final merged output file
    #[arg(short, long, default_value = "results.csv")]
    pub output: PathBuf,

    /// Directory for checkpoints and partial results
    #[arg(long, default_value = "outputs")]
    pub work_dir: PathBuf,

    /// Root for per-worker scratch directories (defaults to temp dir)
    #[arg(long)]
    pub scratch_root: Option<PathBuf>,

    /// Records per partition chunk
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Size chunks by the smallest state's record count instead of --chunk-size
    #[arg(long, default_value_t = false)]
    pub equal_split: bool,

    /// Maximum concurrent workers (default: min of CPUs and 7)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Checkpoint every N processed records (0 disables checkpointing)
    #[arg(long, default_value_t = DEFAULT_CHECKPOINT_EVERY)]
    pub checkpoint_every: usize,

    /// Seconds to wait for a page's content markers
    #[arg(long, default_value_t = DEFAULT_PAGE_WAIT_SECS)]
    pub page_wait_secs: u64,

    /// Seconds to wait for a triggered attachment download
    #[arg(long, default_value_t = DEFAULT_DOWNLOAD_WAIT_SECS)]
    pub download_wait_secs: u64,

    /// Milliseconds between download-detection polls
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// Metadata only: skip attachment downloads and readability scoring
    #[arg(long, default_value_t = false)]
    pub no_attachments: bool,

    /// Resume interrupted partitions from their checkpoints
    #[arg(long, default_value_t = false)]
    pub resume: bool,

    /// Enable verbose logging (debug level)
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

/// Resolved harvest configuration — validated and ready to drive all
/// four stages.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub input: PathBuf,
    pub filter: Option<PathBuf>,
    pub output: PathBuf,
    pub work_dir: PathBuf,
    pub scratch_root: PathBuf,
    pub chunk_policy: ChunkPolicy,
    pub worker_cap: usize,
    pub checkpoint_every: usize,
    pub tuning: PipelineTuning,
    pub resume: bool,
    #[allow(dead_code)] // Used by bin crate
    pub verbose: bool,
    pub driver_options: DriverOptions,
}

impl HarvestConfig {
    /// Resolves a complete harvest configuration from CLI input and
    /// environment.
    pub fn resolve(cli: CommandLineInput) -> Result<Self, HarvestError> {
        if !cli.input.is_file() {
            return Err(HarvestError::MissingConfiguration(format!(
                "input file {} does not exist",
                cli.input.display()
            )));
        }
        if let Some(filter) = &cli.filter {
            if !filter.is_file() {
                return Err(HarvestError::MissingConfiguration(format!(
                    "filter file {} does not exist",
                    filter.display()
                )));
            }
        }

        let chunk_policy = if cli.equal_split {
            ChunkPolicy::SmallestGroup
        } else {
            ChunkPolicy::Fixed(cli.chunk_size.max(1))
        };

        let tuning = PipelineTuning {
            page_wait: Duration::from_secs(cli.page_wait_secs),
            download_wait: Duration::from_secs(cli.download_wait_secs),
            poll_interval: Duration::from_millis(cli.poll_interval_ms.max(1)),
            score_attachments: !cli.no_attachments,
        };

        let driver_options = DriverOptions {
            browser_binary: std::env::var_os("BROWSER_BINARY").map(PathBuf::from),
            driver_path: std::env::var_os("DRIVER_PATH").map(PathBuf::from),
        };

        Ok(HarvestConfig {
            input: cli.input,
            filter: cli.filter,
            output: cli.output,
            work_dir: cli.work_dir,
            scratch_root: cli.scratch_root.unwrap_or_else(default_scratch_root),
            chunk_policy,
            worker_cap: cli.workers.unwrap_or(DEFAULT_WORKER_CAP).max(1),
            checkpoint_every: cli.checkpoint_every,
            tuning,
            resume: cli.resume,
            verbose: cli.verbose,
            driver_options,
        })
    }
}
