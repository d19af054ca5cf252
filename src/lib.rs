// src/lib.rs
//! formharvest library — harvests filing metadata and attachment
//! readability scores from state-partitioned filing pages into one
//! merged CSV.
//!
//! # Public API
//!
//! The library exposes types organized by concern:
//! - **Error handling** — `HarvestError`, `PartitionError`, `SkipReason`
//! - **Configuration** — `HarvestConfig`, `CommandLineInput`
//! - **Domain model** — `Record`, `GroupKey`, `WorkUnit`, `PartitionIdentity`
//! - **Partitioning** — `build_partitions`, `ChunkPolicy`
//! - **Workers** — `run_partition`, `WorkerEnv`, `dispatch_all`
//! - **Driver** — `PageDriver`, `SerffDriverFactory`
//! - **Scoring** — `FleschScorer`, `PdfiumTextExtractor`
//! - **Aggregation** — `merge_results`, `MergeReport`

pub mod aggregate;
pub mod artifact;
pub mod checkpoint;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod error_recovery;
pub mod extract;
pub mod input;
pub mod model;
pub mod output;
pub mod partition;
pub mod pipeline;
pub mod reclaim;
pub mod score;
pub mod session;
pub mod worker;

// --- Error Handling ---
pub use crate::error::{DriverError, HarvestError, PartitionError, ScoreError, SkipReason};

// --- Configuration ---
pub use crate::config::{CommandLineInput, HarvestConfig};

// --- Domain Model ---
pub use crate::model::{GroupKey, PartitionIdentity, Record, RecordFields, WorkUnit, WorkerId};

// --- Partitioning ---
pub use crate::partition::{build_partitions, ChunkPolicy};

// --- Workers ---
pub use crate::dispatch::{dispatch_all, pool_size, DispatchReport};
pub use crate::extract::{ExtractionPipeline, PartitionStats, PipelineTuning};
pub use crate::worker::{run_partition, PartitionReport, WorkerEnv};

// --- Driver ---
pub use crate::driver::{
    AttachmentRef, DriverFactory, DriverOptions, PageContent, PageDriver, PageItem,
    SerffDriverFactory,
};

// --- Scoring ---
pub use crate::score::{FleschScorer, PdfiumTextExtractor, ReadabilityScore, TextExtract};

// --- Aggregation ---
pub use crate::aggregate::{merge_results, MergeReport};

// --- Pipeline Traits ---
pub use crate::pipeline::{RecordSource, ResultMerger, WorkDispatcher, WorkPlanner};
