// src/pipeline.rs
//! Pipeline capability traits — abstract the four stages of the harvest
//! pipeline.
//!
//! Each trait describes a single capability, enabling testing each stage
//! in isolation: load records, plan partitions, run them, merge results.

use crate::aggregate::MergeReport;
use crate::dispatch::DispatchReport;
use crate::error::HarvestError;
use crate::model::{PartitionIdentity, Record, WorkUnit};

/// Produces the records to harvest from the configured inputs.
pub trait RecordSource {
    fn load(&self) -> Result<Vec<Record>, HarvestError>;
}

/// Splits records into isolated, ordered units of work.
pub trait WorkPlanner {
    fn plan(&self, records: Vec<Record>) -> Vec<WorkUnit>;
}

/// Runs planned units to completion under bounded concurrency.
#[async_trait::async_trait]
pub trait WorkDispatcher {
    async fn dispatch(&self, units: Vec<WorkUnit>) -> DispatchReport;
}

/// Combines per-partition results into the final output.
pub trait ResultMerger {
    fn merge(&self, expected: &[PartitionIdentity]) -> Result<MergeReport, HarvestError>;
}
