// src/dispatch.rs
//! Bounded-concurrency dispatch of partitions onto workers.
//!
//! The pool size is the smallest of the machine's logical CPUs, the
//! configured cap and the number of partitions, never below one. Every
//! partition is spawned up front; a semaphore admits at most N at a
//! time. Failures stay contained: a partition that fails (or whose task
//! panics) lands in the failed list and its siblings keep running.

use crate::error::PartitionError;
use crate::model::{PartitionIdentity, WorkUnit};
use crate::worker::{run_partition, PartitionReport, WorkerEnv};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Per-run outcome of the whole pool.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub completed: Vec<PartitionReport>,
    pub failed: Vec<PartitionError>,
}

impl DispatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// How many workers to run for `unit_count` partitions under `cap`.
pub fn pool_size(unit_count: usize, cap: usize) -> usize {
    num_cpus::get().min(cap).min(unit_count).max(1)
}

/// Runs every partition to completion, at most `workers` at a time.
pub async fn dispatch_all(units: Vec<WorkUnit>, env: Arc<WorkerEnv>, workers: usize) -> DispatchReport {
    let permits = Arc::new(Semaphore::new(workers.max(1)));
    log::info!(
        "Dispatching {} partition(s) across {} worker(s)",
        units.len(),
        workers.max(1)
    );

    let handles: Vec<(PartitionIdentity, JoinHandle<Result<PartitionReport, PartitionError>>)> =
        units
            .into_iter()
            .map(|unit| {
                let identity = unit.identity.clone();
                let env = Arc::clone(&env);
                let permits = Arc::clone(&permits);
                let handle = tokio::spawn(async move {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .expect("dispatch semaphore closed");
                    run_partition(unit, env).await
                });
                (identity, handle)
            })
            .collect();

    let mut report = DispatchReport::default();
    for (identity, handle) in handles {
        match handle.await {
            Ok(Ok(done)) => report.completed.push(done),
            Ok(Err(e)) => {
                log::error!("⚠️ Partition failed: {}", e);
                report.failed.push(e);
            }
            // The task itself died (panic or cancellation).
            Err(join_err) => {
                let aborted = PartitionError::WorkerAborted {
                    identity,
                    cause: join_err.to_string(),
                };
                log::error!("⚠️ Partition failed: {}", aborted);
                report.failed.push(aborted);
            }
        }
    }

    log::info!(
        "Dispatch finished: {} completed, {} failed",
        report.completed.len(),
        report.failed.len()
    );
    report
}
