// src/partition.rs
//! Work partitioner: splits the record set into bounded, group-keyed
//! units of work.
//!
//! Partitioning must be complete and disjoint: for every group key, the
//! union of its partitions' records is exactly the group's records, each
//! appearing once. Partitions are ordered largest-first so the fixed
//! worker pool starts on the biggest units early and the pipeline tail
//! stays short.

use crate::model::{GroupKey, PartitionIdentity, Record, WorkUnit};
use std::collections::HashMap;

/// How the target chunk size is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPolicy {
    /// Every group is split into chunks of at most this many records.
    Fixed(usize),
    /// The chunk size is the size of the smallest group, so every worker
    /// gets a unit of comparable weight.
    SmallestGroup,
}

/// Splits records into partitions according to the chunk policy.
///
/// Groups are keyed by each record's group key, preserving input order
/// within a group. A group no larger than the chunk size yields exactly
/// one partition; larger groups are split by ceiling division. Empty
/// input yields zero partitions.
pub fn build_partitions(records: Vec<Record>, policy: ChunkPolicy) -> Vec<WorkUnit> {
    let groups = group_by_key(records);
    if groups.is_empty() {
        return Vec::new();
    }

    let chunk_size = match policy {
        ChunkPolicy::Fixed(size) => size.max(1),
        ChunkPolicy::SmallestGroup => groups
            .iter()
            .map(|(_, records)| records.len())
            .min()
            .unwrap_or(1)
            .max(1),
    };
    log::info!(
        "Partitioning {} group(s) with chunk size {}",
        groups.len(),
        chunk_size
    );

    let mut units = Vec::new();
    for (key, group_records) in groups {
        let total = group_records.len().div_ceil(chunk_size);
        if total > 1 {
            log::info!("  - {}: split into {} chunks", key, total);
        }

        let mut chunks: Vec<Vec<Record>> = Vec::with_capacity(total);
        let mut current = Vec::with_capacity(chunk_size.min(group_records.len()));
        for record in group_records {
            current.push(record);
            if current.len() == chunk_size {
                chunks.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            chunks.push(current);
        }

        for (index, chunk) in chunks.into_iter().enumerate() {
            units.push(WorkUnit::new(
                PartitionIdentity::new(key.clone(), index, total),
                chunk,
            ));
        }
    }

    // Largest units first; stable so equal sizes keep group order.
    units.sort_by(|a, b| b.len().cmp(&a.len()));
    units
}

/// Groups records by key, keeping groups in first-seen order and records
/// in input order within each group.
fn group_by_key(records: Vec<Record>) -> Vec<(GroupKey, Vec<Record>)> {
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<(GroupKey, Vec<Record>)> = Vec::new();

    for record in records {
        let key = record.state.clone();
        match index.get(&key) {
            Some(&slot) => groups[slot].1.push(record),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![record]));
            }
        }
    }
    groups
}
