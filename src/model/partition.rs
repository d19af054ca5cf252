// src/model/partition.rs
//! Partition identity and the unit of work handed to one worker.
//!
//! Every path the pipeline writes — scratch dirs, checkpoints, partial
//! results — embeds the partition identity plus the worker id, so
//! concurrently running workers can never collide. Identity is explicit
//! `(group_key, index, total)` rather than anything derived from OS
//! process ids.

use super::record::{GroupKey, Record};
use std::fmt;
use uuid::Uuid;

/// Identifies one worker for the lifetime of one partition run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerId(String);

impl WorkerId {
    /// A fresh random id. Short enough for filenames, unique enough that
    /// two runs of the same partition never share paths.
    pub fn random() -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        Self(uuid[..8].to_string())
    }

    #[cfg(test)]
    pub fn fixed(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The `(group key, partition index, total partitions)` tuple that names
/// one partition of one group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionIdentity {
    pub group_key: GroupKey,
    /// Zero-based index of this partition within its group.
    pub index: usize,
    /// How many partitions the group was split into.
    pub total: usize,
}

impl PartitionIdentity {
    pub fn new(group_key: GroupKey, index: usize, total: usize) -> Self {
        debug_assert!(index < total, "partition index out of range");
        Self {
            group_key,
            index,
            total,
        }
    }

    /// Filename stem without the worker id:
    /// `{sanitized_key}_chunk{i+1}of{total}`.
    pub fn file_stem(&self) -> String {
        format!(
            "{}_chunk{}of{}",
            self.group_key.sanitized(),
            self.index + 1,
            self.total
        )
    }

    /// Filename stem for a specific worker's files:
    /// `{sanitized_key}_chunk{i+1}of{total}_{worker}`.
    pub fn file_stem_for(&self, worker: &WorkerId) -> String {
        format!("{}_{}", self.file_stem(), worker)
    }
}

impl fmt::Display for PartitionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} chunk {}/{}",
            self.group_key,
            self.index + 1,
            self.total
        )
    }
}

/// A bounded, ordered slice of one group's records, consumed exactly
/// once by one worker. Immutable after the partitioner builds it.
#[derive(Debug, Clone)]
pub struct WorkUnit {
    pub identity: PartitionIdentity,
    pub records: Vec<Record>,
}

impl WorkUnit {
    pub fn new(identity: PartitionIdentity, records: Vec<Record>) -> Self {
        Self { identity, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stem_encodes_identity() {
        let identity = PartitionIdentity::new(GroupKey::new("CA"), 1, 3);
        assert_eq!(identity.file_stem(), "CA_chunk2of3");
        assert_eq!(
            identity.file_stem_for(&WorkerId::fixed("ab12cd34")),
            "CA_chunk2of3_ab12cd34"
        );
    }

    #[test]
    fn file_stem_sanitizes_group_key() {
        let identity = PartitionIdentity::new(GroupKey::new("P.R."), 0, 1);
        assert_eq!(identity.file_stem(), "P_R__chunk1of1");
    }

    #[test]
    fn display_is_one_based() {
        let identity = PartitionIdentity::new(GroupKey::new("TX"), 0, 2);
        assert_eq!(identity.to_string(), "TX chunk 1/2");
    }

    #[test]
    fn random_worker_ids_are_distinct() {
        assert_ne!(WorkerId::random(), WorkerId::random());
    }
}
