// src/model/mod.rs
//! Domain model: records, partitions and their identities.

pub mod partition;
pub mod record;

pub use partition::{PartitionIdentity, WorkUnit, WorkerId};
pub use record::{GroupKey, Record, RecordFields};
