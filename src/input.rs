// src/input.rs
//! Loads the input dataset and applies the optional serf_num filter join.

use crate::error::HarvestError;
use crate::model::{GroupKey, Record};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// One row of the input dataset as it appears on disk.
#[derive(Debug, Deserialize)]
struct InputRow {
    page_url: String,
    state: String,
    #[serde(default)]
    serf_num: Option<String>,
}

/// One row of the secondary filter dataset.
#[derive(Debug, Deserialize)]
struct FilterRow {
    serf_num: String,
}

/// Reads the input CSV into records, optionally restricted to rows whose
/// `serf_num` appears in the filter dataset.
///
/// An empty result is job-fatal: there is nothing to partition and a
/// silent zero-partition run would look like success.
pub fn load_records(input: &Path, filter: Option<&Path>) -> Result<Vec<Record>, HarvestError> {
    let allowed = match filter {
        Some(path) => Some(load_filter_keys(path)?),
        None => None,
    };

    let mut reader = csv::Reader::from_path(input).map_err(|source| HarvestError::InputRead {
        path: input.to_path_buf(),
        source,
    })?;

    let mut records = Vec::new();
    let mut filtered_out = 0usize;

    for row in reader.deserialize::<InputRow>() {
        let row = row.map_err(|source| HarvestError::InputRead {
            path: input.to_path_buf(),
            source,
        })?;

        if let Some(allowed) = &allowed {
            match &row.serf_num {
                Some(num) if allowed.contains(num) => {}
                _ => {
                    filtered_out += 1;
                    continue;
                }
            }
        }

        records.push(Record::new(
            row.page_url,
            GroupKey::new(row.state),
            row.serf_num,
        ));
    }

    if filtered_out > 0 {
        log::info!(
            "Filter dropped {} row(s); {} remain",
            filtered_out,
            records.len()
        );
    }

    if records.is_empty() {
        return Err(HarvestError::EmptyInput {
            path: input.to_path_buf(),
        });
    }

    log::info!("Loaded {} record(s) from {}", records.len(), input.display());
    Ok(records)
}

/// Reads the set of join keys from the filter dataset.
fn load_filter_keys(path: &Path) -> Result<HashSet<String>, HarvestError> {
    let mut reader = csv::Reader::from_path(path).map_err(|source| HarvestError::InputRead {
        path: path.to_path_buf(),
        source,
    })?;

    let mut keys = HashSet::new();
    for row in reader.deserialize::<FilterRow>() {
        let row = row.map_err(|source| HarvestError::InputRead {
            path: path.to_path_buf(),
            source,
        })?;
        keys.insert(row.serf_num);
    }

    log::info!("Loaded {} filter key(s) from {}", keys.len(), path.display());
    Ok(keys)
}
