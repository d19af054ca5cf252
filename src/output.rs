// src/output.rs
//! Record CSV persistence: the one place result rows are encoded and
//! decoded.
//!
//! Checkpoints, partial results and the merged output all share this row
//! shape, so a checkpoint can be read back as a resume prefix and the
//! aggregator can concatenate partials without re-interpreting them.
//! List-valued cells (`form_name`, `flesch_reading_ease`) are JSON
//! arrays.

use crate::constants::{CHECKPOINT_PREFIX, PARTIAL_PREFIX};
use crate::error::HarvestError;
use crate::model::{GroupKey, PartitionIdentity, Record, RecordFields, WorkerId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One output row as it appears on disk.
#[derive(Debug, Serialize, Deserialize)]
struct ResultRow {
    page_url: String,
    state: String,
    serf_num: Option<String>,
    /// JSON array of item names.
    form_name: String,
    submission_date: Option<String>,
    /// JSON array of number-or-null. Absent column in metadata-only mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    flesch_reading_ease: Option<String>,
}

/// Path of a partition's final result file.
pub fn partial_path(work_dir: &Path, identity: &PartitionIdentity, worker: &WorkerId) -> PathBuf {
    work_dir.join(format!(
        "{}{}.csv",
        PARTIAL_PREFIX,
        identity.file_stem_for(worker)
    ))
}

/// Path of a partition's checkpoint file.
pub fn checkpoint_path(
    work_dir: &Path,
    identity: &PartitionIdentity,
    worker: &WorkerId,
) -> PathBuf {
    work_dir.join(format!(
        "{}{}.csv",
        CHECKPOINT_PREFIX,
        identity.file_stem_for(worker)
    ))
}

/// Writes records to `path`, creating parent directories as needed.
///
/// `with_scores` controls whether the `flesch_reading_ease` column is
/// present; in metadata-only mode it is omitted entirely rather than
/// written empty.
pub fn write_records(
    path: &Path,
    records: &[Record],
    with_scores: bool,
) -> Result<(), HarvestError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(encode_row(record, with_scores)?)?;
    }
    writer.flush()?;

    log::debug!("Wrote {} record(s) to {}", records.len(), path.display());
    Ok(())
}

/// Reads records back from a file previously written by [`write_records`].
pub fn read_records(path: &Path) -> Result<Vec<Record>, HarvestError> {
    let mut reader = csv::Reader::from_path(path).map_err(|source| HarvestError::InputRead {
        path: path.to_path_buf(),
        source,
    })?;

    let mut records = Vec::new();
    for row in reader.deserialize::<ResultRow>() {
        let row = row.map_err(|source| HarvestError::InputRead {
            path: path.to_path_buf(),
            source,
        })?;
        records.push(decode_row(row)?);
    }
    Ok(records)
}

fn encode_row(record: &Record, with_scores: bool) -> Result<ResultRow, HarvestError> {
    Ok(ResultRow {
        page_url: record.page_url.clone(),
        state: record.state.as_str().to_string(),
        serf_num: record.serf_num.clone(),
        form_name: serde_json::to_string(&record.fields.form_names)?,
        submission_date: record.fields.submission_date.clone(),
        flesch_reading_ease: if with_scores {
            Some(serde_json::to_string(&record.fields.flesch_scores)?)
        } else {
            None
        },
    })
}

fn decode_row(row: ResultRow) -> Result<Record, HarvestError> {
    let fields = RecordFields {
        form_names: serde_json::from_str(&row.form_name)?,
        submission_date: row.submission_date,
        flesch_scores: match row.flesch_reading_ease.as_deref() {
            Some(cell) if !cell.is_empty() => serde_json::from_str(cell)?,
            _ => Vec::new(),
        },
    };

    Ok(Record {
        page_url: row.page_url,
        state: GroupKey::new(row.state),
        serf_num: row.serf_num.filter(|s| !s.is_empty()),
        fields,
    })
}
