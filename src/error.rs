// src/error.rs
//! Harvest error types with structured error handling.
//!
//! The error hierarchy mirrors the failure taxonomy of the pipeline:
//! record- and item-level failures are a *skip vocabulary* (`SkipReason`)
//! that never propagates past the record boundary, partition-level
//! failures are `PartitionError` and reach the dispatcher, and job-level
//! failures are `HarvestError` and halt the run.

use crate::model::PartitionIdentity;
use std::path::PathBuf;
use thiserror::Error;

/// Why a record or item was skipped, as a typed vocabulary.
///
/// Instead of blanket catch-and-ignore blocks, every skip carries the
/// reason it happened, so failure paths are distinguishable: a timeout
/// is not a missing field, and a missing field is not a scoring failure.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The page's expected content markers never appeared within the wait.
    PageContentTimeout { url: String },
    /// The page loaded but could not be fetched or parsed at all.
    PageUnavailable { url: String, cause: String },
    /// A triggered attachment download never landed within the wait.
    AttachmentTimeout { form_name: String },
    /// The attachment trigger itself failed before any download started.
    AttachmentTrigger { form_name: String, cause: String },
    /// The text-extraction collaborator failed on a downloaded artifact.
    TextExtraction { path: PathBuf, cause: String },
    /// The scoring collaborator failed on extracted text.
    Scoring { cause: String },
}

impl SkipReason {
    /// Whether this skip was caused by a bounded wait elapsing.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::PageContentTimeout { .. } | Self::AttachmentTimeout { .. }
        )
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PageContentTimeout { url } => {
                write!(f, "content markers never appeared for {}", url)
            }
            Self::PageUnavailable { url, cause } => {
                write!(f, "page unavailable at {}: {}", url, cause)
            }
            Self::AttachmentTimeout { form_name } => {
                write!(f, "no attachment landed for item '{}'", form_name)
            }
            Self::AttachmentTrigger { form_name, cause } => {
                write!(f, "attachment trigger failed for '{}': {}", form_name, cause)
            }
            Self::TextExtraction { path, cause } => {
                write!(f, "text extraction failed for {}: {}", path.display(), cause)
            }
            Self::Scoring { cause } => write!(f, "scoring failed: {}", cause),
        }
    }
}

/// Failures in the page-driver collaborator.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The driver context could not be brought up at all. Partition-fatal.
    #[error("Failed to start driver context: {cause}")]
    Startup { cause: String },

    /// The consent flow for a group key did not complete. The session
    /// manager degrades to an unauthenticated session on this.
    #[error("Session flow failed for '{group_key}': {cause}")]
    SessionFlow { group_key: String, cause: String },

    /// The expected content markers never appeared within the wait.
    #[error("Timed out waiting for content markers at {url}")]
    ContentTimeout { url: String },

    /// HTTP transport failure while talking to the upstream site.
    #[error("Network failure: {0}")]
    Network(#[from] reqwest::Error),

    /// The page fetched but its structure could not be read.
    #[error("Failed to parse page at {url}: {cause}")]
    Parse { url: String, cause: String },

    /// A triggered download failed before producing any file.
    #[error("Attachment download failed for {url}: {cause}")]
    Download { url: String, cause: String },
}

/// Failures in the text-extraction and scoring collaborators.
#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("No scoreable text (zero words)")]
    EmptyText,

    #[error("PDF library unavailable: {reason}")]
    PdfLibrary { reason: String },

    #[error("Failed to read PDF {path}: {reason}")]
    PdfRead { path: PathBuf, reason: String },

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Why a whole partition failed. Reaches the dispatcher; siblings keep
/// running.
#[derive(Error, Debug)]
pub enum PartitionError {
    #[error("Worker context failed to start for {identity}: {source}")]
    Startup {
        identity: PartitionIdentity,
        source: DriverError,
    },

    #[error("Failed to persist results for {identity}: {source}")]
    ResultWrite {
        identity: PartitionIdentity,
        source: HarvestError,
    },

    #[error("Worker task for {identity} aborted: {cause}")]
    WorkerAborted { identity: PartitionIdentity, cause: String },
}

impl PartitionError {
    pub fn identity(&self) -> &PartitionIdentity {
        match self {
            Self::Startup { identity, .. }
            | Self::ResultWrite { identity, .. }
            | Self::WorkerAborted { identity, .. } => identity,
        }
    }
}

/// Top-level harvest error type.
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Input {path} produced no records to harvest")]
    EmptyInput { path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    InputRead {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Filesystem IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No partition produced a result file ({expected} expected) — nothing to merge")]
    NoResults { expected: usize },

    #[error("{} partition(s) did not complete: {}", missing.len(), missing.join(", "))]
    IncompleteRun { missing: Vec<String> },

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_reason_timeouts_are_distinguishable() {
        let page = SkipReason::PageContentTimeout {
            url: "http://example.com/f?id=1".into(),
        };
        let attachment = SkipReason::AttachmentTimeout {
            form_name: "Form A".into(),
        };
        let parse = SkipReason::Scoring {
            cause: "zero words".into(),
        };
        assert!(page.is_timeout());
        assert!(attachment.is_timeout());
        assert!(!parse.is_timeout());
    }

    #[test]
    fn incomplete_run_names_missing_partitions() {
        let err = HarvestError::IncompleteRun {
            missing: vec!["CA chunk 2/3".into(), "TX chunk 1/1".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("CA chunk 2/3"));
        assert!(msg.contains("TX chunk 1/1"));
        assert!(msg.contains("2 partition(s)"));
    }
}
