// src/model/record.rs
//! The record: one source page plus its monotonically accumulated output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The partitioning attribute — a state/jurisdiction name. Also scopes
/// session reuse: all records sharing a group key share one session
/// within a worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupKey(String);

impl GroupKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filename-safe form of the key: alphanumerics, spaces, dashes and
    /// underscores survive, everything else becomes `_`.
    pub fn sanitized(&self) -> String {
        self.0
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Output fields of a record. They accumulate monotonically during
/// processing — append-only, never revised once written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFields {
    /// Names of the items discovered on the page, in discovery order.
    pub form_names: Vec<String>,
    /// The page's submission date, if present.
    pub submission_date: Option<String>,
    /// One entry per discovered attachment, `None` when scoring failed.
    pub flesch_scores: Vec<Option<f64>>,
}

impl RecordFields {
    pub fn push_form_name(&mut self, name: impl Into<String>) {
        self.form_names.push(name.into());
    }

    pub fn push_score(&mut self, score: Option<f64>) {
        self.flesch_scores.push(score);
    }

    /// Sets the submission date exactly once; later calls are ignored so
    /// fields stay write-once.
    pub fn set_submission_date(&mut self, date: Option<String>) {
        if self.submission_date.is_none() {
            self.submission_date = date;
        }
    }
}

/// One unit of source data: a page locator, its group key, an optional
/// join key for the secondary filter dataset, and the accumulated output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub page_url: String,
    pub state: GroupKey,
    pub serf_num: Option<String>,
    #[serde(default)]
    pub fields: RecordFields,
}

impl Record {
    pub fn new(page_url: impl Into<String>, state: GroupKey, serf_num: Option<String>) -> Self {
        Self {
            page_url: page_url.into(),
            state,
            serf_num,
            fields: RecordFields::default(),
        }
    }
}
