// src/score/mod.rs
//! Scoring capability traits: text extraction (`File -> Text`) and
//! readability scoring (`Text -> Score`).
//!
//! The extraction pipeline consumes both as pure capabilities; either
//! failing yields a `null` score for that item, never a pipeline
//! failure.

pub mod flesch;
pub mod pdftext;

use crate::error::ScoreError;
use std::path::Path;

pub use flesch::FleschScorer;
pub use pdftext::PdfiumTextExtractor;

/// Extracts scoreable text from a downloaded artifact.
pub trait TextExtract: Send + Sync {
    fn extract_text(&self, file: &Path) -> Result<String, ScoreError>;
}

/// Computes a readability score over extracted text.
pub trait ReadabilityScore: Send + Sync {
    fn score(&self, text: &str) -> Result<f64, ScoreError>;
}
