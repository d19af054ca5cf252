// src/score/pdftext.rs
//! PDF text extraction via Google PDFium.
//!
//! `PdfiumTextExtractor` is stateless (`Send + Sync`). Each extraction
//! loads a fresh `Pdfium` handle because the upstream type is `!Send`;
//! the OS caches `dlopen` calls, so repeat loads are near-free. Library
//! discovery: `PDFIUM_DYNAMIC_LIB_PATH` env var, then alongside the
//! executable, then the system search paths. A missing library is a
//! per-item scoring failure, not a crash.

use super::TextExtract;
use crate::error::ScoreError;
use pdfium_render::prelude::*;
use std::path::Path;

pub struct PdfiumTextExtractor;

impl PdfiumTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfiumTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TextExtract for PdfiumTextExtractor {
    fn extract_text(&self, file: &Path) -> Result<String, ScoreError> {
        let bytes = std::fs::read(file).map_err(|source| ScoreError::FileRead {
            path: file.to_path_buf(),
            source,
        })?;

        let pdfium = load_pdfium()?;
        let document =
            pdfium
                .load_pdf_from_byte_slice(&bytes, None)
                .map_err(|e| ScoreError::PdfRead {
                    path: file.to_path_buf(),
                    reason: e.to_string(),
                })?;

        let mut text = String::new();
        for page in document.pages().iter() {
            match page.text() {
                Ok(page_text) => {
                    text.push_str(&page_text.all());
                    text.push('\n');
                }
                Err(e) => log::debug!(
                    "Skipping unreadable page in {}: {}",
                    file.display(),
                    e
                ),
            }
        }
        Ok(text)
    }
}

/// Loads the PDFium dynamic library.
fn load_pdfium() -> Result<Pdfium, ScoreError> {
    // 1. Explicit path via env var
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| ScoreError::PdfLibrary {
            reason: format!("failed to load PDFium from {}: {}", path, e),
        })?;
        return Ok(Pdfium::new(bindings));
    }

    // 2. Alongside the running executable
    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            let lib_path =
                Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
            if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                return Ok(Pdfium::new(bindings));
            }
        }
    }

    // 3. System library
    let bindings = Pdfium::bind_to_system_library().map_err(|e| ScoreError::PdfLibrary {
        reason: format!(
            "PDFium library not found; set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {}",
            e
        ),
    })?;
    Ok(Pdfium::new(bindings))
}
