//! Text extraction: PDF bytes → sanitized plain text.
//!
//! Two strategies run in order. pdfium handles the widest range of real-world
//! PDFs (CID fonts, broken xref tables) but needs a native library; `lopdf`
//! is pure Rust and always available. The first strategy that yields
//! non-empty text wins.
//!
//! Extracted text routinely contains NUL bytes and other control characters
//! that break prompt transport. Extractors return raw text; the pipeline runs
//! [`sanitize_text`] over whatever any extractor produced before chunking.

use crate::error::PaperError;
use pdfium_render::prelude::*;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Converts a file into plain text. Implementations are blocking; the pipeline
/// calls them from `spawn_blocking`.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, PaperError>;
}

/// pdfium first, `lopdf` as fallback.
#[derive(Debug, Clone)]
pub struct PdfTextExtractor {
    use_pdfium: bool,
}

impl Default for PdfTextExtractor {
    fn default() -> Self {
        Self { use_pdfium: true }
    }
}

impl PdfTextExtractor {
    pub fn new(use_pdfium: bool) -> Self {
        Self { use_pdfium }
    }

    /// Skip pdfium entirely (no native library, no download).
    pub fn lopdf_only() -> Self {
        Self { use_pdfium: false }
    }
}

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, path: &Path) -> Result<String, PaperError> {
        check_pdf_magic(path)?;

        let pdfium_err = if self.use_pdfium {
            match extract_with_pdfium(path) {
                Ok(text) if !text.trim().is_empty() => return Ok(text),
                Ok(_) => "pdfium extracted empty text".to_string(),
                Err(e) => e,
            }
        } else {
            "pdfium disabled".to_string()
        };
        if self.use_pdfium {
            warn!("{}, trying lopdf", pdfium_err);
        }

        match extract_with_lopdf(path) {
            Ok(text) if !text.trim().is_empty() => Ok(text),
            Ok(_) => Err(PaperError::EmptyText {
                path: path.to_path_buf(),
            }),
            Err(lopdf_err) => Err(PaperError::ExtractionFailed {
                path: path.to_path_buf(),
                detail: format!("{pdfium_err}; {lopdf_err}"),
            }),
        }
    }
}

/// Verify the `%PDF` magic bytes so a renamed text file fails clearly.
fn check_pdf_magic(path: &Path) -> Result<(), PaperError> {
    match std::fs::File::open(path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(PaperError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                });
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(PaperError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(PaperError::FileNotFound {
            path: path.to_path_buf(),
        }),
    }
}

fn extract_with_pdfium(path: &Path) -> Result<String, String> {
    let pdfium =
        pdfium_auto::bind_pdfium_silent().map_err(|e| format!("pdfium unavailable: {e}"))?;
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| format!("pdfium failed to open PDF: {e:?}"))?;

    let mut pages = Vec::new();
    for (i, page) in document.pages().iter().enumerate() {
        match page.text() {
            Ok(text) => pages.push(text.all()),
            Err(e) => debug!("pdfium: no text layer on page {}: {:?}", i + 1, e),
        }
    }
    Ok(pages.join("\n").trim().to_string())
}

fn extract_with_lopdf(path: &Path) -> Result<String, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("lopdf could not read file: {e}"))?;
    let doc =
        lopdf::Document::load_mem(&bytes).map_err(|e| format!("lopdf failed to open PDF: {e}"))?;

    let mut text = String::new();
    for page_num in doc.get_pages().keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => debug!("lopdf: page {} failed: {}", page_num, e),
        }
    }
    Ok(text.trim().to_string())
}

/// Strip NUL/control bytes and invisible Unicode, normalise line endings.
///
/// Newlines and tabs are kept; every other control character is dropped.
pub fn sanitize_text(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .chars()
        .map(|c| if c == '\r' { '\n' } else { c })
        .filter(|&c| c == '\n' || c == '\t' || !c.is_control())
        .filter(|c| {
            !matches!(
                c,
                '\u{200B}' | '\u{FEFF}' | '\u{00AD}' | '\u{200C}' | '\u{200D}' | '\u{2060}'
            )
        })
        .collect::<String>()
        .trim()
        .to_string()
}
