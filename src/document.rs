//! The working state of one input file as it moves through the pipeline.

use std::path::{Path, PathBuf};

/// One input PDF after extraction.
///
/// Owned by a single pipeline run; never shared between documents.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    /// File stem, used for artifact names and as the fallback title.
    pub name: String,
    pub byte_len: u64,
    /// Sanitized extracted text.
    pub text: String,
    pub word_count: usize,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>, byte_len: u64, text: String) -> Self {
        let path = path.into();
        let word_count = word_count(&text);
        Self {
            name: document_name(&path),
            path,
            byte_len,
            text,
            word_count,
        }
    }
}

/// Whitespace-delimited word count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Deterministic document name derived from the file stem.
pub fn document_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_file_stem() {
        assert_eq!(document_name(Path::new("/in/attention.pdf")), "attention");
        assert_eq!(document_name(Path::new("/in/v2.final.pdf")), "v2.final");
        assert_eq!(document_name(Path::new("/")), "document");
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_stems_stay_distinct() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let a = document_name(Path::new(OsStr::from_bytes(b"/in/caf\xe9-a.pdf")));
        let b = document_name(Path::new(OsStr::from_bytes(b"/in/caf\xe9-b.pdf")));
        assert_eq!(a, "caf\u{FFFD}-a");
        assert_ne!(a, b);
    }

    #[test]
    fn counts_words() {
        let doc = Document::new("/in/a.pdf", 10, "one  two\nthree\tfour".into());
        assert_eq!(doc.word_count, 4);
        assert_eq!(doc.name, "a");
    }
}
