//! Sliding-window chunking of long documents.
//!
//! Windows of `size` words advance by `size - overlap` words, so adjacent
//! chunks share exactly `overlap` words. The last window stops at the end of
//! the text instead of being padded. Text at or below the threshold becomes a
//! single chunk spanning everything, which lets the summarizer treat both
//! cases the same way.
//!
//! Chunk text is a slice of the input, so line breaks inside a window survive
//! and nothing is copied.
//!
//! ```text
//! size = 5, overlap = 2:   A B C D E F G H I J
//!   chunk 0                A B C D E
//!   chunk 1                      D E F G H
//!   chunk 2                            G H I J
//! ```

use crate::error::PaperError;
use serde::Serialize;

/// A contiguous word range of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk<'a> {
    /// 0-based position in the chunk sequence.
    pub index: usize,
    /// First word offset (inclusive).
    pub start: usize,
    /// Last word offset (exclusive).
    pub end: usize,
    pub text: &'a str,
}

impl Chunk<'_> {
    pub fn word_count(&self) -> usize {
        self.end - self.start
    }
}

/// Chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    threshold: usize,
    size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker. `overlap` must be smaller than `size`.
    pub fn new(threshold: usize, size: usize, overlap: usize) -> Result<Self, PaperError> {
        if overlap >= size {
            return Err(PaperError::InvalidConfig(format!(
                "chunk overlap ({overlap}) must be smaller than chunk size ({size})"
            )));
        }
        Ok(Self {
            threshold,
            size,
            overlap,
        })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// True when `word_count` is large enough to need the condensation tier.
    pub fn needs_chunking(&self, word_count: usize) -> bool {
        word_count > self.threshold
    }

    /// Split `text` into ordered, overlapping chunks.
    pub fn chunk<'a>(&self, text: &'a str) -> Vec<Chunk<'a>> {
        let spans = word_spans(text);
        if !self.needs_chunking(spans.len()) {
            return vec![Chunk {
                index: 0,
                start: 0,
                end: spans.len(),
                text,
            }];
        }

        let stride = self.size - self.overlap;
        let mut chunks = Vec::with_capacity(spans.len() / stride + 1);
        let mut start = 0usize;

        loop {
            let end = (start + self.size).min(spans.len());
            let (byte_start, _) = spans[start];
            let (_, byte_end) = spans[end - 1];
            chunks.push(Chunk {
                index: chunks.len(),
                start,
                end,
                text: &text[byte_start..byte_end],
            });
            if end == spans.len() {
                break;
            }
            start += stride;
        }

        chunks
    }
}

/// Byte ranges of every whitespace-delimited word.
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut current: Option<usize> = None;
    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), current) {
            (true, Some(s)) => {
                spans.push((s, i));
                current = None;
            }
            (false, None) => current = Some(i),
            _ => {}
        }
    }
    if let Some(s) = current {
        spans.push((s, text.len()));
    }
    spans
}
