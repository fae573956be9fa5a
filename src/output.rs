//! Output data types: the structured summary, rewrite provenance, and the
//! per-document record returned by the pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One contribution or limitation entry.
///
/// Models answer either with a bare string or with a `{label, text}` object;
/// both deserialise into this type. The label renders in bold before the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawItem")]
pub struct SummaryItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub text: String,
}

impl SummaryItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            label: None,
            text: text.into(),
        }
    }

    pub fn labelled(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            text: text.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawItem {
    Plain(String),
    Labelled {
        #[serde(default)]
        label: Option<String>,
        text: String,
    },
}

impl From<RawItem> for SummaryItem {
    fn from(raw: RawItem) -> Self {
        match raw {
            RawItem::Plain(text) => SummaryItem::new(text),
            RawItem::Labelled { label, text } => SummaryItem {
                label: label.filter(|l| !l.trim().is_empty()),
                text,
            },
        }
    }
}

/// The canonical result of summarization.
///
/// After a successful run every field is non-empty, `contributions` has 2–4
/// entries and `limitations` 1–3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredSummary {
    pub title: String,
    pub summary: String,
    pub contributions: Vec<SummaryItem>,
    pub limitations: Vec<SummaryItem>,
    pub question: String,
}

impl StructuredSummary {
    /// Every text the rewrite stage polishes, in a fixed order: summary,
    /// contribution texts, limitation texts, question. Titles and labels are
    /// left alone.
    pub fn rewritable_texts(&self) -> Vec<String> {
        let mut texts = Vec::with_capacity(2 + self.contributions.len() + self.limitations.len());
        texts.push(self.summary.clone());
        texts.extend(self.contributions.iter().map(|c| c.text.clone()));
        texts.extend(self.limitations.iter().map(|l| l.text.clone()));
        texts.push(self.question.clone());
        texts
    }

    /// Inverse of [`Self::rewritable_texts`]. Returns `None` when `texts`
    /// does not have exactly one entry per rewritable field.
    pub fn with_rewritten_texts(&self, texts: Vec<String>) -> Option<Self> {
        let expected = 2 + self.contributions.len() + self.limitations.len();
        if texts.len() != expected {
            return None;
        }
        let mut it = texts.into_iter();
        let summary = it.next()?;
        let contributions = self
            .contributions
            .iter()
            .map(|c| SummaryItem {
                label: c.label.clone(),
                text: it.next().unwrap_or_default(),
            })
            .collect();
        let limitations = self
            .limitations
            .iter()
            .map(|l| SummaryItem {
                label: l.label.clone(),
                text: it.next().unwrap_or_default(),
            })
            .collect();
        let question = it.next()?;
        Some(Self {
            title: self.title.clone(),
            summary,
            contributions,
            limitations,
            question,
        })
    }
}

/// Which rewrite provider produced the final text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// The primary rewrite service (DeepL).
    Primary,
    /// The language-model fallback.
    Fallback,
    /// Neither provider succeeded, or rewriting is disabled; structuring text kept.
    Unrewritten,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Provenance::Primary => "primary",
            Provenance::Fallback => "fallback",
            Provenance::Unrewritten => "unrewritten",
        })
    }
}

/// The summary after the rewrite stage, tagged with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteResult {
    pub summary: StructuredSummary,
    pub provenance: Provenance,
    /// Name of the provider that produced the text, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// Timing and volume figures for one document run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentStats {
    pub byte_len: u64,
    pub word_count: usize,
    /// 1 when the document was below the chunk threshold.
    pub chunk_count: usize,
    /// Condensation requests issued (0 when tier 1 was skipped).
    pub condensation_calls: usize,
    pub extract_duration_ms: u64,
    pub summarize_duration_ms: u64,
    pub rewrite_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// A successfully processed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedDocument {
    pub source: PathBuf,
    /// The rendered `.tex` artifact.
    pub tex_path: PathBuf,
    /// The compiled `.pdf`, when compilation ran and succeeded.
    pub pdf_path: Option<PathBuf>,
    pub summary: StructuredSummary,
    pub provenance: Provenance,
    pub stats: DocumentStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StructuredSummary {
        StructuredSummary {
            title: "T".into(),
            summary: "S".into(),
            contributions: vec![SummaryItem::labelled("Model", "C1"), SummaryItem::new("C2")],
            limitations: vec![SummaryItem::new("L1")],
            question: "Q?".into(),
        }
    }

    #[test]
    fn items_accept_strings_and_objects() {
        let items: Vec<SummaryItem> = serde_json::from_str(
            r#"["plain", {"label": "Speed", "text": "fast"}, {"text": "no label"}]"#,
        )
        .unwrap();
        assert_eq!(items[0], SummaryItem::new("plain"));
        assert_eq!(items[1], SummaryItem::labelled("Speed", "fast"));
        assert_eq!(items[2], SummaryItem::new("no label"));
    }

    #[test]
    fn blank_label_is_dropped() {
        let item: SummaryItem = serde_json::from_str(r#"{"label": " ", "text": "x"}"#).unwrap();
        assert_eq!(item.label, None);
    }

    #[test]
    fn rewritable_texts_order() {
        assert_eq!(
            sample().rewritable_texts(),
            vec!["S", "C1", "C2", "L1", "Q?"]
        );
    }

    #[test]
    fn rewritten_texts_keep_labels_and_title() {
        let texts = vec![
            "s".into(),
            "c1".into(),
            "c2".into(),
            "l1".into(),
            "q".into(),
        ];
        let out = sample().with_rewritten_texts(texts).unwrap();
        assert_eq!(out.title, "T");
        assert_eq!(out.summary, "s");
        assert_eq!(out.contributions[0], SummaryItem::labelled("Model", "c1"));
        assert_eq!(out.limitations[0].text, "l1");
        assert_eq!(out.question, "q");
    }

    #[test]
    fn rewritten_texts_reject_wrong_count() {
        assert!(sample()
            .with_rewritten_texts(vec!["only one".into()])
            .is_none());
    }

    #[test]
    fn provenance_display() {
        assert_eq!(Provenance::Primary.to_string(), "primary");
        assert_eq!(Provenance::Fallback.to_string(), "fallback");
        assert_eq!(
            serde_json::to_string(&Provenance::Unrewritten).unwrap(),
            "\"unrewritten\""
        );
    }
}
