//! LaTeX rendering and the atomic artifact write.
//!
//! Templates carry `%%SLOT%%` placeholders. Substitution is a single pass
//! over the template, so text inserted into one slot is never scanned for
//! further placeholders. Every inserted value is escaped with
//! [`escape_latex`] first; model and DeepL output is untrusted.
//!
//! Known slots:
//!
//! | Slot | Content |
//! |------|---------|
//! | `TITLE` | paper title |
//! | `AUTHOR_BLOCK` | centred author line, empty when no author is set |
//! | `SUMMARY` | summary paragraph(s) |
//! | `CONTRIBUTIONS` | `\item` lines |
//! | `LIMITATIONS` | `\item` lines |
//! | `QUESTION` | discussion question |
//! | `NOTE` | footer note, empty when none is set |

use crate::error::PaperError;
use crate::output::{StructuredSummary, SummaryItem};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Slots a template may reference.
pub const KNOWN_SLOTS: &[&str] = &[
    "TITLE",
    "AUTHOR_BLOCK",
    "SUMMARY",
    "CONTRIBUTIONS",
    "LIMITATIONS",
    "QUESTION",
    "NOTE",
];

/// The built-in one-page summary layout.
pub const BUILTIN_TEMPLATE: &str = r"\documentclass[11pt]{article}
\usepackage[margin=1in]{geometry}
\usepackage{setspace}
\usepackage{hyperref}
\usepackage{times}
\usepackage{xurl}
\usepackage{float}
\singlespacing

\begin{document}
\begin{center}
    {\LARGE \textbf{%%TITLE%%}} \\[2ex]
    \normalsize
\end{center}
%%AUTHOR_BLOCK%%
\section*{Paper Summary}
%%SUMMARY%%

\section*{Contributions}
\begin{itemize}
%%CONTRIBUTIONS%%
\end{itemize}

\section*{Limitations}
\begin{itemize}
%%LIMITATIONS%%
\end{itemize}

\section*{One Question to Discuss}
%%QUESTION%%
%%NOTE%%
\end{document}
";

static RE_SLOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"%%([A-Z][A-Z0-9_]*)%%").unwrap());

/// Escape LaTeX-reserved characters in one pass.
///
/// Text without reserved characters comes back unchanged. Control characters
/// other than newline and tab are dropped, since TeX rejects several of them.
pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\textbackslash{}"),
            '{' => out.push_str(r"\{"),
            '}' => out.push_str(r"\}"),
            '%' | '$' | '#' | '_' | '&' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            '[' => out.push_str("{[}"),
            ']' => out.push_str("{]}"),
            '<' => out.push_str(r"\textless{}"),
            '>' => out.push_str(r"\textgreater{}"),
            '|' => out.push_str(r"\textbar{}"),
            '\n' | '\t' => out.push(c),
            _ if c.is_control() => {}
            _ => out.push(c),
        }
    }
    out
}

/// A validated template.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
}

impl Default for Template {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Template {
    pub fn builtin() -> Self {
        Self {
            source: BUILTIN_TEMPLATE.to_string(),
        }
    }

    /// Accept `source` if every placeholder in it is a known slot.
    pub fn parse(source: impl Into<String>) -> Result<Self, PaperError> {
        let source = source.into();
        if let Some(unknown) = RE_SLOT
            .captures_iter(&source)
            .filter_map(|c| c.get(1))
            .find(|m| !KNOWN_SLOTS.contains(&m.as_str()))
        {
            return Err(PaperError::UnknownTemplateSlot {
                slot: unknown.as_str().to_string(),
            });
        }
        Ok(Self { source })
    }

    /// Read and validate a template file.
    pub fn load(path: &Path) -> Result<Self, PaperError> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            PaperError::InvalidConfig(format!("cannot read template '{}': {e}", path.display()))
        })?;
        Self::parse(source)
    }

    /// Fill every slot. Pure string transformation.
    pub fn render(&self, summary: &StructuredSummary, author: &str, note: Option<&str>) -> String {
        let mut out = String::with_capacity(self.source.len() + 4096);
        let mut last = 0;
        for caps in RE_SLOT.captures_iter(&self.source) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&self.source[last..whole.start()]);
            out.push_str(&slot_value(name.as_str(), summary, author, note));
            last = whole.end();
        }
        out.push_str(&self.source[last..]);
        out
    }
}

fn slot_value(slot: &str, summary: &StructuredSummary, author: &str, note: Option<&str>) -> String {
    match slot {
        "TITLE" => escape_latex(&summary.title),
        "AUTHOR_BLOCK" => author_block(author),
        "SUMMARY" => escape_latex(&summary.summary),
        "CONTRIBUTIONS" => items(&summary.contributions),
        "LIMITATIONS" => items(&summary.limitations),
        "QUESTION" => escape_latex(&summary.question),
        "NOTE" => note_block(note),
        // Unreachable for parsed templates.
        _ => String::new(),
    }
}

fn items(items: &[SummaryItem]) -> String {
    items
        .iter()
        .map(|item| match &item.label {
            Some(label) => format!(
                r"    \item \textbf{{{}:}} {}",
                escape_latex(label),
                escape_latex(&item.text)
            ),
            None => format!(r"    \item {}", escape_latex(&item.text)),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn author_block(author: &str) -> String {
    let author = author.trim();
    if author.is_empty() {
        return String::new();
    }
    format!(
        "\n\\begin{{center}}\n    {{\\textbf{{{}}}}} \\\\[2ex]\n    \\normalsize\n\\end{{center}}\n",
        escape_latex(author)
    )
}

fn note_block(note: Option<&str>) -> String {
    match note.map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) => format!(
            "\n\\vspace{{2\\baselineskip}}\n\\textit{{Note:}} {}\n",
            escape_latex(n)
        ),
        None => String::new(),
    }
}

// ── Atomic write ─────────────────────────────────────────────────────────

/// Write `content` to `dir/file_name` atomically.
///
/// The bytes go to a uniquely named temporary file in `dir` first and are
/// renamed into place, so readers see either nothing or the whole file.
pub async fn write_atomic(
    dir: &Path,
    file_name: &str,
    content: String,
) -> Result<PathBuf, PaperError> {
    let dir = dir.to_path_buf();
    let target = dir.join(file_name);

    tokio::task::spawn_blocking(move || -> Result<PathBuf, PaperError> {
        let fail = |source: std::io::Error| PaperError::OutputWriteFailed {
            path: target.clone(),
            source,
        };
        std::fs::create_dir_all(&dir).map_err(fail)?;
        let staged = stage(&dir, content.as_bytes()).map_err(fail)?;
        staged.persist(&target).map_err(|e| fail(e.error))?;
        debug!("Wrote {} bytes to {}", content.len(), target.display());
        Ok(target)
    })
    .await
    .map_err(|e| PaperError::Internal(format!("write task panicked: {e}")))?
}

/// Write and sync `bytes` into a temporary file inside `dir`.
fn stage(dir: &Path, bytes: &[u8]) -> std::io::Result<NamedTempFile> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".paperbrief-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> StructuredSummary {
        StructuredSummary {
            title: "Cost & Benefit of 100% Recall".into(),
            summary: "We study x_i in {A, B}.".into(),
            contributions: vec![
                SummaryItem::labelled("Speed", "2x faster ~ on average"),
                SummaryItem::new("Uses $O(n)$ memory"),
            ],
            limitations: vec![SummaryItem::new(r"Only tested on C:\data")],
            question: "Does it hold for n^2 #items?".into(),
        }
    }

    #[test]
    fn escapes_every_reserved_character() {
        assert_eq!(
            escape_latex(r"\ { } % $ # _ & ~ ^ [ ] < > |"),
            r"\textbackslash{} \{ \} \% \$ \# \_ \& \textasciitilde{} \textasciicircum{} {[} {]} \textless{} \textgreater{} \textbar{}"
        );
    }

    #[test]
    fn control_characters_are_dropped() {
        assert_eq!(escape_latex("a\u{0}b\u{c}c\u{7f}d"), "abcd");
        assert_eq!(escape_latex("line\n\tindent"), "line\n\tindent");
    }

    #[test]
    fn plain_text_is_unchanged() {
        let plain = "Transformers scale well, mostly. Über-naïve: 42!";
        assert_eq!(escape_latex(plain), plain);
        assert_eq!(escape_latex(&escape_latex(plain)), plain);
    }

    #[test]
    fn renders_builtin_template() {
        let tex = Template::builtin().render(&summary(), "", None);
        assert!(tex.contains(r"{\LARGE \textbf{Cost \& Benefit of 100\% Recall}}"));
        assert!(tex.contains(r"We study x\_i in \{A, B\}."));
        assert!(tex.contains(r"    \item \textbf{Speed:} 2x faster \textasciitilde{} on average"));
        assert!(tex.contains(r"    \item Uses \$O(n)\$ memory"));
        assert!(tex.contains(r"C:\textbackslash{}data"));
        assert!(tex.contains(r"n\textasciicircum{}2 \#items?"));
        assert!(!tex.contains("%%"));
        assert!(!tex.contains("Note:"));
        assert!(tex.trim_end().ends_with(r"\end{document}"));
    }

    #[test]
    fn author_and_note_blocks_are_optional() {
        let tex = Template::builtin().render(&summary(), "Ada & Co", Some("Edited with DeepL"));
        assert!(tex.contains(r"{\textbf{Ada \& Co}} \\[2ex]"));
        assert!(tex.contains(r"\textit{Note:} Edited with DeepL"));
    }

    #[test]
    fn inserted_text_is_not_rescanned_for_slots() {
        let mut s = summary();
        s.summary = "%%QUESTION%%".into();
        let tex = Template::parse("%%SUMMARY%%|%%QUESTION%%")
            .unwrap()
            .render(&s, "", None);
        assert_eq!(
            tex,
            r"\%\%QUESTION\%\%|Does it hold for n\textasciicircum{}2 \#items?"
        );
    }

    #[test]
    fn unknown_slot_is_rejected() {
        let err = Template::parse("%%TITLE%% %%ABSTRACT%%").unwrap_err();
        assert!(matches!(err, PaperError::UnknownTemplateSlot { slot } if slot == "ABSTRACT"));
    }

    #[test]
    fn builtin_template_uses_only_known_slots() {
        assert!(Template::parse(BUILTIN_TEMPLATE).is_ok());
    }

    #[tokio::test]
    async fn write_atomic_creates_dir_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("nested/out");
        let path = write_atomic(&out, "paper.tex", "hello".into())
            .await
            .unwrap();
        assert_eq!(path, out.join("paper.tex"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
        let leftovers: Vec<_> = std::fs::read_dir(&out).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[tokio::test]
    async fn write_atomic_replaces_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        write_atomic(tmp.path(), "a.tex", "old".into())
            .await
            .unwrap();
        write_atomic(tmp.path(), "a.tex", "new".into())
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("a.tex")).unwrap(),
            "new"
        );
    }

    #[test]
    fn interrupted_staging_leaves_no_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let staged = stage(tmp.path(), b"partial").unwrap();
        drop(staged);
        assert!(!tmp.path().join("paper.tex").exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
