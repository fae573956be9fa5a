//! Prompts for the condensation, structuring, and rewrite requests.
//!
//! Every prompt lives here so the orchestration code never embeds wording and
//! tests can inspect prompts without a model. The structuring prompts share one
//! schema and one rule block; the validator in
//! [`crate::pipeline::summarize`] enforces the same bounds the rules announce.

/// System message for every summarization request.
pub const SUMMARIZER_SYSTEM_PROMPT: &str = "You are an academic paper summarizer. \
You read research papers carefully and report only what the text supports.";

/// System message for the language-model rewrite fallback.
pub const REWRITE_SYSTEM_PROMPT: &str = "You are an academic editor. \
You polish prose without changing its meaning.";

/// JSON schema every structuring response must follow.
pub const SUMMARY_JSON_SCHEMA: &str = r#"{
  "title": "string",
  "summary": "string (1-2 paragraphs, max 150 words)",
  "contributions": [{"label": "string", "text": "string"}],
  "limitations": [{"label": "string", "text": "string"}],
  "question": "string"
}"#;

/// Bounds announced to the model; mirrored by the validator.
pub const SUMMARY_JSON_RULES: &str = "Rules:
- contributions: 2 to 4 items
- limitations: 1 to 3 items
- Total words across summary + contributions + limitations + question: max 500
- Return ONLY valid JSON: no markdown, no code fences, no explanations";

/// Instruction for the rewrite fallback.
pub const REWRITE_INSTRUCTION: &str =
    "Rewrite the following academic text to improve clarity and academic tone. \
Keep the original meaning. Be concise. Maximum 500 words total. \
Return only the rewritten text, no explanations:";

/// Single-pass prompt for documents below the chunk threshold.
pub fn summary_prompt(text: &str, filename: &str) -> String {
    format!(
        "Analyze the following paper and return a structured JSON summary with this exact schema:\n\
{SUMMARY_JSON_SCHEMA}\n\n\
The \"title\" should be the actual paper title if detectable, otherwise use \"{filename}\".\n\
{SUMMARY_JSON_RULES}\n\n\
Paper text:\n{text}"
    )
}

/// Condensation prompt for one chunk (1-indexed `chunk_num`).
pub fn chunk_prompt(chunk: &str, chunk_num: usize, total: usize) -> String {
    format!(
        "Summarize portion {chunk_num}/{total} of an academic paper.\n\
Extract the main points, any contributions mentioned, and any limitations mentioned.\n\
Return a concise paragraph of at most 100 words.\n\
Return ONLY the summary text, no labels or JSON.\n\n\
Text:\n{chunk}"
    )
}

/// Structuring prompt over the joined per-chunk condensations.
pub fn consolidation_prompt(summaries: &str, filename: &str) -> String {
    format!(
        "The following are partial summaries of consecutive chunks from a long academic paper.\n\n\
Consolidate them into a single structured JSON summary with this exact schema:\n\
{SUMMARY_JSON_SCHEMA}\n\n\
The \"title\" should be the actual paper title if detectable, otherwise use \"{filename}\".\n\
{SUMMARY_JSON_RULES}\n\n\
Partial summaries:\n{summaries}"
    )
}

/// Rewrite prompt for a single field.
pub fn rewrite_prompt(text: &str) -> String {
    format!("{REWRITE_INSTRUCTION}\n\n{text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_prompt_numbers_portion() {
        let p = chunk_prompt("body", 2, 3);
        assert!(p.starts_with("Summarize portion 2/3"));
        assert!(p.ends_with("Text:\nbody"));
    }

    #[test]
    fn structuring_prompts_carry_schema_and_filename() {
        for p in [
            summary_prompt("t", "attention"),
            consolidation_prompt("s", "attention"),
        ] {
            assert!(p.contains("\"contributions\""));
            assert!(p.contains("2 to 4 items"));
            assert!(p.contains("otherwise use \"attention\""));
        }
    }

    #[test]
    fn rewrite_prompt_appends_text() {
        assert!(rewrite_prompt("abc").ends_with("\n\nabc"));
    }
}
