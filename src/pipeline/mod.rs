//! Pipeline stages for PDF-to-LaTeX summarization.
//!
//! Each submodule implements exactly one step; [`crate::process`] wires them
//! together for a single document.
//!
//! ## Data Flow
//!
//! ```text
//! detect ──▶ extract ──▶ chunk ──▶ summarize ──▶ rewrite ──▶ render ──▶ compile
//! (stable?)  (text)      (windows) (2 tiers)     (polish)    (.tex)     (.pdf)
//! ```
//!
//! 1. [`detect`]: wait until a new file has stopped growing
//! 2. [`extract`]: pdfium, then lopdf; runs in `spawn_blocking`
//! 3. [`chunk`]: overlapping word windows; pure
//! 4. [`summarize`]: per-chunk condensation then one structuring call
//! 5. [`rewrite`]: DeepL, falling back to the fast model; never fatal
//! 6. [`render`]: escape, fill the template, write atomically
//! 7. [`compile`]: latexmk; best-effort
//!
//! [`llm`] holds the language-model seam shared by `summarize` and `rewrite`.

pub mod chunk;
pub mod compile;
pub mod detect;
pub mod extract;
pub mod llm;
pub mod render;
pub mod rewrite;
pub mod summarize;
