//! Best-effort typesetting of the rendered `.tex` artifact.
//!
//! A failed or missing compiler never affects the document's outcome; the
//! caller logs the error and keeps the `.tex`.

use crate::error::CompileError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

/// Characters of compiler stderr kept in [`CompileError::Failed`].
const STDERR_TAIL: usize = 2000;

/// Turns a rendered artifact into a binary document next to it.
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Compile `tex_path`; returns the produced file's path.
    async fn compile(&self, tex_path: &Path) -> Result<PathBuf, CompileError>;
}

/// `latexmk -pdf`, run in the artifact's directory.
#[derive(Debug, Clone)]
pub struct LatexmkCompiler {
    program: String,
    timeout_secs: u64,
}

impl LatexmkCompiler {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            program: "latexmk".to_string(),
            timeout_secs,
        }
    }

    /// Use a different executable name or path.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl Compiler for LatexmkCompiler {
    async fn compile(&self, tex_path: &Path) -> Result<PathBuf, CompileError> {
        let dir = tex_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_name = tex_path.file_name().unwrap_or(tex_path.as_os_str());

        let child = Command::new(&self.program)
            .args(["-pdf", "-interaction=nonstopmode", "-halt-on-error"])
            .arg(file_name)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    CompileError::NotInstalled {
                        program: self.program.clone(),
                    }
                } else {
                    CompileError::Io {
                        program: self.program.clone(),
                        source: e,
                    }
                }
            })?;

        let output = timeout(
            Duration::from_secs(self.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| CompileError::Timeout {
            program: self.program.clone(),
            secs: self.timeout_secs,
        })?
        .map_err(|e| CompileError::Io {
            program: self.program.clone(),
            source: e,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CompileError::Failed {
                program: self.program.clone(),
                code: output.status.code(),
                stderr_tail: tail(stderr.trim(), STDERR_TAIL).to_string(),
            });
        }

        let pdf = tex_path.with_extension("pdf");
        debug!("{} produced {}", self.program, pdf.display());
        Ok(pdf)
    }
}

/// The last `max` characters of `s`.
fn tail(s: &str, max: usize) -> &str {
    let count = s.chars().count();
    if count <= max {
        return s;
    }
    match s.char_indices().nth(count - max) {
        Some((i, _)) => &s[i..],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_end() {
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("ab", 3), "ab");
        assert_eq!(tail("ääää", 2), "ää");
    }

    #[tokio::test]
    async fn missing_program_is_not_installed() {
        let tmp = tempfile::tempdir().unwrap();
        let tex = tmp.path().join("a.tex");
        std::fs::write(&tex, "x").unwrap();
        let err = LatexmkCompiler::new(5)
            .with_program("paperbrief-no-such-latexmk")
            .compile(&tex)
            .await
            .unwrap_err();
        assert!(matches!(err, CompileError::NotInstalled { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let tex = tmp.path().join("a.tex");
        std::fs::write(&tex, "x").unwrap();
        let err = LatexmkCompiler::new(5)
            .with_program("false")
            .compile(&tex)
            .await
            .unwrap_err();
        assert!(
            matches!(err, CompileError::Failed { code: Some(1), .. }),
            "got: {err:?}"
        );
    }
}
