//! Result types returned by the generation entry points.
//!
//! Everything here is `Serialize` so the CLI's `--json` mode can dump a
//! [`PaperOutput`] as-is.

use crate::error::QpGenError;
use crate::invoker::Generation;
use crate::pipeline::input::DocumentKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The generated question paper plus how it was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperOutput {
    /// Final paper text (cleaned when `polish` is on).
    pub text: String,
    /// Which backend answered and what failed before it.
    pub generation: Generation,
    pub document: DocumentInfo,
    pub stats: GenerationStats,
}

/// What was read from the input document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// File name as shown to the user.
    pub name: String,
    pub kind: DocumentKind,
    /// Characters of extracted text.
    pub document_chars: usize,
    /// Number of splitter chunks.
    pub chunks: usize,
    /// Characters of the excerpt placed in the prompt.
    pub excerpt_chars: usize,
}

/// An extracted document ready for prompting, without any model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentExcerpt {
    pub info: DocumentInfo,
    /// The excerpt exactly as it would be embedded in the prompt.
    pub excerpt: String,
}

/// Timing and attempt counters for one generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Backends attempted, including the one that succeeded.
    pub attempts: usize,
    /// Attempts that failed before success.
    pub failed_attempts: usize,
    /// Attempts that failed on quota exhaustion.
    pub quota_failures: usize,
    pub extract_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl GenerationStats {
    pub(crate) fn from_generation(generation: &Generation) -> Self {
        Self {
            attempts: generation.attempts(),
            failed_attempts: generation.failures.len(),
            quota_failures: generation.failures.iter().filter(|f| f.is_expected()).count(),
            ..Default::default()
        }
    }
}

/// Write `contents` to `path` through a sibling `.tmp` file and a rename, so
/// readers never see a half-written paper. Missing parent directories are
/// created.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), QpGenError> {
    let write_err = |source| QpGenError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}
