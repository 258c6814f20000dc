//! Error types for the edgequake-qpgen library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`QpGenError`]: **fatal**, the paper cannot be produced at all
//!   (unreadable document, missing API key, every backend failed). Returned
//!   as `Err(QpGenError)` from the top-level `generate*` functions.
//!
//! * [`AttemptError`]: **non-fatal**, a single backend attempt failed
//!   (quota exhausted, transport glitch, textless response). The invoker
//!   absorbs it and moves on to the next backend; it only surfaces as the
//!   cause attached to [`QpGenError::AllBackendsFailed`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-qpgen library.
#[derive(Debug, Error)]
pub enum QpGenError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file extension promises a format the bytes do not match.
    #[error("File is not a valid {kind} document: '{path}'\nFirst bytes: {magic:?}")]
    InvalidDocument {
        path: PathBuf,
        kind: String,
        magic: [u8; 4],
    },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The document parser failed.
    #[error("Failed to extract text from '{path}': {detail}")]
    ExtractionFailed { path: PathBuf, detail: String },

    /// The document parsed but contained no text.
    #[error("No text could be extracted from '{path}'\nScanned PDFs need OCR first.")]
    EmptyDocument { path: PathBuf },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF text extraction needs a pdfium shared library. You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium.\n\
  • Place libpdfium next to the working directory.\n\
  • Install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// No API key was configured or found in the environment.
    #[error(
        "Missing Google Generative AI key.\n\
Set GOOGLE_API_KEY (or GEMINI_API_KEY), or pass --api-key."
    )]
    MissingApiKey,

    /// The configured edgequake-llm provider could not be created.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every backend in the list was tried and none produced text.
    #[error(
        "All {attempted} generation backends failed.\nLast error: {}",
        describe_last(.last_error)
    )]
    AllBackendsFailed {
        attempted: usize,
        #[source]
        last_error: Option<AttemptError>,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn describe_last(last: &Option<AttemptError>) -> String {
    match last {
        Some(e) => e.to_string(),
        None => "all backends failed".to_string(),
    }
}

/// A non-fatal failure of a single backend attempt.
///
/// Both variants advance the invoker to the next backend. The split only
/// decides how loudly the failure is logged: quota exhaustion is expected
/// under free-tier limits, anything else is worth a warning.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AttemptError {
    /// The backend reported resource exhaustion or rate limiting.
    #[error("{backend}: quota exhausted: {detail}")]
    QuotaExceeded { backend: String, detail: String },

    /// Any other failure: transport, HTTP status, malformed or textless response.
    #[error("{backend}: {detail}")]
    Backend { backend: String, detail: String },
}

impl AttemptError {
    pub fn quota(backend: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::QuotaExceeded {
            backend: backend.into(),
            detail: detail.into(),
        }
    }

    pub fn backend_error(backend: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.into(),
            detail: detail.into(),
        }
    }

    /// `true` for quota/rate-limit exhaustion, the expected failure kind.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }

    /// Identifier of the backend that produced this error.
    pub fn backend(&self) -> &str {
        match self {
            Self::QuotaExceeded { backend, .. } | Self::Backend { backend, .. } => backend,
        }
    }
}

static RE_STATUS_429: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b429\b").unwrap());

/// Heuristic used for providers that only expose an error message.
pub(crate) fn message_indicates_quota(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    RE_STATUS_429.is_match(&lower)
        || lower.contains("rate limit")
        || lower.contains("ratelimit")
        || lower.contains("quota")
        || lower.contains("resource_exhausted")
        || lower.contains("resource exhausted")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_backends_failed_display_with_cause() {
        let e = QpGenError::AllBackendsFailed {
            attempted: 3,
            last_error: Some(AttemptError::backend_error("gemini-1.5-pro", "HTTP 500")),
        };
        let msg = e.to_string();
        assert!(msg.contains("All 3"), "got: {msg}");
        assert!(msg.contains("gemini-1.5-pro: HTTP 500"), "got: {msg}");
    }

    #[test]
    fn all_backends_failed_display_without_cause() {
        let e = QpGenError::AllBackendsFailed {
            attempted: 0,
            last_error: None,
        };
        assert!(e.to_string().contains("all backends failed"));
    }

    #[test]
    fn all_backends_failed_exposes_source() {
        use std::error::Error as _;
        let e = QpGenError::AllBackendsFailed {
            attempted: 1,
            last_error: Some(AttemptError::quota("a", "429")),
        };
        let source = e.source().expect("source attached");
        assert!(source.to_string().contains("quota exhausted"));
    }

    #[test]
    fn attempt_error_flags() {
        let q = AttemptError::quota("gemini-2.0-flash", "429 Too Many Requests");
        let b = AttemptError::backend_error("gemini-1.5-flash", "timeout");
        assert!(q.is_expected());
        assert!(!b.is_expected());
        assert_eq!(q.backend(), "gemini-2.0-flash");
        assert_eq!(b.backend(), "gemini-1.5-flash");
    }

    #[test]
    fn quota_heuristic() {
        assert!(message_indicates_quota("HTTP 429: slow down"));
        assert!(message_indicates_quota("Rate limit exceeded"));
        assert!(message_indicates_quota("RESOURCE_EXHAUSTED: quota"));
        assert!(!message_indicates_quota("invalid api key"));
    }

    #[test]
    fn digits_containing_429_are_not_quota() {
        assert!(!message_indicates_quota("upstream error, request id 14290"));
        assert!(!message_indicates_quota("prompt has 4291 tokens"));
        assert!(message_indicates_quota("status 429 Too Many Requests"));
    }
}
