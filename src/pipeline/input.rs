//! Input resolution: normalise a user-supplied path or URL to a local file.
//!
//! pdfium and the zip reader both want a file on disk, so URL inputs are
//! downloaded into a `TempDir` that lives as long as the returned
//! [`ResolvedInput`]. The document kind comes from the file extension and
//! binary formats are checked against their magic bytes before parsing.

use crate::error::QpGenError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Pdf,
    Docx,
    /// Anything that is not PDF or DOCX is read as text.
    Text,
}

impl DocumentKind {
    /// Classify by extension (case-insensitive).
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("pdf") => DocumentKind::Pdf,
            Some("docx") => DocumentKind::Docx,
            _ => DocumentKind::Text,
        }
    }

    /// Expected leading bytes, if the format has any.
    pub fn magic(&self) -> Option<&'static [u8; 4]> {
        match self {
            DocumentKind::Pdf => Some(b"%PDF"),
            DocumentKind::Docx => Some(b"PK\x03\x04"),
            DocumentKind::Text => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Docx => "docx",
            DocumentKind::Text => "txt",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DocumentKind::Pdf => "PDF",
            DocumentKind::Docx => "DOCX",
            DocumentKind::Text => "text",
        })
    }
}

/// The resolved input, either a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local { path: PathBuf, kind: DocumentKind },
    /// Input was a URL; the document lives in a temp directory kept alive
    /// until processing completes.
    Downloaded {
        path: PathBuf,
        kind: DocumentKind,
        _temp_dir: TempDir,
    },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local { path, .. } => path,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            ResolvedInput::Local { kind, .. } | ResolvedInput::Downloaded { kind, .. } => *kind,
        }
    }

    /// File name shown to users.
    pub fn display_name(&self) -> String {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path().display().to_string())
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local document path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, QpGenError> {
    if input.trim().is_empty() {
        return Err(QpGenError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Resolve a local file path, validating existence and magic bytes.
fn resolve_local(path_str: &str) -> Result<ResolvedInput, QpGenError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(QpGenError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(QpGenError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    let kind = DocumentKind::from_path(&path);

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut head = [0u8; 4];
            if f.read_exact(&mut head).is_ok() {
                check_magic(&path, kind, &head)?;
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(QpGenError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(QpGenError::FileNotFound { path });
        }
    }

    debug!("Resolved local {} document: {}", kind, path.display());
    Ok(ResolvedInput::Local { path, kind })
}

fn check_magic(path: &Path, kind: DocumentKind, head: &[u8]) -> Result<(), QpGenError> {
    if let Some(expected) = kind.magic() {
        if head.len() >= 4 && &head[..4] != expected {
            let mut magic = [0u8; 4];
            magic.copy_from_slice(&head[..4]);
            return Err(QpGenError::InvalidDocument {
                path: path.to_path_buf(),
                kind: kind.to_string(),
                magic,
            });
        }
    }
    Ok(())
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, QpGenError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| QpGenError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            QpGenError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            QpGenError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(QpGenError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let filename = extract_filename(url, content_type.as_deref());

    let temp_dir = TempDir::new().map_err(|e| QpGenError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| QpGenError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| QpGenError::Internal(format!("Failed to write temp file: {}", e)))?;

    let kind = DocumentKind::from_path(&file_path);
    check_magic(&file_path, kind, &bytes)?;

    info!("Downloaded to: {}", file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        kind,
        _temp_dir: temp_dir,
    })
}

/// Pick a file name from the URL path, falling back on the content type.
fn extract_filename(url: &str, content_type: Option<&str>) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    let ext = match content_type.unwrap_or("") {
        ct if ct.starts_with("application/pdf") => "pdf",
        ct if ct.contains("wordprocessingml") => "docx",
        _ => "txt",
    };
    format!("downloaded.{ext}")
}
