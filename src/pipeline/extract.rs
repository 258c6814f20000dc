//! Text extraction from PDF, DOCX and plain-text documents.
//!
//! Parsing is delegated to existing libraries: pdfium for PDF and the `zip`
//! crate for the DOCX container. The only local logic is flattening
//! `word/document.xml` into text.
//!
//! pdfium is not async-safe, so PDF work runs in `spawn_blocking`.

use crate::error::QpGenError;
use crate::pipeline::input::DocumentKind;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use regex::Regex;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extract the full text of a document.
///
/// # Errors
/// [`QpGenError::EmptyDocument`] when the document has no extractable text.
pub async fn extract_text(path: &Path, kind: DocumentKind) -> Result<String, QpGenError> {
    let owned = path.to_path_buf();
    let text = match kind {
        DocumentKind::Pdf => spawn_blocking_extract(owned, extract_pdf_blocking).await?,
        DocumentKind::Docx => spawn_blocking_extract(owned, extract_docx_blocking).await?,
        DocumentKind::Text => {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| QpGenError::ExtractionFailed {
                    path: path.to_path_buf(),
                    detail: e.to_string(),
                })?;
            String::from_utf8_lossy(&bytes).into_owned()
        }
    };

    if text.trim().is_empty() {
        return Err(QpGenError::EmptyDocument {
            path: path.to_path_buf(),
        });
    }

    info!(
        "Extracted {} characters from {} document",
        text.chars().count(),
        kind
    );
    Ok(text)
}

async fn spawn_blocking_extract(
    path: PathBuf,
    f: fn(&Path) -> Result<String, QpGenError>,
) -> Result<String, QpGenError> {
    tokio::task::spawn_blocking(move || f(&path))
        .await
        .map_err(|e| QpGenError::Internal(format!("Extraction task panicked: {}", e)))?
}

// ── PDF ──────────────────────────────────────────────────────────────────

/// Bind pdfium from `PDFIUM_LIB_PATH`, the working directory, or the system.
fn bind_pdfium() -> Result<Pdfium, QpGenError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.is_empty() => Pdfium::bind_to_library(&p),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| QpGenError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn extract_pdf_blocking(path: &Path) -> Result<String, QpGenError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| QpGenError::ExtractionFailed {
            path: path.to_path_buf(),
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    debug!("PDF loaded: {} pages", pages.len());

    let mut out = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let text = page.text().map_err(|e| QpGenError::ExtractionFailed {
            path: path.to_path_buf(),
            detail: format!("page {}: {:?}", idx + 1, e),
        })?;
        out.push(text.all());
    }

    Ok(out.join("\n"))
}

// ── DOCX ─────────────────────────────────────────────────────────────────

fn extract_docx_blocking(path: &Path) -> Result<String, QpGenError> {
    let fail = |detail: String| QpGenError::ExtractionFailed {
        path: path.to_path_buf(),
        detail,
    };

    let file = std::fs::File::open(path).map_err(|e| fail(e.to_string()))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| fail(format!("not a zip: {e}")))?;
    let mut entry = archive
        .by_name("word/document.xml")
        .map_err(|e| fail(format!("word/document.xml: {e}")))?;

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| fail(format!("word/document.xml: {e}")))?;

    Ok(docx_xml_to_text(&xml))
}

/// The WordprocessingML pieces that carry visible text or layout. Only
/// `<w:t>` runs count as text; `<w:delText>` and `<w:instrText>` hold deleted
/// revisions and field codes.
static RE_DOCX_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|(</w:p>)|(<w:(?:br|cr)\b[^>]*/>)|(<w:tab\s*/>)")
        .unwrap()
});

static RE_ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(?:#([0-9]+)|#[xX]([0-9A-Fa-f]+)|(lt|gt|quot|apos|amp));").unwrap()
});

/// Flatten WordprocessingML into text: one line per paragraph.
pub(crate) fn docx_xml_to_text(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len() / 4);
    for caps in RE_DOCX_TOKEN.captures_iter(xml) {
        if let Some(text) = caps.get(1) {
            out.push_str(&decode_entities(text.as_str()));
        } else if caps.get(2).is_some() || caps.get(3).is_some() {
            out.push('\n');
        } else {
            out.push('\t');
        }
    }
    out.trim().to_string()
}

/// Decode the five predefined XML entities and numeric character references
/// in a single pass, so `&amp;lt;` stays `&lt;`.
fn decode_entities(s: &str) -> String {
    RE_ENTITY
        .replace_all(s, |caps: &regex::Captures| {
            let numeric = match (caps.get(1), caps.get(2)) {
                (Some(dec), _) => Some(dec.as_str().parse::<u32>().ok()),
                (None, Some(hex)) => Some(u32::from_str_radix(hex.as_str(), 16).ok()),
                _ => None,
            };
            match numeric {
                Some(code) => code
                    .and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_else(|| caps[0].to_string()),
                None => match &caps[3] {
                    "lt" => "<",
                    "gt" => ">",
                    "quot" => "\"",
                    "apos" => "'",
                    _ => "&",
                }
                .to_string(),
            }
        })
        .into_owned()
}
