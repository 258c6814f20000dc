//! Question-paper generation entry points.
//!
//! One call runs the whole flow: resolve the input, extract and excerpt the
//! document, assemble the prompt with a fresh variation token, hand it to the
//! [`FallbackInvoker`] and optionally polish the result. Nothing is cached
//! between calls; generating twice from the same document is expected to
//! give two different papers.

use crate::backend::{GeminiBackend, GenerationBackend, ProviderBackend};
use crate::config::GenerationConfig;
use crate::error::QpGenError;
use crate::invoker::FallbackInvoker;
use crate::output::{write_atomic, DocumentExcerpt, DocumentInfo, GenerationStats, PaperOutput};
use crate::pipeline::chunk::{self, TextSplitter};
use crate::pipeline::input::DocumentKind;
use crate::pipeline::{extract, input, postprocess};
use crate::prompts::{build_prompt, VariationToken};
use edgequake_llm::ProviderFactory;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Generate a question paper from a local file or HTTP/HTTPS URL.
///
/// The backend comes from the config: an edgequake-llm provider when
/// `provider_name` is set, Gemini otherwise.
///
/// # Errors
/// - Input errors (missing file, bad download, wrong magic bytes)
/// - [`QpGenError::EmptyDocument`] when no text could be extracted
/// - [`QpGenError::MissingApiKey`] when the Gemini key cannot be found
/// - [`QpGenError::AllBackendsFailed`] when no backend produced text
pub async fn generate_paper(
    input_str: impl AsRef<str>,
    config: &GenerationConfig,
) -> Result<PaperOutput, QpGenError> {
    let input_str = input_str.as_ref();
    let backend = resolve_backend(config)?;
    generate_paper_with_backend(input_str, config, backend).await
}

/// Like [`generate_paper`] but with a caller-supplied backend.
///
/// Useful when the caller wraps a backend with its own middleware, or in
/// tests with a scripted backend.
pub async fn generate_paper_with_backend(
    input_str: impl AsRef<str>,
    config: &GenerationConfig,
    backend: Arc<dyn GenerationBackend>,
) -> Result<PaperOutput, QpGenError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting generation: {}", input_str);

    // ── Step 1: Extract and excerpt ──────────────────────────────────────
    let extract_start = Instant::now();
    let DocumentExcerpt { info: document, excerpt } = extract_document(input_str, config).await?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;

    if let Some(ref cb) = config.progress_callback {
        cb.on_document_loaded(document.document_chars, document.chunks, document.excerpt_chars);
    }

    // ── Step 2: Assemble prompt ──────────────────────────────────────────
    let token = VariationToken::random();
    let prompt = build_prompt(&excerpt, &config.instructions, &token);
    debug!("Prompt: {} chars, variation id {}", prompt.len(), token);

    // ── Step 3: Fallback generation ──────────────────────────────────────
    let llm_start = Instant::now();
    let invoker = FallbackInvoker::new(backend, config.backends.clone())
        .with_progress(config.progress_callback.clone());
    let generation = invoker.generate(&prompt).await?;
    let llm_duration_ms = llm_start.elapsed().as_millis() as u64;

    // ── Step 4: Polish ───────────────────────────────────────────────────
    let text = if config.polish {
        postprocess::clean_output(&generation.text)
    } else {
        generation.text.clone()
    };

    let stats = GenerationStats {
        extract_duration_ms,
        llm_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        ..GenerationStats::from_generation(&generation)
    };

    info!(
        "Generation complete: {} via {} ({} attempt(s), {}ms total)",
        document.name, generation.backend, stats.attempts, stats.total_duration_ms
    );

    Ok(PaperOutput {
        text,
        generation,
        document,
        stats,
    })
}

/// Generate a paper and write it to `output_path`.
///
/// Uses atomic write (temp file + rename) so a failed run never leaves a
/// half-written paper behind.
pub async fn generate_paper_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &GenerationConfig,
) -> Result<GenerationStats, QpGenError> {
    let output = generate_paper(input_str, config).await?;
    write_atomic(output_path.as_ref(), &output.text).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`generate_paper`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_paper_sync(
    input_str: impl AsRef<str>,
    config: &GenerationConfig,
) -> Result<PaperOutput, QpGenError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| QpGenError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate_paper(input_str, config))
}

/// Generate a paper from an uploaded document held in memory.
///
/// `file_name` is only used for its extension, which decides how the bytes
/// are parsed. The bytes go to a managed [`tempfile`] that is removed when
/// this call returns.
pub async fn generate_from_bytes(
    bytes: &[u8],
    file_name: &str,
    config: &GenerationConfig,
) -> Result<PaperOutput, QpGenError> {
    let backend = resolve_backend(config)?;
    generate_from_bytes_with_backend(bytes, file_name, config, backend).await
}

/// Like [`generate_from_bytes`] but with a caller-supplied backend.
pub async fn generate_from_bytes_with_backend(
    bytes: &[u8],
    file_name: &str,
    config: &GenerationConfig,
    backend: Arc<dyn GenerationBackend>,
) -> Result<PaperOutput, QpGenError> {
    let kind = DocumentKind::from_path(Path::new(file_name));
    let mut tmp = tempfile::Builder::new()
        .prefix("qpgen-upload-")
        .suffix(&format!(".{}", kind.extension()))
        .tempfile()
        .map_err(|e| QpGenError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| QpGenError::Internal(format!("tempfile write: {e}")))?;

    let path = tmp.path().to_string_lossy().to_string();
    let mut output = generate_paper_with_backend(&path, config, backend).await?;
    output.document.name = file_name.to_string();
    Ok(output)
}

/// Resolve, extract and excerpt a document without calling any model.
///
/// Does not require an API key.
pub async fn extract_document(
    input_str: impl AsRef<str>,
    config: &GenerationConfig,
) -> Result<DocumentExcerpt, QpGenError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let kind = resolved.kind();
    let text = extract::extract_text(resolved.path(), kind).await?;

    let chunks = TextSplitter::new(config.chunk_size, config.chunk_overlap).split(&text);
    let excerpt = chunk::excerpt(&chunks, config.excerpt_chars);
    debug!(
        "{} chunk(s); excerpt is {} characters",
        chunks.len(),
        excerpt.chars().count()
    );

    Ok(DocumentExcerpt {
        info: DocumentInfo {
            name: resolved.display_name(),
            kind,
            document_chars: text.chars().count(),
            chunks: chunks.len(),
            excerpt_chars: excerpt.chars().count(),
        },
        excerpt,
    })
}

/// Pick the backend named by the config.
///
/// With `provider_name` set, the provider is instantiated once for the
/// primary model so a missing key or unknown provider fails before any
/// document work. Otherwise the Gemini backend is built, which needs an
/// API key.
pub fn resolve_backend(config: &GenerationConfig) -> Result<Arc<dyn GenerationBackend>, QpGenError> {
    match config.provider_name.as_deref() {
        Some(name) => {
            let primary = config.backends.first().map(String::as_str).unwrap_or_default();
            ProviderFactory::create_llm_provider(name, primary).map_err(|e| {
                QpGenError::ProviderNotConfigured {
                    provider: name.to_string(),
                    hint: format!("{e}"),
                }
            })?;
            Ok(Arc::new(ProviderBackend::from_config(config)?))
        }
        None => Ok(Arc::new(GeminiBackend::from_config(config)?)),
    }
}
