//! # edgequake-qpgen
//!
//! Generate exam question papers from study material with an ordered list of
//! LLM backends.
//!
//! ## Why this crate?
//!
//! Free-tier model quotas run out mid-session. Rather than failing the
//! request, the generator walks a list of models (primary first) and
//! returns the first paper any of them produces. Quota exhaustion is
//! treated as routine; only when every model has failed does the caller see
//! an error, and that error carries the last cause.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / DOCX / TXT
//!  │
//!  ├─ 1. Input    resolve local file or download from URL
//!  ├─ 2. Extract  pdfium / word/document.xml / lossy UTF-8
//!  ├─ 3. Chunk    recursive split, joined excerpt (15 000 chars)
//!  ├─ 4. Prompt   excerpt + question pattern + variation id
//!  ├─ 5. Invoke   gemini-2.0-flash → 2.0-flash-lite → 1.5-flash → 1.5-pro
//!  └─ 6. Polish   fence stripping, whitespace cleanup
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_qpgen::{generate_paper, GenerationConfig, QuestionPattern};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from GOOGLE_API_KEY / GEMINI_API_KEY
//!     let config = GenerationConfig::builder()
//!         .pattern(QuestionPattern::new(10, 5, 2))
//!         .build()?;
//!     let output = generate_paper("biology-notes.pdf", &config).await?;
//!     println!("{}", output.text);
//!     eprintln!("answered by {} after {} attempt(s)",
//!         output.generation.backend,
//!         output.stats.attempts);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `qpgen` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-qpgen = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod error;
pub mod generate;
pub mod invoker;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{GeminiBackend, GenerationBackend, GenerationResponse, ProviderBackend};
pub use config::{
    ApiKey, GenerationConfig, GenerationConfigBuilder, Instructions, QuestionPattern,
    DEFAULT_BACKENDS,
};
pub use error::{AttemptError, QpGenError};
pub use generate::{
    extract_document, generate_from_bytes, generate_from_bytes_with_backend, generate_paper,
    generate_paper_sync, generate_paper_to_file, generate_paper_with_backend, resolve_backend,
};
pub use invoker::{extract_text, FallbackInvoker, Generation, TextSource};
pub use output::{write_atomic, DocumentExcerpt, DocumentInfo, GenerationStats, PaperOutput};
pub use pipeline::input::DocumentKind;
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::{build_prompt, VariationToken};
