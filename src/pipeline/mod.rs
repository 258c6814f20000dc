//! Pipeline stages for document-to-question-paper generation.
//!
//! Each submodule implements one transformation step and is tested on its
//! own. Only [`input`] and the backends touch the network.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ chunk ──▶ (prompt + invoker) ──▶ postprocess
//! (URL/path)  (pdfium/zip)  (split, excerpt)  (fallback LLM)     (cleanup)
//! ```
//!
//! 1. [`input`]  : canonicalise the user-supplied path or URL to a local
//!    file and classify it as PDF, DOCX or text
//! 2. [`extract`]: pull the plain text out; PDF and DOCX parsing runs in
//!    `spawn_blocking`
//! 3. [`chunk`]  : recursive character splitting, then the bounded excerpt
//!    that goes into the prompt
//! 4. [`postprocess`]: deterministic layout cleanup of the generated paper

pub mod chunk;
pub mod extract;
pub mod input;
pub mod postprocess;
