//! The fallback invoker: try each backend in order, return the first text.
//!
//! ## Policy
//!
//! - Backends are attempted strictly in list order, one attempt each, with
//!   no delay between attempts and no concurrency.
//! - A successful call whose primary text is absent or empty falls back to
//!   the nested candidate → content parts → text path before it counts as a
//!   failure.
//! - Quota exhaustion and every other failure both advance to the next
//!   backend. The last error seen is attached if the whole list fails.
//!
//! The invoker holds no mutable state; one instance can serve concurrent
//! requests.

use crate::backend::{GenerationBackend, GenerationResponse};
use crate::error::{AttemptError, QpGenError};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which extraction path produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextSource {
    /// The response's primary text field.
    Primary,
    /// The first candidate's content parts.
    Nested,
}

/// A successful invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    /// Text exactly as the backend produced it.
    pub text: String,
    /// Model identifier that produced `text`.
    pub backend: String,
    pub source: TextSource,
    /// Failures absorbed before `backend` succeeded, in attempt order.
    pub failures: Vec<AttemptError>,
}

impl Generation {
    /// Number of backends attempted, including the successful one.
    pub fn attempts(&self) -> usize {
        self.failures.len() + 1
    }
}

/// Pick the text out of a response.
///
/// Returns the primary field untouched when it is non-empty; otherwise the
/// concatenated parts of the first candidate that has any text. `None`
/// means the response carries no usable text.
pub fn extract_text(response: &GenerationResponse) -> Option<(String, TextSource)> {
    if let Some(text) = response.text.as_deref() {
        if !text.is_empty() {
            return Some((text.to_string(), TextSource::Primary));
        }
    }

    response
        .candidates
        .iter()
        .filter_map(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<String>()
        })
        .find(|text| !text.is_empty())
        .map(|text| (text, TextSource::Nested))
}

/// Ordered-fallback generation over a [`GenerationBackend`].
pub struct FallbackInvoker {
    backend: Arc<dyn GenerationBackend>,
    backends: Vec<String>,
    progress: Option<ProgressCallback>,
}

impl FallbackInvoker {
    /// `backends` is tried in order; the first entry is the primary.
    pub fn new<I, S>(backend: Arc<dyn GenerationBackend>, backends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            backend,
            backends: backends.into_iter().map(Into::into).collect(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn backends(&self) -> &[String] {
        &self.backends
    }

    /// Run the prompt against each backend until one yields text.
    ///
    /// # Errors
    /// [`QpGenError::AllBackendsFailed`] once the list is exhausted, carrying
    /// the error of the last backend attempted.
    pub async fn generate(&self, prompt: &str) -> Result<Generation, QpGenError> {
        let total = self.backends.len();
        let mut failures: Vec<AttemptError> = Vec::new();

        for (i, model) in self.backends.iter().enumerate() {
            if let Some(ref cb) = self.progress {
                cb.on_attempt_start(model, i + 1, total);
            }
            debug!("{}: attempting {} ({}/{})", self.backend.name(), model, i + 1, total);

            let outcome = self
                .backend
                .generate(model, prompt)
                .await
                .and_then(|response| {
                    extract_text(&response).ok_or_else(|| {
                        AttemptError::backend_error(model.as_str(), "response contained no text")
                    })
                });

            match outcome {
                Ok((text, source)) => {
                    info!(
                        "{}: {} produced {} bytes ({:?} text) after {} failed attempt(s)",
                        self.backend.name(),
                        model,
                        text.len(),
                        source,
                        failures.len()
                    );
                    if let Some(ref cb) = self.progress {
                        cb.on_generation_complete(model, text.len());
                    }
                    return Ok(Generation {
                        text,
                        backend: model.clone(),
                        source,
                        failures,
                    });
                }
                Err(e) => {
                    if e.is_expected() {
                        info!("{} quota exhausted", model);
                    } else {
                        warn!("Backend attempt failed: {}", e);
                    }
                    if let Some(ref cb) = self.progress {
                        cb.on_attempt_failed(model, &e);
                    }
                    failures.push(e);
                }
            }
        }

        Err(QpGenError::AllBackendsFailed {
            attempted: total,
            last_error: failures.pop(),
        })
    }

    /// Synchronous wrapper around [`FallbackInvoker::generate`].
    ///
    /// Creates a temporary tokio runtime internally; do not call from inside
    /// an async context.
    pub fn generate_blocking(&self, prompt: &str) -> Result<Generation, QpGenError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| QpGenError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.generate(prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Candidate, Content, Part};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted backend: each model id maps to a fixed outcome.
    struct Scripted {
        outcomes: HashMap<String, Result<GenerationResponse, AttemptError>>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(outcomes: Vec<(&str, Result<GenerationResponse, AttemptError>)>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: outcomes
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerationBackend for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            model: &str,
            _prompt: &str,
        ) -> Result<GenerationResponse, AttemptError> {
            self.calls.lock().unwrap().push(model.to_string());
            self.outcomes
                .get(model)
                .cloned()
                .unwrap_or_else(|| Err(AttemptError::backend_error(model, "unscripted")))
        }
    }

    fn quota(m: &str) -> Result<GenerationResponse, AttemptError> {
        Err(AttemptError::quota(m, "429"))
    }

    fn boom(m: &str) -> Result<GenerationResponse, AttemptError> {
        Err(AttemptError::backend_error(m, "boom"))
    }

    #[tokio::test]
    async fn quota_failures_then_success_stops_early() {
        let backend = Scripted::new(vec![
            ("a", quota("a")),
            ("b", quota("b")),
            ("c", Ok(GenerationResponse::from_text("paper"))),
            ("d", Ok(GenerationResponse::from_text("never"))),
        ]);
        let invoker = FallbackInvoker::new(backend.clone(), ["a", "b", "c", "d"]);

        let g = invoker.generate("p").await.unwrap();
        assert_eq!(g.text, "paper");
        assert_eq!(g.backend, "c");
        assert_eq!(g.attempts(), 3);
        assert_eq!(backend.calls(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn all_failed_reports_last_error() {
        let backend = Scripted::new(vec![("a", boom("a")), ("b", quota("b")), ("c", boom("c"))]);
        let invoker = FallbackInvoker::new(backend.clone(), ["a", "b", "c"]);

        match invoker.generate("p").await {
            Err(QpGenError::AllBackendsFailed {
                attempted,
                last_error,
            }) => {
                assert_eq!(attempted, 3);
                assert_eq!(last_error, Some(AttemptError::backend_error("c", "boom")));
            }
            other => panic!("expected AllBackendsFailed, got {other:?}"),
        }
        assert_eq!(backend.calls().len(), 3);
    }

    #[tokio::test]
    async fn last_error_is_last_seen_even_when_quota() {
        let backend = Scripted::new(vec![("a", boom("a")), ("b", quota("b"))]);
        let invoker = FallbackInvoker::new(backend, ["a", "b"]);
        let err = invoker.generate("p").await.unwrap_err();
        match err {
            QpGenError::AllBackendsFailed { last_error, .. } => {
                assert_eq!(last_error, Some(AttemptError::quota("b", "429")));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_backend_list_fails_generically() {
        let backend = Scripted::new(vec![]);
        let invoker = FallbackInvoker::new(backend, Vec::<String>::new());
        let err = invoker.generate("p").await.unwrap_err();
        assert!(matches!(
            err,
            QpGenError::AllBackendsFailed {
                attempted: 0,
                last_error: None
            }
        ));
        assert!(err.to_string().contains("all backends failed"));
    }

    #[tokio::test]
    async fn quota_then_generic_then_ok() {
        let backend = Scripted::new(vec![
            ("A", quota("A")),
            ("B", boom("B")),
            ("C", Ok(GenerationResponse::from_text("OK"))),
        ]);
        let invoker = FallbackInvoker::new(backend, ["A", "B", "C"]);

        let g = invoker.generate("p").await.unwrap();
        assert_eq!(g.text, "OK");
        assert_eq!(g.failures.last(), Some(&AttemptError::backend_error("B", "boom")));
        assert!(g.failures[0].is_expected());
    }

    #[tokio::test]
    async fn textless_response_advances() {
        let backend = Scripted::new(vec![
            ("a", Ok(GenerationResponse::default())),
            ("b", Ok(GenerationResponse::from_parts(["nested"]))),
        ]);
        let invoker = FallbackInvoker::new(backend, ["a", "b"]);
        let g = invoker.generate("p").await.unwrap();
        assert_eq!(g.backend, "b");
        assert_eq!(g.source, TextSource::Nested);
        assert_eq!(
            g.failures,
            vec![AttemptError::backend_error("a", "response contained no text")]
        );
    }

    #[test]
    fn primary_text_returned_unmodified() {
        let mut r = GenerationResponse::from_parts(["nested text"]);
        r.text = Some("  primary\n\n".into());
        assert_eq!(
            extract_text(&r),
            Some(("  primary\n\n".to_string(), TextSource::Primary))
        );
    }

    #[tokio::test]
    async fn whitespace_primary_is_returned_without_fallback() {
        let backend = Scripted::new(vec![
            ("a", Ok(GenerationResponse::from_text("   \n"))),
            ("b", Ok(GenerationResponse::from_text("paper"))),
        ]);
        let invoker = FallbackInvoker::new(backend.clone(), ["a", "b"]);
        let g = invoker.generate("p").await.unwrap();
        assert_eq!(g.text, "   \n");
        assert_eq!(g.backend, "a");
        assert_eq!(g.source, TextSource::Primary);
        assert!(g.failures.is_empty());
        assert_eq!(backend.calls(), vec!["a"]);
    }

    #[test]
    fn empty_primary_uses_nested_path() {
        let mut r = GenerationResponse::from_parts(["part one, ", "part two"]);
        r.text = Some(String::new());
        assert_eq!(
            extract_text(&r),
            Some(("part one, part two".to_string(), TextSource::Nested))
        );
    }

    #[test]
    fn nested_path_skips_empty_candidates() {
        let r = GenerationResponse {
            text: None,
            candidates: vec![
                Candidate {
                    content: None,
                    finish_reason: Some("SAFETY".into()),
                },
                Candidate {
                    content: Some(Content {
                        parts: vec![Part { text: None }],
                        role: None,
                    }),
                    finish_reason: None,
                },
                Candidate {
                    content: Some(Content {
                        parts: vec![Part {
                            text: Some("third".into()),
                        }],
                        role: None,
                    }),
                    finish_reason: None,
                },
            ],
            usage_metadata: None,
        };
        assert_eq!(
            extract_text(&r),
            Some(("third".to_string(), TextSource::Nested))
        );
    }

    #[test]
    fn no_text_anywhere() {
        assert_eq!(extract_text(&GenerationResponse::default()), None);
    }

    #[test]
    fn blocking_wrapper() {
        let backend = Scripted::new(vec![("a", Ok(GenerationResponse::from_text("sync")))]);
        let invoker = FallbackInvoker::new(backend, ["a"]);
        assert_eq!(invoker.generate_blocking("p").unwrap().text, "sync");
    }
}
