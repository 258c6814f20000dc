//! Progress-callback trait for generation events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] to receive
//! events as the document is loaded and each backend is attempted.
//!
//! # Example
//!
//! ```rust
//! use edgequake_qpgen::{AttemptError, GenerationConfig, GenerationProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FailureCounter {
//!     failures: AtomicUsize,
//! }
//!
//! impl GenerationProgressCallback for FailureCounter {
//!     fn on_attempt_failed(&self, _backend: &str, error: &AttemptError) {
//!         self.failures.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("skipping: {error}");
//!     }
//! }
//!
//! let config = GenerationConfig::builder()
//!     .progress_callback(Arc::new(FailureCounter { failures: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::AttemptError;
use std::sync::Arc;

/// Called by the generation pipeline at each stage.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync` because one
/// config (and its callback) may serve several requests at once.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called once the document text is extracted and excerpted.
    ///
    /// # Arguments
    /// * `document_chars`: characters extracted from the document
    /// * `chunks`        : number of splitter chunks
    /// * `excerpt_chars` : characters actually sent to the model
    fn on_document_loaded(&self, document_chars: usize, chunks: usize, excerpt_chars: usize) {
        let _ = (document_chars, chunks, excerpt_chars);
    }

    /// Called just before a backend is attempted.
    ///
    /// # Arguments
    /// * `backend`: model identifier
    /// * `index`  : 1-indexed position in the backend list
    /// * `total`  : length of the backend list
    fn on_attempt_start(&self, backend: &str, index: usize, total: usize) {
        let _ = (backend, index, total);
    }

    /// Called when a backend attempt fails and the invoker moves on.
    fn on_attempt_failed(&self, backend: &str, error: &AttemptError) {
        let _ = (backend, error);
    }

    /// Called once a backend produced text.
    ///
    /// # Arguments
    /// * `text_len`: byte length of the generated text
    fn on_generation_complete(&self, backend: &str, text_len: usize) {
        let _ = (backend, text_len);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl GenerationProgressCallback for Recorder {
        fn on_attempt_start(&self, backend: &str, index: usize, total: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("start {backend} {index}/{total}"));
        }

        fn on_attempt_failed(&self, backend: &str, error: &AttemptError) {
            self.events
                .lock()
                .unwrap()
                .push(format!("fail {backend} expected={}", error.is_expected()));
        }

        fn on_generation_complete(&self, backend: &str, text_len: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("done {backend} {text_len}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_document_loaded(100, 1, 100);
        cb.on_attempt_start("a", 1, 2);
        cb.on_attempt_failed("a", &AttemptError::quota("a", "429"));
        cb.on_generation_complete("b", 12);
    }

    #[test]
    fn recorder_receives_events_in_order() {
        let rec = Recorder::default();
        rec.on_attempt_start("a", 1, 2);
        rec.on_attempt_failed("a", &AttemptError::quota("a", "429"));
        rec.on_attempt_start("b", 2, 2);
        rec.on_generation_complete("b", 2);

        let events = rec.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                "start a 1/2".to_string(),
                "fail a expected=true".to_string(),
                "start b 2/2".to_string(),
                "done b 2".to_string(),
            ]
        );
    }
}
