//! Generation backends: the seam between the invoker and a hosted model.
//!
//! A backend knows how to send one prompt to one model id and hand back the
//! raw response shape. It does not retry, fall back or pick text out of the
//! response; that is [`crate::invoker`]'s job, which keeps the fallback
//! policy testable with an in-memory backend.
//!
//! - [`gemini`]  : native Gemini `generateContent` REST client
//! - [`provider`]: any edgequake-llm provider (openai, anthropic, ollama, …)

pub mod gemini;
pub mod provider;

use crate::error::AttemptError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use gemini::GeminiBackend;
pub use provider::ProviderBackend;

/// Sends a prompt to a named model.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Short label used in logs ("gemini", "openai", …).
    fn name(&self) -> &str;

    /// One attempt against `model`. No retries.
    async fn generate(&self, model: &str, prompt: &str) -> Result<GenerationResponse, AttemptError>;
}

/// Response of a single generation call.
///
/// `text` is the primary textual field (a backend's quick accessor); the
/// candidate list is the nested path the invoker falls back to when `text`
/// is absent or empty. Field names follow the Gemini wire format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default)]
    pub candidates: Vec<Candidate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
}

impl GenerationResponse {
    /// A response carrying only the primary field.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// A response carrying only one candidate with the given parts.
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: vec![Candidate {
                content: Some(Content {
                    parts: parts
                        .into_iter()
                        .map(|p| Part {
                            text: Some(p.into()),
                        })
                        .collect(),
                    role: Some("model".into()),
                }),
                finish_reason: Some("STOP".into()),
            }],
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

/// Token accounting, when the backend reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u64,
    #[serde(default)]
    pub candidates_token_count: u64,
    #[serde(default)]
    pub total_token_count: u64,
}
