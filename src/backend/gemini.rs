//! Native Gemini `generateContent` client.
//!
//! ## Failure classification
//!
//! HTTP 429, or an error body whose `status` is `RESOURCE_EXHAUSTED`, means
//! the model's quota is used up; it becomes [`AttemptError::QuotaExceeded`].
//! Every other failure (non-2xx, transport error, timeout, undecodable body)
//! becomes [`AttemptError::Backend`]. Neither is retried here.
//!
//! ## Primary text
//!
//! The REST API has no top-level text field. We fill
//! [`GenerationResponse::text`] the way the official SDK's quick accessor
//! does: only when there is exactly one candidate and it finished normally.
//! Anything else is left to the invoker's nested extraction.

use super::{GenerationBackend, GenerationResponse};
use crate::config::{ApiKey, GenerationConfig};
use crate::error::{AttemptError, QpGenError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Gemini REST backend.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: ApiKey,
    base_url: String,
    system_prompt: Option<String>,
    temperature: f32,
    max_tokens: usize,
}

impl GeminiBackend {
    /// Build a backend from the config, resolving the API key.
    pub fn from_config(config: &GenerationConfig) -> Result<Self, QpGenError> {
        let api_key = config.resolve_api_key()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| QpGenError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.clone(),
            system_prompt: Some(
                config
                    .system_prompt
                    .clone()
                    .unwrap_or_else(|| crate::prompts::DEFAULT_SYSTEM_PROMPT.to_string()),
            ),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }

    fn request_body(&self, prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: self.system_prompt.as_ref().map(|s| RequestContent {
                role: None,
                parts: vec![RequestPart { text: s.clone() }],
            }),
            contents: vec![RequestContent {
                role: Some("user".into()),
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: RequestGenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        }
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<GenerationResponse, AttemptError> {
        let url = self.endpoint(model);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose())
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AttemptError::backend_error(model, format!("request timed out: {e}"))
                } else {
                    AttemptError::backend_error(model, format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AttemptError::backend_error(model, format!("reading body: {e}")))?;

        if !status.is_success() {
            return Err(classify_status(model, status.as_u16(), &body));
        }

        let mut parsed: GenerationResponse = serde_json::from_str(&body)
            .map_err(|e| AttemptError::backend_error(model, format!("malformed response: {e}")))?;

        if let Some(usage) = &parsed.usage_metadata {
            debug!(
                "{}: {} prompt tokens, {} output tokens",
                model, usage.prompt_token_count, usage.candidates_token_count
            );
        }

        parsed.text = quick_text(&parsed);
        Ok(parsed)
    }
}

/// Map a non-2xx status and its body to an attempt error.
fn classify_status(model: &str, status: u16, body: &str) -> AttemptError {
    let api_error = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
    let detail = match &api_error {
        Some(e) if !e.message.is_empty() => format!("HTTP {status}: {}", e.message),
        _ => format!("HTTP {status}"),
    };

    let exhausted = api_error
        .as_ref()
        .and_then(|e| e.status.as_deref())
        .is_some_and(|s| s == "RESOURCE_EXHAUSTED");

    if status == 429 || exhausted {
        AttemptError::quota(model, detail)
    } else {
        AttemptError::backend_error(model, detail)
    }
}

/// The SDK-style `.text` accessor: single, normally finished candidate only.
fn quick_text(response: &GenerationResponse) -> Option<String> {
    let [candidate] = response.candidates.as_slice() else {
        return None;
    };
    match candidate.finish_reason.as_deref() {
        None | Some("STOP") | Some("MAX_TOKENS") => {}
        Some(_) => return None,
    }
    let text: String = candidate
        .content
        .as_ref()?
        .parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<RequestContent>,
    contents: Vec<RequestContent>,
    generation_config: RequestGenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestGenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}
