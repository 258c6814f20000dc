//! Backend over any edgequake-llm provider.
//!
//! Lets the backend list name OpenAI, Anthropic, Ollama, … models instead
//! of Gemini ones. The provider's chat response only exposes the message
//! content, so it maps to the primary text field and the candidate list
//! stays empty.
//!
//! edgequake-llm reports failures as one error type, so quota exhaustion is
//! recognised from the message (429, "rate limit", "quota", …).

use super::{GenerationBackend, GenerationResponse, UsageMetadata};
use crate::config::GenerationConfig;
use crate::error::{message_indicates_quota, AttemptError, QpGenError};
use crate::prompts::DEFAULT_SYSTEM_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

/// Builds a provider for each model id on demand.
pub struct ProviderBackend {
    provider_name: String,
    system_prompt: String,
    temperature: f32,
    max_tokens: usize,
}

impl ProviderBackend {
    pub fn from_config(config: &GenerationConfig) -> Result<Self, QpGenError> {
        let provider_name = config.provider_name.clone().ok_or_else(|| {
            QpGenError::InvalidConfig("ProviderBackend needs a provider name".into())
        })?;
        Ok(Self {
            provider_name,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn provider_for(&self, model: &str) -> Result<Arc<dyn LLMProvider>, AttemptError> {
        ProviderFactory::create_llm_provider(&self.provider_name, model).map_err(|e| {
            AttemptError::backend_error(
                model,
                format!("provider '{}' not available: {e}", self.provider_name),
            )
        })
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl GenerationBackend for ProviderBackend {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<GenerationResponse, AttemptError> {
        let provider = self.provider_for(model)?;
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user(prompt),
        ];

        let response = provider
            .chat(&messages, Some(&self.options()))
            .await
            .map_err(|e| {
                let msg = format!("{e}");
                if message_indicates_quota(&msg) {
                    AttemptError::quota(model, msg)
                } else {
                    AttemptError::backend_error(model, msg)
                }
            })?;

        debug!(
            "{}/{}: {} input tokens, {} output tokens",
            self.provider_name, model, response.prompt_tokens, response.completion_tokens
        );

        Ok(GenerationResponse {
            text: Some(response.content),
            candidates: Vec::new(),
            usage_metadata: Some(UsageMetadata {
                prompt_token_count: response.prompt_tokens as u64,
                candidates_token_count: response.completion_tokens as u64,
                total_token_count: (response.prompt_tokens + response.completion_tokens) as u64,
            }),
        })
    }
}
