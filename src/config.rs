//! Configuration types for question-paper generation.
//!
//! All generation behaviour is controlled through [`GenerationConfig`], built
//! via its [`GenerationConfigBuilder`]. The API key is an explicit field
//! rather than process-wide state so the invoker can be exercised in
//! isolation with any credential (or none, behind a mock backend).

use crate::error::QpGenError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary model first, fallbacks after, tried strictly in this order.
pub const DEFAULT_BACKENDS: &[&str] = &[
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
    "gemini-1.5-flash",
    "gemini-1.5-pro",
];

/// Environment variables consulted for the Gemini key, in order.
pub const API_KEY_ENV_VARS: &[&str] = &["GOOGLE_API_KEY", "GEMINI_API_KEY"];

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// An API credential whose `Debug`/`Display` never reveal the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key. Blank input yields `None`.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    /// First non-empty value among [`API_KEY_ENV_VARS`].
    pub fn from_env() -> Option<Self> {
        API_KEY_ENV_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find_map(|value| Self::new(value))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Configuration for one question-paper generation.
///
/// Built via [`GenerationConfig::builder()`] or using
/// [`GenerationConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_qpgen::{GenerationConfig, QuestionPattern};
///
/// let config = GenerationConfig::builder()
///     .pattern(QuestionPattern::new(5, 3, 1))
///     .backends(["gemini-2.0-flash", "gemini-1.5-flash"])
///     .build()
///     .unwrap();
/// assert_eq!(config.backends.len(), 2);
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// Ordered model identifiers. First is primary. Default: [`DEFAULT_BACKENDS`].
    pub backends: Vec<String>,

    /// Gemini API key. If None, [`ApiKey::from_env`] is consulted when the
    /// Gemini backend is created.
    pub api_key: Option<ApiKey>,

    /// edgequake-llm provider name (e.g. "openai", "anthropic", "ollama").
    /// When set, backends are model ids of that provider instead of Gemini.
    pub provider_name: Option<String>,

    /// Gemini REST endpoint root. Default: [`DEFAULT_GEMINI_BASE_URL`].
    pub base_url: String,

    /// What the paper should contain.
    pub instructions: Instructions,

    /// Custom system prompt. If None, uses the built-in question-setter prompt.
    pub system_prompt: Option<String>,

    /// Sampling temperature. Default: 0.7.
    ///
    /// Question papers benefit from some diversity; the variation token
    /// alone does not change the sampling distribution.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 4096.
    pub max_tokens: usize,

    /// Splitter chunk size in characters. Default: 2000.
    pub chunk_size: usize,

    /// Overlap between neighbouring chunks in characters. Default: 200.
    pub chunk_overlap: usize,

    /// Characters of the joined document sent to the model. Default: 15 000.
    pub excerpt_chars: usize,

    /// Run [`crate::pipeline::postprocess::clean_output`] on the result. Default: true.
    pub polish: bool,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-backend-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Receives load and attempt events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backends: DEFAULT_BACKENDS.iter().map(|s| s.to_string()).collect(),
            api_key: None,
            provider_name: None,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            instructions: Instructions::default(),
            system_prompt: None,
            temperature: 0.7,
            max_tokens: 4096,
            chunk_size: 2000,
            chunk_overlap: 200,
            excerpt_chars: 15_000,
            polish: true,
            download_timeout_secs: 120,
            api_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("backends", &self.backends)
            .field("api_key", &self.api_key)
            .field("provider_name", &self.provider_name)
            .field("base_url", &self.base_url)
            .field("instructions", &self.instructions)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("excerpt_chars", &self.excerpt_chars)
            .field("polish", &self.polish)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn GenerationProgressCallback>"),
            )
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }

    /// Explicit key, else the environment.
    pub fn resolve_api_key(&self) -> Result<ApiKey, QpGenError> {
        self.api_key
            .clone()
            .or_else(ApiKey::from_env)
            .ok_or(QpGenError::MissingApiKey)
    }
}

/// Builder for [`GenerationConfig`].
#[derive(Debug)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn backends<I, S>(mut self, backends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.backends = backends.into_iter().map(Into::into).collect();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = ApiKey::new(key);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn pattern(mut self, pattern: QuestionPattern) -> Self {
        self.config.instructions = Instructions::Pattern(pattern);
        self
    }

    /// Replace the quantity requirements with free-text instructions.
    pub fn custom_instructions(mut self, text: impl Into<String>) -> Self {
        self.config.instructions = Instructions::Custom(text.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn chunk_size(mut self, n: usize) -> Self {
        self.config.chunk_size = n;
        self
    }

    pub fn chunk_overlap(mut self, n: usize) -> Self {
        self.config.chunk_overlap = n;
        self
    }

    pub fn excerpt_chars(mut self, n: usize) -> Self {
        self.config.excerpt_chars = n;
        self
    }

    pub fn polish(mut self, v: bool) -> Self {
        self.config.polish = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, QpGenError> {
        let c = &self.config;
        if c.backends.is_empty() {
            return Err(QpGenError::InvalidConfig(
                "At least one backend model is required".into(),
            ));
        }
        if c.backends.iter().any(|b| b.trim().is_empty()) {
            return Err(QpGenError::InvalidConfig(
                "Backend model identifiers must not be blank".into(),
            ));
        }
        if c.chunk_size == 0 {
            return Err(QpGenError::InvalidConfig("Chunk size must be ≥ 1".into()));
        }
        if c.chunk_overlap >= c.chunk_size {
            return Err(QpGenError::InvalidConfig(format!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        if c.excerpt_chars == 0 {
            return Err(QpGenError::InvalidConfig(
                "Excerpt length must be ≥ 1".into(),
            ));
        }
        if let Instructions::Custom(ref text) = c.instructions {
            if text.trim().is_empty() {
                return Err(QpGenError::InvalidConfig(
                    "Custom instructions must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Instructions ─────────────────────────────────────────────────────────

/// How many questions to ask at each mark weight.
///
/// Limits mirror the form this tool replaces: at most 20 two-mark, 10
/// five-mark and 5 ten-mark questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionPattern {
    pub two_mark: u32,
    pub five_mark: u32,
    pub ten_mark: u32,
}

impl QuestionPattern {
    pub const MAX_TWO_MARK: u32 = 20;
    pub const MAX_FIVE_MARK: u32 = 10;
    pub const MAX_TEN_MARK: u32 = 5;

    /// Counts above the limits are clamped.
    pub fn new(two_mark: u32, five_mark: u32, ten_mark: u32) -> Self {
        Self {
            two_mark: two_mark.min(Self::MAX_TWO_MARK),
            five_mark: five_mark.min(Self::MAX_FIVE_MARK),
            ten_mark: ten_mark.min(Self::MAX_TEN_MARK),
        }
    }

    pub fn total_questions(&self) -> u32 {
        self.two_mark + self.five_mark + self.ten_mark
    }

    pub fn total_marks(&self) -> u32 {
        self.two_mark * 2 + self.five_mark * 5 + self.ten_mark * 10
    }
}

impl Default for QuestionPattern {
    fn default() -> Self {
        Self {
            two_mark: 10,
            five_mark: 5,
            ten_mark: 2,
        }
    }
}

/// Either quantity requirements or a free-text override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instructions {
    Pattern(QuestionPattern),
    Custom(String),
}

impl Default for Instructions {
    fn default() -> Self {
        Instructions::Pattern(QuestionPattern::default())
    }
}
