/*!
 * LLM provider clients.
 *
 * The analysis pipeline only needs one capability from a language model:
 * turn a prompt into text. Each backend implements `Provider` for that:
 * - Ollama: Local LLM server (default)
 * - OpenAI: OpenAI API or any OpenAI-compatible server such as LM Studio
 * - Anthropic: Anthropic API integration
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use crate::app_config::{LlmConfig, LlmProvider};
use crate::errors::{ConfigError, ProviderError};

pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;

/// A single prompt sent to a provider
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System prompt
    pub system: Option<String>,
    /// User prompt
    pub prompt: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            temperature: 0.0,
            max_tokens: 256,
        }
    }

    /// Set the system prompt
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the token limit
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Sampling settings applied to every classification request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 64,
        }
    }
}

impl From<&LlmConfig> for Sampling {
    fn from(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

impl Sampling {
    /// Copy these settings onto `request`
    pub fn apply(&self, request: CompletionRequest) -> CompletionRequest {
        request.temperature(self.temperature).max_tokens(self.max_tokens)
    }
}

/// Text produced by a provider
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated text
    pub text: String,
}

/// Common trait for all LLM providers
///
/// Implementations are interchangeable behind `Arc<dyn Provider>`; callers
/// wrap every call in their own timeout.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Complete a request using this provider
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;
}

/// Build the configured provider, or `None` when the LLM is disabled
pub fn create_provider(config: &LlmConfig) -> Result<Option<Arc<dyn Provider>>, ConfigError> {
    if !config.enabled {
        return Ok(None);
    }

    let model = config.get_model();
    let endpoint = config.get_endpoint();

    let provider: Arc<dyn Provider> = match config.provider {
        LlmProvider::Ollama => Arc::new(
            ollama::Ollama::from_url(endpoint, model, config.timeout_secs).with_retries(config.max_retries),
        ),
        LlmProvider::OpenAI | LlmProvider::LMStudio => {
            if config.provider == LlmProvider::OpenAI && config.api_key.is_empty() {
                return Err(ConfigError::Missing("llm.api_key (required for OpenAI)".to_string()));
            }
            Arc::new(openai::OpenAI::new(
                config.provider.display_name(),
                endpoint,
                config.api_key.clone(),
                model,
                config.timeout_secs,
            ))
        }
        LlmProvider::Anthropic => {
            if config.api_key.is_empty() {
                return Err(ConfigError::Missing("llm.api_key (required for Anthropic)".to_string()));
            }
            Arc::new(anthropic::Anthropic::new(
                config.api_key.clone(),
                endpoint,
                model,
                config.timeout_secs,
            ))
        }
    };

    Ok(Some(provider))
}

/// Map a transport error from reqwest onto the provider taxonomy
pub(crate) fn classify_reqwest_error(err: reqwest::Error, timeout: std::time::Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout)
    } else if err.is_connect() {
        ProviderError::ConnectionError(err.to_string())
    } else {
        ProviderError::RequestFailed(err.to_string())
    }
}
