//! Completion service integrations

mod openai_compat;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::widget::CompletionConfig;

pub use openai_compat::{OpenAICompatConfig, OpenAICompatProvider};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Status {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// One stateless completion call: the system framing plus a single user turn
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_text: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn from_config(config: &CompletionConfig, user_text: impl Into<String>) -> Self {
        Self {
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            user_text: user_text.into(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// An external service that turns a request into one reply string
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError>;
}

/// Build the completion service described by the widget config
pub fn from_config(config: &CompletionConfig) -> Result<OpenAICompatProvider, ProviderError> {
    let api_key = config.api_key();
    if api_key.is_none() {
        tracing::warn!(
            "{} is not set; completion requests will be sent without credentials",
            config.api_key_env
        );
    }

    OpenAICompatProvider::new(OpenAICompatConfig {
        base_url: config.base_url.clone(),
        api_key,
    })
}
