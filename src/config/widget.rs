//! Widget configuration loaded from TOML files
//!
//! Each deployment of the chat widget can tune:
//! - The completion endpoint, model and sampling settings
//! - The greeting and storage key of the transcript
//! - How concurrent submissions are dispatched
//! - The storage backend and voice input language
//!
//! Every section is optional; a missing file means all defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::prompts::builtin;

/// Root widget configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// Completion service settings
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Widget behavior
    #[serde(default)]
    pub widget: WidgetSettings,

    /// Transcript storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Voice input
    #[serde(default)]
    pub voice: VoiceConfig,
}

impl WidgetConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: WidgetConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let completion = &self.completion;
        if !(0.0..=2.0).contains(&completion.temperature) {
            return Err(ConfigError::Validation(format!(
                "completion.temperature must be within 0..=2, got {}",
                completion.temperature
            )));
        }
        if completion.max_tokens == 0 {
            return Err(ConfigError::Validation(
                "completion.max_tokens must be positive".into(),
            ));
        }
        if completion.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "completion.timeout_secs must be positive".into(),
            ));
        }
        if self.widget.storage_key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "widget.storage_key must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Completion service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the bearer token
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum reply size in tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// System role instruction sent with every request
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    150
}

fn default_system_prompt() -> String {
    builtin::SYSTEM_PROMPT.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl CompletionConfig {
    /// Resolve the API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: default_system_prompt(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// How submissions made while a reply is outstanding are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchPolicy {
    /// One request at a time, in submission order
    #[default]
    Serial,
    /// Every submission runs at once; replies land in arrival order
    Concurrent,
}

/// Widget behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetSettings {
    /// Storage key of the persisted transcript
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Greeting shown in a fresh transcript
    #[serde(default = "default_greeting")]
    pub greeting: String,

    #[serde(default)]
    pub dispatch: DispatchPolicy,
}

fn default_storage_key() -> String {
    "chat-messages".to_string()
}

fn default_greeting() -> String {
    builtin::GREETING.to_string()
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            greeting: default_greeting(),
            dispatch: DispatchPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    /// Nothing survives a restart
    Memory,
}

/// Transcript storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

/// Voice input configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// BCP 47 language tag passed to the recognizer
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en-US".to_string()
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CONFIG: &str = r#"
[completion]
base_url = "http://localhost:8000/v1"
model = "llama-3"
api_key_env = "LOCAL_LLM_KEY"
temperature = 0.2
max_tokens = 300
timeout_secs = 10

[widget]
storage_key = "globalsync-chat"
greeting = "Welcome to GlobalSync!"
dispatch = "concurrent"

[storage]
backend = "memory"

[voice]
language = "de-DE"
"#;

    #[test]
    fn test_parse_config() {
        let config = WidgetConfig::from_str(SAMPLE_CONFIG).unwrap();

        assert_eq!(config.completion.base_url, "http://localhost:8000/v1");
        assert_eq!(config.completion.model, "llama-3");
        assert_eq!(config.completion.max_tokens, 300);
        assert_eq!(config.completion.timeout(), Duration::from_secs(10));
        // Not overridden
        assert_eq!(config.completion.system_prompt, builtin::SYSTEM_PROMPT);

        assert_eq!(config.widget.storage_key, "globalsync-chat");
        assert_eq!(config.widget.greeting, "Welcome to GlobalSync!");
        assert_eq!(config.widget.dispatch, DispatchPolicy::Concurrent);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.voice.language, "de-DE");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_config() {
        let config = WidgetConfig::from_str("").unwrap();
        assert_eq!(config.completion.model, "gpt-3.5-turbo");
        assert_eq!(config.completion.max_tokens, 150);
        assert_eq!(config.completion.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.widget.storage_key, "chat-messages");
        assert_eq!(config.widget.dispatch, DispatchPolicy::Serial);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let config = WidgetConfig::from_str("[completion]\ntemperature = 3.5\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let config = WidgetConfig::from_str("[completion]\nmax_tokens = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let config = WidgetConfig::from_str("[widget]\nstorage_key = \"  \"\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_unknown_dispatch_is_a_parse_error() {
        let result = WidgetConfig::from_str("[widget]\ndispatch = \"parallel\"\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }
}
