//! LLM model descriptors forwarded to the extraction service.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ConfigError;

/// Supported model providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    DeepSeek,
    Google,
    Cohere,
    Perplexity,
    Azure,
    Bedrock,
    Vertex,
    SelfHosted,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::DeepSeek => "deepseek",
            Provider::Google => "google",
            Provider::Cohere => "cohere",
            Provider::Perplexity => "perplexity",
            Provider::Azure => "azure",
            Provider::Bedrock => "bedrock",
            Provider::Vertex => "vertex",
            Provider::SelfHosted => "selfhosted",
        }
    }

    /// Default chat-completions base URL for providers that speak the
    /// OpenAI wire format.
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("https://api.openai.com/v1"),
            Provider::DeepSeek => Some("https://api.deepseek.com/v1"),
            Provider::Perplexity => Some("https://api.perplexity.ai"),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured model, validated once when the configuration loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: Provider,

    #[serde(default)]
    pub api_key: String,

    pub model: String,

    #[serde(default)]
    pub temperature: f64,

    /// Tokens per minute; 0 means unlimited
    #[serde(default)]
    pub tpm_limit: u32,

    /// Requests per minute; 0 means unlimited
    #[serde(default)]
    pub rpm_limit: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

impl ModelConfig {
    /// Minimal descriptor, mostly useful in tests.
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: String::new(),
            model: model.into(),
            temperature: 0.0,
            tpm_limit: 0,
            rpm_limit: 0,
            base_url: None,
            endpoint_type: None,
            region: None,
            project_id: None,
            location: None,
            api_version: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_rpm_limit(mut self, rpm: u32) -> Self {
        self.rpm_limit = rpm;
        self
    }

    /// Base URL to use, falling back to the provider default.
    pub fn resolved_base_url(&self) -> Option<&str> {
        match self.base_url.as_deref() {
            Some(url) if !url.trim().is_empty() => Some(url.trim_end_matches('/')),
            _ => self.provider.default_base_url(),
        }
    }

    /// Check provider-specific required fields.
    pub fn validate(&self, index: usize) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidModel {
            index,
            provider: self.provider.to_string(),
            reason: reason.to_string(),
        };

        if self.model.trim().is_empty() {
            return Err(invalid("model is required"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid("temperature must be between 0 and 2"));
        }
        if self.provider != Provider::SelfHosted && self.api_key.trim().is_empty() {
            return Err(invalid("api_key is required"));
        }

        match self.provider {
            Provider::Azure if is_blank(&self.base_url) || is_blank(&self.api_version) => {
                Err(invalid("azure requires base_url and api_version"))
            }
            Provider::Bedrock if is_blank(&self.region) => Err(invalid("bedrock requires region")),
            Provider::Vertex if is_blank(&self.project_id) || is_blank(&self.location) => {
                Err(invalid("vertex requires project_id and location"))
            }
            Provider::SelfHosted if is_blank(&self.base_url) => {
                Err(invalid("selfhosted requires base_url"))
            }
            _ => Ok(()),
        }
    }
}
