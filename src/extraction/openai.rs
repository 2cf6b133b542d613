//! Extraction over OpenAI-compatible chat-completions endpoints.
//!
//! Covers OpenAI itself, DeepSeek, Perplexity, Azure OpenAI deployments and
//! self-hosted servers that speak the same wire format. Other providers are
//! rejected before any request is sent.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    ExtractionError, ExtractionRequest, ExtractionResponse, ExtractionService, PromptResponse,
};
use crate::config::{ModelConfig, Provider};
use crate::utils::retry::{with_retry, RetryConfig};

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

const SYSTEM_PROMPT: &str =
    "You are a careful research assistant screening scientific manuscripts. Reply with JSON only.";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Sends each prompt of a batch to every configured model, in order.
///
/// Requests per model are throttled according to its `rpm_limit`. Each
/// prompt gets a single attempt unless a [`RetryConfig`] is supplied.
pub struct OpenAiExtractor {
    http: reqwest::Client,
    retry: RetryConfig,
    limiters: Mutex<HashMap<String, Arc<DirectRateLimiter>>>,
}

impl fmt::Debug for OpenAiExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiExtractor").finish_non_exhaustive()
    }
}

impl OpenAiExtractor {
    /// Create an extractor with a default HTTP client.
    pub fn new() -> Result<Self, ExtractionError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self::with_client(http))
    }

    /// Create from an existing reqwest client
    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            retry: RetryConfig::disabled(),
            limiters: Mutex::new(HashMap::new()),
        }
    }

    /// Retry transient failures (429, 5xx, network) with backoff.
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn supports(provider: Provider) -> bool {
        matches!(
            provider,
            Provider::OpenAi
                | Provider::DeepSeek
                | Provider::Perplexity
                | Provider::Azure
                | Provider::SelfHosted
        )
    }

    fn limiter_for(&self, model: &ModelConfig) -> Option<Arc<DirectRateLimiter>> {
        let rpm = NonZeroU32::new(model.rpm_limit)?;
        let key = format!("{}:{}", model.provider, model.model);
        let mut limiters = self
            .limiters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let limiter = limiters.entry(key).or_insert_with(|| {
            Arc::new(RateLimiter::direct(
                Quota::per_minute(rpm).allow_burst(nonzero!(1u32)),
            ))
        });
        Some(Arc::clone(limiter))
    }

    fn endpoint(model: &ModelConfig) -> Result<String, ExtractionError> {
        if !Self::supports(model.provider) {
            return Err(ExtractionError::UnsupportedProvider(model.provider.to_string()));
        }
        let base = model
            .resolved_base_url()
            .ok_or_else(|| ExtractionError::Other(format!("no base_url for {}", model.provider)))?;

        if model.provider == Provider::Azure {
            let version = model.api_version.as_deref().unwrap_or_default();
            return Ok(format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                base, model.model, version
            ));
        }
        Ok(format!("{}/chat/completions", base))
    }

    fn headers(model: &ModelConfig) -> Result<HeaderMap, ExtractionError> {
        let invalid = |e: reqwest::header::InvalidHeaderValue| ExtractionError::Other(e.to_string());
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if !model.api_key.is_empty() {
            if model.provider == Provider::Azure {
                headers.insert(
                    HeaderName::from_static("api-key"),
                    HeaderValue::from_str(&model.api_key).map_err(invalid)?,
                );
            } else {
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {}", model.api_key)).map_err(invalid)?,
                );
            }
        }
        Ok(headers)
    }

    async fn chat(&self, model: &ModelConfig, prompt: &str) -> Result<String, ExtractionError> {
        if let Some(limiter) = self.limiter_for(model) {
            limiter.until_ready().await;
        }

        let url = Self::endpoint(model)?;
        let body = ChatRequest {
            model: &model.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: model.temperature,
        };

        debug!(model = %model.model, provider = %model.provider, "Chat completion request");

        let response = self
            .http
            .post(&url)
            .headers(Self::headers(model)?)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Api { status, body });
        }

        let chat: ChatResponse = response.json().await?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ExtractionError::EmptyReply(model.model.clone()))
    }
}

#[async_trait]
impl ExtractionService for OpenAiExtractor {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<ExtractionResponse, ExtractionError> {
        if request.models.is_empty() {
            return Err(ExtractionError::NoModels);
        }
        for model in &request.models {
            Self::endpoint(model)?;
        }

        let mut responses = Vec::with_capacity(request.prompts.len());
        let mut last_error = None;
        let mut answered = 0usize;

        for prompt in &request.prompts {
            let mut model_responses = Vec::with_capacity(request.models.len());
            for model in &request.models {
                let attempt = || self.chat(model, &prompt.prompt_content);
                match with_retry(self.retry, attempt).await {
                    Ok(reply) => model_responses.push(reply),
                    Err(e) => {
                        warn!(
                            sequence_id = %prompt.sequence_id,
                            model = %model.model,
                            "Extraction prompt failed: {}",
                            e
                        );
                        last_error = Some(e);
                    }
                }
            }
            if !model_responses.is_empty() {
                answered += 1;
            }
            responses.push(PromptResponse {
                sequence_id: Some(prompt.sequence_id.clone()),
                model_responses,
            });
        }

        match last_error {
            Some(err) if answered == 0 && !request.prompts.is_empty() => Err(err),
            _ => Ok(ExtractionResponse { responses }),
        }
    }
}
