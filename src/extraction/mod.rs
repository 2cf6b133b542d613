//! Batched LLM extraction boundary.
//!
//! Filters in AI-assisted mode build one prompt per manuscript (or per pair
//! of manuscripts), send the whole batch through an [`ExtractionService`] in
//! a single call, and map the replies back by sequence id.
//!
//! Two services ship with the crate:
//!
//! - [`OpenAiExtractor`]: OpenAI-compatible chat-completions endpoints
//! - [`MockExtractor`]: scripted replies for tests

mod mock;
mod openai;

pub use mock::MockExtractor;
pub use openai::OpenAiExtractor;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::config::ModelConfig;

/// Version stamped into every request
pub const REQUEST_VERSION: &str = "1.0";

/// Request envelope metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub version: String,
    pub schema_version: String,
}

impl Default for RequestMetadata {
    fn default() -> Self {
        Self {
            version: REQUEST_VERSION.to_string(),
            schema_version: REQUEST_VERSION.to_string(),
        }
    }
}

/// A single prompt inside a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub prompt_content: String,
    pub sequence_id: String,
    pub sequence_number: usize,
}

/// A batch of prompts for the configured models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub metadata: RequestMetadata,
    pub models: Vec<ModelConfig>,
    pub prompts: Vec<Prompt>,
}

impl ExtractionRequest {
    /// Number prompts from 1 in the order given.
    pub fn new(models: &[ModelConfig], contents: Vec<String>) -> Self {
        let prompts = contents
            .into_iter()
            .enumerate()
            .map(|(index, prompt_content)| Prompt {
                prompt_content,
                sequence_id: (index + 1).to_string(),
                sequence_number: index + 1,
            })
            .collect();

        Self {
            metadata: RequestMetadata::default(),
            models: models.to_vec(),
            prompts,
        }
    }
}

/// Replies for one prompt, one entry per model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_id: Option<String>,
    #[serde(default)]
    pub model_responses: Vec<String>,
}

/// Replies for a whole batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResponse {
    #[serde(default)]
    pub responses: Vec<PromptResponse>,
}

impl ExtractionResponse {
    /// First model reply per request prompt, in request order.
    ///
    /// Responses carrying a known `sequence_id` are placed by id; the rest
    /// fall back to their position in the response list.
    pub fn aligned(&self, request: &ExtractionRequest) -> Vec<Option<String>> {
        let positions: HashMap<&str, usize> = request
            .prompts
            .iter()
            .enumerate()
            .map(|(index, prompt)| (prompt.sequence_id.as_str(), index))
            .collect();

        let mut replies = vec![None; request.prompts.len()];
        for (position, response) in self.responses.iter().enumerate() {
            let index = response
                .sequence_id
                .as_deref()
                .and_then(|id| positions.get(id).copied())
                .unwrap_or(position);

            if let Some(slot) = replies.get_mut(index) {
                if slot.is_none() {
                    *slot = response.model_responses.first().cloned();
                }
            }
        }
        replies
    }
}

/// Errors raised at the extraction boundary.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("No AI models configured")]
    NoModels,

    #[error("Provider '{0}' is not supported by this extraction service")]
    UnsupportedProvider(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty reply from model {0}")]
    EmptyReply(String),

    #[error("Error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for ExtractionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ExtractionError::Parse(err.to_string())
        } else {
            ExtractionError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExtractionError {
    fn from(err: serde_json::Error) -> Self {
        ExtractionError::Parse(err.to_string())
    }
}

/// A batched extraction backend.
#[async_trait]
pub trait ExtractionService: Send + Sync + Debug {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Run every prompt in the request and return the replies.
    async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<ExtractionResponse, ExtractionError>;
}

/// An extraction service bound to the configured models.
///
/// Filters receive one of these when AI assistance is possible at all.
#[derive(Debug, Clone)]
pub struct AiAssist {
    service: Arc<dyn ExtractionService>,
    models: Vec<ModelConfig>,
}

impl AiAssist {
    pub fn new(service: Arc<dyn ExtractionService>, models: Vec<ModelConfig>) -> Self {
        Self { service, models }
    }

    pub fn is_available(&self) -> bool {
        !self.models.is_empty()
    }

    pub fn models(&self) -> &[ModelConfig] {
        &self.models
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    /// Send all prompts in one call; replies come back in prompt order.
    pub async fn batch(&self, prompts: Vec<String>) -> Result<Vec<Option<String>>, ExtractionError> {
        if self.models.is_empty() {
            return Err(ExtractionError::NoModels);
        }
        if prompts.is_empty() {
            return Ok(Vec::new());
        }

        let request = ExtractionRequest::new(&self.models, prompts);
        tracing::debug!(
            service = self.service.name(),
            prompts = request.prompts.len(),
            "Sending extraction batch"
        );
        let response = self.service.extract(&request).await?;
        Ok(response.aligned(&request))
    }
}

/// Strip markdown code fences from a model reply.
pub fn strip_code_blocks(reply: &str) -> &str {
    reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Parse a JSON object out of a model reply.
///
/// Accepts bare JSON, fenced JSON, or JSON surrounded by prose.
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Result<T, ExtractionError> {
    let cleaned = strip_code_blocks(reply);
    match serde_json::from_str(cleaned) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            let start = cleaned.find('{');
            let end = cleaned.rfind('}');
            match (start, end) {
                (Some(start), Some(end)) if start < end => {
                    Ok(serde_json::from_str(&cleaned[start..=end])?)
                }
                _ => Err(first_err.into()),
            }
        }
    }
}
