//! Mock extraction service for testing purposes.

use async_trait::async_trait;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use super::{ExtractionError, ExtractionRequest, ExtractionResponse, ExtractionService, Prompt, PromptResponse};

type Responder = Box<dyn Fn(&Prompt) -> Option<String> + Send + Sync>;

/// Extraction service that answers from a closure and records every request.
///
/// Replies are returned in reverse order with explicit sequence ids when
/// [`reversed`](MockExtractor::reversed) is set, which exercises id-based
/// alignment.
pub struct MockExtractor {
    responder: Option<Responder>,
    failure: Option<String>,
    reversed: bool,
    requests: Mutex<Vec<ExtractionRequest>>,
}

impl fmt::Debug for MockExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockExtractor")
            .field("failure", &self.failure)
            .field("reversed", &self.reversed)
            .finish()
    }
}

impl Default for MockExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExtractor {
    /// A service that answers every prompt with no model reply.
    pub fn new() -> Self {
        Self {
            responder: None,
            failure: None,
            reversed: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer each prompt with the closure's result.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&Prompt) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::new()
        }
    }

    /// Answer every prompt with the same reply.
    pub fn constant(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::with_responder(move |_| Some(reply.clone()))
    }

    /// Fail every call with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new()
        }
    }

    /// Return replies in reverse order, tagged with sequence ids.
    pub fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    fn lock_requests(&self) -> MutexGuard<'_, Vec<ExtractionRequest>> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of `extract` calls seen so far.
    pub fn call_count(&self) -> usize {
        self.lock_requests().len()
    }

    /// Copies of every request received.
    pub fn requests(&self) -> Vec<ExtractionRequest> {
        self.lock_requests().clone()
    }
}

#[async_trait]
impl ExtractionService for MockExtractor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<ExtractionResponse, ExtractionError> {
        self.lock_requests().push(request.clone());

        if let Some(message) = &self.failure {
            return Err(ExtractionError::Other(message.clone()));
        }

        let mut responses: Vec<PromptResponse> = request
            .prompts
            .iter()
            .map(|prompt| PromptResponse {
                sequence_id: self.reversed.then(|| prompt.sequence_id.clone()),
                model_responses: self
                    .responder
                    .as_ref()
                    .and_then(|respond| respond(prompt))
                    .into_iter()
                    .collect(),
            })
            .collect();

        if self.reversed {
            responses.reverse();
        }

        Ok(ExtractionResponse { responses })
    }
}
