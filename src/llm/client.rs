//! Completion client trait and a scripted mock

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::types::{CompletionRequest, CompletionResponse};
use crate::error::{Result, ScrapeError};

/// Stateless text-completion client; each call is independent.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Single completion request
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Model name used for requests
    fn model(&self) -> &str;
}

/// Mock client returning scripted responses, recording every request.
#[derive(Debug, Default)]
pub struct MockCompletionClient {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response text.
    pub fn with_response(self, content: impl Into<String>) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(content.into());
        }
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.requests
            .lock()
            .map_err(|e| ScrapeError::Llm(e.to_string()))?
            .push(request);

        let content = self
            .responses
            .lock()
            .map_err(|e| ScrapeError::Llm(e.to_string()))?
            .pop_front()
            .ok_or_else(|| ScrapeError::Llm("mock has no scripted response".to_string()))?;

        Ok(CompletionResponse {
            content,
            finish_reason: Some("stop".to_string()),
            ..Default::default()
        })
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_returns_scripted_responses_in_order() {
        let mock = MockCompletionClient::new().with_response("first").with_response("second");
        let a = mock.complete(CompletionRequest::new("s")).await.unwrap();
        let b = mock.complete(CompletionRequest::new("s")).await.unwrap();
        assert_eq!(a.content, "first");
        assert_eq!(b.content, "second");
        assert_eq!(mock.requests().len(), 2);
        assert_eq!(mock.model(), "mock-model");
    }

    #[tokio::test]
    async fn test_mock_exhausted() {
        let mock = MockCompletionClient::new();
        assert!(matches!(mock.complete(CompletionRequest::new("s")).await, Err(ScrapeError::Llm(_))));
    }
}
