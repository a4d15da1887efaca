use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// A single message in a generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Text completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    /// The (instructions, context) shape both vigil collaborators use.
    pub fn instructed(instructions: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            messages: vec![
                ChatMessage::system(instructions),
                ChatMessage::user(context),
            ],
            max_tokens: 512,
            temperature: 0.7,
        }
    }
}

/// Text completion response.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Error type for LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("rate limited")]
    RateLimited,
    #[error("request failed: {0}")]
    RequestFailed(String),
}

/// Trait for LLM providers (OpenAI, Gemini, DeepSeek, compatible proxies).
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>>;
}

/// Mock provider for testing — returns a fixed response or a fixed error.
#[derive(Debug, Clone)]
pub struct MockProvider {
    response: Result<String, String>,
}

impl MockProvider {
    pub fn new(response: impl Into<String>) -> Self {
        Self { response: Ok(response.into()) }
    }

    /// Create a mock that fails every call with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self { response: Err(message.into()) }
    }
}

impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        let response = self.response.clone();
        Box::pin(async move {
            match response {
                Ok(content) => Ok(CompletionResponse {
                    content,
                    input_tokens: 10,
                    output_tokens: 20,
                }),
                Err(message) => Err(LlmError::RequestFailed(message)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_returns_response() {
        let mock = MockProvider::new("get back to work");
        let req = CompletionRequest::instructed("be stern", "user is sleeping");
        let resp = mock.complete(req).await.unwrap();
        assert_eq!(resp.content, "get back to work");
    }

    #[tokio::test]
    async fn mock_provider_can_fail() {
        let mock = MockProvider::failing("boom");
        let req = CompletionRequest::instructed("be stern", "user is sleeping");
        let err = mock.complete(req).await.unwrap_err();
        assert!(matches!(err, LlmError::RequestFailed(_)));
    }

    #[test]
    fn instructed_request_shape() {
        let req = CompletionRequest::instructed("sys", "ctx");
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, Role::System);
        assert_eq!(req.messages[0].content, "sys");
        assert_eq!(req.messages[1].role, Role::User);
    }
}
