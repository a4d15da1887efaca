//! HTTP-based LLM provider.
//!
//! Talks the OpenAI chat-completions format, which OpenAI, Google Gemini
//! (via its OpenAI-compatible endpoint) and DeepSeek all accept.

use crate::provider::{CompletionRequest, CompletionResponse, LlmError, LlmProvider, Role};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Inferred provider kind from model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Google,
    DeepSeek,
    /// Falls back to the OpenAI base URL.
    Unknown,
}

impl ProviderKind {
    /// Infer provider from model name prefix.
    pub fn from_model(model: &str) -> Self {
        let m = model.to_lowercase();
        if m.starts_with("gpt-") || m.starts_with("o1-") || m.starts_with("o3-") || m.starts_with("o4-") {
            Self::OpenAi
        } else if m.starts_with("gemini-") {
            Self::Google
        } else if m.starts_with("deepseek-") {
            Self::DeepSeek
        } else {
            Self::Unknown
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi | Self::Unknown => "https://api.openai.com/v1",
            Self::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
            Self::DeepSeek => "https://api.deepseek.com",
        }
    }
}

#[derive(Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Deserialize)]
struct ApiChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

fn role_str(role: &Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Parse error response, returning RateLimited for 429.
fn check_error(status: reqwest::StatusCode, body: String) -> LlmError {
    if status.as_u16() == 429 {
        LlmError::RateLimited
    } else {
        LlmError::RequestFailed(format!("{status}: {body}"))
    }
}

/// OpenAI-compatible HTTP provider.
pub struct HttpProvider {
    kind: ProviderKind,
    model: String,
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpProvider {
    /// Build from model name + API key + optional base URL override.
    pub fn new(model: String, api_key: String, base_url: Option<String>) -> Self {
        let kind = ProviderKind::from_model(&model);
        let base = base_url.unwrap_or_else(|| kind.default_base_url().to_owned());
        Self {
            kind,
            model,
            client: reqwest::Client::new(),
            base_url: base.trim_end_matches('/').to_owned(),
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn complete_inner(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = ApiRequest {
            model: self.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| ApiMessage { role: role_str(&m.role), content: m.content.clone() })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(check_error(status, text));
        }

        let api: ApiResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let content = api
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        let (input_tokens, output_tokens) = api
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        Ok(CompletionResponse { content, input_tokens, output_tokens })
    }
}

impl LlmProvider for HttpProvider {
    fn name(&self) -> &str {
        match self.kind {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Google => "google",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Unknown => "unknown",
        }
    }

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        Box::pin(self.complete_inner(request))
    }
}

/// Build an LlmProvider from environment variables.
/// Reads `<model_env_key>`, `VIGIL_LLM_API_KEY`, optionally `VIGIL_LLM_BASE_URL`.
/// Returns `None` if model or key is not set.
pub fn from_env_with_model_var(model_env_key: &str) -> Option<HttpProvider> {
    let model = std::env::var(model_env_key).ok()?;
    let api_key = std::env::var("VIGIL_LLM_API_KEY").ok()?;
    let base_url = std::env::var("VIGIL_LLM_BASE_URL").ok();
    Some(HttpProvider::new(model, api_key, base_url))
}

/// Build the reaction generator provider from `VIGIL_LLM_MODEL`.
pub fn from_env() -> Option<HttpProvider> {
    from_env_with_model_var("VIGIL_LLM_MODEL")
}

/// Build the ambiguous-window classifier provider from `VIGIL_CLASSIFIER_MODEL`.
/// A smaller model is usually enough for a one-word verdict.
pub fn classifier_from_env() -> Option<HttpProvider> {
    from_env_with_model_var("VIGIL_CLASSIFIER_MODEL")
}
