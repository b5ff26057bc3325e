use std::time::Duration;

use reqwest::header::RETRY_AFTER;

use crate::core::config;
use crate::core::retry::{retry, RetryConfig};
use crate::core::session::ChatTurn;
use crate::llm::error::LlmError;
use crate::llm::types::{ChatMessage, ChatRequest, ChatResponse};

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
///
/// Cheap to clone; the inner `reqwest::Client` shares its connection pool.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    retry: RetryConfig,
}

impl LlmClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder().timeout(config::llm::timeout()).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            retry: RetryConfig::llm(),
        })
    }

    /// Client configured from `OPENAI_KEY`, `OPENAI_BASE_URL` and `OPENAI_MODEL`.
    pub fn from_config() -> Result<Self, LlmError> {
        Self::new(
            config::llm::API_KEY.as_str(),
            config::llm::BASE_URL.as_str(),
            config::llm::MODEL.as_str(),
        )
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends the request, retrying transient failures, and returns the first
    /// choice's text.
    pub async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        retry(&self.retry, || self.send_once(request)).await
    }

    async fn send_once(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        log::debug!("LLM request: model={} max_tokens={}", request.model, request.max_tokens);

        let response = self.http.post(&url).bearer_auth(&self.api_key).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            log::warn!("LLM API error {}: {}", status, body);
            return Err(LlmError::Status {
                status,
                body,
                retry_after,
            });
        }

        let text = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&text)?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }

    fn request(&self, messages: Vec<ChatMessage>, max_tokens: u32) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens,
        }
    }

    /// Single-shot system + user prompt.
    pub async fn text(&self, system: &str, user: &str, max_tokens: u32) -> Result<String, LlmError> {
        let request = self.request(vec![ChatMessage::system(system), ChatMessage::user(user)], max_tokens);
        self.complete(&request).await
    }

    /// System prompt plus one base64 JPEG and a caption.
    pub async fn vision(&self, system: &str, image_b64: &str, caption: &str, max_tokens: u32) -> Result<String, LlmError> {
        let request = self.request(
            vec![ChatMessage::system(system), ChatMessage::user_with_image(image_b64, caption)],
            max_tokens,
        );
        self.complete(&request).await
    }

    /// System prompt followed by the rolling conversation.
    pub async fn chat(&self, system: &str, history: &[ChatTurn], max_tokens: u32) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(system));
        messages.extend(history.iter().map(ChatMessage::from));
        self.complete(&self.request(messages, max_tokens)).await
    }
}
