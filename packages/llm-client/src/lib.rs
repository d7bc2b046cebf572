//! Minimal OpenAI-compatible chat completion client.
//!
//! A clean REST client with no domain-specific logic. Works against the
//! OpenAI API or any endpoint speaking the same `/chat/completions`
//! protocol (proxies, local inference servers).
//!
//! # Example
//!
//! ```rust,ignore
//! use llm_client::{LlmClient, ChatRequest, Message};
//!
//! let client = LlmClient::from_env()?;
//! let response = client
//!     .chat_completion(
//!         ChatRequest::new("gpt-4o-mini")
//!             .message(Message::system("You are a helpful assistant."))
//!             .message(Message::user("Hello!"))
//!             .temperature(0.0),
//!     )
//!     .await?;
//! ```

pub mod error;
pub mod types;

pub use error::{LlmClientError, Result};
pub use types::{ChatRequest, ChatResponse, Choice, Message, Usage};

use reqwest::Client;
use tracing::{debug, warn};

/// OpenAI-compatible API client.
#[derive(Clone)]
pub struct LlmClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl LlmClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    /// Create from environment variable `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or(LlmClientError::MissingApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Set a custom base URL (for proxies or local inference servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Chat completion.
    ///
    /// Sends messages to the chat completion API and returns the response.
    pub async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse> {
        let start = std::time::Instant::now();
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .http_client
            .post(url.as_str())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "LLM request failed");
                LlmClientError::Request { url: url.clone(), source: e }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %body, "LLM API error");
            return Err(LlmClientError::Status { status: status.as_u16(), body });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmClientError::Decode(e.to_string()))?;

        debug!(
            model = %request.model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            tokens = parsed.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0),
            "chat completion finished"
        );

        require_choices(parsed)
    }
}

/// Some proxies answer 200 with an empty choices array when the upstream
/// model is overloaded; surface that as its own error.
fn require_choices(parsed: ChatResponse) -> Result<ChatResponse> {
    if parsed.choices.is_empty() {
        Err(LlmClientError::EmptyCompletion)
    } else {
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_serializes_without_empty_options() {
        let req = ChatRequest::new("gpt-4o-mini").message(Message::user("hi"));
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("temperature"));
        assert!(!json.contains("max_tokens"));
    }

    #[test]
    fn chat_response_first_content() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"hello"},"finish_reason":"stop"}],"usage":{"prompt_tokens":1,"completion_tokens":1,"total_tokens":2}}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.content(), Some("hello"));
    }

    #[test]
    fn empty_choices_are_their_own_error() {
        let raw = r#"{"choices":[]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(require_choices(parsed), Err(LlmClientError::EmptyCompletion)));
    }
}
