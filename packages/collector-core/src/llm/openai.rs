//! [`LlmConnector`] implementation over the OpenAI-compatible client.

use async_trait::async_trait;
use llm_client::{ChatRequest, LlmClient, LlmClientError, Message};

use crate::error::LlmError;
use crate::llm::LlmConnector;

const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that extracts structured information from documents.";

/// OpenAI-compatible connector used in production.
pub struct OpenAiConnector {
    client: LlmClient,
    model: String,
}

impl OpenAiConnector {
    pub fn new(client: LlmClient, model: impl Into<String>) -> Self {
        Self { client, model: model.into() }
    }
}

#[async_trait]
impl LlmConnector for OpenAiConnector {
    async fn generate(&self, instruction: &str, text: &str) -> Result<String, LlmError> {
        let request = ChatRequest::new(&self.model)
            .message(Message::system(SYSTEM_PROMPT))
            .message(Message::user(format!("{instruction}\n\n{text}")))
            .temperature(0.0);

        let response = self.client.chat_completion(request).await.map_err(|e| match e {
            LlmClientError::Request { .. } => LlmError::Transport(e.to_string()),
            other => LlmError::Provider(other.to_string()),
        })?;

        response
            .content()
            .map(str::to_owned)
            .ok_or_else(|| LlmError::Provider("empty completion".to_string()))
    }
}
