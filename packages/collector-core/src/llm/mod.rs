//! LLM connector seam.
//!
//! The core only needs one capability: send an instruction plus document
//! text, get the model's text back. Retrying and defaulting on bad output
//! is the caller's job (the Document pipeline), never the connector's.

use async_trait::async_trait;

use crate::error::LlmError;

#[cfg(feature = "openai")]
mod openai;
#[cfg(feature = "openai")]
pub use openai::OpenAiConnector;

/// Asynchronous instruction/content round-trip against a language model.
#[async_trait]
pub trait LlmConnector: Send + Sync {
    async fn generate(&self, instruction: &str, text: &str) -> Result<String, LlmError>;
}
