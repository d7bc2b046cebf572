//! Failure modes of a chat completion round trip.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmClientError>;

/// Everything that can go wrong between building a request and holding a
/// usable completion.
#[derive(Debug, Error)]
pub enum LlmClientError {
    /// `OPENAI_API_KEY` is absent or empty.
    #[error("no API key available, set OPENAI_API_KEY")]
    MissingApiKey,

    /// The request never produced an HTTP response.
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The endpoint answered with a non-success status.
    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the expected completion shape.
    #[error("undecodable completion payload: {0}")]
    Decode(String),

    /// A well-formed response carrying no choices at all.
    #[error("completion arrived without any choices")]
    EmptyCompletion,
}
