//! Typed errors for the collector core.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to keep the failure
//! taxonomy explicit: transport failures propagate one level and become
//! "this item failed"; parse failures never propagate at all.

use thiserror::Error;

/// Errors surfaced by the collector core.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Network fetch failed (connection, timeout, non-2xx, empty body)
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// PDF could not be loaded or read
    #[error("PDF error for {url}: {message}")]
    Pdf { url: String, message: String },

    /// Local scratch file I/O failed
    #[error("scratch file error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM connector failed (transport level, not schema level)
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Downstream API rejected or failed a submission
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A site-specific extractor could not make sense of its input
    #[error("extraction failed for {url}: {reason}")]
    Extraction { url: String, reason: String },
}

/// Errors from the LLM connector seam.
///
/// Schema violations in LLM *output* are deliberately not represented
/// here: the Document pipeline absorbs those locally with a default
/// record. This type only covers the request/response round-trip.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Request could not be sent or timed out
    #[error("LLM transport error: {0}")]
    Transport(String),

    /// Provider returned a non-success status or an unusable body
    #[error("LLM provider error: {0}")]
    Provider(String),
}

/// Errors from the downstream database API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 401: bad credentials. Fatal to the whole run.
    #[error("authentication rejected by the database API")]
    Auth,

    /// 409: the record already exists upstream
    #[error("record already exists upstream")]
    Conflict,

    /// 422: the payload was rejected; carries the response body
    #[error("payload rejected: {body}")]
    Unprocessable { body: String },

    /// Any other non-2xx status
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// Transport-level failure
    #[error("API transport error: {0}")]
    Transport(String),
}

impl ApiError {
    /// Only bad credentials justify aborting the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiError::Auth)
    }
}

/// Errors from the cache layer.
///
/// Only construction-time failures reach callers; operational failures
/// degrade to miss/no-op inside the cache itself.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Backend unreachable at construction time
    #[error("cache backend unreachable: {0}")]
    Unreachable(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CollectorError>;
