//! Client for the downstream database API.
//!
//! The core depends only on the request/response/error contract captured
//! by [`DatabaseApi`]; the HTTP wiring lives in [`LtzfApiClient`].

use async_trait::async_trait;
use ltzf_models::Vorgang;
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;

/// Submission seam for structured proceedings.
#[async_trait]
pub trait DatabaseApi: Send + Sync {
    /// Submit one Vorgang under the given collector identifier.
    ///
    /// Errors map 1:1 onto upstream status codes: 401 → [`ApiError::Auth`],
    /// 409 → [`ApiError::Conflict`], 422 → [`ApiError::Unprocessable`].
    async fn put_vorgang(&self, collector_id: Uuid, vorgang: &Vorgang) -> Result<(), ApiError>;
}

/// HTTP implementation against the LTZF database service.
#[derive(Clone)]
pub struct LtzfApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl LtzfApiClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url, api_key: api_key.into() }
    }
}

#[async_trait]
impl DatabaseApi for LtzfApiClient {
    async fn put_vorgang(&self, collector_id: Uuid, vorgang: &Vorgang) -> Result<(), ApiError> {
        let url = format!("{}/api/v1/vorgang", self.base_url);
        debug!(api_id = %vorgang.api_id, collector_id = %collector_id, "submitting vorgang");

        let response = self
            .client
            .put(&url)
            .header("api-key", &self.api_key)
            .query(&[("collector", collector_id.to_string())])
            .json(vorgang)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        match status.as_u16() {
            200..=299 => Ok(()),
            401 => Err(ApiError::Auth),
            409 => Err(ApiError::Conflict),
            422 => {
                let body = response.text().await.unwrap_or_default();
                Err(ApiError::Unprocessable { body })
            }
            code => {
                let body = response.text().await.unwrap_or_default();
                Err(ApiError::Status { status: code, body })
            }
        }
    }
}
