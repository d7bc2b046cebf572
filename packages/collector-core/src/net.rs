//! Network fetch seam.
//!
//! The Document pipeline and the site-specific scrapers talk to the
//! network through [`Fetcher`] so that tests can inject canned bodies
//! instead of flipping testing-mode flags on domain objects.

use async_trait::async_trait;

use crate::error::{CollectorError, Result};

/// A fetched response body.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub status: u16,
    pub bytes: Vec<u8>,
}

impl FetchedBody {
    /// Body as UTF-8 text, lossily decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Trait for network clients (to allow fakes in tests).
///
/// Implementations must be safe for many concurrent in-flight calls;
/// the orchestrator fans out over one shared instance.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET the URL. Non-2xx statuses and empty bodies are errors:
    /// a partial artifact must never enter the pipeline.
    async fn fetch(&self, url: &str) -> Result<FetchedBody>;
}

/// [`Fetcher`] over a shared `reqwest::Client`.
///
/// The client is cheap to clone and multiplexes connections internally;
/// per-host connection caps are configured on the client by the binary.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedBody> {
        let response = self.client.get(url).send().await.map_err(|e| {
            CollectorError::Fetch { url: url.to_string(), reason: e.to_string() }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectorError::Fetch {
                url: url.to_string(),
                reason: format!("status {status}"),
            });
        }

        let bytes = response.bytes().await.map_err(|e| CollectorError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if bytes.is_empty() {
            return Err(CollectorError::Fetch {
                url: url.to_string(),
                reason: "empty response body".to_string(),
            });
        }

        Ok(FetchedBody { status: status.as_u16(), bytes: bytes.to_vec() })
    }
}
