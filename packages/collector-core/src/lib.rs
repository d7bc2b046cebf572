//! Legislative-Process Collection Library
//!
//! The source-independent core of the collector: everything a scraper
//! needs to turn pages on a parliament website into structured
//! proceedings and submit them to the downstream database, except the
//! site-specific parsing itself.
//!
//! # Design
//!
//! - Sources implement [`Scraper`]; [`ScraperRunner`] owns the run cycle
//! - Documents enrich themselves ([`Document`]) via PDF text extraction
//!   and an LLM connector
//! - Everything expensive is cached ([`CollectorCache`]) and every cache
//!   failure after startup degrades to a miss
//! - One failing item never fails a run; only bad credentials do
//!
//! # Modules
//!
//! - [`scraper`] - Scraper contract and run orchestration
//! - [`document`] - Self-enriching document pipeline
//! - [`cache`] - Redis-backed and in-memory caches
//! - [`api`] - Downstream database client
//! - [`llm`] - LLM connector seam
//! - [`pdf`] - PDF text and date extraction
//! - [`testing`] - Fake collaborators for tests

pub mod api;
pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod llm;
pub mod net;
pub mod pdf;
pub mod scraper;
pub mod testing;

pub use api::{DatabaseApi, LtzfApiClient};
pub use cache::{CacheStats, CollectorCache, MemoryCache, RedisCache, NS_DOKUMENT, NS_VORGANG};
pub use config::CollectorConfig;
pub use document::{Document, DocumentContext, DokumentSnapshot};
pub use error::{ApiError, CacheError, CollectorError, LlmError, Result};
pub use llm::LlmConnector;
pub use net::{FetchedBody, Fetcher, HttpFetcher};
pub use scraper::{RunSummary, Scraper, ScraperRunner};

#[cfg(feature = "openai")]
pub use llm::OpenAiConnector;
