//! Collector configuration.
//!
//! The core receives this as an opaque object; reading the environment is
//! the binary's job.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration handed to the core by the host binary.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Base URL of the downstream database API
    pub database_url: String,

    /// API key sent with every submission
    pub api_key: String,

    /// Cache backend address, e.g. `redis://localhost:6379`.
    /// `None` constructs the cache in disabled mode.
    pub cache_url: Option<String>,

    /// TTL for cached documents (dedup by source URL)
    pub dokument_ttl: Duration,

    /// Risk score at or above which a Vorgang is flagged as trojaner
    pub trojan_threshold: u8,

    /// Directory for per-run audit logs; `None` disables auditing
    pub audit_dir: Option<PathBuf>,

    /// Directory for transient per-document scratch files
    pub scratch_dir: PathBuf,

    /// Cap on concurrently processed items per scraper run
    pub max_concurrent_items: usize,

    /// LLM model name for semantic extraction
    pub llm_model: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            database_url: "http://localhost:80".to_string(),
            api_key: String::new(),
            cache_url: None,
            dokument_ttl: Duration::from_secs(24 * 60 * 60),
            trojan_threshold: 5,
            audit_dir: None,
            scratch_dir: std::env::temp_dir(),
            max_concurrent_items: 8,
            llm_model: "gpt-4o-mini".to_string(),
        }
    }
}
