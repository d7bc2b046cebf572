//! Legislative-process collector
//!
//! Reads its configuration from the environment, connects the cache and
//! the downstream database client, and drives every registered scraper
//! through run cycles until terminated.

mod scrapers;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use collector_core::{
    CollectorCache, CollectorConfig, DatabaseApi, HttpFetcher, LlmConnector, LtzfApiClient,
    OpenAiConnector, RedisCache, Scraper, ScraperRunner,
};
use llm_client::LlmClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scrapers::bylt::ByltScraper;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,collector=debug,collector_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    dotenvy::dotenv().ok();
    let config = config_from_env()?;
    tracing::info!(database_url = %config.database_url, "starting collector");

    let cache: Arc<dyn CollectorCache> = match &config.cache_url {
        Some(url) => Arc::new(
            RedisCache::connect(url, config.dokument_ttl)
                .await
                .context("cache backend configured but unreachable")?,
        ),
        None => Arc::new(RedisCache::disabled()),
    };

    let http = reqwest::Client::builder()
        .pool_max_idle_per_host(4)
        .timeout(Duration::from_secs(60))
        .user_agent(concat!("ltzf-collector/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building HTTP client")?;
    let fetcher = Arc::new(HttpFetcher::new(http));

    let llm_client = LlmClient::from_env().context("reading LLM credentials")?;
    let llm: Arc<dyn LlmConnector> =
        Arc::new(OpenAiConnector::new(llm_client, config.llm_model.clone()));

    let api: Arc<dyn DatabaseApi> = Arc::new(LtzfApiClient::new(
        reqwest::Client::new(),
        config.database_url.clone(),
        config.api_key.clone(),
    ));

    // Scraper registry. New sources get registered here.
    let scrapers: Vec<Arc<dyn Scraper>> = vec![Arc::new(ByltScraper::new(
        fetcher.clone(),
        llm.clone(),
        cache.clone(),
        config.clone(),
    ))];

    let mut runners: Vec<ScraperRunner> = scrapers
        .into_iter()
        .map(|s| ScraperRunner::new(s, cache.clone(), api.clone(), config.clone()))
        .collect();

    let cycle = cycle_interval_from_env()?;
    loop {
        for runner in &mut runners {
            if let Err(e) = runner.run().await {
                tracing::error!(error = %e, "scraper run aborted");
            }
        }
        tracing::info!(sleep_secs = cycle.as_secs(), "cycle complete");
        tokio::time::sleep(cycle).await;
    }
}

fn config_from_env() -> Result<CollectorConfig> {
    let mut config = CollectorConfig {
        database_url: std::env::var("LTZF_API_URL").context("LTZF_API_URL must be set")?,
        api_key: std::env::var("LTZF_API_KEY").context("LTZF_API_KEY must be set")?,
        cache_url: std::env::var("REDIS_URL").ok(),
        ..CollectorConfig::default()
    };

    if let Ok(secs) = std::env::var("DOCUMENT_TTL_SECS") {
        config.dokument_ttl = Duration::from_secs(
            secs.parse().context("DOCUMENT_TTL_SECS must be an integer")?,
        );
    }
    if let Ok(threshold) = std::env::var("TROJAN_THRESHOLD") {
        config.trojan_threshold =
            threshold.parse().context("TROJAN_THRESHOLD must be 0..=10")?;
    }
    if let Ok(dir) = std::env::var("AUDIT_DIR") {
        config.audit_dir = Some(dir.into());
    }
    if let Ok(dir) = std::env::var("SCRATCH_DIR") {
        config.scratch_dir = dir.into();
    }
    if let Ok(n) = std::env::var("MAX_CONCURRENT_ITEMS") {
        config.max_concurrent_items =
            n.parse().context("MAX_CONCURRENT_ITEMS must be an integer")?;
    }
    if let Ok(model) = std::env::var("LLM_MODEL") {
        config.llm_model = model;
    }
    Ok(config)
}

fn cycle_interval_from_env() -> Result<Duration> {
    match std::env::var("CYCLE_SECS") {
        Ok(secs) => Ok(Duration::from_secs(
            secs.parse().context("CYCLE_SECS must be an integer")?,
        )),
        Err(_) => Ok(Duration::from_secs(15 * 60)),
    }
}
