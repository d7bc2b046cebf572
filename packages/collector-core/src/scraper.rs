//! Scraper contract and run orchestration.
//!
//! A concrete source implements [`Scraper`] (the two site-specific
//! capabilities); [`ScraperRunner`] drives it through one run cycle:
//! listing fetch → dedup against the cache → bounded concurrent
//! extract-and-submit fan-out → collect → cache write-back.
//!
//! Failures never cross a task boundary. A listing extractor that fails
//! contributes an empty list; an item task that fails is logged and
//! excluded from the results; only bad credentials (401) end the run.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;
use ltzf_models::Vorgang;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api::DatabaseApi;
use crate::cache::CollectorCache;
use crate::config::CollectorConfig;
use crate::error::{ApiError, CollectorError, Result};

/// One legislative-process source.
///
/// Both extractors must be safe to run concurrently with other
/// invocations of themselves; the runner fans them out on one event loop.
#[async_trait::async_trait]
pub trait Scraper: Send + Sync {
    fn name(&self) -> &'static str;

    /// Identifies this collector towards the database API.
    fn collector_id(&self) -> Uuid;

    /// The listing pages enumerated at the start of every run.
    fn listing_urls(&self) -> &[String];

    /// Extract candidate item identifiers from one listing page.
    async fn listing_page_extractor(&self, url: &str) -> Result<Vec<String>>;

    /// Extract one item into a structured proceeding. May construct and
    /// run Documents internally.
    async fn item_extractor(&self, item: &str) -> Result<Vorgang>;
}

/// Per-run counters, logged at the end of every cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Distinct item identifiers seen on the listing pages
    pub processed: usize,
    /// Items skipped because the dedup cache already had them
    pub skipped: usize,
    /// Items extracted, submitted, and written back to the cache
    pub succeeded: usize,
    /// Items that failed extraction or submission
    pub failed: usize,
}

enum ItemOutcome {
    Submitted(Vorgang),
    Failed,
    Fatal(ApiError),
}

/// Drives one [`Scraper`] through run cycles.
///
/// No state survives across `run()` invocations except what lives in the
/// cache; `result_objects` is rebuilt each run.
pub struct ScraperRunner {
    scraper: Arc<dyn Scraper>,
    cache: Arc<dyn CollectorCache>,
    api: Arc<dyn DatabaseApi>,
    config: CollectorConfig,
    run_id: Uuid,
    /// Every successfully submitted record of the most recent run.
    pub result_objects: Vec<Vorgang>,
}

impl ScraperRunner {
    pub fn new(
        scraper: Arc<dyn Scraper>,
        cache: Arc<dyn CollectorCache>,
        api: Arc<dyn DatabaseApi>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            scraper,
            cache,
            api,
            config,
            run_id: Uuid::new_v4(),
            result_objects: Vec::new(),
        }
    }

    /// Run one full cycle. Returns an error only for failures that make
    /// continuing pointless (bad credentials).
    pub async fn run(&mut self) -> Result<RunSummary> {
        self.result_objects.clear();
        self.run_id = Uuid::new_v4();
        info!(scraper = %self.scraper.name(), run_id = %self.run_id, "starting run");

        let items = self.collect_listing_items().await;
        let mut summary = RunSummary { processed: items.len(), ..Default::default() };

        // Dedup against the vorgang namespace: a hit means this item was
        // already processed and submitted within the TTL window.
        let mut pending: Vec<String> = Vec::new();
        for item in items {
            if self.cache.get_vorgang(&item).await.is_some() {
                debug!(item = %item, "item already processed, skipping");
                summary.skipped += 1;
            } else {
                pending.push(item);
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_items.max(1)));
        let this = &*self;
        let tasks = pending.iter().map(|item| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore.acquire().await;
                let outcome = this.process_item(item).await;
                (item.as_str(), outcome)
            }
        });
        let outcomes = join_all(tasks).await;

        let mut cache_writes: Vec<(String, Vorgang)> = Vec::new();
        let mut fatal: Option<ApiError> = None;
        for (item, outcome) in outcomes {
            match outcome {
                ItemOutcome::Submitted(vorgang) => {
                    summary.succeeded += 1;
                    cache_writes.push((item.to_string(), vorgang));
                }
                ItemOutcome::Failed => summary.failed += 1,
                ItemOutcome::Fatal(e) => {
                    summary.failed += 1;
                    fatal.get_or_insert(e);
                }
            }
        }

        if let Some(e) = fatal {
            error!(scraper = %self.scraper.name(), error = %e, "aborting run");
            return Err(CollectorError::Api(e));
        }

        for (item, vorgang) in cache_writes {
            self.cache.store_vorgang(&item, &vorgang).await;
            self.result_objects.push(vorgang);
        }

        info!(
            scraper = %self.scraper.name(),
            run_id = %self.run_id,
            processed = summary.processed,
            skipped = summary.skipped,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "run finished"
        );
        Ok(summary)
    }

    /// Fan out over all listing pages; a failed extractor contributes an
    /// empty list. Returns the deduplicated item identifiers.
    async fn collect_listing_items(&self) -> Vec<String> {
        let listing_urls = self.scraper.listing_urls().to_vec();
        let tasks = listing_urls.iter().map(|url| {
            let url = url.clone();
            async move {
                match self.scraper.listing_page_extractor(&url).await {
                    Ok(items) => {
                        debug!(url = %url, items = items.len(), "listing page extracted");
                        items
                    }
                    Err(e) => {
                        warn!(url = %url, error = %e, "listing page extraction failed");
                        Vec::new()
                    }
                }
            }
        });
        let nested = join_all(tasks).await;
        let set: BTreeSet<String> = nested.into_iter().flatten().collect();
        set.into_iter().collect()
    }

    async fn process_item(&self, item: &str) -> ItemOutcome {
        let vorgang = match self.scraper.item_extractor(item).await {
            Ok(vorgang) => vorgang,
            Err(e) => {
                warn!(item = %item, error = %e, "item extraction failed");
                return ItemOutcome::Failed;
            }
        };
        match self.senditem(&vorgang).await {
            Ok(Some(submitted)) => ItemOutcome::Submitted(submitted),
            Ok(None) => ItemOutcome::Failed,
            Err(fatal) => ItemOutcome::Fatal(fatal),
        }
    }

    /// Submit one record, auditing it first. Returns the record on
    /// success, `None` for non-fatal rejections, and an error only for
    /// failures that must abort the run.
    async fn senditem(&self, vorgang: &Vorgang) -> std::result::Result<Option<Vorgang>, ApiError> {
        self.audit_record(vorgang).await;

        match self.api.put_vorgang(self.scraper.collector_id(), vorgang).await {
            Ok(()) => {
                info!(api_id = %vorgang.api_id, titel = %vorgang.titel, "vorgang submitted");
                Ok(Some(vorgang.clone()))
            }
            Err(ApiError::Auth) => Err(ApiError::Auth),
            Err(ApiError::Conflict) => {
                info!(api_id = %vorgang.api_id, "vorgang already exists upstream");
                Ok(None)
            }
            Err(ApiError::Unprocessable { body }) => {
                error!(api_id = %vorgang.api_id, response = %body, "payload rejected upstream");
                self.persist_rejected(vorgang, &body).await;
                Ok(None)
            }
            Err(e) => {
                error!(api_id = %vorgang.api_id, error = %e, "submission failed");
                Ok(None)
            }
        }
    }

    /// Append the record to the per-run audit log, one JSON document per
    /// line. Forensic trail only; never read back, and failures here are
    /// never allowed to fail the submission.
    async fn audit_record(&self, vorgang: &Vorgang) {
        let Some(dir) = &self.config.audit_dir else { return };
        let path = dir.join(format!("vorgang-{}.jsonl", self.run_id));
        let mut line = match serde_json::to_string(vorgang) {
            Ok(line) => line,
            Err(e) => {
                warn!(api_id = %vorgang.api_id, error = %e, "record not serializable for audit log");
                return;
            }
        };
        line.push('\n');
        let result = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            file.write_all(line.as_bytes()).await
        }
        .await;
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "audit log write failed");
        }
    }

    /// Keep rejected payloads on disk for later inspection.
    async fn persist_rejected(&self, vorgang: &Vorgang, response: &str) {
        let Some(dir) = &self.config.audit_dir else { return };
        let path = dir.join(format!("rejected-{}.json", vorgang.api_id));
        let payload = serde_json::json!({
            "payload": vorgang,
            "response": response,
        });
        if let Err(e) = tokio::fs::write(&path, payload.to_string()).await {
            warn!(path = %path.display(), error = %e, "failed to persist rejected payload");
        }
    }
}
