//! Cache layer: dedup guard for submitted proceedings and content cache
//! for processed documents.
//!
//! Two independent namespaces: `vorgang:<key>` is a short-lived guard
//! against re-submitting an item already processed this cycle;
//! `dokument:<url>` is a longer-lived content cache keyed by source URL,
//! independent of which Vorgang references the document.
//!
//! Failure semantics: only construction can fail. Once a cache exists,
//! backend trouble degrades to "always re-fetch": a `get` becomes a miss,
//! a `store` becomes a no-op, and the pipeline keeps running.

mod memory;
mod redis;

pub use memory::MemoryCache;
pub use redis::RedisCache;

use std::time::Duration;

use async_trait::async_trait;
use ltzf_models::Vorgang;

use crate::document::DokumentSnapshot;

/// Fixed TTL of the vorgang dedup namespace.
pub const VORGANG_TTL: Duration = Duration::from_secs(12 * 60);

pub const NS_VORGANG: &str = "vorgang";
pub const NS_DOKUMENT: &str = "dokument";

/// Per-namespace entry counts plus backend memory usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub vorgang_entries: usize,
    pub dokument_entries: usize,
    /// Reported by the backend where available
    pub backend_memory_bytes: Option<u64>,
}

/// The cache contract of the collector core.
///
/// Callers never branch on whether the cache is enabled; a disabled cache
/// absorbs every call as miss / no-op success.
#[async_trait]
pub trait CollectorCache: Send + Sync {
    /// Dedup lookup for an already-processed item this cycle.
    async fn get_vorgang(&self, key: &str) -> Option<Vorgang>;

    /// Record a submitted item under the dedup TTL.
    async fn store_vorgang(&self, key: &str, vorgang: &Vorgang);

    /// Content-cache lookup by source URL. Cached snapshots from failed or
    /// partial extractions are treated as absent.
    async fn get_dokument(&self, url: &str) -> Option<DokumentSnapshot>;

    /// Cache a processed document. Refuses snapshots whose download or
    /// extraction did not succeed; returns whether the entry was accepted
    /// (a disabled cache accepts trivially).
    async fn store_dokument(&self, url: &str, snapshot: &DokumentSnapshot) -> bool;

    /// Drop a single entry. Returns whether the backend reported a deletion
    /// (a disabled cache reports success).
    async fn invalidate(&self, namespace: &str, key: &str) -> bool;

    /// Drop everything.
    async fn clear(&self);

    async fn stats(&self) -> CacheStats;
}

/// Guard shared by all backends: never poison the cache with partial
/// results.
pub(crate) fn is_cacheable(snapshot: &DokumentSnapshot) -> bool {
    snapshot.download_success && snapshot.extraction_success
}

/// Read-side re-validation: a cached snapshot from a failed extraction is
/// treated as absent.
pub(crate) fn validate_cached(snapshot: DokumentSnapshot) -> Option<DokumentSnapshot> {
    if snapshot.extraction_success {
        Some(snapshot)
    } else {
        None
    }
}
