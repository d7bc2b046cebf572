//! Redis-backed cache implementation.
//!
//! Construction is the only fallible moment: the backend is PINGed once,
//! and an unreachable backend is an error the host treats as fatal (the
//! process cannot proceed without a definitively enabled-or-disabled
//! cache). Afterwards every backend hiccup is logged and absorbed as a
//! miss or no-op.

use std::time::Duration;

use async_trait::async_trait;
use ltzf_models::Vorgang;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::cache::{
    is_cacheable, validate_cached, CacheStats, CollectorCache, NS_DOKUMENT, NS_VORGANG,
    VORGANG_TTL,
};
use crate::document::DokumentSnapshot;
use crate::error::CacheError;

/// Cache over a Redis backend, or the absorbing disabled variant.
pub struct RedisCache {
    conn: Option<ConnectionManager>,
    dokument_ttl: Duration,
}

impl RedisCache {
    /// Connect and verify liveness. Fails hard if the backend does not
    /// answer a PING.
    pub async fn connect(url: &str, dokument_ttl: Duration) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::Unreachable(e.to_string()))?;
        let mut conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Unreachable(e.to_string()))?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| CacheError::Unreachable(e.to_string()))?;

        info!(url = %url, "connected to cache backend");
        Ok(Self { conn: Some(conn), dokument_ttl })
    }

    /// A cache that absorbs every operation: every get misses, every
    /// store succeeds as a no-op. Callers cannot tell the difference.
    pub fn disabled() -> Self {
        info!("cache running in disabled mode");
        Self { conn: None, dokument_ttl: Duration::ZERO }
    }

    pub fn is_disabled(&self) -> bool {
        self.conn.is_none()
    }

    async fn get_raw(&self, key: &str) -> Option<String> {
        let mut conn = self.conn.clone()?;
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    async fn put_raw(&self, key: &str, payload: String, ttl: Duration) {
        let Some(mut conn) = self.conn.clone() else { return };
        if let Err(e) = conn.set_ex::<_, _, ()>(key, payload, ttl.as_secs().max(1)).await {
            warn!(key = %key, error = %e, "cache write failed, continuing without it");
        }
    }

    async fn count_keys(&self, conn: &mut ConnectionManager, pattern: &str) -> usize {
        match conn.keys::<_, Vec<String>>(pattern).await {
            Ok(keys) => keys.len(),
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "cache key enumeration failed");
                0
            }
        }
    }
}

#[async_trait]
impl CollectorCache for RedisCache {
    async fn get_vorgang(&self, key: &str) -> Option<Vorgang> {
        let raw = self.get_raw(&format!("{NS_VORGANG}:{key}")).await?;
        match serde_json::from_str(&raw) {
            Ok(vorgang) => Some(vorgang),
            Err(e) => {
                warn!(key = %key, error = %e, "corrupt vorgang cache entry, treating as miss");
                None
            }
        }
    }

    async fn store_vorgang(&self, key: &str, vorgang: &Vorgang) {
        debug!(key = %key, api_id = %vorgang.api_id, "caching submitted vorgang");
        match serde_json::to_string(vorgang) {
            Ok(payload) => self.put_raw(&format!("{NS_VORGANG}:{key}"), payload, VORGANG_TTL).await,
            Err(e) => warn!(key = %key, error = %e, "vorgang not serializable, skipping cache"),
        }
    }

    async fn get_dokument(&self, url: &str) -> Option<DokumentSnapshot> {
        let raw = self.get_raw(&format!("{NS_DOKUMENT}:{url}")).await?;
        match serde_json::from_str::<DokumentSnapshot>(&raw) {
            Ok(snapshot) => validate_cached(snapshot),
            Err(e) => {
                warn!(url = %url, error = %e, "corrupt dokument cache entry, treating as miss");
                None
            }
        }
    }

    async fn store_dokument(&self, url: &str, snapshot: &DokumentSnapshot) -> bool {
        if !is_cacheable(snapshot) {
            debug!(url = %url, "refusing to cache partial document result");
            return false;
        }
        match serde_json::to_string(snapshot) {
            Ok(payload) => {
                self.put_raw(&format!("{NS_DOKUMENT}:{url}"), payload, self.dokument_ttl).await;
                true
            }
            Err(e) => {
                warn!(url = %url, error = %e, "dokument not serializable, skipping cache");
                false
            }
        }
    }

    async fn invalidate(&self, namespace: &str, key: &str) -> bool {
        let Some(mut conn) = self.conn.clone() else { return true };
        match conn.del::<_, i64>(format!("{namespace}:{key}")).await {
            Ok(deleted) => deleted > 0,
            Err(e) => {
                warn!(namespace = %namespace, key = %key, error = %e, "cache invalidation failed");
                false
            }
        }
    }

    async fn clear(&self) {
        let Some(mut conn) = self.conn.clone() else { return };
        if let Err(e) = redis::cmd("FLUSHDB").query_async::<()>(&mut conn).await {
            warn!(error = %e, "cache clear failed");
        }
    }

    async fn stats(&self) -> CacheStats {
        let Some(mut conn) = self.conn.clone() else { return CacheStats::default() };
        let vorgang_entries = self.count_keys(&mut conn, &format!("{NS_VORGANG}:*")).await;
        let dokument_entries = self.count_keys(&mut conn, &format!("{NS_DOKUMENT}:*")).await;

        let backend_memory_bytes = match redis::cmd("INFO")
            .arg("memory")
            .query_async::<String>(&mut conn)
            .await
        {
            Ok(raw) => raw
                .lines()
                .find_map(|line| line.strip_prefix("used_memory:"))
                .and_then(|v| v.trim().parse().ok()),
            Err(e) => {
                warn!(error = %e, "cache memory stats unavailable");
                None
            }
        };

        CacheStats { vorgang_entries, dokument_entries, backend_memory_bytes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ltzf_models::{Autor, Doktyp, Vorgangstyp};
    use uuid::Uuid;

    fn snapshot() -> DokumentSnapshot {
        DokumentSnapshot {
            url: "https://example.org/a.pdf".into(),
            typ: Doktyp::Entwurf,
            hash: Some("00".repeat(32)),
            full_text: vec![],
            titel: Some("Test".into()),
            zp_erstellt: None,
            zp_modifiziert: Some(chrono::Utc::now()),
            drucksnr: None,
            autoren: vec![],
            schlagworte: vec![],
            trojanergefahr: 0,
            meinung: None,
            betroffene_texte: vec![],
            zusammenfassung: None,
            download_success: true,
            extraction_success: true,
        }
    }

    // Disabled-cache transparency: every get is absent, every store and
    // invalidate a truthy no-op. No backend required.
    #[tokio::test]
    async fn disabled_cache_absorbs_all_operations() {
        let cache = RedisCache::disabled();
        assert!(cache.is_disabled());

        let vg = Vorgang {
            api_id: Uuid::new_v4(),
            titel: "t".into(),
            kurztitel: None,
            wahlperiode: 19,
            verfassungsaendernd: false,
            trojaner: false,
            typ: Vorgangstyp::Sonstig,
            initiatoren: vec![Autor::organisation("o")],
            ids: vec![],
            links: vec![],
            stationen: vec![],
        };
        cache.store_vorgang("k", &vg).await;
        assert!(cache.get_vorgang("k").await.is_none());

        let snap = snapshot();
        assert!(cache.store_dokument(&snap.url, &snap).await);
        assert!(cache.get_dokument(&snap.url).await.is_none());

        assert!(cache.invalidate(NS_VORGANG, "k").await);
        cache.clear().await;
        assert_eq!(cache.stats().await, CacheStats::default());
    }

    // Even a disabled cache keeps the partial-result guard visible.
    #[tokio::test]
    async fn disabled_cache_still_refuses_partial_documents() {
        let cache = RedisCache::disabled();
        let mut snap = snapshot();
        snap.extraction_success = false;
        assert!(!cache.store_dokument(&snap.url, &snap).await);
    }
}
