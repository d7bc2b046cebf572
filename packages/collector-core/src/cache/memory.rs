//! In-memory cache implementation for tests and local development.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ltzf_models::Vorgang;
use tracing::debug;

use crate::cache::{
    is_cacheable, validate_cached, CacheStats, CollectorCache, NS_DOKUMENT, NS_VORGANG,
    VORGANG_TTL,
};
use crate::document::DokumentSnapshot;

struct Entry {
    payload: String,
    expires_at: Instant,
}

/// TTL-respecting cache backed by a `HashMap`.
///
/// Data is lost on restart; production runs use [`super::RedisCache`].
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    dokument_ttl: Duration,
}

impl MemoryCache {
    pub fn new(dokument_ttl: Duration) -> Self {
        Self { entries: RwLock::new(HashMap::new()), dokument_ttl }
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().unwrap();
        let entry = entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.payload.clone())
    }

    fn put_raw(&self, key: String, payload: String, ttl: Duration) {
        let entry = Entry { payload, expires_at: Instant::now() + ttl };
        self.entries.write().unwrap().insert(key, entry);
    }

    fn live_count(&self, prefix: &str) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .unwrap()
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && e.expires_at > now)
            .count()
    }
}

#[async_trait]
impl CollectorCache for MemoryCache {
    async fn get_vorgang(&self, key: &str) -> Option<Vorgang> {
        let raw = self.get_raw(&format!("{NS_VORGANG}:{key}"))?;
        serde_json::from_str(&raw).ok()
    }

    async fn store_vorgang(&self, key: &str, vorgang: &Vorgang) {
        match serde_json::to_string(vorgang) {
            Ok(payload) => self.put_raw(format!("{NS_VORGANG}:{key}"), payload, VORGANG_TTL),
            Err(e) => debug!(key = %key, error = %e, "vorgang not serializable, skipping cache"),
        }
    }

    async fn get_dokument(&self, url: &str) -> Option<DokumentSnapshot> {
        let raw = self.get_raw(&format!("{NS_DOKUMENT}:{url}"))?;
        serde_json::from_str(&raw).ok().and_then(validate_cached)
    }

    async fn store_dokument(&self, url: &str, snapshot: &DokumentSnapshot) -> bool {
        if !is_cacheable(snapshot) {
            debug!(url = %url, "refusing to cache partial document result");
            return false;
        }
        match serde_json::to_string(snapshot) {
            Ok(payload) => {
                self.put_raw(format!("{NS_DOKUMENT}:{url}"), payload, self.dokument_ttl);
                true
            }
            Err(_) => false,
        }
    }

    async fn invalidate(&self, namespace: &str, key: &str) -> bool {
        self.entries.write().unwrap().remove(&format!("{namespace}:{key}")).is_some()
    }

    async fn clear(&self) {
        self.entries.write().unwrap().clear();
    }

    async fn stats(&self) -> CacheStats {
        CacheStats {
            vorgang_entries: self.live_count(&format!("{NS_VORGANG}:")),
            dokument_entries: self.live_count(&format!("{NS_DOKUMENT}:")),
            backend_memory_bytes: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ltzf_models::{Autor, Doktyp, Station, Stationstyp, Vorgangstyp};
    use uuid::Uuid;

    fn snapshot(url: &str) -> DokumentSnapshot {
        DokumentSnapshot {
            url: url.into(),
            typ: Doktyp::Entwurf,
            hash: Some("00".repeat(32)),
            full_text: vec!["Seite".into()],
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

    fn vorgang() -> Vorgang {
        Vorgang {
            api_id: Uuid::new_v4(),
            titel: "t".into(),
            kurztitel: None,
            wahlperiode: 19,
            verfassungsaendernd: false,
            trojaner: false,
            typ: Vorgangstyp::GgLandParl,
            initiatoren: vec![Autor::organisation("o")],
            ids: vec![],
            links: vec![],
            stationen: vec![Station {
                typ: Stationstyp::ParlInitiativ,
                zp_start: chrono::Utc::now(),
                gremium: None,
                dokumente: vec![],
                stellungnahmen: vec![],
                trojanergefahr: 0,
                betroffene_texte: vec![],
                link: None,
            }],
        }
    }

    #[tokio::test]
    async fn dokument_roundtrip_is_lossless() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        let snap = snapshot("https://example.org/a.pdf");
        assert!(cache.store_dokument(&snap.url, &snap).await);
        let back = cache.get_dokument(&snap.url).await.unwrap();
        assert_eq!(snap, back);
    }

    #[tokio::test]
    async fn refuses_partial_documents() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        let mut snap = snapshot("https://example.org/a.pdf");
        snap.extraction_success = false;
        assert!(!cache.store_dokument(&snap.url, &snap).await);
        assert!(cache.get_dokument(&snap.url).await.is_none());
    }

    #[tokio::test]
    async fn dokument_ttl_expires() {
        let cache = MemoryCache::new(Duration::from_secs(1));
        let snap = snapshot("https://example.org/a.pdf");
        assert!(cache.store_dokument(&snap.url, &snap).await);
        assert!(cache.get_dokument(&snap.url).await.is_some());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(cache.get_dokument(&snap.url).await.is_none());
    }

    #[tokio::test]
    async fn namespaces_are_independent() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        let vg = vorgang();
        cache.store_vorgang("item-1", &vg).await;
        let snap = snapshot("item-1");
        assert!(cache.store_dokument("item-1", &snap).await);

        assert!(cache.get_vorgang("item-1").await.is_some());
        assert!(cache.get_dokument("item-1").await.is_some());
        assert!(cache.invalidate(NS_VORGANG, "item-1").await);
        assert!(cache.get_vorgang("item-1").await.is_none());
        assert!(cache.get_dokument("item-1").await.is_some());
    }

    #[tokio::test]
    async fn stats_count_live_entries_per_namespace() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        cache.store_vorgang("a", &vorgang()).await;
        cache.store_vorgang("b", &vorgang()).await;
        let snap = snapshot("https://example.org/a.pdf");
        cache.store_dokument(&snap.url, &snap).await;

        let stats = cache.stats().await;
        assert_eq!(stats.vorgang_entries, 2);
        assert_eq!(stats.dokument_entries, 1);

        cache.clear().await;
        assert_eq!(cache.stats().await, CacheStats::default());
    }
}
