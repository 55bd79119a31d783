//! AttributeResolver - best-known description per `(class, code)`
//!
//! Lookup tiers:
//! 1. static dictionary (sync path checks this first)
//! 2. in-memory cache, filled from the remote source
//! 3. persisted second-tier cache, used when the source is down
//! 4. the raw code itself
//!
//! Only `resolve_async` / `preload` touch the network. Concurrent loads of
//! the same class are coalesced: callers queue on a per-class lock and skip
//! the fetch if another caller completed an attempt while they waited.

use super::cache::{AttributeCache, CacheEntry, CacheStats};
use super::source::AttributeSource;
use super::Describe;
use crate::config::DecoderConfig;
use crate::dictionary;
use crate::store::KvStore;
use epw_types::AttributeClass;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const PERSISTED_KEY_PREFIX: &str = "epw_attr_cache_";

/// Per-class load coordination
#[derive(Debug, Default)]
struct ClassLoader {
    lock: Mutex<()>,
    /// Completed load attempts (success or failure)
    attempts: AtomicU64,
}

pub struct AttributeResolver {
    source: Option<Arc<dyn AttributeSource>>,
    store: Option<Arc<dyn KvStore>>,
    cache: AttributeCache,
    persisted_ttl: Duration,
    loaders: HashMap<AttributeClass, ClassLoader>,
}

impl AttributeResolver {
    /// Resolver with no remote source and no persisted tier
    pub fn offline() -> Self {
        Self::from_config(&DecoderConfig::default())
    }

    /// Resolver using the TTLs from `config`; attach source / store with the builders
    pub fn from_config(config: &DecoderConfig) -> Self {
        Self {
            source: None,
            store: None,
            cache: AttributeCache::new(config.cache_ttl),
            persisted_ttl: config.persisted_cache_ttl(),
            loaders: AttributeClass::ALL
                .into_iter()
                .map(|c| (c, ClassLoader::default()))
                .collect(),
        }
    }

    /// Set remote source
    pub fn with_source(mut self, source: Arc<dyn AttributeSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set second-tier store
    pub fn with_store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Dictionary, then in-memory cache (expired entries included), then the code itself.
    ///
    /// Never performs I/O.
    pub fn resolve_sync(&self, class: AttributeClass, code: &str) -> String {
        if let Some(description) = dictionary::lookup(class, code) {
            return description.to_string();
        }
        self.cache
            .lookup(class, code)
            .unwrap_or_else(|| code.to_string())
    }

    /// Load the class if missing or expired, then answer from the cache.
    ///
    /// Falls back to `resolve_sync` when the cache has no mapping for `code`.
    pub async fn resolve_async(&self, class: AttributeClass, code: &str) -> String {
        if self.cache.needs_refresh(class) {
            self.ensure_loaded(class).await;
        }
        match self.cache.lookup(class, code) {
            Some(description) => description,
            None => self.resolve_sync(class, code),
        }
    }

    /// Warm several classes concurrently
    pub async fn preload(&self, classes: &[AttributeClass]) {
        join_all(classes.iter().map(|class| async move {
            if self.cache.needs_refresh(*class) {
                self.ensure_loaded(*class).await;
            }
        }))
        .await;
        debug!("Preloaded {} attribute classes", classes.len());
    }

    /// Drop every in-memory entry (the persisted tier is kept)
    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("Attribute cache cleared");
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of completed load attempts for a class
    pub fn load_attempts(&self, class: AttributeClass) -> u64 {
        self.loaders
            .get(&class)
            .map(|l| l.attempts.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    async fn ensure_loaded(&self, class: AttributeClass) {
        let Some(loader) = self.loaders.get(&class) else {
            return;
        };

        let seen = loader.attempts.load(Ordering::Acquire);
        let _guard = loader.lock.lock().await;

        // Another caller finished a load while we were queued
        if loader.attempts.load(Ordering::Acquire) != seen || !self.cache.needs_refresh(class) {
            return;
        }

        self.load_class(class).await;
        loader.attempts.fetch_add(1, Ordering::AcqRel);
    }

    async fn load_class(&self, class: AttributeClass) {
        if let Some(source) = &self.source {
            match source.fetch(class).await {
                Ok(data) => {
                    info!("Loaded {} {} attributes from source", data.len(), class);
                    let entry = CacheEntry::new(data);
                    self.write_persisted(class, &entry);
                    self.cache.insert(class, entry);
                    return;
                }
                Err(e) => warn!("Failed to fetch {} attributes: {}", class, e),
            }
        }

        match self.read_persisted(class) {
            Some(entry) if !entry.is_expired(self.persisted_ttl) => {
                info!(
                    "Serving persisted {} attributes ({}s old)",
                    class,
                    entry.age().as_secs()
                );
                self.cache.insert(class, entry);
            }
            Some(_) => warn!("Persisted {} attributes expired; using dictionary", class),
            None => debug!("No persisted {} attributes; using dictionary", class),
        }
    }

    fn persisted_key(class: AttributeClass) -> String {
        format!("{}{}", PERSISTED_KEY_PREFIX, class.as_str())
    }

    fn read_persisted(&self, class: AttributeClass) -> Option<CacheEntry> {
        let store = self.store.as_ref()?;
        let raw = match store.get(&Self::persisted_key(class)) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("Failed to read persisted {} attributes: {}", class, e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Discarding corrupt persisted {} attributes: {}", class, e);
                None
            }
        }
    }

    fn write_persisted(&self, class: AttributeClass, entry: &CacheEntry) {
        let Some(store) = &self.store else {
            return;
        };
        let result = serde_json::to_string(entry)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                store
                    .set(&Self::persisted_key(class), &json)
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            warn!("Failed to persist {} attributes: {}", class, e);
        }
    }
}

impl Describe for AttributeResolver {
    fn describe(&self, class: AttributeClass, code: &str) -> String {
        self.resolve_sync(class, code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use epw_types::AttributeEntry;
    use std::sync::atomic::AtomicUsize;

    /// Source returning fixed entries (or failing), counting calls
    struct FakeSource {
        entries: Vec<AttributeEntry>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn ok(entries: Vec<AttributeEntry>) -> Arc<Self> {
            Arc::new(Self {
                entries,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                entries: vec![],
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AttributeSource for FakeSource {
        async fn fetch(&self, _class: AttributeClass) -> Result<Vec<AttributeEntry>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                Err(SourceError::Unavailable("down".to_string()))
            } else {
                Ok(self.entries.clone())
            }
        }
    }

    #[test]
    fn test_sync_falls_back_to_code() {
        let resolver = AttributeResolver::offline();
        assert_eq!(resolver.resolve_sync(AttributeClass::Tipo, "R"), "Régua");
        assert_eq!(resolver.resolve_sync(AttributeClass::Tipo, "ZZ"), "ZZ");
    }

    #[test]
    fn test_sync_prefers_dictionary_over_cache() {
        let resolver = AttributeResolver::offline();
        resolver.cache.insert(
            AttributeClass::Tipo,
            CacheEntry::new(vec![
                AttributeEntry::new("R", "Régua LED"),
                AttributeEntry::new("W", "Wall"),
            ]),
        );

        assert_eq!(resolver.resolve_sync(AttributeClass::Tipo, "R"), "Régua");
        assert_eq!(resolver.resolve_sync(AttributeClass::Tipo, "W"), "Wall");
    }

    #[tokio::test]
    async fn test_async_fetches_and_persists() {
        let source = FakeSource::ok(vec![AttributeEntry::new("W", "Wall")]);
        let store = Arc::new(MemoryStore::new());
        let resolver = AttributeResolver::offline()
            .with_source(source.clone())
            .with_store(store.clone());

        assert_eq!(resolver.resolve_async(AttributeClass::Cor, "W").await, "Wall");
        assert_eq!(resolver.resolve_sync(AttributeClass::Cor, "W"), "Wall");
        assert!(store.get("epw_attr_cache_cor").unwrap().is_some());

        // Fresh cache: no second fetch
        resolver.resolve_async(AttributeClass::Cor, "B").await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_loads_are_coalesced() {
        let source = FakeSource::ok(vec![AttributeEntry::new("W", "Wall")]);
        let resolver = AttributeResolver::offline().with_source(source.clone());

        let (a, b, c) = tokio::join!(
            resolver.resolve_async(AttributeClass::Cor, "W"),
            resolver.resolve_async(AttributeClass::Cor, "W"),
            resolver.resolve_async(AttributeClass::Cor, "B"),
        );

        assert_eq!(a, "Wall");
        assert_eq!(b, "Wall");
        assert_eq!(c, "Branco");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.load_attempts(AttributeClass::Cor), 1);
    }

    #[tokio::test]
    async fn test_concurrent_failures_are_coalesced_too() {
        let source = FakeSource::failing();
        let resolver = AttributeResolver::offline().with_source(source.clone());

        let (a, b) = tokio::join!(
            resolver.resolve_async(AttributeClass::Tipo, "R"),
            resolver.resolve_async(AttributeClass::Tipo, "QQ"),
        );

        assert_eq!(a, "Régua");
        assert_eq!(b, "QQ");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_serves_persisted_copy() {
        let store = Arc::new(MemoryStore::new());
        let stale = CacheEntry {
            data: vec![AttributeEntry::new("W", "Wall")],
            timestamp: Utc::now() - chrono::Duration::minutes(45),
        };
        store
            .set("epw_attr_cache_cor", &serde_json::to_string(&stale).unwrap())
            .unwrap();

        let resolver = AttributeResolver::offline()
            .with_source(FakeSource::failing())
            .with_store(store);

        assert_eq!(resolver.resolve_async(AttributeClass::Cor, "W").await, "Wall");
    }

    #[tokio::test]
    async fn test_expired_persisted_copy_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        let ancient = CacheEntry {
            data: vec![AttributeEntry::new("W", "Wall")],
            timestamp: Utc::now() - chrono::Duration::hours(3),
        };
        store
            .set("epw_attr_cache_cor", &serde_json::to_string(&ancient).unwrap())
            .unwrap();

        let resolver = AttributeResolver::offline()
            .with_source(FakeSource::failing())
            .with_store(store);

        assert_eq!(resolver.resolve_async(AttributeClass::Cor, "W").await, "W");
    }

    #[tokio::test]
    async fn test_corrupt_persisted_copy_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        store.set("epw_attr_cache_tipo", "{not json").unwrap();

        let resolver = AttributeResolver::offline().with_store(store);
        assert_eq!(resolver.resolve_async(AttributeClass::Tipo, "W").await, "W");
        assert_eq!(resolver.resolve_async(AttributeClass::Tipo, "R").await, "Régua");
    }

    #[tokio::test]
    async fn test_preload_warms_every_class() {
        let source = FakeSource::ok(vec![AttributeEntry::new("W", "Wall")]);
        let resolver = AttributeResolver::offline().with_source(source.clone());

        resolver.preload(&AttributeClass::ALL).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 6);
        assert_eq!(resolver.cache_stats().active_entries, 6);
        assert_eq!(resolver.resolve_sync(AttributeClass::Acabamento, "W"), "Wall");

        resolver.clear_cache();
        assert_eq!(resolver.cache_stats().total_entries, 0);
    }
}
