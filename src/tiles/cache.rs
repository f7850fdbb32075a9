//! Two-tier tile cache with single-flight resolution and stale serving
//!
//! Resolution order for a key:
//!
//! 1. a memory entry younger than `fresh_ttl` is served as `memory`;
//! 2. a durable entry no older than `durable_ttl` is promoted into memory
//!    and served as `disk`;
//! 3. otherwise the caller joins (or starts) the key's single flight, which
//!    fetches elements, rasterizes, and stores the result in both tiers;
//! 4. if the upstream fetch fails and a memory entry younger than
//!    `stale_ttl` exists, that entry is served marked stale
//!    (`memory-stale`) instead of the error.
//!
//! The durable tier is best effort: read errors are misses and write errors
//! are logged, neither fails a resolve.

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::payload::{TilePayload, TileSource};
use super::single_flight::SingleFlight;
use super::store::FsStore;
use super::ChunkRequest;
use crate::core::config::TileCacheConfig;
use crate::render::rasterizer::rasterize;
use crate::runtime::async_utils::age_ms;
use crate::runtime::{Clock, SystemClock};
use crate::traits::{CacheStats, DurableStore, ElementSource};
use crate::{ChunkError, Result};

/// A rendered payload and when it was produced (epoch ms)
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub payload: TilePayload,
    pub created_at: u64,
}

/// On-disk layout of a durable entry
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DurableRecord {
    created_at: u64,
    payload: TilePayload,
}

#[derive(Debug, Default)]
struct Counters {
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    renders: AtomicU64,
    stale_served: AtomicU64,
    failures: AtomicU64,
}

struct Inner {
    config: TileCacheConfig,
    memory: Mutex<LruCache<String, CacheEntry>>,
    durable: Option<Arc<dyn DurableStore>>,
    source: Arc<dyn ElementSource>,
    clock: Arc<dyn Clock>,
    flights: SingleFlight<String, TilePayload>,
    counters: Counters,
}

/// Server-side tile cache. Cloning is cheap and every clone shares state.
#[derive(Clone)]
pub struct TileCache {
    inner: Arc<Inner>,
}

impl TileCache {
    /// Cache on the system clock, with a file-backed durable tier when
    /// `config.durable_dir` is set
    pub fn new(config: TileCacheConfig, source: Arc<dyn ElementSource>) -> Self {
        let durable = config
            .durable_dir
            .clone()
            .map(|dir| Arc::new(FsStore::new(dir)) as Arc<dyn DurableStore>);
        Self::with_parts(config, source, durable, Arc::new(SystemClock))
    }

    pub fn with_parts(
        config: TileCacheConfig,
        source: Arc<dyn ElementSource>,
        durable: Option<Arc<dyn DurableStore>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = config.normalized();
        let capacity = NonZeroUsize::new(config.memory_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Inner {
                memory: Mutex::new(LruCache::new(capacity)),
                config,
                durable,
                source,
                clock,
                flights: SingleFlight::new(),
                counters: Counters::default(),
            }),
        }
    }

    pub fn config(&self) -> &TileCacheConfig {
        &self.inner.config
    }

    /// Resolve `request` to a payload, computing it at most once at a time
    pub async fn resolve(&self, request: &ChunkRequest) -> Result<TilePayload> {
        let key = request.cache_key();
        let now = self.inner.clock.now_ms();

        if let Some(entry) = self.memory_get(&key) {
            if age_ms(now, entry.created_at) < self.inner.config.fresh_ttl.as_millis() as u64 {
                self.inner.counters.memory_hits.fetch_add(1, Ordering::Relaxed);
                log::debug!("memory hit {}", key);
                return Ok(entry.payload.with_source(TileSource::Memory));
            }
        }

        if let Some(entry) = self.read_durable(&key, now).await {
            self.inner.counters.disk_hits.fetch_add(1, Ordering::Relaxed);
            log::debug!("disk hit {}", key);
            let payload = entry.payload.clone().with_source(TileSource::Disk);
            self.memory_put(entry);
            return Ok(payload);
        }

        let cache = self.clone();
        let request = request.clone();
        let flight_key = key.clone();
        self.inner
            .flights
            .run(key, move || async move { cache.produce(flight_key, request).await })
            .await
    }

    /// Body of a single flight: fetch, render, store; fall back to stale
    async fn produce(&self, key: String, request: ChunkRequest) -> Result<TilePayload> {
        let elements = match self
            .inner
            .source
            .fetch_elements(&request.bbox, &request.lod.highways())
            .await
        {
            Ok(elements) => elements,
            Err(err) => return self.stale_or(&key, err),
        };

        let render_request = request.clone();
        let raster = tokio::task::spawn_blocking(move || {
            rasterize(
                &render_request.bbox,
                &elements,
                render_request.pixel_size,
                render_request.lod,
            )
        })
        .await
        .map_err(|err| ChunkError::RenderFailure(format!("render task failed: {}", err)))
        .and_then(|result| result);

        let raster = match raster {
            Ok(raster) => raster,
            Err(err) => {
                self.inner.counters.failures.fetch_add(1, Ordering::Relaxed);
                log::warn!("render of {} failed: {}", key, err);
                return Err(err);
            }
        };

        let payload = TilePayload::from_raster(&request, &raster);
        let created_at = self.inner.clock.now_ms();
        self.inner.counters.renders.fetch_add(1, Ordering::Relaxed);
        log::info!(
            "rendered {} ({} roads, {} land areas)",
            key,
            raster.way_count,
            raster.land_area_count
        );

        self.memory_put(CacheEntry {
            key: key.clone(),
            payload: payload.clone(),
            created_at,
        });
        self.write_durable(&key, &payload, created_at).await;
        Ok(payload)
    }

    fn stale_or(&self, key: &str, err: ChunkError) -> Result<TilePayload> {
        let now = self.inner.clock.now_ms();
        if let Some(entry) = self.memory_get(key) {
            let age = age_ms(now, entry.created_at);
            if age < self.inner.config.stale_ttl.as_millis() as u64 {
                self.inner.counters.stale_served.fetch_add(1, Ordering::Relaxed);
                log::info!("serving {} stale ({}ms old) after: {}", key, age, err);
                return Ok(entry.payload.into_stale(age));
            }
        }
        self.inner.counters.failures.fetch_add(1, Ordering::Relaxed);
        Err(err)
    }

    fn memory_get(&self, key: &str) -> Option<CacheEntry> {
        self.inner.memory.lock().ok()?.get(key).cloned()
    }

    fn memory_put(&self, entry: CacheEntry) {
        if let Ok(mut memory) = self.inner.memory.lock() {
            memory.put(entry.key.clone(), entry);
        }
    }

    async fn read_durable(&self, key: &str, now: u64) -> Option<CacheEntry> {
        let store = self.inner.durable.as_ref()?;
        let bytes = match store.get(key).await {
            Ok(bytes) => bytes?,
            Err(err) => {
                log::warn!("durable read of {} failed: {}", key, err);
                return None;
            }
        };
        let record: DurableRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(err) => {
                log::debug!("ignoring unreadable durable entry {}: {}", key, err);
                return None;
            }
        };
        if age_ms(now, record.created_at) > self.inner.config.durable_ttl.as_millis() as u64 {
            return None;
        }
        Some(CacheEntry {
            key: key.to_string(),
            payload: record.payload,
            created_at: record.created_at,
        })
    }

    async fn write_durable(&self, key: &str, payload: &TilePayload, created_at: u64) {
        let Some(store) = self.inner.durable.as_ref() else {
            return;
        };
        let record = DurableRecord {
            created_at,
            payload: payload.clone(),
        };
        let result = match serde_json::to_vec(&record) {
            Ok(bytes) => store.put(key, &bytes).await,
            Err(err) => Err(err.into()),
        };
        if let Err(err) = result {
            log::warn!("durable write of {} failed: {}", key, err);
        }
    }

    /// Entries currently held in memory
    pub fn len(&self) -> usize {
        self.inner.memory.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys currently being resolved
    pub fn in_flight(&self) -> usize {
        self.inner.flights.in_flight()
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.inner.counters;
        CacheStats {
            memory_hits: c.memory_hits.load(Ordering::Relaxed),
            disk_hits: c.disk_hits.load(Ordering::Relaxed),
            renders: c.renders.load(Ordering::Relaxed),
            stale_served: c.stale_served.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::BoundingBox;
    use crate::core::lod::Lod;
    use crate::osm::element::{Node, VectorElement, Way};
    use crate::osm::tags::RoadClass;
    use crate::runtime::ManualClock;
    use crate::tiles::store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    const START: u64 = 1_700_000_000_000;

    /// Replays scripted results; the last one repeats forever
    struct FakeSource {
        calls: AtomicUsize,
        script: Mutex<VecDeque<Result<Vec<VectorElement>>>>,
        delay: Duration,
    }

    impl FakeSource {
        fn new(script: Vec<Result<Vec<VectorElement>>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                script: Mutex::new(script.into()),
                delay: Duration::from_millis(20),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ElementSource for FakeSource {
        async fn fetch_elements(
            &self,
            _bbox: &BoundingBox,
            _highways: &[RoadClass],
        ) -> Result<Vec<VectorElement>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap()
            }
        }
    }

    /// Reads miss, writes fail
    struct BrokenStore;

    #[async_trait]
    impl DurableStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(ChunkError::Storage("disk gone".into()))
        }

        async fn put(&self, _key: &str, _value: &[u8]) -> Result<()> {
            Err(ChunkError::Storage("read-only filesystem".into()))
        }

        async fn delete(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    fn road() -> Vec<VectorElement> {
        vec![
            Node::new(1, 57.05, -2.45).into(),
            Node::new(2, 57.20, -2.05).into(),
            Way::new(10, vec![1, 2]).with_tag("highway", "primary").into(),
        ]
    }

    fn request() -> ChunkRequest {
        let bbox = BoundingBox::new(57.0, -2.5, 57.25, -2.0).unwrap();
        ChunkRequest::new(bbox, Lod::Coarse, 64)
    }

    fn unavailable() -> Result<Vec<VectorElement>> {
        Err(ChunkError::UpstreamUnavailable("mirror down".into()))
    }

    fn cache_with(
        source: Arc<FakeSource>,
        durable: Option<Arc<dyn DurableStore>>,
        clock: Arc<ManualClock>,
    ) -> TileCache {
        TileCache::with_parts(TileCacheConfig::for_testing(), source, durable, clock)
    }

    #[tokio::test]
    async fn test_concurrent_resolves_fetch_once() {
        let source = FakeSource::new(vec![Ok(road())]);
        let cache = cache_with(source.clone(), None, Arc::new(ManualClock::new(START)));

        let request = request();
        let results =
            futures::future::join_all((0..20).map(|_| cache.resolve(&request))).await;

        assert_eq!(source.calls(), 1);
        let first = results[0].clone().unwrap();
        assert_eq!(first.meta.source, TileSource::Network);
        assert_eq!(first.meta.way_count, 1);
        assert!(results.iter().all(|r| r.as_ref() == Ok(&first)));
        assert_eq!(cache.stats().renders, 1);
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_fresh_entry_served_from_memory() {
        let source = FakeSource::new(vec![Ok(road())]);
        let clock = Arc::new(ManualClock::new(START));
        let cache = cache_with(source.clone(), None, clock.clone());

        cache.resolve(&request()).await.unwrap();
        clock.advance(Duration::from_secs(9 * 60));
        let second = cache.resolve(&request()).await.unwrap();

        assert_eq!(second.meta.source, TileSource::Memory);
        assert!(!second.meta.stale);
        assert_eq!(source.calls(), 1);
        assert_eq!(cache.stats().memory_hits, 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_serves_stale() {
        let source = FakeSource::new(vec![Ok(road()), unavailable()]);
        let clock = Arc::new(ManualClock::new(START));
        let cache = cache_with(source.clone(), None, clock.clone());

        let fresh = cache.resolve(&request()).await.unwrap();
        assert!(!fresh.meta.stale);

        clock.advance(Duration::from_secs(11 * 60));
        let stale = cache.resolve(&request()).await.unwrap();
        assert!(stale.meta.stale);
        assert_eq!(stale.meta.stale_age_ms, Some(11 * 60 * 1000));
        assert_eq!(stale.meta.source, TileSource::MemoryStale);
        assert_eq!(stale.image, fresh.image);
        assert_eq!(source.calls(), 2);
        assert_eq!(cache.stats().stale_served, 1);

        // Past the stale window the error surfaces
        clock.advance(Duration::from_secs(50 * 60));
        let err = cache.resolve(&request()).await.unwrap_err();
        assert_eq!(err, ChunkError::UpstreamUnavailable("mirror down".into()));
        assert_eq!(cache.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_failure_without_entry_propagates_and_clears_flight() {
        let source = FakeSource::new(vec![unavailable(), Ok(road())]);
        let cache = cache_with(source.clone(), None, Arc::new(ManualClock::new(START)));

        assert!(cache.resolve(&request()).await.is_err());
        assert_eq!(cache.in_flight(), 0);

        let retried = cache.resolve(&request()).await.unwrap();
        assert_eq!(retried.meta.source, TileSource::Network);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_render_failure_is_not_masked_by_stale() {
        let bad = vec![Node::new(1, f64::INFINITY, 0.0).into()];
        let source = FakeSource::new(vec![Ok(road()), Ok(bad)]);
        let clock = Arc::new(ManualClock::new(START));
        let cache = cache_with(source.clone(), None, clock.clone());

        cache.resolve(&request()).await.unwrap();
        clock.advance(Duration::from_secs(11 * 60));
        assert!(matches!(
            cache.resolve(&request()).await,
            Err(ChunkError::RenderFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_durable_tier_survives_restart() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(START));

        let first_source = FakeSource::new(vec![Ok(road())]);
        let first = cache_with(first_source.clone(), Some(store.clone()), clock.clone());
        let rendered = first.resolve(&request()).await.unwrap();

        // A new process sharing the same durable tier
        clock.advance(Duration::from_secs(24 * 60 * 60));
        let second_source = FakeSource::new(vec![unavailable()]);
        let second = cache_with(second_source.clone(), Some(store.clone()), clock.clone());
        let restored = second.resolve(&request()).await.unwrap();

        assert_eq!(restored.meta.source, TileSource::Disk);
        assert_eq!(restored.image, rendered.image);
        assert_eq!(second_source.calls(), 0);
        assert_eq!(second.len(), 1);
        assert_eq!(second.stats().disk_hits, 1);
    }

    #[tokio::test]
    async fn test_expired_durable_entry_is_a_miss() {
        let store: Arc<dyn DurableStore> = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(START));
        let source = FakeSource::new(vec![Ok(road())]);
        let cache = cache_with(source.clone(), Some(store.clone()), clock.clone());
        cache.resolve(&request()).await.unwrap();

        clock.advance(Duration::from_secs(31 * 24 * 60 * 60));
        let again = cache.resolve(&request()).await.unwrap();
        assert_eq!(again.meta.source, TileSource::Network);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_durable_entry_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        store
            .put(&request().cache_key(), b"{\"createdAt\": 1}")
            .await
            .unwrap();
        let source = FakeSource::new(vec![Ok(road())]);
        let cache = cache_with(
            source.clone(),
            Some(store.clone() as Arc<dyn DurableStore>),
            Arc::new(ManualClock::new(START)),
        );

        let payload = cache.resolve(&request()).await.unwrap();
        assert_eq!(payload.meta.source, TileSource::Network);
        // Overwritten with a good record
        let bytes = store.get(&request().cache_key()).await.unwrap().unwrap();
        assert!(serde_json::from_slice::<DurableRecord>(&bytes).is_ok());
    }

    #[tokio::test]
    async fn test_broken_durable_tier_never_fails_resolve() {
        let source = FakeSource::new(vec![Ok(road())]);
        let cache = cache_with(
            source.clone(),
            Some(Arc::new(BrokenStore)),
            Arc::new(ManualClock::new(START)),
        );

        let payload = cache.resolve(&request()).await.unwrap();
        assert_eq!(payload.meta.source, TileSource::Network);
        let again = cache.resolve(&request()).await.unwrap();
        assert_eq!(again.meta.source, TileSource::Memory);
    }
}
