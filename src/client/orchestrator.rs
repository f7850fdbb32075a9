//! Turns planned chunk sets into the displayed tile set
//!
//! Each planning pass gets a generation number. Chunks already resident
//! are reused, chunks already being fetched are joined, and the rest are
//! fetched through a semaphore shared by all passes. When a pass finishes
//! it is published only if no newer pass has started in the meantime;
//! superseded passes still fill the cache, they just never reach the
//! viewer.

use futures::future::join_all;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;
use tokio::time::Instant;

use super::ClientTile;
use crate::core::config::OrchestratorConfig;
use crate::core::lod::Lod;
use crate::planner::{CameraState, ChunkPlanner, ChunkSpec};
use crate::tiles::single_flight::SingleFlight;
use crate::traits::{ChunkFetcher, TileViewer};
use crate::{ChunkError, Result};

/// Telemetry snapshot for debug overlays
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientStats {
    pub generation: u64,
    /// Chunks in the latest pass
    pub requested: usize,
    /// Tiles currently published
    pub visible: usize,
    pub visible_coarse: usize,
    pub visible_medium: usize,
    pub visible_fine: usize,
    pub cache_size: usize,
    /// Chunk fetches currently in flight
    pub loading: usize,
    pub last_fetch_ms: Option<u64>,
    /// Failed fetches since start
    pub failed: u64,
    pub last_error: Option<String>,
}

/// Result of one planning pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassOutcome {
    pub generation: u64,
    /// False when a newer pass superseded this one
    pub applied: bool,
    pub resolved: usize,
    pub failed: usize,
}

struct State {
    tiles: LruCache<String, Arc<ClientTile>>,
    visible: Vec<Arc<ClientTile>>,
    requested: usize,
    last_fetch_ms: Option<u64>,
    failed: u64,
    last_error: Option<String>,
}

/// Pieces the spawned fetch tasks need after the caller has moved on
struct Shared {
    fetcher: Arc<dyn ChunkFetcher>,
    viewer: Arc<dyn TileViewer>,
    state: Mutex<State>,
    /// Held while a pass or shutdown talks to the viewer, so views arrive
    /// in generation order without holding `state` across viewer code
    publish: Mutex<()>,
    permits: Semaphore,
    shut_down: AtomicBool,
}

impl Shared {
    /// A panicking viewer must not wedge the orchestrator, so poisoning is
    /// ignored; `State` stays consistent because no viewer code runs under it.
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish_lock(&self) -> MutexGuard<'_, ()> {
        self.publish.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cached(&self, key: &str) -> Option<Arc<ClientTile>> {
        self.state().tiles.get(key).cloned()
    }

    /// Fetch and decode one chunk under a concurrency permit
    async fn fetch(&self, spec: ChunkSpec) -> Result<Arc<ClientTile>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ChunkError::Aborted("orchestrator shut down".to_string()))?;
        if let Some(tile) = self.cached(&spec.key) {
            return Ok(tile);
        }

        let started = Instant::now();
        let fetched = self.fetcher.fetch_chunk(&spec.request()).await;
        let elapsed = started.elapsed().as_millis() as u64;
        let tile = Arc::new(ClientTile::decode(spec, fetched?)?);
        log::debug!("fetched {} in {}ms", tile.key(), elapsed);

        if self.shut_down.load(Ordering::SeqCst) {
            return Ok(tile);
        }
        let evicted = {
            let mut state = self.state();
            state.last_fetch_ms = Some(elapsed);
            state
                .tiles
                .push(tile.key().to_string(), tile.clone())
                .map(|(key, _)| key)
                .filter(|key| key != tile.key())
        };
        if let Some(key) = evicted {
            self.viewer.release(&key);
        }
        Ok(tile)
    }
}

/// Client-side fetch orchestration for planned chunks
pub struct ClientTileOrchestrator {
    shared: Arc<Shared>,
    flights: SingleFlight<String, Arc<ClientTile>>,
    generation: AtomicU64,
}

impl ClientTileOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        fetcher: Arc<dyn ChunkFetcher>,
        viewer: Arc<dyn TileViewer>,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            shared: Arc::new(Shared {
                fetcher,
                viewer,
                publish: Mutex::new(()),
                state: Mutex::new(State {
                    tiles: LruCache::new(capacity),
                    visible: Vec::new(),
                    requested: 0,
                    last_fetch_ms: None,
                    failed: 0,
                    last_error: None,
                }),
                permits: Semaphore::new(config.concurrency.max(1)),
                shut_down: AtomicBool::new(false),
            }),
            flights: SingleFlight::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// Plan for `camera` and apply the result
    pub async fn update_camera(&self, planner: &ChunkPlanner, camera: &CameraState) -> PassOutcome {
        self.apply_plan(planner.plan(camera)).await
    }

    /// Resolve every spec of a planning pass and publish the resolved tiles
    /// unless a newer pass started meanwhile. Failed chunks are left out.
    pub async fn apply_plan(&self, specs: Vec<ChunkSpec>) -> PassOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.state().requested = specs.len();

        let results = join_all(specs.into_iter().map(|spec| self.resolve(spec))).await;

        let mut tiles = Vec::with_capacity(results.len());
        let mut failed = 0;
        let mut last_error = None;
        for result in results {
            match result {
                Ok(tile) => tiles.push(tile),
                Err(err) => {
                    failed += 1;
                    last_error = Some(err.to_string());
                }
            }
        }

        let resolved = tiles.len();

        // The generation check and the viewer call happen under one publish
        // lock, so a newer pass can never be overwritten by an older one
        let _publish = self.shared.publish_lock();
        let applied = {
            let mut state = self.shared.state();
            state.failed += failed as u64;
            if let Some(err) = last_error {
                log::warn!("{} chunk(s) failed in pass {}: {}", failed, generation, err);
                state.last_error = Some(err);
            }

            let current = self.generation.load(Ordering::SeqCst);
            let applied = current == generation && !self.shared.shut_down.load(Ordering::SeqCst);
            if applied {
                // Tiles evicted during the pass were already released
                tiles.retain(|tile| state.tiles.get(tile.key()).is_some());
                state.visible = tiles.clone();
            } else {
                log::debug!("discarding pass {} (current is {})", generation, current);
            }
            applied
        };
        if applied {
            self.shared.viewer.show(&tiles);
        }

        PassOutcome {
            generation,
            applied,
            resolved,
            failed,
        }
    }

    async fn resolve(&self, spec: ChunkSpec) -> Result<Arc<ClientTile>> {
        if let Some(tile) = self.shared.cached(&spec.key) {
            return Ok(tile);
        }
        let shared = self.shared.clone();
        self.flights
            .run(spec.key.clone(), move || async move { shared.fetch(spec).await })
            .await
    }

    /// Currently published tiles
    pub fn visible(&self) -> Vec<Arc<ClientTile>> {
        self.shared.state().visible.clone()
    }

    pub fn stats(&self) -> ClientStats {
        let loading = self.flights.in_flight();
        let generation = self.generation.load(Ordering::SeqCst);
        let state = self.shared.state();
        let count = |lod: Lod| state.visible.iter().filter(|t| t.spec.lod == lod).count();
        let (visible_coarse, visible_medium, visible_fine) =
            (count(Lod::Coarse), count(Lod::Medium), count(Lod::Fine));
        let visible = state.visible.len();
        let cache_size = state.tiles.len();
        ClientStats {
            generation,
            requested: state.requested,
            visible,
            visible_coarse,
            visible_medium,
            visible_fine,
            cache_size,
            loading,
            last_fetch_ms: state.last_fetch_ms,
            failed: state.failed,
            last_error: state.last_error.clone(),
        }
    }

    /// Release every resident tile and stop accepting work.
    ///
    /// Passes still running are discarded when they finish.
    pub fn shutdown(&self) {
        if self.shared.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.permits.close();
        let _publish = self.shared.publish_lock();
        let released = {
            let mut state = self.shared.state();
            state.visible.clear();
            let mut keys = Vec::with_capacity(state.tiles.len());
            while let Some((key, _)) = state.tiles.pop_lru() {
                keys.push(key);
            }
            keys
        };
        self.shared.viewer.show(&[]);
        for key in &released {
            self.shared.viewer.release(key);
        }
        log::debug!("tile orchestrator shut down");
    }
}

impl Drop for ClientTileOrchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
