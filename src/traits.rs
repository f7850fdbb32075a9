//! Seams between the pipeline's services
//!
//! Every collaborator a service talks to is reached through one of these
//! traits, so each service can be built with fakes in tests.

use async_trait::async_trait;
use std::sync::Arc;

use crate::client::ClientTile;
use crate::core::geo::BoundingBox;
use crate::osm::element::VectorElement;
use crate::osm::tags::RoadClass;
use crate::tiles::payload::TilePayload;
use crate::tiles::ChunkRequest;
use crate::Result;

/// Produces tagged vector elements for a box
#[async_trait]
pub trait ElementSource: Send + Sync {
    /// Roads of the given classes plus all land-cover ways inside `bbox`,
    /// in the order the source returned them.
    async fn fetch_elements(
        &self,
        bbox: &BoundingBox,
        highways: &[RoadClass],
    ) -> Result<Vec<VectorElement>>;
}

/// Best-effort durable byte store keyed by opaque strings.
///
/// Nothing here is a system of record: callers treat every error as a miss.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Client-side transport for a single chunk
#[async_trait]
pub trait ChunkFetcher: Send + Sync {
    async fn fetch_chunk(&self, request: &ChunkRequest) -> Result<TilePayload>;
}

/// The out-of-process viewer that displays decoded tiles.
///
/// All methods default to no-ops so a viewer only implements what it needs.
pub trait TileViewer: Send + Sync {
    /// Replace the displayed set with `tiles`
    fn show(&self, tiles: &[Arc<ClientTile>]) {
        let _ = tiles;
    }

    /// Free any resources held for `key`; the tile will not be shown again
    fn release(&self, key: &str) {
        let _ = key;
    }
}

/// Counters kept by the server-side tile cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub renders: u64,
    pub stale_served: u64,
    pub failures: u64,
    pub entries: usize,
}
