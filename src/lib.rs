//! # chunkmap
//!
//! An adaptive level-of-detail tile pipeline for OpenStreetMap road and
//! land-use geometry.
//!
//! The crate is split along the path a tile takes:
//!
//! - [`planner`] decides, from camera state, which chunks at which LoD
//!   should exist.
//! - [`client`] resolves those chunks against a local cache and the
//!   network, bounded and deduplicated, and publishes the visible set.
//! - [`tiles`] is the server-side two-tier cache with single-flight
//!   resolution and stale serving.
//! - [`upstream`] is the throttled, retrying gateway to the Overpass API.
//! - [`render`] rasterizes tagged vector elements into RGBA bitmaps.

pub mod client;
pub mod core;
pub mod osm;
pub mod planner;
pub mod prelude;
pub mod render;
pub mod runtime;
#[cfg(feature = "server")]
pub mod server;
pub mod tiles;
pub mod traits;
pub mod upstream;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    config::{OrchestratorConfig, PlannerConfig, ServerConfig, TileCacheConfig, UpstreamConfig},
    geo::{BoundingBox, LatLng},
};

pub use client::{ClientTile, ClientTileOrchestrator, HttpChunkFetcher};
pub use osm::element::{Node, VectorElement, Way};
pub use planner::{CameraState, ChunkPlanner, ChunkSpec, Lod, LodLevel, TopChunkId};
pub use render::rasterizer::{rasterize, RasterTile};
pub use tiles::{cache::TileCache, payload::TilePayload, ChunkRequest};
pub use upstream::gateway::UpstreamGateway;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, ChunkError>;

/// Error taxonomy for the chunk pipeline.
///
/// The type is `Clone` because a single in-flight resolution hands its
/// result to every waiter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChunkError {
    #[error("Invalid bounding box: {0}")]
    InvalidBoundingBox(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upstream rate limited (retry after {retry_after:?})")]
    UpstreamRateLimited {
        retry_after: Option<std::time::Duration>,
    },

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    #[error("Render failure: {0}")]
    RenderFailure(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("In-flight work aborted: {0}")]
    Aborted(String),
}

impl ChunkError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamRateLimited { .. }
                | Self::UpstreamUnavailable(_)
                | Self::UpstreamTimeout(_)
                | Self::Fetch(_)
                | Self::Aborted(_)
        )
    }

    /// Whether the error was caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidBoundingBox(_) | Self::InvalidRequest(_))
    }

    /// HTTP status the chunk endpoint answers with for this error
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            502
        }
    }
}

impl From<reqwest::Error> for ChunkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::UpstreamTimeout(err.to_string())
        } else {
            Self::UpstreamUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ChunkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<std::io::Error> for ChunkError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Error type alias for convenience
pub type Error = ChunkError;
