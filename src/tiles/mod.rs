//! Server-side tile production: request identity, payloads, durable
//! stores and the two-tier cache

pub mod cache;
pub mod payload;
pub mod single_flight;
pub mod store;

use serde::{Deserialize, Serialize};

use crate::constants::{
    CACHE_KEY_PRECISION, CACHE_SCHEMA_VERSION, DEFAULT_PIXEL_SIZE, MAX_PIXEL_SIZE, MIN_PIXEL_SIZE,
};
use crate::core::geo::BoundingBox;
use crate::core::lod::Lod;

pub use cache::TileCache;
pub use payload::{TileImage, TileMeta, TilePayload, TileSource};
pub use single_flight::SingleFlight;
pub use store::{FsStore, MemoryStore};

/// What the client asks the server for: one box at one LoD and size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRequest {
    pub bbox: BoundingBox,
    pub lod: Lod,
    pub pixel_size: u32,
}

impl ChunkRequest {
    /// `pixel_size` is clamped into the supported range
    pub fn new(bbox: BoundingBox, lod: Lod, pixel_size: u32) -> Self {
        Self {
            bbox,
            lod,
            pixel_size: pixel_size.clamp(MIN_PIXEL_SIZE, MAX_PIXEL_SIZE),
        }
    }

    /// Cache identity: schema version, LoD, the box rounded to four
    /// decimals and the pixel size.
    pub fn cache_key(&self) -> String {
        let p = CACHE_KEY_PRECISION;
        format!(
            "v{}:{}:{:.*}:{:.*}:{:.*}:{:.*}:{}",
            CACHE_SCHEMA_VERSION,
            self.lod,
            p,
            self.bbox.south,
            p,
            self.bbox.west,
            p,
            self.bbox.north,
            p,
            self.bbox.east,
            self.pixel_size
        )
    }

    /// Query-string pairs understood by `GET /osm/chunk`
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("south", self.bbox.south.to_string()),
            ("west", self.bbox.west.to_string()),
            ("north", self.bbox.north.to_string()),
            ("east", self.bbox.east.to_string()),
            ("lod", self.lod.to_string()),
            ("pixelSize", self.pixel_size.to_string()),
        ]
    }
}

/// Pixel size for a raw request value: missing or non-finite values use
/// the default, others are truncated and clamped.
pub fn resolve_pixel_size(raw: Option<f64>) -> u32 {
    match raw {
        Some(value) if value.is_finite() => {
            value
                .trunc()
                .clamp(MIN_PIXEL_SIZE as f64, MAX_PIXEL_SIZE as f64) as u32
        }
        _ => DEFAULT_PIXEL_SIZE,
    }
}
