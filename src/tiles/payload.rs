//! Wire format of a rendered tile

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use super::ChunkRequest;
use crate::core::geo::BoundingBox;
use crate::core::lod::Lod;
use crate::render::rasterizer::RasterTile;
use crate::{ChunkError, Result};

/// Where a served payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TileSource {
    Memory,
    Disk,
    Network,
    MemoryStale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileImage {
    pub width: u32,
    pub height: u32,
    pub rgba_base64: String,
}

impl TileImage {
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Self {
        Self {
            width,
            height,
            rgba_base64: STANDARD.encode(rgba),
        }
    }

    /// Raw RGBA bytes, checked against `width * height * 4`
    pub fn decode_rgba(&self) -> Result<Vec<u8>> {
        let bytes = STANDARD
            .decode(&self.rgba_base64)
            .map_err(|err| ChunkError::Decode(format!("bad base64: {}", err)))?;
        let expected = self.width as usize * self.height as usize * 4;
        if bytes.len() != expected {
            return Err(ChunkError::Decode(format!(
                "expected {} bytes for {}x{}, got {}",
                expected,
                self.width,
                self.height,
                bytes.len()
            )));
        }
        Ok(bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileMeta {
    pub lod: Lod,
    #[serde(flatten)]
    pub bbox: BoundingBox,
    /// Road classes included at this LoD
    #[serde(default)]
    pub highways: Vec<String>,
    pub way_count: u32,
    pub land_area_count: u32,
    pub stale: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_age_ms: Option<u64>,
    pub source: TileSource,
}

/// A rendered tile as sent to clients. Never mutated after creation; the
/// cache hands out re-tagged copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TilePayload {
    pub image: TileImage,
    pub meta: TileMeta,
}

impl TilePayload {
    /// Fresh payload for a just-rendered tile
    pub fn from_raster(request: &ChunkRequest, raster: &RasterTile) -> Self {
        Self {
            image: TileImage::from_rgba(raster.width, raster.height, &raster.rgba),
            meta: TileMeta {
                lod: request.lod,
                bbox: request.bbox,
                highways: request
                    .lod
                    .highways()
                    .iter()
                    .map(|class| class.as_str().to_string())
                    .collect(),
                way_count: raster.way_count,
                land_area_count: raster.land_area_count,
                stale: false,
                stale_age_ms: None,
                source: TileSource::Network,
            },
        }
    }

    pub fn with_source(mut self, source: TileSource) -> Self {
        self.meta.source = source;
        self
    }

    /// Copy marked as served past its freshness window
    pub fn into_stale(mut self, age_ms: u64) -> Self {
        self.meta.stale = true;
        self.meta.stale_age_ms = Some(age_ms);
        self.meta.source = TileSource::MemoryStale;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.meta.way_count == 0 && self.meta.land_area_count == 0
    }
}
