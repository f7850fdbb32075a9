//! Client side of the pipeline: fetch, decode and publish planned chunks

pub mod fetcher;
pub mod orchestrator;

pub use fetcher::HttpChunkFetcher;
pub use orchestrator::{ClientStats, ClientTileOrchestrator, PassOutcome};

use image::RgbaImage;

use crate::planner::ChunkSpec;
use crate::tiles::payload::{TileMeta, TilePayload};
use crate::{ChunkError, Result};

/// A planned chunk with its decoded bitmap, ready for the viewer
#[derive(Debug, Clone)]
pub struct ClientTile {
    pub spec: ChunkSpec,
    pub image: RgbaImage,
    pub meta: TileMeta,
}

impl ClientTile {
    /// Decode a server payload for `spec`
    pub fn decode(spec: ChunkSpec, payload: TilePayload) -> Result<Self> {
        let TilePayload { image, meta } = payload;
        let rgba = image.decode_rgba()?;
        let image = RgbaImage::from_raw(image.width, image.height, rgba).ok_or_else(|| {
            ChunkError::Decode(format!(
                "buffer does not fit {}x{}",
                image.width, image.height
            ))
        })?;
        Ok(Self { spec, image, meta })
    }

    pub fn key(&self) -> &str {
        &self.spec.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::BoundingBox;
    use crate::core::lod::{Lod, LodLevel};
    use crate::planner::TopChunkId;
    use crate::render::rasterizer::RasterTile;

    #[test]
    fn test_decode_payload() {
        let bbox = BoundingBox::new(57.0, -2.5, 57.25, -2.0).unwrap();
        let spec = ChunkSpec::new(
            bbox,
            &LodLevel::new(Lod::Fine, 0.68, 64),
            TopChunkId::new(0, 0),
            "root".into(),
        );
        let mut rgba = vec![0u8; 64 * 64 * 4];
        rgba[..4].copy_from_slice(&[1, 2, 3, 4]);
        let raster = RasterTile {
            width: 64,
            height: 64,
            rgba,
            way_count: 0,
            land_area_count: 0,
        };
        let payload = TilePayload::from_raster(&spec.request(), &raster);

        let tile = ClientTile::decode(spec, payload).unwrap();
        assert_eq!(tile.image.dimensions(), (64, 64));
        assert_eq!(tile.image.get_pixel(0, 0).0, [1, 2, 3, 4]);
        assert_eq!(tile.key(), "fine:0:0:root");
    }
}
