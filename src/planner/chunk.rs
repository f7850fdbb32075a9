use std::fmt;
use std::str::FromStr;

use crate::core::geo::BoundingBox;
use crate::core::lod::{Lod, LodLevel};
use crate::tiles::ChunkRequest;
use crate::ChunkError;

/// A region-sized cell of the planning grid, as an offset from the
/// configured region. `0:0` is the region itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopChunkId {
    pub x: i32,
    pub y: i32,
}

impl TopChunkId {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for TopChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.y)
    }
}

impl FromStr for TopChunkId {
    type Err = ChunkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ChunkError::InvalidRequest(format!("bad top chunk id '{}'", s));
        let (x, y) = s.split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            x: x.trim().parse().map_err(|_| invalid())?,
            y: y.trim().parse().map_err(|_| invalid())?,
        })
    }
}

/// One planned chunk: a box, its level of detail and where it sits in the
/// refinement tree. Produced fresh on every planning pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSpec {
    pub bbox: BoundingBox,
    pub lod: Lod,
    pub pixel_size: u32,
    pub top: TopChunkId,
    /// Quadrant suffixes from the top chunk down, e.g. `root.sw.ne`
    pub path: String,
    /// `lod:top:path`, unique within one plan
    pub key: String,
}

impl ChunkSpec {
    pub fn new(bbox: BoundingBox, level: &LodLevel, top: TopChunkId, path: String) -> Self {
        let key = format!("{}:{}:{}", level.lod, top, path);
        Self {
            bbox,
            lod: level.lod,
            pixel_size: level.pixel_size,
            top,
            path,
            key,
        }
    }

    /// Number of quadrisections below the top chunk
    pub fn depth(&self) -> usize {
        self.path.matches('.').count()
    }

    /// Server request for this chunk
    pub fn request(&self) -> ChunkRequest {
        ChunkRequest::new(self.bbox, self.lod, self.pixel_size)
    }
}
