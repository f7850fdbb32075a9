//! Road stroke and land-area fill styles

use crate::core::lod::Lod;
use crate::osm::tags::{LandCover, LanduseKind, NaturalKind, RoadClass};

/// Stroke color and width for a road class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoadStyle {
    pub color: [u8; 3],
    pub width: u32,
}

impl RoadStyle {
    const fn new(color: [u8; 3], width: u32) -> Self {
        Self { color, width }
    }

    /// Base style: warmer and wider for major roads, cooler and thinner for
    /// local ones. Unknown classes draw like a generic `road`.
    pub fn for_class(class: &RoadClass) -> Self {
        match class {
            RoadClass::Motorway => Self::new([255, 152, 69], 4),
            RoadClass::Trunk => Self::new([255, 188, 96], 4),
            RoadClass::Primary => Self::new([255, 219, 120], 3),
            RoadClass::Secondary => Self::new([243, 243, 181], 2),
            RoadClass::Tertiary => Self::new([212, 230, 212], 2),
            RoadClass::Unclassified => Self::new([176, 196, 176], 1),
            RoadClass::Residential => Self::new([164, 186, 201], 1),
            RoadClass::Service => Self::new([152, 172, 189], 1),
            RoadClass::LivingStreet => Self::new([165, 180, 202], 1),
            RoadClass::Road | RoadClass::Other(_) => Self::new([155, 175, 194], 1),
        }
    }

    /// Style adjusted for a level of detail.
    ///
    /// Coarse tiles keep every road at least two pixels wide so it survives
    /// downsampling, medium tiles narrow one step, fine tiles use the base.
    pub fn for_lod(class: &RoadClass, lod: Lod) -> Self {
        let base = Self::for_class(class);
        let width = match lod {
            Lod::Coarse => base.width.max(2),
            Lod::Medium => base.width.saturating_sub(1).max(1),
            Lod::Fine => base.width,
        };
        Self { width, ..base }
    }
}

/// Translucent fill for a land-cover area
pub fn land_fill(cover: &LandCover) -> [u8; 4] {
    match cover {
        LandCover::Natural(kind) => match kind {
            NaturalKind::Wood => [66, 122, 78, 105],
            NaturalKind::Scrub => [102, 136, 92, 90],
            NaturalKind::Heath => [125, 118, 87, 85],
            NaturalKind::Grassland => [121, 142, 95, 80],
            NaturalKind::Wetland => [79, 126, 126, 100],
            NaturalKind::Water => [62, 108, 156, 120],
            NaturalKind::Beach => [175, 162, 116, 80],
            NaturalKind::Sand => [169, 156, 114, 80],
            NaturalKind::BareRock => [112, 112, 112, 75],
            NaturalKind::Other(_) => [96, 128, 96, 70],
        },
        LandCover::Landuse(kind) => match kind {
            LanduseKind::Forest => [64, 118, 73, 105],
            LanduseKind::Farmland => [126, 141, 95, 85],
            LanduseKind::Meadow => [117, 142, 99, 80],
            LanduseKind::Grass => [108, 138, 96, 80],
            LanduseKind::RecreationGround => [109, 143, 101, 85],
            LanduseKind::Residential => [120, 126, 132, 55],
            LanduseKind::Industrial => [128, 122, 116, 65],
            LanduseKind::Commercial => [134, 127, 122, 65],
            LanduseKind::Cemetery => [108, 133, 102, 80],
            LanduseKind::Other(_) => [108, 130, 101, 65],
        },
    }
}
