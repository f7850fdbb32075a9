//! Vector elements to RGBA bitmap
//!
//! Rendering is a pure function of its inputs: no clock, no randomness and
//! a draw order fixed by element order, so identical inputs always produce
//! byte-identical buffers.
//!
//! Layering is part of the contract: every land-area fill is drawn before
//! any road stroke, so roads always sit on top of land cover. Within each
//! layer, ways are drawn in the order the upstream returned them.

use super::canvas::RgbaCanvas;
use super::style::{land_fill, RoadStyle};
use crate::constants::ROAD_STROKE_ALPHA;
use crate::core::geo::{BoundingBox, LatLng};
use crate::core::lod::Lod;
use crate::osm::element::{Node, VectorElement, Way};
use crate::prelude::HashMap;
use crate::{ChunkError, Result};

/// Output of one render call
#[derive(Debug, Clone, PartialEq)]
pub struct RasterTile {
    pub width: u32,
    pub height: u32,
    /// Row-major straight RGBA, top row first
    pub rgba: Vec<u8>,
    /// Road ways that were stroked
    pub way_count: u32,
    /// Closed land areas that were filled
    pub land_area_count: u32,
}

/// Linear lat/lng to pixel mapping over a bounding box.
///
/// This is a plain equirectangular crop: `(south, west)` lands on the
/// bottom-left pixel and `(north, east)` on the top-right one.
#[derive(Debug, Clone, Copy)]
pub struct PixelProjection {
    bbox: BoundingBox,
    width: u32,
    height: u32,
}

impl PixelProjection {
    pub fn new(bbox: BoundingBox, width: u32, height: u32) -> Self {
        Self {
            bbox,
            width,
            height,
        }
    }

    pub fn project(&self, point: &LatLng) -> (f64, f64) {
        let lng_span = self.bbox.east - self.bbox.west;
        let lat_span = self.bbox.north - self.bbox.south;
        let x = (point.lng - self.bbox.west) / lng_span * (self.width as f64 - 1.0);
        let y = (self.bbox.north - point.lat) / lat_span * (self.height as f64 - 1.0);
        (x, y)
    }
}

/// Render `elements` into a `size`×`size` tile covering `bbox`.
///
/// Ways referencing a node that is not present in `elements` are dropped.
/// Closed `natural`/`landuse` ways are filled, `highway` ways are stroked
/// with an LoD-dependent width.
///
/// Fails with [`ChunkError::RenderFailure`] on a degenerate box, a zero size
/// or a node with non-finite coordinates.
pub fn rasterize(
    bbox: &BoundingBox,
    elements: &[VectorElement],
    size: u32,
    lod: Lod,
) -> Result<RasterTile> {
    if size == 0 {
        return Err(ChunkError::RenderFailure("pixel size must be positive".into()));
    }
    if !(bbox.north - bbox.south > 0.0) || !(bbox.east - bbox.west > 0.0) {
        return Err(ChunkError::RenderFailure(format!(
            "degenerate bounding box {:?}",
            bbox
        )));
    }

    let nodes = index_nodes(elements)?;
    let projection = PixelProjection::new(*bbox, size, size);
    let mut canvas = RgbaCanvas::new(size, size);

    let ways: Vec<&Way> = elements
        .iter()
        .filter_map(|element| match element {
            VectorElement::Way(way) => Some(way),
            _ => None,
        })
        .collect();

    let mut land_area_count = 0;
    for way in &ways {
        let Some(cover) = way.land_cover() else {
            continue;
        };
        let Some(points) = resolve(way, &nodes) else {
            continue;
        };
        if !is_closed(&points) {
            continue;
        }
        let pixels: Vec<(f64, f64)> = points.iter().map(|p| projection.project(p)).collect();
        canvas.fill_polygon(&pixels, land_fill(&cover));
        land_area_count += 1;
    }

    let mut way_count = 0;
    for way in &ways {
        let Some(class) = way.road_class() else {
            continue;
        };
        let Some(points) = resolve(way, &nodes) else {
            continue;
        };
        if points.len() < 2 {
            continue;
        }
        let style = RoadStyle::for_lod(&class, lod);
        let [r, g, b] = style.color;
        let rgba = [r, g, b, ROAD_STROKE_ALPHA];
        for pair in points.windows(2) {
            let from = projection.project(&pair[0]);
            let to = projection.project(&pair[1]);
            canvas.draw_segment(from, to, style.width as f64, rgba);
        }
        way_count += 1;
    }

    log::debug!(
        "rasterized {} {}px tile: {} roads, {} land areas",
        lod,
        size,
        way_count,
        land_area_count
    );

    Ok(RasterTile {
        width: size,
        height: size,
        rgba: canvas.into_pixels(),
        way_count,
        land_area_count,
    })
}

fn index_nodes(elements: &[VectorElement]) -> Result<HashMap<i64, LatLng>> {
    let mut nodes = HashMap::default();
    for element in elements {
        if let VectorElement::Node(Node { id, lat, lon }) = element {
            if !lat.is_finite() || !lon.is_finite() {
                return Err(ChunkError::RenderFailure(format!(
                    "node {} has non-finite coordinates",
                    id
                )));
            }
            nodes.insert(*id, LatLng::new(*lat, LatLng::wrap_lng(*lon)));
        }
    }
    Ok(nodes)
}

/// All node positions of `way`, or `None` if any reference is dangling
fn resolve(way: &Way, nodes: &HashMap<i64, LatLng>) -> Option<Vec<LatLng>> {
    way.nodes.iter().map(|id| nodes.get(id).copied()).collect()
}

/// A ring needs at least three distinct corners plus the repeated first node
fn is_closed(points: &[LatLng]) -> bool {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() >= 4 => {
            first.lat == last.lat && first.lng == last.lng
        }
        _ => false,
    }
}
