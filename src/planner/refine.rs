use super::chunk::{ChunkSpec, TopChunkId};
use super::CameraState;
use crate::core::config::PlannerConfig;
use crate::core::geo::{BoundingBox, LatLng, Quadrant};

/// Decides which chunks should exist for a camera position.
///
/// Planning is a pure function of the config and the camera: the same
/// inputs always give the same specs in the same order.
#[derive(Debug, Clone)]
pub struct ChunkPlanner {
    config: PlannerConfig,
}

impl ChunkPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Whether the camera is close enough to the region for chunks at all
    pub fn is_active(&self, camera: &CameraState) -> bool {
        camera.is_valid()
            && camera.altitude < self.config.activation_altitude
            && self.config.region.center().angular_distance_deg(&camera.focus())
                <= self.config.max_focus_distance_deg
    }

    /// Grid cell containing `point`
    pub fn top_chunk_at(&self, point: &LatLng) -> TopChunkId {
        let region = &self.config.region;
        let x = ((point.lng - region.west) / region.width_deg()).floor();
        let y = ((point.lat - region.south) / region.height_deg()).floor();
        TopChunkId::new(x as i32, y as i32)
    }

    /// Box of a grid cell, or `None` if it would cross the antimeridian or a
    /// pole
    pub fn top_chunk_bounds(&self, id: TopChunkId) -> Option<BoundingBox> {
        let region = &self.config.region;
        let dx = id.x as f64 * region.width_deg();
        let dy = id.y as f64 * region.height_deg();
        let (west, east) = (region.west + dx, region.east + dx);
        let (south, north) = (region.south + dy, region.north + dy);
        if west < -180.0 || east > 180.0 || south < -90.0 || north > 90.0 {
            return None;
        }
        Some(BoundingBox {
            south,
            west,
            north,
            east,
        })
    }

    /// The focus cell and its ring of neighbours, row by row from the south
    pub fn top_chunks_for(&self, camera: &CameraState) -> Vec<TopChunkId> {
        let center = self.top_chunk_at(&camera.focus());
        let n = self.config.neighborhood as i32;
        (-n..=n)
            .flat_map(|dy| (-n..=n).map(move |dx| TopChunkId::new(center.x + dx, center.y + dy)))
            .collect()
    }

    /// Full plan for a camera: empty unless the overlay is active
    pub fn plan(&self, camera: &CameraState) -> Vec<ChunkSpec> {
        if !self.is_active(camera) {
            log::debug!("planner inactive at {:?}", camera);
            return Vec::new();
        }
        let specs: Vec<ChunkSpec> = self
            .top_chunks_for(camera)
            .into_iter()
            .flat_map(|top| self.plan_top_chunk(top, camera))
            .collect();
        log::debug!("planned {} chunks at altitude {}", specs.len(), camera.altitude);
        specs
    }

    /// Leaves of one top chunk; empty if the cell is rejected
    pub fn plan_top_chunk(&self, top: TopChunkId, camera: &CameraState) -> Vec<ChunkSpec> {
        match self.top_chunk_bounds(top) {
            Some(bounds) => self.plan_region(bounds, top, camera),
            None => {
                log::debug!("rejecting top chunk {} outside the globe", top);
                Vec::new()
            }
        }
    }

    /// Leaves of the refinement tree rooted at `bounds`.
    ///
    /// The leaves tile `bounds` exactly: every branch splits into all four
    /// quadrants and every unsplit node is emitted once.
    pub fn plan_region(
        &self,
        bounds: BoundingBox,
        top: TopChunkId,
        camera: &CameraState,
    ) -> Vec<ChunkSpec> {
        if self.config.levels.is_empty() {
            return Vec::new();
        }
        self.visit(bounds, 0, "root".to_string(), top, &camera.focus(), camera.altitude)
    }

    fn visit(
        &self,
        bbox: BoundingBox,
        depth: usize,
        path: String,
        top: TopChunkId,
        focus: &LatLng,
        altitude: f64,
    ) -> Vec<ChunkSpec> {
        let children = bbox.quadrisect();
        if !self.should_refine(depth, &children, focus, altitude) {
            return vec![ChunkSpec::new(bbox, &self.config.levels[depth], top, path)];
        }
        children
            .iter()
            .flat_map(|(quadrant, child)| {
                let child_path = format!("{}.{}", path, quadrant.suffix());
                self.visit(*child, depth + 1, child_path, top, focus, altitude)
            })
            .collect()
    }

    /// Refine iff a finer level exists, the camera is at or below this
    /// level's altitude limit, and the nearest child center is within
    /// `trigger_factor` child half-diagonals of the focus (both inclusive).
    fn should_refine(
        &self,
        depth: usize,
        children: &[(Quadrant, BoundingBox); 4],
        focus: &LatLng,
        altitude: f64,
    ) -> bool {
        let levels = &self.config.levels;
        if depth + 1 >= levels.len() || altitude > levels[depth].max_refine_altitude {
            return false;
        }
        let child_half_diagonal = children[0].1.half_diagonal_deg();
        let nearest = children
            .iter()
            .map(|(_, child)| child.center().angular_distance_deg(focus))
            .fold(f64::INFINITY, f64::min);
        nearest <= child_half_diagonal * self.config.trigger_factor
    }
}
