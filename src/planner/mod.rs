//! Camera-driven chunk planning
//!
//! The planner turns a camera position into the set of chunks that should
//! exist: top-level region-sized cells around the focus, each recursively
//! quadrisected toward the focus while the camera is low enough for the
//! next level of detail.

pub mod chunk;
pub mod refine;

pub use crate::core::lod::{Lod, LodLevel};
pub use chunk::{ChunkSpec, TopChunkId};
pub use refine::ChunkPlanner;

use crate::core::geo::LatLng;

/// Where the viewer looks from. `altitude` is a camera-distance proxy:
/// smaller is closer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub lat: f64,
    pub lng: f64,
    pub altitude: f64,
}

impl CameraState {
    pub fn new(lat: f64, lng: f64, altitude: f64) -> Self {
        Self { lat, lng, altitude }
    }

    /// Look-at point with the longitude wrapped into [-180, 180)
    pub fn focus(&self) -> LatLng {
        LatLng::new(self.lat, LatLng::wrap_lng(self.lng))
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite() && self.altitude.is_finite()
    }
}
