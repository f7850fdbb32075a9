use serde::{Deserialize, Serialize};

use crate::{ChunkError, Result};

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Wraps longitude into the half-open range [-180, 180)
    pub fn wrap_lng(lng: f64) -> f64 {
        let wrapped = (lng + 180.0).rem_euclid(360.0) - 180.0;
        // rem_euclid can round up to exactly 360 for tiny negative inputs
        if wrapped >= 180.0 {
            wrapped - 360.0
        } else {
            wrapped
        }
    }

    /// Great-circle angle to `other` in degrees, via the spherical law of cosines.
    pub fn angular_distance_deg(&self, other: &LatLng) -> f64 {
        let a1 = self.lat.to_radians();
        let b1 = self.lng.to_radians();
        let a2 = other.lat.to_radians();
        let b2 = other.lng.to_radians();
        let cos_value = a1.sin() * a2.sin() + a1.cos() * a2.cos() * (b2 - b1).cos();
        cos_value.clamp(-1.0, 1.0).acos().to_degrees()
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// An axis-aligned geographic box in degrees.
///
/// Construction validates `south < north`, `west < east` and that every edge
/// lies inside the latitude/longitude ranges, so a `BoundingBox` never spans
/// the antimeridian or a pole.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Creates a validated bounding box.
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Result<Self> {
        let bbox = Self {
            south,
            west,
            north,
            east,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Creates a bounding box after shifting both longitudes so that `west`
    /// lands in [-180, 180). Boxes that would still cross the seam are rejected.
    pub fn normalized(south: f64, west: f64, north: f64, east: f64) -> Result<Self> {
        if !west.is_finite() || !east.is_finite() {
            return Err(ChunkError::InvalidBoundingBox(
                "longitude is not a finite number".to_string(),
            ));
        }
        let wrapped_west = LatLng::wrap_lng(west);
        let shift = wrapped_west - west;
        Self::new(south, wrapped_west, north, east + shift)
    }

    fn validate(&self) -> Result<()> {
        let edges = [self.south, self.west, self.north, self.east];
        if edges.iter().any(|v| !v.is_finite()) {
            return Err(ChunkError::InvalidBoundingBox(
                "coordinates must be finite numbers".to_string(),
            ));
        }
        if self.south >= self.north {
            return Err(ChunkError::InvalidBoundingBox(format!(
                "south ({}) must be below north ({})",
                self.south, self.north
            )));
        }
        if self.west >= self.east {
            return Err(ChunkError::InvalidBoundingBox(format!(
                "west ({}) must be below east ({})",
                self.west, self.east
            )));
        }
        if self.south < -90.0 || self.north > 90.0 {
            return Err(ChunkError::InvalidBoundingBox(
                "latitude outside [-90, 90]".to_string(),
            ));
        }
        if self.west < -180.0 || self.east > 180.0 {
            return Err(ChunkError::InvalidBoundingBox(
                "longitude outside [-180, 180]".to_string(),
            ));
        }
        Ok(())
    }

    /// Height in degrees of latitude
    pub fn height_deg(&self) -> f64 {
        self.north - self.south
    }

    /// Width in degrees of longitude
    pub fn width_deg(&self) -> f64 {
        self.east - self.west
    }

    /// Gets the center point of the bounds
    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    /// Half of the box diagonal measured in plain degrees.
    pub fn half_diagonal_deg(&self) -> f64 {
        (self.height_deg() / 2.0).hypot(self.width_deg() / 2.0)
    }

    /// Checks if the bounds contain a point (edges inclusive)
    pub fn contains(&self, point: &LatLng) -> bool {
        point.lat >= self.south
            && point.lat <= self.north
            && point.lng >= self.west
            && point.lng <= self.east
    }

    /// Splits the box into its four equal quadrants, in `sw, se, nw, ne` order.
    ///
    /// Siblings share their midlines bit for bit, so the quadrants tile the
    /// parent exactly.
    pub fn quadrisect(&self) -> [(Quadrant, BoundingBox); 4] {
        let mid_lat = (self.south + self.north) / 2.0;
        let mid_lng = (self.west + self.east) / 2.0;
        let make = |south, west, north, east| BoundingBox {
            south,
            west,
            north,
            east,
        };
        [
            (Quadrant::SouthWest, make(self.south, self.west, mid_lat, mid_lng)),
            (Quadrant::SouthEast, make(self.south, mid_lng, mid_lat, self.east)),
            (Quadrant::NorthWest, make(mid_lat, self.west, self.north, mid_lng)),
            (Quadrant::NorthEast, make(mid_lat, mid_lng, self.north, self.east)),
        ]
    }

    /// Area in square degrees (planar, used for coverage checks)
    pub fn area_deg2(&self) -> f64 {
        self.height_deg() * self.width_deg()
    }
}

/// One of the four children produced by [`BoundingBox::quadrisect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    SouthWest,
    SouthEast,
    NorthWest,
    NorthEast,
}

impl Quadrant {
    /// Path suffix used in chunk keys
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::SouthWest => "sw",
            Self::SouthEast => "se",
            Self::NorthWest => "nw",
            Self::NorthEast => "ne",
        }
    }
}
