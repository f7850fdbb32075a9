//! Levels of detail and what each one includes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::osm::tags::RoadClass;
use crate::ChunkError;

/// Rendering fidelity of a chunk, ordered coarse to fine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lod {
    Coarse,
    Medium,
    Fine,
}

impl Lod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coarse => "coarse",
            Self::Medium => "medium",
            Self::Fine => "fine",
        }
    }

    /// Road classes fetched and drawn at this level
    pub fn highways(&self) -> Vec<RoadClass> {
        let mut classes = vec![RoadClass::Motorway, RoadClass::Trunk, RoadClass::Primary];
        if *self >= Self::Medium {
            classes.extend([RoadClass::Secondary, RoadClass::Tertiary]);
        }
        if *self == Self::Fine {
            classes.extend([
                RoadClass::Unclassified,
                RoadClass::Residential,
                RoadClass::Service,
                RoadClass::LivingStreet,
                RoadClass::Road,
            ]);
        }
        classes
    }
}

impl Default for Lod {
    fn default() -> Self {
        Self::Coarse
    }
}

impl fmt::Display for Lod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lod {
    type Err = ChunkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coarse" => Ok(Self::Coarse),
            "medium" => Ok(Self::Medium),
            "fine" => Ok(Self::Fine),
            other => Err(ChunkError::InvalidRequest(format!(
                "unknown lod '{}', expected coarse|medium|fine",
                other
            ))),
        }
    }
}

/// One row of the planner's level table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LodLevel {
    pub lod: Lod,
    /// Camera altitude at or below which this level refines into the next
    pub max_refine_altitude: f64,
    pub pixel_size: u32,
}

impl LodLevel {
    pub fn new(lod: Lod, max_refine_altitude: f64, pixel_size: u32) -> Self {
        Self {
            lod,
            max_refine_altitude,
            pixel_size,
        }
    }

    /// Level table used by the globe viewer
    pub fn default_levels() -> Vec<LodLevel> {
        vec![
            LodLevel::new(Lod::Coarse, 1.25, 1536),
            LodLevel::new(Lod::Medium, 1.12, 1536),
            LodLevel::new(Lod::Fine, 0.68, 2048),
        ]
    }
}
