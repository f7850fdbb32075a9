//! Typed views over the `highway`, `natural` and `landuse` tag values.
//!
//! Every enum ends in an `Other` variant so that unknown values still get a
//! category default style instead of being dropped.

use serde::{Deserialize, Serialize};

/// Road classification from the `highway=*` tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoadClass {
    Motorway,
    Trunk,
    Primary,
    Secondary,
    Tertiary,
    Unclassified,
    Residential,
    Service,
    LivingStreet,
    Road,
    Other(String),
}

impl RoadClass {
    pub fn parse(value: &str) -> Self {
        match value {
            "motorway" => Self::Motorway,
            "trunk" => Self::Trunk,
            "primary" => Self::Primary,
            "secondary" => Self::Secondary,
            "tertiary" => Self::Tertiary,
            "unclassified" => Self::Unclassified,
            "residential" => Self::Residential,
            "service" => Self::Service,
            "living_street" => Self::LivingStreet,
            "road" => Self::Road,
            other => Self::Other(other.to_string()),
        }
    }

    /// The OSM tag value
    pub fn as_str(&self) -> &str {
        match self {
            Self::Motorway => "motorway",
            Self::Trunk => "trunk",
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Tertiary => "tertiary",
            Self::Unclassified => "unclassified",
            Self::Residential => "residential",
            Self::Service => "service",
            Self::LivingStreet => "living_street",
            Self::Road => "road",
            Self::Other(value) => value,
        }
    }
}

/// `natural=*` values with a dedicated fill
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NaturalKind {
    Wood,
    Scrub,
    Heath,
    Grassland,
    Wetland,
    Water,
    Beach,
    Sand,
    BareRock,
    Other(String),
}

impl NaturalKind {
    pub fn parse(value: &str) -> Self {
        match value {
            "wood" => Self::Wood,
            "scrub" => Self::Scrub,
            "heath" => Self::Heath,
            "grassland" => Self::Grassland,
            "wetland" => Self::Wetland,
            "water" => Self::Water,
            "beach" => Self::Beach,
            "sand" => Self::Sand,
            "bare_rock" => Self::BareRock,
            other => Self::Other(other.to_string()),
        }
    }
}

/// `landuse=*` values with a dedicated fill
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LanduseKind {
    Forest,
    Farmland,
    Meadow,
    Grass,
    RecreationGround,
    Residential,
    Industrial,
    Commercial,
    Cemetery,
    Other(String),
}

impl LanduseKind {
    pub fn parse(value: &str) -> Self {
        match value {
            "forest" => Self::Forest,
            "farmland" => Self::Farmland,
            "meadow" => Self::Meadow,
            "grass" => Self::Grass,
            "recreation_ground" => Self::RecreationGround,
            "residential" => Self::Residential,
            "industrial" => Self::Industrial,
            "commercial" => Self::Commercial,
            "cemetery" => Self::Cemetery,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Land cover of an area way. `natural` wins when both tags are present.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LandCover {
    Natural(NaturalKind),
    Landuse(LanduseKind),
}
