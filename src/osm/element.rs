use serde::{Deserialize, Serialize};

use super::tags::{LandCover, LanduseKind, NaturalKind, RoadClass};
use crate::prelude::HashMap;

/// A tagged vector element as returned by the Overpass JSON API.
///
/// Relations and any other element types decode to [`VectorElement::Other`]
/// and are ignored by rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VectorElement {
    Node(Node),
    Way(Way),
    #[serde(other)]
    Other,
}

/// A point with an id, referenced by ways
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
}

/// An ordered list of node references with tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Way {
    pub id: i64,
    #[serde(default)]
    pub nodes: Vec<i64>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl Node {
    pub fn new(id: i64, lat: f64, lon: f64) -> Self {
        Self { id, lat, lon }
    }
}

impl Way {
    pub fn new(id: i64, nodes: Vec<i64>) -> Self {
        Self {
            id,
            nodes,
            tags: HashMap::default(),
        }
    }

    /// Builder-style tag insertion
    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    /// Road class if the way carries a `highway` tag
    pub fn road_class(&self) -> Option<RoadClass> {
        self.tags.get("highway").map(|v| RoadClass::parse(v))
    }

    /// Land cover if the way carries a `natural` or `landuse` tag
    pub fn land_cover(&self) -> Option<LandCover> {
        if let Some(value) = self.tags.get("natural") {
            return Some(LandCover::Natural(NaturalKind::parse(value)));
        }
        self.tags
            .get("landuse")
            .map(|v| LandCover::Landuse(LanduseKind::parse(v)))
    }

    /// Only roads and land areas are rendered
    pub fn is_relevant(&self) -> bool {
        self.tags.contains_key("highway")
            || self.tags.contains_key("natural")
            || self.tags.contains_key("landuse")
    }
}

impl From<Node> for VectorElement {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<Way> for VectorElement {
    fn from(way: Way) -> Self {
        Self::Way(way)
    }
}
