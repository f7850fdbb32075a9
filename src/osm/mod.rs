//! OpenStreetMap element model, tag vocabulary and Overpass query support

pub mod element;
pub mod query;
pub mod tags;

pub use element::{Node, VectorElement, Way};
pub use tags::{LandCover, LanduseKind, NaturalKind, RoadClass};
