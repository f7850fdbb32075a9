//! Overpass QL query building and response decoding

use serde::Deserialize;

use super::element::VectorElement;
use super::tags::RoadClass;
use crate::constants::OVERPASS_QUERY_TIMEOUT_SECS;
use crate::core::geo::BoundingBox;
use crate::Result;

/// Build the query selecting roads of the given classes plus every natural
/// and land-use way inside `bbox`, recursing down to their nodes.
pub fn build_chunk_query(bbox: &BoundingBox, highways: &[RoadClass]) -> String {
    let regex = highways
        .iter()
        .map(RoadClass::as_str)
        .collect::<Vec<_>>()
        .join("|");
    let area = format!("{},{},{},{}", bbox.south, bbox.west, bbox.north, bbox.east);

    format!(
        "[out:json][timeout:{timeout}];\n\
         (\n  \
         way[\"highway\"~\"{regex}\"]({area});\n  \
         way[\"natural\"]({area});\n  \
         way[\"landuse\"]({area});\n\
         );\n\
         (._;>;);\n\
         out body;",
        timeout = OVERPASS_QUERY_TIMEOUT_SECS,
    )
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<VectorElement>,
}

/// Decode an Overpass JSON body, keeping element order.
///
/// Ways without a `highway`, `natural` or `landuse` tag and elements of
/// other types (relations, areas) are dropped.
pub fn parse_elements(body: &str) -> Result<Vec<VectorElement>> {
    let response: OverpassResponse = serde_json::from_str(body)?;
    Ok(response
        .elements
        .into_iter()
        .filter(|element| match element {
            VectorElement::Node(_) => true,
            VectorElement::Way(way) => way.is_relevant(),
            VectorElement::Other => false,
        })
        .collect())
}
