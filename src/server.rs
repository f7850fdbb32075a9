//! HTTP surface: `GET /osm/chunk`
//!
//! Query parameters: `south`, `west`, `north`, `east` (required numbers),
//! `lod` (`coarse` when absent) and `pixelSize` (defaulted and clamped).
//! Input errors answer 400, upstream and render failures 502, both with an
//! `{ "error": ... }` body.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::core::geo::BoundingBox;
use crate::core::lod::Lod;
use crate::tiles::cache::TileCache;
use crate::tiles::{resolve_pixel_size, ChunkRequest};
use crate::{ChunkError, Result};

/// Raw query string; every field is text so parse errors become 400s
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkQuery {
    pub south: Option<String>,
    pub west: Option<String>,
    pub north: Option<String>,
    pub east: Option<String>,
    pub lod: Option<String>,
    pub pixel_size: Option<String>,
}

impl ChunkQuery {
    /// Validate into a request with a normalized box
    pub fn into_request(self) -> Result<ChunkRequest> {
        let south = coordinate("south", self.south.as_deref())?;
        let west = coordinate("west", self.west.as_deref())?;
        let north = coordinate("north", self.north.as_deref())?;
        let east = coordinate("east", self.east.as_deref())?;
        let bbox = BoundingBox::normalized(south, west, north, east)?;

        let lod = match self.lod.as_deref().map(str::trim) {
            None | Some("") => Lod::default(),
            Some(label) => label.parse()?,
        };
        let pixel_size = resolve_pixel_size(
            self.pixel_size
                .as_deref()
                .and_then(|raw| raw.trim().parse::<f64>().ok()),
        );
        Ok(ChunkRequest::new(bbox, lod, pixel_size))
    }
}

fn coordinate(name: &str, raw: Option<&str>) -> Result<f64> {
    let raw = raw.ok_or_else(|| ChunkError::InvalidBoundingBox(format!("{} is required", name)))?;
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ChunkError::InvalidBoundingBox(format!(
            "{} must be a number, got '{}'",
            name, raw
        ))),
    }
}

/// Router serving chunks out of `cache`
pub fn router(cache: TileCache) -> Router {
    Router::new()
        .route("/osm/chunk", get(chunk_handler))
        .with_state(cache)
}

pub async fn chunk_handler(
    State(cache): State<TileCache>,
    Query(query): Query<ChunkQuery>,
) -> Response {
    let request = match query.into_request() {
        Ok(request) => request,
        Err(err) => return error_response(err),
    };
    match cache.resolve(&request).await {
        Ok(payload) => Json(payload).into_response(),
        Err(err) => {
            log::warn!("chunk {} failed: {}", request.cache_key(), err);
            error_response(err)
        }
    }
}

fn error_response(err: ChunkError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
    let body = serde_json::json!({ "error": err.to_string() });
    (status, Json(body)).into_response()
}
