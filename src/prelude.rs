//! Prelude module for common chunkmap types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use chunkmap::prelude::*;`

pub use crate::core::{
    config::{
        OrchestratorConfig, PlannerConfig, ServerConfig, TileCacheConfig, UpstreamConfig,
    },
    geo::{BoundingBox, LatLng, Quadrant},
    lod::{Lod, LodLevel},
};

pub use crate::osm::{LandCover, Node, RoadClass, VectorElement, Way};

pub use crate::planner::{CameraState, ChunkPlanner, ChunkSpec, TopChunkId};

pub use crate::render::rasterizer::{rasterize, RasterTile};

pub use crate::tiles::{
    cache::TileCache,
    payload::{TileImage, TileMeta, TilePayload, TileSource},
    store::{FsStore, MemoryStore},
    ChunkRequest,
};

pub use crate::upstream::{gateway::UpstreamGateway, transport::HttpTransport};

pub use crate::client::{ClientTile, ClientTileOrchestrator, HttpChunkFetcher};

pub use crate::runtime::{Clock, ManualClock, SystemClock};

pub use crate::traits::{ChunkFetcher, DurableStore, ElementSource, TileViewer};

pub use crate::{ChunkError, Error, Result};

pub use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
