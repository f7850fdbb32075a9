//! Software rasterization of tagged OSM ways into RGBA tiles

pub mod canvas;
pub mod rasterizer;
pub mod style;

pub use canvas::RgbaCanvas;
pub use rasterizer::{rasterize, RasterTile};
