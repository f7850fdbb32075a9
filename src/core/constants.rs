//! Engine-wide constants for chunk planning, caching and rendering.
//! Keeping them in a single place makes it easier to tweak the magic numbers.

/// Smallest accepted square tile edge in pixels.
pub const MIN_PIXEL_SIZE: u32 = 64;

/// Largest accepted square tile edge in pixels.
pub const MAX_PIXEL_SIZE: u32 = 4096;

/// Tile edge used when a request does not name one.
pub const DEFAULT_PIXEL_SIZE: u32 = 128;

/// Bumped whenever the payload layout or rendering changes meaning.
pub const CACHE_SCHEMA_VERSION: u32 = 2;

/// Decimal places kept when quantizing bbox coordinates into cache keys.
pub const CACHE_KEY_PRECISION: usize = 4;

/// Opacity of every road stroke stamp.
pub const ROAD_STROKE_ALPHA: u8 = 215;

/// Overpass server-side query timeout in seconds.
pub const OVERPASS_QUERY_TIMEOUT_SECS: u32 = 25;

/// Default public Overpass endpoint.
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// The upstream spacing is never allowed below this floor.
pub const MIN_UPSTREAM_INTERVAL_MS: u64 = 250;

/// Area of interest the planner refines by default (Aberdeen, Scotland).
pub const DEFAULT_REGION: (f64, f64, f64, f64) = (56.85, -2.62, 57.42, -1.72);
