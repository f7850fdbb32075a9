//! Configuration for the chunk pipeline
//!
//! Each service takes a plain config struct with sensible defaults plus a
//! few named presets. The server binary layers environment variables on top
//! through [`ServerConfig::from_env`].

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{DEFAULT_OVERPASS_URL, DEFAULT_REGION, MIN_UPSTREAM_INTERVAL_MS};
use crate::core::geo::BoundingBox;
use crate::core::lod::LodLevel;

/// Policy for talking to the shared Overpass service
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamConfig {
    /// Equivalent mirrors, tried in round-robin order
    pub endpoints: Vec<String>,
    /// Minimum spacing between any two upstream calls, process-wide
    pub min_interval: Duration,
    /// Extra passes over the mirror list after the first
    pub max_retries: u32,
    pub request_timeout: Duration,
    /// Backoff unit used on 429 when the server sends no retry hint;
    /// the wait is `(attempt + 1) * fallback_backoff`
    pub fallback_backoff: Duration,
    /// Upper bound (exclusive) of the random jitter added to 429 waits
    pub max_jitter: Duration,
    /// Longest a server-provided retry hint is honoured for
    pub max_retry_wait: Duration,
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![DEFAULT_OVERPASS_URL.to_string()],
            min_interval: Duration::from_millis(900),
            max_retries: 2,
            request_timeout: Duration::from_secs(30),
            fallback_backoff: Duration::from_millis(1200),
            max_jitter: Duration::from_millis(300),
            max_retry_wait: Duration::from_secs(60),
            user_agent: format!("chunkmap/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl UpstreamConfig {
    /// Gentler on the public instance: slower spacing, fewer retries
    pub fn low_load() -> Self {
        Self {
            min_interval: Duration::from_millis(2000),
            max_retries: 1,
            ..Default::default()
        }
    }

    /// Fast spacing for tests running on a paused clock
    pub fn for_testing() -> Self {
        Self {
            endpoints: vec!["http://mirror-a.test".to_string()],
            min_interval: Duration::from_millis(10),
            max_retries: 2,
            request_timeout: Duration::from_secs(1),
            fallback_backoff: Duration::from_millis(100),
            max_jitter: Duration::from_millis(300),
            max_retry_wait: Duration::from_secs(5),
            user_agent: "chunkmap-test".to_string(),
        }
    }

    pub fn with_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    /// Total calls one fetch may make before giving up
    pub fn max_attempts(&self) -> usize {
        (self.max_retries as usize + 1) * self.endpoints.len().max(1)
    }
}

/// Freshness tiers and capacity for the server-side tile cache
#[derive(Debug, Clone, PartialEq)]
pub struct TileCacheConfig {
    /// Memory entries younger than this are served as-is
    pub fresh_ttl: Duration,
    /// Memory entries younger than this may be served stale on upstream failure
    pub stale_ttl: Duration,
    /// Durable entries younger than this skip a re-render
    pub durable_ttl: Duration,
    pub memory_capacity: usize,
    /// Directory of the on-disk tier; `None` disables it
    pub durable_dir: Option<PathBuf>,
}

impl Default for TileCacheConfig {
    fn default() -> Self {
        Self {
            fresh_ttl: Duration::from_secs(10 * 60),
            stale_ttl: Duration::from_secs(60 * 60),
            durable_ttl: Duration::from_secs(30 * 24 * 60 * 60),
            memory_capacity: 1024,
            durable_dir: Some(PathBuf::from("cache").join("osm-chunks")),
        }
    }
}

impl TileCacheConfig {
    pub fn for_testing() -> Self {
        Self {
            memory_capacity: 64,
            durable_dir: None,
            ..Default::default()
        }
    }

    /// The durable tier must outlive the stale window
    pub fn normalized(mut self) -> Self {
        if self.durable_ttl < self.stale_ttl {
            self.durable_ttl = self.stale_ttl;
        }
        if self.stale_ttl < self.fresh_ttl {
            self.stale_ttl = self.fresh_ttl;
        }
        self.memory_capacity = self.memory_capacity.max(1);
        self
    }
}

/// Inputs of the adaptive chunk planner
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    /// The area of interest; also the size of one top-level chunk
    pub region: BoundingBox,
    /// Ordered coarse to fine
    pub levels: Vec<LodLevel>,
    /// Multiple of a child's half-diagonal within which the focus triggers refinement
    pub trigger_factor: f64,
    /// Above this camera altitude no chunks are planned at all
    pub activation_altitude: f64,
    /// Focus points farther than this from the region center plan nothing
    pub max_focus_distance_deg: f64,
    /// Ring of neighbouring top-level chunks planned around the focus chunk
    pub neighborhood: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        let (south, west, north, east) = DEFAULT_REGION;
        Self {
            region: BoundingBox {
                south,
                west,
                north,
                east,
            },
            levels: LodLevel::default_levels(),
            trigger_factor: 1.15,
            activation_altitude: 1.8,
            max_focus_distance_deg: 14.0,
            neighborhood: 1,
        }
    }
}

impl PlannerConfig {
    pub fn for_region(region: BoundingBox) -> Self {
        Self {
            region,
            ..Default::default()
        }
    }
}

/// Client-side fetch orchestration
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Maximum chunk fetches in flight at once
    pub concurrency: usize,
    /// Decoded tiles kept resident before the least recently used is released
    pub cache_capacity: usize,
    /// Base URL of the chunk server
    pub base_url: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            cache_capacity: 256,
            base_url: "http://localhost:3001".to_string(),
        }
    }
}

/// Everything the chunk server process needs
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind: String,
    pub upstream: UpstreamConfig,
    pub cache: TileCacheConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3001".to_string(),
            upstream: UpstreamConfig::default(),
            cache: TileCacheConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(bind) = lookup("CHUNKMAP_BIND") {
            config.bind = bind;
        }

        let primary = lookup("OVERPASS_URL").unwrap_or_else(|| DEFAULT_OVERPASS_URL.to_string());
        let mut endpoints = vec![primary];
        if let Some(fallbacks) = lookup("OVERPASS_FALLBACK_URLS") {
            endpoints.extend(
                fallbacks
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            );
        }
        config.upstream.endpoints = endpoints;

        if let Some(ms) = parse_var::<u64, _>(&lookup, "OVERPASS_MIN_INTERVAL_MS") {
            config.upstream.min_interval = Duration::from_millis(ms.max(MIN_UPSTREAM_INTERVAL_MS));
        }
        if let Some(retries) = parse_var::<u32, _>(&lookup, "OVERPASS_MAX_RETRIES") {
            config.upstream.max_retries = retries;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "OSM_CHUNK_DISK_TTL_MS") {
            config.cache.durable_ttl = Duration::from_millis(ms);
        }
        if let Some(dir) = lookup("OSM_CHUNK_CACHE_DIR") {
            config.cache.durable_dir = Some(PathBuf::from(dir));
        }

        config.cache = config.cache.normalized();
        config
    }

    /// Apply the [`UpstreamConfig::low_load`] pacing on top of whatever the
    /// environment set, never making the upstream policy more aggressive
    pub fn with_low_load(mut self) -> Self {
        let gentle = UpstreamConfig::low_load();
        self.upstream.min_interval = self.upstream.min_interval.max(gentle.min_interval);
        self.upstream.max_retries = self.upstream.max_retries.min(gentle.max_retries);
        self
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("ignoring {}={:?}: not a valid number", name, raw);
            None
        }
    }
}
