use async_trait::async_trait;
use clap::{Args, ValueEnum};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chunkmap::core::geo::LatLng;
use chunkmap::tiles::payload::TilePayload;
use chunkmap::traits::ChunkFetcher;
use chunkmap::{
    BoundingBox, ChunkRequest, HttpChunkFetcher, Lod, OrchestratorConfig, ServerConfig, TileCache,
};

use crate::serve::build_cache;

/// Longest error message kept in the summary
const MAX_ERROR_LEN: usize = 220;
const TOP_ERRORS: usize = 5;
const SAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Go through a running chunk server
    Api,
    /// Resolve in-process against a fresh tile cache
    Direct,
}

#[derive(Args, Debug)]
pub struct LoadTestArgs {
    #[arg(long, value_enum, default_value_t = Mode::Api)]
    mode: Mode,
    /// Chunk server for `api` mode; defaults to the client's configured server
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long, default_value_t = 56.11, allow_negative_numbers = true)]
    lat: f64,
    #[arg(long, default_value_t = -2.93, allow_negative_numbers = true)]
    lng: f64,
    /// Edge length of each requested box in degrees
    #[arg(long, default_value_t = 6.0)]
    tile_size: f64,
    /// Rings around the center box; 1 gives a 3x3 grid
    #[arg(long, default_value_t = 1)]
    grid: i32,
    #[arg(long, default_value_t = Lod::Medium)]
    lod: Lod,
    #[arg(long, default_value_t = 2)]
    concurrency: usize,
    #[arg(long, default_value_t = 96)]
    pixel_size: u32,
}

/// One box of the request grid, with its offset from the center
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    pub x: i32,
    pub y: i32,
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

/// `(2 * grid + 1)^2` boxes centered on `(lat, lng)`, south row first.
///
/// West edges are wrapped and latitudes clamped, so boxes near the seam or
/// the poles may still be rejected by the server.
pub fn grid_cells(lat: f64, lng: f64, tile_size: f64, grid: i32) -> Vec<GridCell> {
    let mut cells = Vec::new();
    for y in -grid..=grid {
        for x in -grid..=grid {
            let south = (lat + y as f64 * tile_size - tile_size / 2.0).max(-90.0);
            let north = (south + tile_size).min(90.0);
            let west = LatLng::wrap_lng(lng + x as f64 * tile_size - tile_size / 2.0);
            cells.push(GridCell {
                x,
                y,
                south,
                west,
                north,
                east: west + tile_size,
            });
        }
    }
    cells
}

/// Outcome of one request
#[derive(Debug, Clone)]
pub struct Sample {
    pub cell: GridCell,
    pub elapsed_ms: u64,
    pub result: Result<TilePayload, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorCount {
    pub count: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub ok: usize,
    pub failed: usize,
    pub avg_latency_ms: u64,
    pub way_count_sum: u64,
    pub way_count_avg: f64,
    pub empty_tiles: usize,
    pub stale_count: usize,
    pub top_errors: Vec<ErrorCount>,
}

pub fn summarize(samples: &[Sample]) -> Summary {
    let payloads: Vec<&TilePayload> = samples.iter().filter_map(|s| s.result.as_ref().ok()).collect();
    let way_counts: Vec<u64> = payloads.iter().map(|p| p.meta.way_count as u64).collect();
    let way_count_sum: u64 = way_counts.iter().sum();

    let avg_latency_ms = if samples.is_empty() {
        0
    } else {
        let total: u64 = samples.iter().map(|s| s.elapsed_ms).sum();
        (total as f64 / samples.len() as f64).round() as u64
    };
    let way_count_avg = if way_counts.is_empty() {
        0.0
    } else {
        (way_count_sum as f64 / way_counts.len() as f64 * 100.0).round() / 100.0
    };

    let mut errors: HashMap<String, usize> = HashMap::new();
    for sample in samples {
        if let Err(message) = &sample.result {
            let key: String = message.chars().take(MAX_ERROR_LEN).collect();
            *errors.entry(key).or_default() += 1;
        }
    }
    let mut top_errors: Vec<ErrorCount> = errors
        .into_iter()
        .map(|(message, count)| ErrorCount { count, message })
        .collect();
    top_errors.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.message.cmp(&b.message)));
    top_errors.truncate(TOP_ERRORS);

    Summary {
        total: samples.len(),
        ok: payloads.len(),
        failed: samples.len() - payloads.len(),
        avg_latency_ms,
        way_count_sum,
        way_count_avg,
        empty_tiles: way_counts.iter().filter(|&&count| count == 0).count(),
        stale_count: payloads.iter().filter(|p| p.meta.stale).count(),
        top_errors,
    }
}

/// Resolves chunks against an in-process cache
struct LocalFetcher {
    cache: TileCache,
}

#[async_trait]
impl ChunkFetcher for LocalFetcher {
    async fn fetch_chunk(&self, request: &ChunkRequest) -> chunkmap::Result<TilePayload> {
        self.cache.resolve(request).await
    }
}

async fn request_cell(
    fetcher: &dyn ChunkFetcher,
    cell: GridCell,
    lod: Lod,
    pixel_size: u32,
) -> Sample {
    let started = Instant::now();
    let result = match BoundingBox::normalized(cell.south, cell.west, cell.north, cell.east) {
        Ok(bbox) => fetcher
            .fetch_chunk(&ChunkRequest::new(bbox, lod, pixel_size))
            .await
            .map_err(|err| err.to_string()),
        Err(err) => Err(err.to_string()),
    };
    Sample {
        cell,
        elapsed_ms: started.elapsed().as_millis() as u64,
        result,
    }
}

pub async fn run(args: LoadTestArgs) -> anyhow::Result<()> {
    let fetcher: Arc<dyn ChunkFetcher> = match args.mode {
        Mode::Api => {
            let mut config = OrchestratorConfig::default();
            if let Some(base_url) = args.base_url.clone() {
                config.base_url = base_url;
            }
            Arc::new(HttpChunkFetcher::from_config(&config))
        }
        Mode::Direct => Arc::new(LocalFetcher {
            cache: build_cache(&ServerConfig::from_env()),
        }),
    };
    let cells = grid_cells(args.lat, args.lng, args.tile_size, args.grid);
    log::info!(
        "load test: {} boxes of {}deg at {} via {:?}, concurrency {}",
        cells.len(),
        args.tile_size,
        args.lod,
        args.mode,
        args.concurrency
    );

    let started = Instant::now();
    let (lod, pixel_size) = (args.lod, args.pixel_size);
    let samples: Vec<Sample> = stream::iter(cells)
        .map(|cell| {
            let fetcher = Arc::clone(&fetcher);
            async move { request_cell(fetcher.as_ref(), cell, lod, pixel_size).await }
        })
        .buffered(args.concurrency.max(1))
        .collect()
        .await;

    let summary = summarize(&samples);
    println!("{}", serde_json::to_string_pretty(&summary)?);

    for sample in samples.iter().take(SAMPLES) {
        match &sample.result {
            Ok(payload) => println!(
                "[{},{}] {}ms ways={} land={} stale={} source={:?}",
                sample.cell.x,
                sample.cell.y,
                sample.elapsed_ms,
                payload.meta.way_count,
                payload.meta.land_area_count,
                payload.meta.stale,
                payload.meta.source
            ),
            Err(message) => println!(
                "[{},{}] {}ms error: {}",
                sample.cell.x, sample.cell.y, sample.elapsed_ms, message
            ),
        }
    }
    log::info!("load test finished in {:?}", started.elapsed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkmap::render::rasterizer::RasterTile;

    fn payload(way_count: u32, stale: bool) -> TilePayload {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0).unwrap();
        let request = ChunkRequest::new(bbox, Lod::Medium, 64);
        let raster = RasterTile {
            width: 64,
            height: 64,
            rgba: vec![0; 64 * 64 * 4],
            way_count,
            land_area_count: 0,
        };
        let payload = TilePayload::from_raster(&request, &raster);
        if stale {
            payload.into_stale(1_000)
        } else {
            payload
        }
    }

    fn sample(elapsed_ms: u64, result: Result<TilePayload, String>) -> Sample {
        Sample {
            cell: grid_cells(0.0, 0.0, 1.0, 0)[0],
            elapsed_ms,
            result,
        }
    }

    #[test]
    fn test_grid_is_square_and_south_first() {
        let cells = grid_cells(56.11, -2.93, 6.0, 1);
        assert_eq!(cells.len(), 9);
        assert_eq!((cells[0].x, cells[0].y), (-1, -1));
        assert_eq!((cells[8].x, cells[8].y), (1, 1));

        let center = cells[4];
        assert!((center.south - 53.11).abs() < 1e-9);
        assert!((center.west + 5.93).abs() < 1e-9);
        assert!((center.east - center.west - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_grid_clamps_latitude_and_wraps_longitude() {
        let cells = grid_cells(88.0, 179.0, 6.0, 1);
        assert!(cells.iter().all(|c| c.north <= 90.0 && c.south >= -90.0));
        // x = 1 starts at 179 + 6 - 3 = 182, wrapped to -178
        assert!((cells[2].west + 178.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_counts() {
        let samples = vec![
            sample(10, Ok(payload(4, false))),
            sample(20, Ok(payload(0, true))),
            sample(31, Err("Upstream unavailable: boom".into())),
            sample(40, Err("Upstream unavailable: boom".into())),
            sample(50, Err("x".repeat(300))),
        ];
        let summary = summarize(&samples);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.ok, 2);
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.avg_latency_ms, 30);
        assert_eq!(summary.way_count_sum, 4);
        assert_eq!(summary.way_count_avg, 2.0);
        assert_eq!(summary.empty_tiles, 1);
        assert_eq!(summary.stale_count, 1);
        assert_eq!(summary.top_errors[0].count, 2);
        assert_eq!(summary.top_errors[0].message, "Upstream unavailable: boom");
        assert_eq!(summary.top_errors[1].message.len(), MAX_ERROR_LEN);
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.avg_latency_ms, 0);
        assert_eq!(summary.way_count_avg, 0.0);
        assert!(summary.top_errors.is_empty());
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let json = serde_json::to_value(summarize(&[])).unwrap();
        assert!(json.get("avgLatencyMs").is_some());
        assert!(json.get("topErrors").is_some());
    }
}
