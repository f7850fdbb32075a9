use clap::Args;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use chunkmap::server::router;
use chunkmap::{ServerConfig, TileCache, UpstreamGateway};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen address; overrides CHUNKMAP_BIND
    #[arg(long)]
    bind: Option<String>,
    /// Durable cache directory; overrides OSM_CHUNK_CACHE_DIR
    #[arg(long)]
    cache_dir: Option<std::path::PathBuf>,
    /// Keep rendered chunks in memory only
    #[arg(long, default_value_t = false)]
    no_disk_cache: bool,
    /// Slower spacing and fewer retries against the public Overpass instance
    #[arg(long, default_value_t = false)]
    low_load: bool,
}

/// Build the tile cache for a server config
pub fn build_cache(config: &ServerConfig) -> TileCache {
    let gateway = Arc::new(UpstreamGateway::new(config.upstream.clone()));
    TileCache::new(config.cache.clone(), gateway)
}

pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = ServerConfig::from_env();
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(dir) = args.cache_dir {
        config.cache.durable_dir = Some(dir);
    }
    if args.no_disk_cache {
        config.cache.durable_dir = None;
    }
    if args.low_load {
        config = config.with_low_load();
    }

    log::info!(
        "upstream {:?}, spacing {:?}, {} retries",
        config.upstream.endpoints,
        config.upstream.min_interval,
        config.upstream.max_retries
    );
    match &config.cache.durable_dir {
        Some(dir) => log::info!("durable chunk cache at {}", dir.display()),
        None => log::info!("durable chunk cache disabled"),
    }

    let app = router(build_cache(&config)).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    log::info!("listening on http://{}/osm/chunk", config.bind);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("chunk server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for ctrl-c: {}", err);
        std::future::pending::<()>().await;
    }
    log::info!("shutting down");
}
