use clap::{Parser, Subcommand};

mod load_test;
mod serve;

/// Adaptive OSM chunk server
#[derive(Parser, Debug)]
#[command(name = "chunkmap-server", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve `GET /osm/chunk`
    Serve(serve::ServeArgs),
    /// Fire a grid of chunk requests and print a summary
    LoadTest(load_test::LoadTestArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Serve(args) => serve::run(args).await,
        Command::LoadTest(args) => load_test::run(args).await,
    }
}
