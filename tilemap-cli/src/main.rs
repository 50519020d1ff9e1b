//! Tilemap CLI - command-line tile fetcher.
//!
//! Thin demonstration harness over the `tilemap` library: resolves a tile
//! coordinate to a URL, fetches it through the cache-backed worker, and
//! writes the decoded image to a file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tilemap::{OsmScheme, SourceError, TileSource, TileSourceConfig, UrlScheme, XyzScheme};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tilemap", version, about = "Fetch slippy-map tiles with a persistent cache")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch one tile and write the decoded image to a file
    Fetch {
        /// Tile column
        x: u32,
        /// Tile row
        y: u32,
        /// Zoom level
        zoom: u8,
        /// Output path (default: tile_<zoom>_<x>_<y>.png)
        #[arg(long)]
        out: Option<PathBuf>,
        /// URL template with {x}, {y}, {z} placeholders (default: OpenStreetMap)
        #[arg(long)]
        template: Option<String>,
        /// Cache directory (default: platform cache location)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        /// Seconds to wait for delivery before giving up
        #[arg(long, default_value_t = 60)]
        wait_secs: u64,
    },
    /// Print the URL a tile coordinate resolves to
    Url {
        /// Tile column
        x: u32,
        /// Tile row
        y: u32,
        /// Zoom level
        zoom: u8,
        /// URL template with {x}, {y}, {z} placeholders (default: OpenStreetMap)
        #[arg(long)]
        template: Option<String>,
    },
}

/// CLI error taxonomy.
#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Source(#[from] SourceError),

    /// The tile never arrived: network failure, decode failure, or an
    /// out-of-range zoom level.
    #[error("tile {0} was not delivered within the wait window")]
    NotDelivered(String),

    #[error("failed to save image: {0}")]
    Save(String),
}

fn scheme_from(template: Option<String>) -> Arc<dyn UrlScheme> {
    match template {
        Some(template) => Arc::new(XyzScheme::new(template)),
        None => Arc::new(OsmScheme::new()),
    }
}

async fn fetch(
    x: u32,
    y: u32,
    zoom: u8,
    out: Option<PathBuf>,
    template: Option<String>,
    cache_dir: Option<PathBuf>,
    wait_secs: u64,
) -> Result<(), CliError> {
    let config = TileSourceConfig {
        cache_dir,
        ..TileSourceConfig::default()
    };
    let mut source = TileSource::new(scheme_from(template), config).await?;

    info!(url = %source.url(x, y, zoom), "requesting tile");
    source.request_tile(x, y, zoom);

    let tile = tokio::time::timeout(Duration::from_secs(wait_secs), source.next_tile())
        .await
        .ok()
        .flatten()
        .ok_or_else(|| CliError::NotDelivered(format!("{zoom}/{x}/{y}")))?;

    let out = out.unwrap_or_else(|| PathBuf::from(format!("tile_{zoom}_{x}_{y}.png")));
    tile.image
        .save(&out)
        .map_err(|e| CliError::Save(e.to_string()))?;

    println!(
        "Saved tile {} ({}x{}) to {}",
        tile.key,
        tile.image.width(),
        tile.image.height(),
        out.display()
    );

    source.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Fetch {
            x,
            y,
            zoom,
            out,
            template,
            cache_dir,
            wait_secs,
        } => fetch(x, y, zoom, out, template, cache_dir, wait_secs).await,
        Command::Url { x, y, zoom, template } => {
            println!("{}", scheme_from(template).url(x, y, zoom));
            Ok(())
        }
    }
}
