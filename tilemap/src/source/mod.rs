//! Consumer-facing tile source.
//!
//! [`TileSource`] is the contract a map-rendering consumer interacts with.
//! It hides the fetch worker's channel plumbing behind a fire-and-forget
//! request surface, supplies the URL policy through a pluggable
//! [`UrlScheme`], and hands back decoded images.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tilemap::{OsmScheme, TileSource, TileSourceConfig};
//!
//! let mut source = TileSource::new(
//!     Arc::new(OsmScheme::new()),
//!     TileSourceConfig::default(),
//! ).await?;
//!
//! source.request_tile(4376, 2932, 13);
//! while let Some(tile) = source.next_tile().await {
//!     // composite tile.image at tile.key
//! }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, ImageFormat};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{CacheError, DiskTileCache, DEFAULT_MAX_SIZE_BYTES};
use crate::coord::TileKey;
use crate::fetch::{FetchCommand, HttpClient, ReqwestClient, TileFetched, TileFetchWorker};
use crate::scheme::UrlScheme;

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Default minimum zoom level served.
pub const DEFAULT_MIN_ZOOM: u8 = 2;

/// Default maximum zoom level served.
pub const DEFAULT_MAX_ZOOM: u8 = 18;

/// Default network-level request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while constructing a [`TileSource`].
///
/// Per-tile failures are never errors; they surface only as the absence of
/// a delivered tile.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The disk cache could not be opened.
    #[error("failed to open tile cache: {0}")]
    Cache(#[from] CacheError),

    /// The HTTP client could not be built.
    #[error("failed to create HTTP client: {0}")]
    Http(String),

    /// No cache directory was configured and the platform has no default.
    #[error("no platform cache directory available")]
    NoCacheDir,
}

/// Construction-time configuration for a [`TileSource`].
///
/// Immutable once the source is built.
#[derive(Debug, Clone)]
pub struct TileSourceConfig {
    /// Tile edge length in pixels.
    pub tile_size: u32,
    /// Lowest zoom level requests are accepted for.
    pub min_zoom: u8,
    /// Highest zoom level requests are accepted for.
    pub max_zoom: u8,
    /// Cache directory; `None` uses the platform cache location.
    pub cache_dir: Option<PathBuf>,
    /// Maximum total size of the disk cache in bytes.
    pub cache_size_bytes: u64,
    /// `User-Agent` header sent with every tile request.
    pub user_agent: String,
    /// Image codec the tile server delivers.
    pub image_format: ImageFormat,
    /// Network-level request timeout.
    pub request_timeout: Duration,
}

impl Default for TileSourceConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            cache_dir: None,
            cache_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            user_agent: format!("tilemap/{}", env!("CARGO_PKG_VERSION")),
            image_format: ImageFormat::Png,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// A decoded tile delivered to the consumer.
#[derive(Debug)]
pub struct TileImage {
    /// The tile this image belongs to.
    pub key: TileKey,
    /// Decoded raster image, immutable after creation.
    pub image: DynamicImage,
}

/// Asynchronous tile source backed by a fetch worker and a disk cache.
///
/// Requests are fire-and-forget: [`request_tile`](Self::request_tile)
/// returns immediately and delivery happens through
/// [`next_tile`](Self::next_tile). Tiles that fail to download or decode
/// are simply never delivered; a later request for the same tile retries.
pub struct TileSource {
    /// URL policy.
    scheme: Arc<dyn UrlScheme>,

    /// Immutable configuration.
    config: TileSourceConfig,

    /// Command channel into the worker.
    command_tx: mpsc::Sender<FetchCommand>,

    /// Event channel out of the worker.
    events_rx: mpsc::UnboundedReceiver<TileFetched>,

    /// The worker task, for graceful shutdown.
    worker: JoinHandle<()>,
}

impl TileSource {
    /// Build a source with a reqwest-backed HTTP client.
    ///
    /// Opens the disk cache and spawns the fetch worker; the current tokio
    /// runtime hosts the worker task.
    ///
    /// # Arguments
    ///
    /// * `scheme` - URL policy mapping coordinates to tile URLs
    /// * `config` - Construction-time configuration
    ///
    /// # Errors
    ///
    /// Returns `SourceError` if the cache directory cannot be opened or the
    /// HTTP client cannot be built.
    pub async fn new(
        scheme: Arc<dyn UrlScheme>,
        config: TileSourceConfig,
    ) -> Result<Self, SourceError> {
        let client = ReqwestClient::new(&config.user_agent, config.request_timeout)
            .map_err(|e| SourceError::Http(e.to_string()))?;
        Self::with_client(scheme, config, client).await
    }

    /// Build a source with a caller-supplied HTTP client.
    ///
    /// Useful for injecting an instrumented or mock client.
    pub async fn with_client<C: HttpClient + Clone>(
        scheme: Arc<dyn UrlScheme>,
        config: TileSourceConfig,
        client: C,
    ) -> Result<Self, SourceError> {
        let cache_dir = match &config.cache_dir {
            Some(dir) => dir.clone(),
            None => dirs::cache_dir()
                .map(|d| d.join("tilemap"))
                .ok_or(SourceError::NoCacheDir)?,
        };

        let cache = DiskTileCache::open(&cache_dir, config.cache_size_bytes).await?;
        let (worker, command_tx, events_rx) = TileFetchWorker::new(cache, client);
        let worker = tokio::spawn(worker.run());

        Ok(Self {
            scheme,
            config,
            command_tx,
            events_rx,
            worker,
        })
    }

    /// The URL the configured scheme resolves this coordinate to.
    pub fn url(&self, x: u32, y: u32, zoom: u8) -> String {
        self.scheme.url(x, y, zoom)
    }

    /// Request a tile; returns immediately without a result.
    ///
    /// Delivery, if the tile can be acquired, happens via
    /// [`next_tile`](Self::next_tile). Requests outside the configured zoom
    /// range are dropped.
    pub fn request_tile(&self, x: u32, y: u32, zoom: u8) {
        if zoom < self.config.min_zoom || zoom > self.config.max_zoom {
            warn!(x, y, zoom, "tile request outside configured zoom range, dropping");
            return;
        }

        let key = TileKey::new(x, y, zoom);
        let url = self.scheme.url(x, y, zoom);
        self.send(FetchCommand::Fetch { key, url });
    }

    /// Cancel the pending download of one tile; no-op if none is pending.
    pub fn abort_tile(&self, x: u32, y: u32, zoom: u8) {
        self.send(FetchCommand::Abort(TileKey::new(x, y, zoom)));
    }

    /// Cancel every pending download.
    pub fn abort_all_requests(&self) {
        self.send(FetchCommand::AbortAll);
    }

    /// Await the next decoded tile.
    ///
    /// Payloads that fail to decode are discarded silently, matching the
    /// treatment of network failures. Returns `None` once the worker has
    /// stopped.
    pub async fn next_tile(&mut self) -> Option<TileImage> {
        loop {
            let TileFetched { key, data } = self.events_rx.recv().await?;
            match image::load_from_memory_with_format(&data, self.config.image_format) {
                Ok(image) => return Some(TileImage { key, image }),
                Err(e) => {
                    debug!(%key, error = %e, "discarding undecodable tile");
                }
            }
        }
    }

    /// Stop the worker, cancelling pending downloads, and wait for it.
    pub async fn shutdown(self) {
        let Self {
            command_tx,
            events_rx,
            worker,
            ..
        } = self;
        drop(command_tx);
        drop(events_rx);
        let _ = worker.await;
    }

    /// Tile edge length in pixels.
    pub fn tile_size(&self) -> u32 {
        self.config.tile_size
    }

    /// Lowest accepted zoom level.
    pub fn min_zoom(&self) -> u8 {
        self.config.min_zoom
    }

    /// Highest accepted zoom level.
    pub fn max_zoom(&self) -> u8 {
        self.config.max_zoom
    }

    /// Image codec tiles are decoded with.
    pub fn image_format(&self) -> ImageFormat {
        self.config.image_format
    }

    /// Send a command; the worker going away only costs us that command.
    fn send(&self, cmd: FetchCommand) {
        if self.command_tx.try_send(cmd).is_err() {
            warn!("fetch worker unavailable, dropping command");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MockHttpClient;
    use crate::scheme::OsmScheme;
    use tempfile::tempdir;
    use tokio::time::timeout;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([255, 0, 0, 255]));
        let mut buf = std::io::Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn test_config(dir: &std::path::Path) -> TileSourceConfig {
        TileSourceConfig {
            cache_dir: Some(dir.to_path_buf()),
            ..TileSourceConfig::default()
        }
    }

    async fn test_source(client: Arc<MockHttpClient>, dir: &std::path::Path) -> TileSource {
        TileSource::with_client(Arc::new(OsmScheme::new()), test_config(dir), client)
            .await
            .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = TileSourceConfig::default();
        assert_eq!(config.tile_size, 256);
        assert_eq!(config.min_zoom, 2);
        assert_eq!(config.max_zoom, 18);
        assert_eq!(config.cache_size_bytes, 100 * 1024 * 1024);
        assert_eq!(config.image_format, ImageFormat::Png);
        assert!(config.user_agent.starts_with("tilemap/"));
    }

    #[tokio::test]
    async fn test_request_tile_delivers_decoded_image() {
        let dir = tempdir().unwrap();
        let client = Arc::new(MockHttpClient::ok(png_bytes()));
        let mut source = test_source(Arc::clone(&client), dir.path()).await;

        source.request_tile(1, 2, 3);

        let tile = timeout(Duration::from_secs(1), source.next_tile())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tile.key, TileKey::new(1, 2, 3));
        assert_eq!(tile.image.width(), 4);
        assert_eq!(tile.image.height(), 4);
        assert_eq!(client.calls(), 1);

        source.shutdown().await;
    }

    #[tokio::test]
    async fn test_corrupt_bytes_produce_no_tile() {
        let dir = tempdir().unwrap();
        let client = Arc::new(MockHttpClient::ok(vec![0, 1, 2, 3]));
        let mut source = test_source(Arc::clone(&client), dir.path()).await;

        source.request_tile(1, 2, 3);

        // Decode failure is treated like a fetch failure: nothing arrives.
        assert!(timeout(Duration::from_millis(100), source.next_tile())
            .await
            .is_err());
        assert_eq!(client.calls(), 1);

        source.shutdown().await;
    }

    #[tokio::test]
    async fn test_out_of_range_zoom_is_dropped() {
        let dir = tempdir().unwrap();
        let client = Arc::new(MockHttpClient::ok(png_bytes()));
        let mut source = test_source(Arc::clone(&client), dir.path()).await;

        source.request_tile(0, 0, 1);
        source.request_tile(0, 0, 19);

        assert!(timeout(Duration::from_millis(100), source.next_tile())
            .await
            .is_err());
        assert_eq!(client.calls(), 0);

        source.shutdown().await;
    }

    #[tokio::test]
    async fn test_cached_tile_survives_source_restart() {
        let dir = tempdir().unwrap();
        let client = Arc::new(MockHttpClient::ok(png_bytes()));

        let mut source = test_source(Arc::clone(&client), dir.path()).await;
        source.request_tile(1, 2, 3);
        assert!(timeout(Duration::from_secs(1), source.next_tile())
            .await
            .unwrap()
            .is_some());
        source.shutdown().await;

        // A fresh source over the same cache dir serves from disk.
        let client2 = Arc::new(MockHttpClient::ok(png_bytes()));
        let mut source = test_source(Arc::clone(&client2), dir.path()).await;
        source.request_tile(1, 2, 3);
        assert!(timeout(Duration::from_secs(1), source.next_tile())
            .await
            .unwrap()
            .is_some());
        assert_eq!(client2.calls(), 0);

        source.shutdown().await;
    }

    #[tokio::test]
    async fn test_abort_all_with_nothing_pending_is_noop() {
        let dir = tempdir().unwrap();
        let client = Arc::new(MockHttpClient::ok(png_bytes()));
        let mut source = test_source(Arc::clone(&client), dir.path()).await;

        source.abort_all_requests();
        source.abort_tile(5, 5, 5);

        // Still operational.
        source.request_tile(1, 2, 3);
        assert!(timeout(Duration::from_secs(1), source.next_tile())
            .await
            .unwrap()
            .is_some());

        source.shutdown().await;
    }

    #[tokio::test]
    async fn test_url_uses_scheme() {
        let dir = tempdir().unwrap();
        let client = Arc::new(MockHttpClient::ok(png_bytes()));
        let source = test_source(client, dir.path()).await;

        assert_eq!(
            source.url(4376, 2932, 13),
            "https://tile.openstreetmap.org/13/4376/2932.png"
        );

        source.shutdown().await;
    }

    #[tokio::test]
    async fn test_config_accessors() {
        let dir = tempdir().unwrap();
        let client = Arc::new(MockHttpClient::ok(png_bytes()));
        let source = test_source(client, dir.path()).await;

        assert_eq!(source.tile_size(), 256);
        assert_eq!(source.min_zoom(), 2);
        assert_eq!(source.max_zoom(), 18);
        assert_eq!(source.image_format(), ImageFormat::Png);

        source.shutdown().await;
    }
}
