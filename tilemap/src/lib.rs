//! Tilemap - asynchronous slippy-map tile acquisition
//!
//! This library provides the tile acquisition subsystem of a pannable,
//! zoomable raster map: given an `(x, y, zoom)` tile coordinate it decides
//! whether to serve a cached image, join an in-flight download, or issue a
//! new network request, and delivers the decoded image back to the consumer
//! asynchronously.
//!
//! # Architecture
//!
//! ```text
//! consumer ──► TileSource::request_tile(x, y, zoom)
//!                  │  (mpsc command channel)
//!                  ▼
//!            TileFetchWorker ──► DiskTileCache hit? ──► emit
//!                  │ miss
//!                  ├── already in flight? ──► drop duplicate
//!                  └── HTTP GET ──► write-through cache ──► emit
//!                  │  (mpsc event channel)
//!                  ▼
//! consumer ◄── TileSource::next_tile() (decoded image)
//! ```
//!
//! The worker task is the sole owner of the cache and the in-flight table;
//! the consumer only ever exchanges messages with it and never blocks on
//! network or disk I/O.

pub mod cache;
pub mod coord;
pub mod fetch;
pub mod scheme;
pub mod source;

pub use cache::{CacheError, DiskTileCache};
pub use coord::TileKey;
pub use fetch::{FetchCommand, FetchError, HttpClient, ReqwestClient, TileFetched};
pub use scheme::{OsmScheme, UrlScheme, XyzScheme};
pub use source::{SourceError, TileImage, TileSource, TileSourceConfig};
