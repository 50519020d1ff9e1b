//! Tile fetch worker.
//!
//! The [`TileFetchWorker`] is a long-running background task that is the
//! sole authority over how a requested tile is satisfied:
//!
//! - cache hit: serve the cached bytes, no network request
//! - already in flight: drop the duplicate request, the pending fetch
//!   satisfies it
//! - otherwise: issue one HTTP GET, register it in the in-flight table
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      TileFetchWorker                       │
//! │                                                            │
//! │  FetchCommand ──► ┌─────────────┐                          │
//! │                   │ Cache Check │──► Hit ──► emit event    │
//! │                   └──────┬──────┘                          │
//! │                          │ Miss                            │
//! │                          ▼                                 │
//! │                   ┌─────────────┐                          │
//! │                   │  In-flight  │──► Pending ──► drop      │
//! │                   └──────┬──────┘                          │
//! │                          │ New                             │
//! │                          ▼                                 │
//! │                   ┌─────────────┐   success: write-through │
//! │                   │  HTTP GET   │──► to cache, emit event  │
//! │                   └─────────────┘   failure: silent drop   │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The worker owns the disk cache and the in-flight table exclusively; both
//! are only ever touched from its task, so no locking is needed. Consumers
//! talk to it through the command channel and receive results on the event
//! channel. Failed fetches emit nothing: the only observable effect of any
//! failure is the absence of an event, and a later request for the same
//! tile retries from scratch.

mod http;

pub use http::{HttpClient, ReqwestClient};

#[cfg(test)]
pub use http::tests::MockHttpClient;

use std::collections::HashMap;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::DiskTileCache;
use crate::coord::TileKey;

/// Capacity of the command channel from consumer to worker.
pub const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Errors that can occur while fetching a tile.
///
/// These never reach the consumer; the worker logs them and drops the tile.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Connection-level failure, including timeouts.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP status {0}")]
    Status(u16),
}

/// Commands accepted by the fetch worker.
#[derive(Debug, Clone)]
pub enum FetchCommand {
    /// Acquire the tile at `key`, fetching `url` unless cached or pending.
    Fetch { key: TileKey, url: String },
    /// Cancel the in-flight fetch for one tile; no-op if none is pending.
    Abort(TileKey),
    /// Cancel every in-flight fetch.
    AbortAll,
}

/// Event emitted by the worker when a tile's bytes are available.
///
/// Delivered for cache hits and successful fetches alike. Exactly one event
/// is emitted per completed key, however many duplicate requests were
/// coalesced into it; every consumer of the event stream observes it.
#[derive(Debug, Clone)]
pub struct TileFetched {
    /// The tile this payload belongs to.
    pub key: TileKey,
    /// Raw (undecoded) image bytes.
    pub data: Bytes,
}

/// Internal message from a fetch task back to the worker loop.
struct Completion {
    key: TileKey,
    url: String,
    result: Result<Bytes, FetchError>,
}

/// Background worker owning the tile cache, the HTTP client, and the
/// in-flight request table.
///
/// Construct with [`TileFetchWorker::new`] and drive with
/// [`run`](TileFetchWorker::run) on a spawned task. The worker stops when
/// every command sender has been dropped, cancelling whatever is still in
/// flight.
pub struct TileFetchWorker<C: HttpClient + Clone> {
    /// Disk cache, exclusively owned.
    cache: DiskTileCache,

    /// HTTP client, cloned into each fetch task.
    client: C,

    /// Live fetches by tile key; at most one entry per key.
    in_flight: HashMap<TileKey, CancellationToken>,

    /// Commands from the consumer side.
    command_rx: mpsc::Receiver<FetchCommand>,

    /// Completion reports from spawned fetch tasks.
    completion_rx: mpsc::Receiver<Completion>,

    /// Sender cloned into fetch tasks.
    completion_tx: mpsc::Sender<Completion>,

    /// Delivery of finished tiles to the consumer.
    events_tx: mpsc::UnboundedSender<TileFetched>,
}

impl<C: HttpClient + Clone> TileFetchWorker<C> {
    /// Create a worker and its consumer-side channel endpoints.
    ///
    /// # Arguments
    ///
    /// * `cache` - Disk cache the worker takes exclusive ownership of
    /// * `client` - HTTP client used for all fetches
    ///
    /// # Returns
    ///
    /// The worker plus the command sender and event receiver for the
    /// consumer side.
    pub fn new(
        cache: DiskTileCache,
        client: C,
    ) -> (
        Self,
        mpsc::Sender<FetchCommand>,
        mpsc::UnboundedReceiver<TileFetched>,
    ) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (completion_tx, completion_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let worker = Self {
            cache,
            client,
            in_flight: HashMap::new(),
            command_rx,
            completion_rx,
            completion_tx,
            events_tx,
        };

        (worker, command_tx, events_rx)
    }

    /// Run the worker until the command channel closes.
    ///
    /// All cache access, in-flight bookkeeping, and event emission happen
    /// here; callers never block on this work.
    pub async fn run(mut self) {
        debug!("tile fetch worker started");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                Some(done) = self.completion_rx.recv() => {
                    self.handle_completion(done).await;
                }
            }
        }

        self.abort_all();
        debug!("tile fetch worker stopped");
    }

    async fn handle_command(&mut self, cmd: FetchCommand) {
        match cmd {
            FetchCommand::Fetch { key, url } => self.fetch(key, url).await,
            FetchCommand::Abort(key) => self.abort(key),
            FetchCommand::AbortAll => self.abort_all(),
        }
    }

    /// Serve from cache, join a pending fetch, or start a new one.
    async fn fetch(&mut self, key: TileKey, url: String) {
        if self.cache.contains(&url) {
            if let Some(data) = self.cache.get(&url).await {
                debug!(%key, "tile served from cache");
                let _ = self.events_tx.send(TileFetched { key, data });
                return;
            }
            // The entry vanished between contains and get; fetch instead.
        }

        if self.in_flight.contains_key(&key) {
            debug!(%key, "tile already in flight, coalescing request");
            return;
        }

        let token = CancellationToken::new();
        self.in_flight.insert(key, token.clone());

        let client = self.client.clone();
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => return,
                result = client.get(&url) => result,
            };
            // A closed channel means the worker is gone; nothing to report to.
            let _ = completion_tx.send(Completion { key, url, result }).await;
        });
    }

    /// Process the outcome of one fetch task.
    async fn handle_completion(&mut self, done: Completion) {
        let Completion { key, url, result } = done;

        if self.in_flight.remove(&key).is_none() {
            // Aborted after the response was already queued: drop it whole,
            // no cache write, no event.
            debug!(%key, "ignoring completion for aborted tile");
            return;
        }

        match result {
            Ok(data) => {
                if let Err(e) = self.cache.put(&url, &data).await {
                    warn!(%key, error = %e, "failed to write tile to cache");
                }
                let _ = self.events_tx.send(TileFetched { key, data });
            }
            Err(e) => {
                debug!(%key, error = %e, "tile fetch failed, dropping");
            }
        }
    }

    /// Cancel the fetch for `key` if one is pending.
    fn abort(&mut self, key: TileKey) {
        if let Some(token) = self.in_flight.remove(&key) {
            debug!(%key, "aborting tile fetch");
            token.cancel();
        }
    }

    /// Cancel every pending fetch.
    fn abort_all(&mut self) {
        for (key, token) in self.in_flight.drain() {
            debug!(%key, "aborting tile fetch");
            token.cancel();
        }
    }
}
