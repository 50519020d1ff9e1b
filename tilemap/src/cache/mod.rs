//! Persistent, size-bounded tile cache.
//!
//! [`DiskTileCache`] stores previously fetched tile bytes on disk, keyed by
//! the tile's source URL, so that tiles survive process restarts. Each entry
//! carries a fixed expiration window from its insertion time; an expired
//! entry behaves as a miss and is deleted lazily. The total payload size is
//! bounded by a configurable cap, enforced on insertion by evicting the
//! earliest-expiring (oldest-inserted) entries first.
//!
//! # On-Disk Layout
//!
//! Each entry is a pair of files named after the SHA-256 of the URL:
//!
//! - `<hex>.tile` - the raw payload bytes
//! - `<hex>.meta` - JSON sidecar with the URL, expiration, and length
//!
//! The in-memory index is rebuilt by scanning the sidecars at open, so no
//! separate manifest file is needed. No other process is expected to read
//! the directory.
//!
//! # Ownership
//!
//! The cache is designed for a single-writer context: the fetch worker owns
//! it exclusively and all mutation happens on the worker task. There is no
//! internal locking.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

/// Default validity window for cached tiles: 7 days from insertion.
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default maximum cache size: 100 MiB.
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 100 * 1024 * 1024;

/// Payload file extension.
const TILE_EXT: &str = "tile";

/// Metadata sidecar extension.
const META_EXT: &str = "meta";

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error reading or writing cache files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata sidecar could not be serialized or parsed.
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Metadata sidecar persisted next to each payload file.
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    /// Source URL the payload was fetched from.
    url: String,
    /// Expiration as milliseconds since the Unix epoch.
    expires_at_ms: u64,
    /// Payload length in bytes.
    len: u64,
}

/// In-memory index entry for one cached tile.
#[derive(Debug, Clone)]
struct IndexEntry {
    /// File stem (hex SHA-256 of the URL) of the payload/sidecar pair.
    stem: String,
    /// Expiration as milliseconds since the Unix epoch.
    expires_at_ms: u64,
    /// Payload length in bytes.
    len: u64,
    /// Insertion order within this session, breaks expiry ties on eviction.
    seq: u64,
}

/// Durable, size-bounded store of fetched tile bytes, addressed by URL.
///
/// Entries expire a fixed window after insertion (default 7 days); there is
/// no revalidation protocol with the origin server, staleness is simply
/// accepted for the window and a fresh fetch forced thereafter.
///
/// # Example
///
/// ```ignore
/// use tilemap::cache::DiskTileCache;
///
/// let mut cache = DiskTileCache::open(dir, 100 * 1024 * 1024).await?;
/// cache.put("https://tile.example.com/3/1/2.png", &bytes).await?;
/// assert!(cache.contains("https://tile.example.com/3/1/2.png"));
/// ```
pub struct DiskTileCache {
    /// Cache directory.
    dir: PathBuf,
    /// Maximum total payload size in bytes.
    max_size_bytes: u64,
    /// Validity window applied to new entries.
    validity: Duration,
    /// URL -> entry index, rebuilt from sidecars at open.
    index: HashMap<String, IndexEntry>,
    /// Total payload size of all indexed entries.
    total_bytes: u64,
    /// Next insertion sequence number.
    next_seq: u64,
}

impl DiskTileCache {
    /// Open a cache directory, creating it if necessary.
    ///
    /// Existing entries are re-indexed by scanning their metadata sidecars.
    /// Entries with an unreadable sidecar or a missing payload file are
    /// discarded.
    ///
    /// # Arguments
    ///
    /// * `dir` - Directory to store cache files in
    /// * `max_size_bytes` - Maximum total payload size
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Io` if the directory cannot be created or read.
    pub async fn open(dir: impl AsRef<Path>, max_size_bytes: u64) -> Result<Self, CacheError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let mut cache = Self {
            dir,
            max_size_bytes,
            validity: DEFAULT_VALIDITY,
            index: HashMap::new(),
            total_bytes: 0,
            next_seq: 0,
        };
        cache.scan().await?;

        debug!(
            dir = %cache.dir.display(),
            entries = cache.index.len(),
            bytes = cache.total_bytes,
            "opened tile cache"
        );
        Ok(cache)
    }

    /// Override the validity window applied to newly inserted entries.
    ///
    /// Defaults to [`DEFAULT_VALIDITY`] (7 days). Entries already on disk
    /// keep the expiration they were written with.
    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    /// Rebuild the index from the metadata sidecars in the cache directory.
    async fn scan(&mut self) -> Result<(), CacheError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(META_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(String::from) else {
                continue;
            };

            let meta: EntryMeta = match tokio::fs::read(&path).await {
                Ok(raw) => match serde_json::from_slice(&raw) {
                    Ok(meta) => meta,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "dropping unreadable cache sidecar");
                        let _ = tokio::fs::remove_file(&path).await;
                        let _ = tokio::fs::remove_file(self.payload_path(&stem)).await;
                        continue;
                    }
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read cache sidecar");
                    continue;
                }
            };

            // Payload must exist and match the recorded length.
            let payload = self.payload_path(&stem);
            match tokio::fs::metadata(&payload).await {
                Ok(m) if m.len() == meta.len => {}
                _ => {
                    warn!(path = %payload.display(), "dropping cache entry with missing payload");
                    let _ = tokio::fs::remove_file(&path).await;
                    let _ = tokio::fs::remove_file(&payload).await;
                    continue;
                }
            }

            let seq = self.next_seq;
            self.next_seq += 1;
            self.total_bytes += meta.len;
            self.index.insert(
                meta.url,
                IndexEntry {
                    stem,
                    expires_at_ms: meta.expires_at_ms,
                    len: meta.len,
                    seq,
                },
            );
        }

        Ok(())
    }

    /// Whether a non-expired entry exists for `url`.
    ///
    /// Has no side effects; expired entries are purged by `get` or replaced
    /// by the next `put`, not here.
    pub fn contains(&self, url: &str) -> bool {
        self.index
            .get(url)
            .is_some_and(|e| e.expires_at_ms > now_ms())
    }

    /// Retrieve the cached bytes for `url`, if present and unexpired.
    ///
    /// An expired entry behaves as a miss and its files are deleted. A
    /// payload that can no longer be read also behaves as a miss.
    pub async fn get(&mut self, url: &str) -> Option<Bytes> {
        let entry = self.index.get(url)?.clone();

        if entry.expires_at_ms <= now_ms() {
            debug!(url, "cache entry expired");
            self.evict(url, &entry).await;
            return None;
        }

        match tokio::fs::read(self.payload_path(&entry.stem)).await {
            Ok(data) => Some(Bytes::from(data)),
            Err(e) => {
                warn!(url, error = %e, "failed to read cached tile, dropping entry");
                self.evict(url, &entry).await;
                None
            }
        }
    }

    /// Insert or replace the entry for `url`.
    ///
    /// The entry expires [`validity`](Self::with_validity) from now and is
    /// written durably before this returns. Insertion may evict the
    /// earliest-expiring entries to keep the total size within the cap.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the payload or sidecar cannot be written.
    pub async fn put(&mut self, url: &str, data: &[u8]) -> Result<(), CacheError> {
        let stem = file_stem(url);
        let expires_at_ms = now_ms() + self.validity.as_millis() as u64;
        let meta = EntryMeta {
            url: url.to_string(),
            expires_at_ms,
            len: data.len() as u64,
        };

        tokio::fs::write(self.payload_path(&stem), data).await?;
        tokio::fs::write(self.meta_path(&stem), serde_json::to_vec(&meta)?).await?;

        if let Some(old) = self.index.remove(url) {
            self.total_bytes -= old.len;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.total_bytes += meta.len;
        self.index.insert(
            meta.url,
            IndexEntry {
                stem,
                expires_at_ms,
                len: meta.len,
                seq,
            },
        );

        self.evict_to_cap().await;
        Ok(())
    }

    /// Delete any entry for `url`; no-op if absent.
    pub async fn remove(&mut self, url: &str) {
        if let Some(entry) = self.index.get(url).cloned() {
            self.evict(url, &entry).await;
        }
    }

    /// Total payload size of all indexed entries in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Number of indexed entries, expired ones included until purged.
    pub fn entry_count(&self) -> usize {
        self.index.len()
    }

    /// Maximum configured total payload size in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Evict earliest-expiring entries until the total size is within the cap.
    ///
    /// With a fixed validity window the earliest-expiring entry is also the
    /// oldest-inserted one, so this is FIFO eviction.
    async fn evict_to_cap(&mut self) {
        while self.total_bytes > self.max_size_bytes {
            let Some((url, entry)) = self
                .index
                .iter()
                .min_by_key(|(_, e)| (e.expires_at_ms, e.seq))
                .map(|(u, e)| (u.clone(), e.clone()))
            else {
                break;
            };
            debug!(url = %url, "evicting tile to respect cache size cap");
            self.evict(&url, &entry).await;
        }
    }

    /// Remove one entry from the index and delete its files (best effort).
    async fn evict(&mut self, url: &str, entry: &IndexEntry) {
        if self.index.remove(url).is_some() {
            self.total_bytes -= entry.len;
        }
        let _ = tokio::fs::remove_file(self.payload_path(&entry.stem)).await;
        let _ = tokio::fs::remove_file(self.meta_path(&entry.stem)).await;
    }

    fn payload_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}.{TILE_EXT}"))
    }

    fn meta_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}.{META_EXT}"))
    }
}

/// Milliseconds since the Unix epoch.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Hex SHA-256 of the URL, used as the file stem for both entry files.
fn file_stem(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    digest.iter().fold(String::with_capacity(64), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}
