//! Flat-file thumbnail storage with mtime-based validity

use crate::error::{CacheError, Result};
use crate::types::{CacheStats, CachedThumb};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, info, warn};

/// Prefix shared by every cache file name
pub const CACHE_FILE_PREFIX: &str = "thumb_";

/// Appended to the hashed input of square-cropped variants
const SQUARE_KEY_MARKER: &[u8] = b"square";

/// A cached thumbnail is valid only while it is strictly newer than its source.
pub fn is_fresh(cache_modified: SystemTime, source_modified: SystemTime) -> bool {
    cache_modified > source_modified
}

/// A thumbnail cache backed by a single directory of flat files
pub struct ThumbCache {
    /// Directory where cached thumbnails are stored
    cache_dir: PathBuf,
    /// Cache hit counter
    hits: Arc<AtomicU64>,
    /// Cache miss counter
    misses: Arc<AtomicU64>,
}

impl ThumbCache {
    /// Create a new thumbnail cache
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Initialize the cache by ensuring the cache directory exists
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.cache_dir).await?;
        info!(cache_dir = ?self.cache_dir, "Cache initialized");
        Ok(())
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Generate a cache key from the source filename, output size, quality and crop mode.
    ///
    /// Square crops get their own marker so they never share a file with a
    /// plain resize of the same size.
    pub fn cache_key(filename: &str, width: u32, height: u32, quality: u8, square: bool) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}{}{}{}", filename, width, height, quality).as_bytes());
        if square {
            hasher.update(SQUARE_KEY_MARKER);
        }
        hex::encode(hasher.finalize())
    }

    /// File name of a cached variant, e.g. `thumb_<key>.jpg`
    pub fn cache_filename(key: &str, extension: &str) -> String {
        format!("{}{}.{}", CACHE_FILE_PREFIX, key, extension)
    }

    /// Full path of a cached variant
    pub fn cache_path(&self, key: &str, extension: &str) -> PathBuf {
        self.cache_dir.join(Self::cache_filename(key, extension))
    }

    /// Read a cached thumbnail if it exists and is newer than the source
    pub async fn get(&self, path: &Path, source_modified: SystemTime) -> Option<CachedThumb> {
        let modified = match fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if !is_fresh(modified, source_modified) {
            debug!(path = ?path, "Cached thumbnail is older than its source");
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        match fs::read(path).await {
            Ok(data) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(path = ?path, "Cache hit");
                Some(CachedThumb {
                    data,
                    modified: DateTime::<Utc>::from(modified),
                })
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to read cached thumbnail");
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a rendered thumbnail, replacing any previous file at `path`
    pub async fn put(&self, path: &Path, data: &[u8]) -> Result<()> {
        fs::write(path, data)
            .await
            .map_err(|e| CacheError::Write {
                path: path.to_path_buf(),
                source: Box::new(e),
            })?;

        debug!(path = ?path, size = data.len(), "Cached thumbnail");
        Ok(())
    }

    /// Delete a cached variant. Returns whether a file was removed.
    pub async fn invalidate(&self, path: &Path) -> Result<bool> {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = ?path, "Invalidated cached thumbnail");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Get current cache statistics
    pub async fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            ..CacheStats::default()
        };

        let mut dir = match fs::read_dir(&self.cache_dir).await {
            Ok(dir) => dir,
            Err(e) => {
                warn!(cache_dir = ?self.cache_dir, error = %e, "Failed to list cache directory");
                return stats;
            }
        };

        while let Ok(Some(entry)) = dir.next_entry().await {
            let is_thumb = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(CACHE_FILE_PREFIX));
            if !is_thumb {
                continue;
            }
            if let Ok(meta) = entry.metadata().await {
                if meta.is_file() {
                    stats.entries += 1;
                    stats.total_size += meta.len();
                }
            }
        }

        stats
    }
}
