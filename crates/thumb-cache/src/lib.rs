//! File-based thumbnail cache
//!
//! Stores rendered thumbnails as flat files named after a hash of the source
//! filename, output dimensions and quality. A cached file is only served while
//! it is newer than the source image it was rendered from.

mod cache;
mod error;
mod types;

pub use cache::{is_fresh, ThumbCache, CACHE_FILE_PREFIX};
pub use error::{CacheError, Result};
pub use types::{CacheStats, CachedThumb};
