//! Cache types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fresh thumbnail read back from the cache
#[derive(Debug, Clone)]
pub struct CachedThumb {
    pub data: Vec<u8>,
    pub modified: DateTime<Utc>,
}

/// Statistics about the cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size: u64,
    pub hits: u64,
    pub misses: u64,
}
