//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Limits applied to the caches of a graph.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```rust
/// use trellis_core::EngineConfig;
///
/// let config = EngineConfig::from_json(r#"{ "cache_shards": 4 }"#).unwrap();
/// assert_eq!(config.cache_shards, 4);
/// assert_eq!(config.hash_cache_size_limit, 128_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bytes of computed values kept in the compute cache.
    pub compute_cache_memory_limit: usize,
    /// Entries kept in the hash cache.
    pub hash_cache_size_limit: usize,
    /// Independent lock domains per cache.
    pub cache_shards: usize,
}

impl EngineConfig {
    pub const DEFAULT_COMPUTE_CACHE_MEMORY_LIMIT: usize = 1024 * 1024 * 1024;
    pub const DEFAULT_HASH_CACHE_SIZE_LIMIT: usize = 128_000;
    pub const DEFAULT_CACHE_SHARDS: usize = 16;

    pub fn from_json(text: &str) -> Result<Self> {
        let mut config: EngineConfig = serde_json::from_str(text)?;
        config.cache_shards = config.cache_shards.max(1);
        Ok(config)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            compute_cache_memory_limit: Self::DEFAULT_COMPUTE_CACHE_MEMORY_LIMIT,
            hash_cache_size_limit: Self::DEFAULT_HASH_CACHE_SIZE_LIMIT,
            cache_shards: Self::DEFAULT_CACHE_SHARDS,
        }
    }
}
