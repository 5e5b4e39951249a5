//! LRU cache for decoded variable chunks.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::types::CacheStats;

/// Cache key for chunks: (variable_hash, chunk_row, chunk_col).
pub type ChunkKey = (u64, usize, usize);

const VALUE_SIZE: usize = std::mem::size_of::<f64>();

/// LRU cache for decoded chunks with memory-bounded eviction.
///
/// Chunks are stored as `f64` regardless of the on-disk element type.
pub struct ChunkCache {
    cache: LruCache<ChunkKey, Arc<Vec<f64>>>,
    memory_limit: usize,
    current_memory: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl ChunkCache {
    /// Create a new chunk cache with the given memory limit in bytes.
    pub fn new(memory_limit: usize) -> Self {
        // Entry bound assumes 256x256 f64 chunks; memory is the real limit
        let chunk_size_estimate = 256 * 256 * VALUE_SIZE;
        let max_entries = (memory_limit / chunk_size_estimate).max(16);

        Self {
            cache: LruCache::new(NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN)),
            memory_limit,
            current_memory: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Try to get a chunk from the cache.
    pub fn get(&mut self, key: &ChunkKey) -> Option<Arc<Vec<f64>>> {
        if let Some(data) = self.cache.get(key) {
            self.hits += 1;
            Some(Arc::clone(data))
        } else {
            self.misses += 1;
            None
        }
    }

    /// Insert a chunk, evicting least recently used entries to make room.
    ///
    /// Chunks larger than the whole budget are not cached.
    pub fn insert(&mut self, key: ChunkKey, data: Arc<Vec<f64>>) {
        let data_size = data.len() * VALUE_SIZE;
        if data_size > self.memory_limit {
            return;
        }

        while self.current_memory + data_size > self.memory_limit && !self.cache.is_empty() {
            self.pop_lru();
        }

        if self.cache.len() == self.cache.cap().get() {
            self.pop_lru();
        }

        if let Some(replaced) = self.cache.put(key, data) {
            self.current_memory = self
                .current_memory
                .saturating_sub(replaced.len() * VALUE_SIZE);
        }
        self.current_memory += data_size;
    }

    fn pop_lru(&mut self) {
        if let Some((_, evicted)) = self.cache.pop_lru() {
            self.current_memory = self
                .current_memory
                .saturating_sub(evicted.len() * VALUE_SIZE);
            self.evictions += 1;
        }
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.cache.len(),
            memory_bytes: self.current_memory as u64,
            evictions: self.evictions,
        }
    }

    /// Clear all entries from the cache.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.current_memory = 0;
    }

    /// Get the current memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        self.current_memory
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Hash a variable name for use in cache keys.
pub fn hash_name(name: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(value: f64, len: usize) -> Arc<Vec<f64>> {
        Arc::new(vec![value; len])
    }

    #[test]
    fn test_cache_insert_and_get() {
        let mut cache = ChunkCache::new(1024 * 1024);

        let key = (123, 0, 0);
        assert!(cache.get(&key).is_none());
        cache.insert(key, chunk(1.5, 4));
        assert_eq!(cache.get(&key).as_deref(), Some(&vec![1.5; 4]));
    }

    #[test]
    fn test_cache_lru_eviction() {
        // 128 bytes = 16 f64s
        let mut cache = ChunkCache::new(128);

        for i in 0..10 {
            cache.insert((0, i, 0), chunk(i as f64, 4));
        }

        assert!(cache.get(&(0, 0, 0)).is_none());
        assert!(cache.get(&(0, 9, 0)).is_some());
        assert!(cache.memory_usage() <= 128);
        assert!(cache.stats().evictions > 0);
    }

    #[test]
    fn test_oversized_chunk_is_not_cached() {
        let mut cache = ChunkCache::new(64);
        cache.insert((0, 0, 0), chunk(1.0, 100));
        assert!(cache.is_empty());
        assert_eq!(cache.memory_usage(), 0);
    }

    #[test]
    fn test_reinsert_does_not_double_count() {
        let mut cache = ChunkCache::new(1024);
        cache.insert((0, 0, 0), chunk(1.0, 8));
        cache.insert((0, 0, 0), chunk(2.0, 8));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.memory_usage(), 64);
    }

    #[test]
    fn test_cache_stats_and_clear() {
        let mut cache = ChunkCache::new(1024 * 1024);
        cache.insert((0, 0, 0), chunk(1.0, 4));

        cache.get(&(0, 0, 0));
        cache.get(&(0, 1, 0));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.memory_usage(), 0);
    }

    #[test]
    fn test_hash_name() {
        assert_eq!(hash_name("elevation"), hash_name("elevation"));
        assert_ne!(hash_name("elevation"), hash_name("gravity"));
    }
}
