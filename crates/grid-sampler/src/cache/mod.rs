//! Cache implementations for grid sampling.

mod chunk_cache;

pub use chunk_cache::{hash_name, ChunkCache, ChunkKey};
