//! Configuration for grid sampling and dataset output.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::codec::bytes_to_bytes::crc32c::Crc32cCodec;
use zarrs::array::codec::BytesToBytesCodecTraits;

use crate::error::{GridError, Result};

/// Configuration for sampling a grid dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Upper bound on bytes fetched from the store per batch.
    pub max_bytes: usize,

    /// Absolute tolerance for coordinate and index comparisons.
    pub float_tolerance: f64,

    /// Memory budget for the chunk cache in megabytes.
    pub chunk_cache_size_mb: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            max_bytes: 500_000_000,
            float_tolerance: 1e-6,
            chunk_cache_size_mb: 256,
        }
    }
}

impl SamplerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("GRID_MAX_BYTES") {
            if let Ok(bytes) = val.parse() {
                config.max_bytes = bytes;
            }
        }

        if let Ok(val) = std::env::var("GRID_FLOAT_TOLERANCE") {
            if let Ok(tolerance) = val.parse() {
                config.float_tolerance = tolerance;
            }
        }

        if let Ok(val) = std::env::var("CHUNK_CACHE_SIZE_MB") {
            if let Ok(size) = val.parse() {
                config.chunk_cache_size_mb = size;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_bytes == 0 {
            return Err("max_bytes must be > 0".to_string());
        }

        if !self.float_tolerance.is_finite() || self.float_tolerance < 0.0 {
            return Err("float_tolerance must be a finite non-negative number".to_string());
        }

        if self.chunk_cache_size_mb == 0 {
            return Err("chunk_cache_size_mb must be > 0".to_string());
        }

        Ok(())
    }

    /// Get the chunk cache size in bytes.
    pub fn chunk_cache_size_bytes(&self) -> usize {
        self.chunk_cache_size_mb * 1024 * 1024
    }
}

/// Compression codec for Zarr files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ZarrCompression {
    /// No compression.
    None,
    /// LZ4 compression.
    Lz4,
    /// Zstd compression.
    Zstd,
    /// Blosc with LZ4.
    BloscLz4,
    /// Blosc with Zstd.
    #[default]
    BloscZstd,
}

impl ZarrCompression {
    /// Get the codec name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
            Self::BloscLz4 => "blosc_lz4",
            Self::BloscZstd => "blosc_zstd",
        }
    }
}

impl FromStr for ZarrCompression {
    type Err = String;

    /// Parse from string (case-insensitive).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "lz4" => Ok(Self::Lz4),
            "zstd" => Ok(Self::Zstd),
            "blosc_lz4" => Ok(Self::BloscLz4),
            "blosc_zstd" => Ok(Self::BloscZstd),
            other => Err(format!(
                "unknown compression '{}', expected one of none, lz4, zstd, blosc_lz4, blosc_zstd",
                other
            )),
        }
    }
}

impl std::fmt::Display for ZarrCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compression applied to variables written by the writer and copy utility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionOptions {
    pub compression: ZarrCompression,

    /// Compression level (1-9).
    pub level: u8,

    /// Enable byte shuffle filter for better compression.
    pub shuffle: bool,

    /// Append a crc32c checksum codec.
    pub checksum: bool,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            compression: ZarrCompression::BloscZstd,
            level: 4,
            shuffle: true,
            checksum: true,
        }
    }
}

impl CompressionOptions {
    /// No compression and no checksum.
    pub fn uncompressed() -> Self {
        Self {
            compression: ZarrCompression::None,
            level: 1,
            shuffle: false,
            checksum: false,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.compression != ZarrCompression::None && (self.level == 0 || self.level > 9) {
            return Err("compression level must be 1-9".to_string());
        }
        Ok(())
    }

    /// Build the bytes-to-bytes codec chain for elements of `typesize` bytes.
    pub fn codecs(&self, typesize: usize) -> Result<Vec<Arc<dyn BytesToBytesCodecTraits>>> {
        let mut codecs: Vec<Arc<dyn BytesToBytesCodecTraits>> = Vec::new();

        if self.compression != ZarrCompression::None {
            let level = BloscCompressionLevel::try_from(self.level)
                .map_err(|_| GridError::configuration("invalid compression level"))?;

            let shuffle = if self.shuffle {
                BloscShuffleMode::Shuffle
            } else {
                BloscShuffleMode::NoShuffle
            };

            // typesize is required when shuffle is enabled
            let typesize = self.shuffle.then_some(typesize);

            let compressor = match self.compression {
                ZarrCompression::Lz4 | ZarrCompression::BloscLz4 => BloscCompressor::LZ4,
                _ => BloscCompressor::Zstd,
            };

            let codec = BloscCodec::new(compressor, level, None, shuffle, typesize)
                .map_err(|e| GridError::configuration(e.to_string()))?;
            codecs.push(Arc::new(codec));
        }

        if self.checksum {
            codecs.push(Arc::new(Crc32cCodec::new()));
        }

        Ok(codecs)
    }
}
