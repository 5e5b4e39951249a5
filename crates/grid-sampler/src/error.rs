//! Error types for grid sampling.

use projection::ProjectionError;
use thiserror::Error;

/// Errors that can occur while opening, sampling or copying a grid.
#[derive(Error, Debug)]
pub enum GridError {
    /// The dataset cannot be used as a sampling grid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The named variable does not exist in the dataset.
    #[error("variable not found: {0}")]
    VariableNotFound(String),

    /// Input or store output does not have the expected shape.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A caller-supplied argument is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The underlying store failed a read or write.
    #[error("store access failed: {0}")]
    StoreAccess(String),

    /// Invalid metadata in the grid dataset.
    #[error("invalid grid metadata: {0}")]
    InvalidMetadata(String),

    /// Zarr format error.
    #[error("Zarr format error: {0}")]
    Zarr(String),

    /// Storage/IO error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Coordinate transform error.
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl GridError {
    /// Create a Configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a StoreAccess error.
    pub fn store_access(msg: impl Into<String>) -> Self {
        Self::StoreAccess(msg.into())
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// Create a Zarr error.
    pub fn zarr(msg: impl Into<String>) -> Self {
        Self::Zarr(msg.into())
    }
}

impl From<std::io::Error> for GridError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for GridError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidMetadata(err.to_string())
    }
}

/// Result type for grid sampling operations.
pub type Result<T> = std::result::Result<T, GridError>;
