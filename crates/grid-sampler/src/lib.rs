//! Point, interpolated and transect sampling over gridded raster datasets.
//!
//! A dataset is a Zarr V3 group holding 1-D coordinate variables, a
//! grid-mapping variable with the CRS and geo transform, and one or more
//! 2-D data variables. Queries are made in any supported CRS and resolved
//! to grid cells in the dataset's native CRS.
//!
//! # Architecture
//!
//! ```text
//! coordinates (any CRS)
//!      │
//!      ▼
//! GridIndexResolver ──► native CRS ──► index pairs (or fractional indices)
//!      │
//!      ▼
//! GridSampler
//!      │
//!      ├─► drop out-of-extent points
//!      │
//!      ├─► batch pairs to the byte budget
//!      │
//!      └─► GridStore::read_pairs ──► ChunkCache ──► Zarr chunks
//!               │
//!               ▼
//!          values, no-data where unresolved
//! ```
//!
//! # Example
//!
//! ```ignore
//! use grid_sampler::{Coordinate, Crs, GridDataset, SamplerConfig};
//!
//! let dataset = GridDataset::open("dem.zarr", SamplerConfig::from_env())?;
//!
//! let points = [Coordinate::new(147.0, -35.0)];
//! let values = dataset.nearest_value(&points, Some(&Crs::WGS84), None, None)?;
//!
//! for point in dataset.sample_transect(&line, None, None)? {
//!     let point = point?;
//!     println!("{} at {} m", point.coordinate, point.distance);
//! }
//! ```

pub mod cache;
pub mod config;
pub mod copy;
pub mod dataset;
pub mod error;
pub mod geometry;
pub mod resolver;
pub mod sampler;
pub mod store;
pub mod testdata;
pub mod transect;
pub mod types;
pub mod writer;

// Re-export commonly used types at crate root
pub use cache::{ChunkCache, ChunkKey};
pub use config::{CompressionOptions, SamplerConfig, ZarrCompression};
pub use copy::{copy_dataset, CopyOptions, CopyReport, DimensionRange};
pub use dataset::{DatasetSummary, GridDataset};
pub use error::{GridError, Result};
pub use geometry::{GeoTransform, GridGeometry};
pub use resolver::GridIndexResolver;
pub use sampler::{fetch_batch_size, GridSampler};
pub use store::{GridStore, MemoryGridStore, PairAccess, ZarrGridStore};
pub use transect::{default_spacing, round_spacing, TransectPoints, TransectSampler};
pub use types::{
    coordinates_from_rows, AxisOrder, CacheStats, ElementType, FractionalIndex, IndexPair,
    TransectPoint, VariableInfo,
};
pub use writer::{GridWriter, VariableSpec};

pub use projection::{Coordinate, CoordinateTransform, Crs, Proj4Transform};
