//! Coordinate reference systems and transforms.
//!
//! The maths is delegated to `proj4rs`; this crate adds CRS parsing from grid
//! metadata, a small table of EPSG definitions, and UTM zone selection for
//! metric distance calculations.

pub mod crs;
pub mod error;
pub mod transform;
pub mod utm;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use crs::Crs;
pub use error::{ProjectionError, ProjectionResult};
pub use transform::{CoordinateTransform, Proj4Transform};
pub use utm::UtmZone;

/// A coordinate pair, easting/longitude first.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Euclidean distance, meaningful only in a metric CRS.
    pub fn distance(&self, other: &Coordinate) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
