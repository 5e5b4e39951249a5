//! Coordinate to array-index resolution.
//!
//! All indices are in storage order. Coordinates are transformed to the
//! grid's native CRS, reordered to storage order, checked against the extent
//! and then located on each axis independently.

use projection::{Coordinate, CoordinateTransform, Crs};

use crate::error::Result;
use crate::geometry::GridGeometry;
use crate::types::{FractionalIndex, IndexPair};

/// Converts between coordinates and grid indices.
pub struct GridIndexResolver<T> {
    geometry: GridGeometry,
    transform: T,
    tolerance: f64,
}

impl<T: CoordinateTransform> GridIndexResolver<T> {
    pub fn new(geometry: GridGeometry, transform: T, tolerance: f64) -> Self {
        Self {
            geometry,
            transform,
            tolerance,
        }
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Transform to the native CRS. `None` or the native CRS is a no-op.
    ///
    /// A coordinate the transform cannot map comes back as `None`.
    pub fn to_native(
        &self,
        coords: &[Coordinate],
        source_crs: Option<&Crs>,
    ) -> Result<Vec<Option<Coordinate>>> {
        match source_crs {
            Some(crs) if crs != self.geometry.crs() => {
                Ok(self.transform.transform_each(coords, crs, self.geometry.crs())?)
            }
            _ => Ok(coords.iter().copied().map(Some).collect()),
        }
    }

    /// Native coordinates in storage order, `None` when outside the extent.
    fn storage_pairs(
        &self,
        coords: &[Coordinate],
        source_crs: Option<&Crs>,
    ) -> Result<Vec<Option<[f64; 2]>>> {
        let order = self.geometry.axis_order();
        Ok(self
            .to_native(coords, source_crs)?
            .into_iter()
            .map(|c| {
                let pair = order.to_storage(c?);
                self.geometry.contains(pair).then_some(pair)
            })
            .collect())
    }

    /// Nearest cell index for each coordinate.
    pub fn resolve_nearest(
        &self,
        coords: &[Coordinate],
        source_crs: Option<&Crs>,
    ) -> Result<Vec<Option<IndexPair>>> {
        Ok(self
            .storage_pairs(coords, source_crs)?
            .into_iter()
            .map(|pair| {
                let pair = pair?;
                Some([self.nearest_on_axis(0, pair[0])?, self.nearest_on_axis(1, pair[1])?])
            })
            .collect())
    }

    /// Nearest cell index for a single coordinate.
    pub fn resolve_nearest_one(
        &self,
        coord: Coordinate,
        source_crs: Option<&Crs>,
    ) -> Result<Option<IndexPair>> {
        Ok(self
            .resolve_nearest(&[coord], source_crs)?
            .into_iter()
            .next()
            .flatten())
    }

    /// Fractional index for each coordinate.
    ///
    /// A coordinate inside cell `i`'s half-pixel window maps into
    /// `[i - 0.5, i + 0.5)`; values within tolerance of an integer snap to it.
    pub fn resolve_fractional(
        &self,
        coords: &[Coordinate],
        source_crs: Option<&Crs>,
    ) -> Result<Vec<Option<FractionalIndex>>> {
        Ok(self
            .storage_pairs(coords, source_crs)?
            .into_iter()
            .map(|pair| pair.map(|p| [self.fractional_on_axis(0, p[0]), self.fractional_on_axis(1, p[1])]))
            .collect())
    }

    /// Native `(x, y)` coordinate of a cell centre, `None` outside the grid.
    pub fn cell_centre(&self, index: IndexPair) -> Option<Coordinate> {
        self.geometry
            .axis_values(index)
            .map(|pair| self.geometry.axis_order().to_coordinate(pair))
    }

    /// First position within half a pixel (plus tolerance) of `value`.
    fn nearest_on_axis(&self, d: usize, value: f64) -> Option<usize> {
        let axis = self.geometry.axis(d);
        let half = self.geometry.pixel_size()[d] / 2.0 + self.tolerance;

        let i = if self.geometry.is_ascending(d) {
            axis.partition_point(|&a| a < value - half)
        } else {
            axis.partition_point(|&a| a > value + half)
        };

        axis.get(i)
            .filter(|&&a| (a - value).abs() <= half)
            .map(|_| i)
    }

    fn fractional_on_axis(&self, d: usize, value: f64) -> f64 {
        let axis = self.geometry.axis(d);
        let pixel = self.geometry.pixel_size()[d];

        let raw = if self.geometry.is_ascending(d) {
            (value - axis[0]) / pixel
        } else {
            (axis[0] - value) / pixel
        };

        let snapped = raw.round();
        if (raw - snapped).abs() <= self.tolerance {
            snapped
        } else {
            raw
        }
    }
}
