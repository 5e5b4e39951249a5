//! Grid geometry: axes, cell sizes and extents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use projection::{Coordinate, Crs};

use crate::error::{GridError, Result};
use crate::types::{json_number, AxisOrder, IndexPair};

/// GDAL-style affine transform.
///
/// `x = origin_x + col * pixel_width + row * row_rotation`,
/// `y = origin_y + col * col_rotation + row * pixel_height`,
/// with `(origin_x, origin_y)` at the outer corner of the first cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_coefficients(gt: [f64; 6]) -> Self {
        Self {
            origin_x: gt[0],
            pixel_width: gt[1],
            row_rotation: gt[2],
            origin_y: gt[3],
            col_rotation: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn coefficients(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Transform for cell-centre axes `x` and `y`.
    pub fn from_axes(x: &[f64], y: &[f64], pixel_size: [f64; 2]) -> Result<Self> {
        let (Some(&x0), Some(&y0)) = (x.first(), y.first()) else {
            return Err(GridError::invalid_argument("axes must not be empty"));
        };
        let dx = axis_direction(x) * pixel_size[0];
        let dy = axis_direction(y) * pixel_size[1];
        Ok(Self::from_coefficients([
            x0 - dx / 2.0,
            dx,
            0.0,
            y0 - dy / 2.0,
            0.0,
            dy,
        ]))
    }

    /// Parse the `GeoTransform` attribute: a string of six numbers or a JSON array.
    pub fn from_attribute(value: &Value) -> Result<Self> {
        let numbers: Vec<f64> = match value {
            Value::String(s) => s
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|t| !t.is_empty())
                .map(|t| {
                    t.parse::<f64>().map_err(|_| {
                        GridError::invalid_metadata(format!("invalid GeoTransform value: {}", t))
                    })
                })
                .collect::<Result<_>>()?,
            Value::Array(items) => items
                .iter()
                .map(|v| {
                    json_number(v).ok_or_else(|| {
                        GridError::invalid_metadata(format!("invalid GeoTransform value: {}", v))
                    })
                })
                .collect::<Result<_>>()?,
            other => {
                return Err(GridError::invalid_metadata(format!(
                    "GeoTransform must be a string or array, got {}",
                    other
                )))
            }
        };

        let coefficients: [f64; 6] = numbers.as_slice().try_into().map_err(|_| {
            GridError::invalid_metadata(format!(
                "GeoTransform needs 6 values, got {}",
                numbers.len()
            ))
        })?;

        Ok(Self::from_coefficients(coefficients))
    }

    /// The GDAL string form, as written to `GeoTransform` attributes.
    pub fn to_attribute(&self) -> String {
        self.coefficients()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Absolute cell size `[x, y]`.
    pub fn pixel_size(&self) -> [f64; 2] {
        [self.pixel_width.abs(), self.pixel_height.abs()]
    }

    /// Shift the origin by whole cells.
    pub fn offset(&self, cols: f64, rows: f64) -> Self {
        Self {
            origin_x: self.origin_x + cols * self.pixel_width + rows * self.row_rotation,
            origin_y: self.origin_y + cols * self.col_rotation + rows * self.pixel_height,
            ..*self
        }
    }

    /// Flip the y direction for a grid of `rows` rows.
    pub fn flip_y(&self, rows: usize) -> Self {
        Self {
            origin_y: self.origin_y + rows as f64 * self.pixel_height,
            pixel_height: -self.pixel_height,
            ..*self
        }
    }
}

fn axis_direction(axis: &[f64]) -> f64 {
    match (axis.first(), axis.last()) {
        (Some(first), Some(last)) if last < first => -1.0,
        _ => 1.0,
    }
}

/// Immutable geometry of a 2-D grid, in storage order.
#[derive(Debug, Clone, Serialize)]
pub struct GridGeometry {
    axes: [Vec<f64>; 2],
    dimensions: [String; 2],
    axis_order: AxisOrder,
    pixel_size: [f64; 2],
    min_extent: [f64; 2],
    max_extent: [f64; 2],
    ascending: [bool; 2],
    crs: Crs,
}

impl GridGeometry {
    /// Build the geometry from storage-order axes.
    ///
    /// `pixel_size` is in storage order; when absent it falls back to the
    /// mean spacing of each axis.
    pub fn new(
        axes: [Vec<f64>; 2],
        dimensions: [String; 2],
        axis_order: AxisOrder,
        pixel_size: Option<[f64; 2]>,
        crs: Crs,
    ) -> Result<Self> {
        let mut ascending = [true; 2];
        let mut min_extent = [0.0; 2];
        let mut max_extent = [0.0; 2];
        let mut sizes = [0.0; 2];

        for d in 0..2 {
            let axis = &axes[d];
            if axis.is_empty() {
                return Err(GridError::configuration(format!(
                    "coordinate axis '{}' is empty",
                    dimensions[d]
                )));
            }
            if axis.iter().any(|v| !v.is_finite()) {
                return Err(GridError::configuration(format!(
                    "coordinate axis '{}' has non-finite values",
                    dimensions[d]
                )));
            }

            ascending[d] = axis.len() < 2 || axis[1] > axis[0];
            let monotonic = axis.windows(2).all(|w| {
                if ascending[d] {
                    w[1] > w[0]
                } else {
                    w[1] < w[0]
                }
            });
            if !monotonic {
                return Err(GridError::configuration(format!(
                    "coordinate axis '{}' is not strictly monotonic",
                    dimensions[d]
                )));
            }

            sizes[d] = match pixel_size {
                Some(p) => p[d].abs(),
                None if axis.len() > 1 => {
                    (axis[axis.len() - 1] - axis[0]).abs() / (axis.len() - 1) as f64
                }
                None => 0.0,
            };
            if !(sizes[d].is_finite() && sizes[d] > 0.0) {
                return Err(GridError::configuration(format!(
                    "cannot determine pixel size for axis '{}'",
                    dimensions[d]
                )));
            }

            let (lo, hi) = if ascending[d] {
                (axis[0], axis[axis.len() - 1])
            } else {
                (axis[axis.len() - 1], axis[0])
            };
            min_extent[d] = lo - sizes[d] / 2.0;
            max_extent[d] = hi + sizes[d] / 2.0;
        }

        Ok(Self {
            axes,
            dimensions,
            axis_order,
            pixel_size: sizes,
            min_extent,
            max_extent,
            ascending,
            crs,
        })
    }

    pub fn axis(&self, d: usize) -> &[f64] {
        &self.axes[d]
    }

    pub fn dimensions(&self) -> &[String; 2] {
        &self.dimensions
    }

    pub fn axis_order(&self) -> AxisOrder {
        self.axis_order
    }

    /// Cell size per axis, storage order.
    pub fn pixel_size(&self) -> [f64; 2] {
        self.pixel_size
    }

    pub fn min_extent(&self) -> [f64; 2] {
        self.min_extent
    }

    pub fn max_extent(&self) -> [f64; 2] {
        self.max_extent
    }

    pub fn is_ascending(&self, d: usize) -> bool {
        self.ascending[d]
    }

    /// Native CRS of the axes.
    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    /// Storage shape.
    pub fn shape(&self) -> [usize; 2] {
        [self.axes[0].len(), self.axes[1].len()]
    }

    /// Extent check on a storage-order pair, half-open `[min, max)` per axis.
    pub fn contains(&self, pair: [f64; 2]) -> bool {
        (0..2).all(|d| pair[d] >= self.min_extent[d] && pair[d] < self.max_extent[d])
    }

    /// Index of the middle cell.
    pub fn centre_index(&self) -> IndexPair {
        let [a, b] = self.shape();
        [a / 2, b / 2]
    }

    /// Storage-order axis values at an index, or `None` outside the grid.
    pub fn axis_values(&self, index: IndexPair) -> Option<[f64; 2]> {
        Some([*self.axes[0].get(index[0])?, *self.axes[1].get(index[1])?])
    }

    /// Lower-left and upper-right corners of the extent, as `(x, y)`.
    pub fn bounds(&self) -> (Coordinate, Coordinate) {
        (
            self.axis_order.to_coordinate(self.min_extent),
            self.axis_order.to_coordinate(self.max_extent),
        )
    }

    /// Geo transform equivalent to this geometry.
    pub fn geo_transform(&self) -> Result<GeoTransform> {
        let (x_dim, y_dim) = match self.axis_order {
            AxisOrder::NorthingFirst => (1, 0),
            AxisOrder::EastingFirst => (0, 1),
        };
        GeoTransform::from_axes(
            &self.axes[x_dim],
            &self.axes[y_dim],
            [self.pixel_size[x_dim], self.pixel_size[y_dim]],
        )
    }
}
