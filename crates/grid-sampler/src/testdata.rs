//! Test data generation utilities.
//!
//! Small Zarr datasets with known values for unit and integration tests.
//! Data values follow `col * 1000 + row`, so a sampled value identifies the
//! cell it came from.
//!
//! | Fixture | CRS | Dimensions |
//! |---------|-----|------------|
//! | [`TestGrid::projected`] | EPSG:32755, 100 m cells | `y`, `x` |
//! | [`TestGrid::geographic`] | EPSG:4326 (WKT), 0.01 degree cells | `lat`, `lon` |

use std::path::Path;

use serde_json::{json, Map};

use projection::Coordinate;

use crate::config::CompressionOptions;
use crate::error::Result;
use crate::geometry::GeoTransform;
use crate::types::ElementType;
use crate::writer::{GridWriter, VariableSpec};

/// Fill value of the fixture data variable.
pub const TEST_FILL_VALUE: f64 = -9999.0;

/// Name of the fixture data variable.
pub const TEST_VARIABLE: &str = "elevation";

/// Name of the secondary variable sharing the data dimensions.
pub const TEST_SECONDARY_VARIABLE: &str = "quality";

const WGS84_WKT: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433],AUTHORITY["EPSG","4326"]]"#;

/// Grid values where value at (col, row) = col * 1000 + row.
pub fn create_test_grid(width: usize, height: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f64);
        }
    }
    data
}

/// Builder for a fixture dataset.
#[derive(Debug, Clone)]
pub struct TestGrid {
    pub width: usize,
    pub height: usize,
    /// Centre of the cell at column 0 and row 0 of the ascending axes.
    pub origin: [f64; 2],
    /// Cell size `[x, y]`.
    pub pixel: [f64; 2],
    pub descending_y: bool,
    pub chunk: usize,
    pub element_type: ElementType,
    pub dimensions: [&'static str; 2],
    pub spatial_ref: String,
    /// `(row, col)` cells holding the fill value.
    pub no_data: Vec<(usize, usize)>,
    pub compression: CompressionOptions,
}

impl TestGrid {
    /// UTM zone 55S grid of 100 m cells.
    pub fn projected(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            origin: [500_050.0, 6_100_050.0],
            pixel: [100.0, 100.0],
            descending_y: false,
            chunk: 4,
            element_type: ElementType::Float32,
            dimensions: ["y", "x"],
            spatial_ref: "EPSG:32755".to_string(),
            no_data: Vec::new(),
            compression: CompressionOptions::uncompressed(),
        }
    }

    /// WGS84 grid of 0.01 degree cells near 147E 35S.
    pub fn geographic(width: usize, height: usize) -> Self {
        Self {
            origin: [147.005, -35.095],
            pixel: [0.01, 0.01],
            dimensions: ["lat", "lon"],
            spatial_ref: WGS84_WKT.to_string(),
            ..Self::projected(width, height)
        }
    }

    /// Store the y axis north to south.
    pub fn with_descending_y(mut self) -> Self {
        self.descending_y = true;
        self
    }

    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk;
        self
    }

    pub fn with_no_data(mut self, row: usize, col: usize) -> Self {
        self.no_data.push((row, col));
        self
    }

    pub fn with_element_type(mut self, element_type: ElementType) -> Self {
        self.element_type = element_type;
        self
    }

    pub fn with_compression(mut self, compression: CompressionOptions) -> Self {
        self.compression = compression;
        self
    }

    pub fn x_axis(&self) -> Vec<f64> {
        (0..self.width)
            .map(|c| self.origin[0] + c as f64 * self.pixel[0])
            .collect()
    }

    /// Y axis in storage order.
    pub fn y_axis(&self) -> Vec<f64> {
        let mut y: Vec<f64> = (0..self.height)
            .map(|r| self.origin[1] + r as f64 * self.pixel[1])
            .collect();
        if self.descending_y {
            y.reverse();
        }
        y
    }

    /// Centre of the stored cell at `(row, col)`.
    pub fn cell_centre(&self, row: usize, col: usize) -> Coordinate {
        Coordinate::new(self.x_axis()[col], self.y_axis()[row])
    }

    /// Data values in storage order, with no-data cells applied.
    pub fn data(&self) -> Vec<f64> {
        let mut data = create_test_grid(self.width, self.height);
        for &(row, col) in &self.no_data {
            data[row * self.width + col] = TEST_FILL_VALUE;
        }
        data
    }

    pub fn geo_transform(&self) -> Result<GeoTransform> {
        GeoTransform::from_axes(&self.x_axis(), &self.y_axis(), self.pixel)
    }

    /// Write the dataset to `path` and return the data values.
    pub fn write(&self, path: &Path) -> Result<Vec<f64>> {
        let mut writer = GridWriter::create(path, self.compression.clone())?;

        let mut attrs = Map::new();
        attrs.insert("title".to_string(), json!("grid-sampler test fixture"));
        attrs.insert("Conventions".to_string(), json!("CF-1.8"));
        writer.write_group_attributes(attrs)?;

        let [y_dim, x_dim] = self.dimensions;
        writer.write_variable(
            VariableSpec::new(y_dim, &[y_dim], &[self.height], ElementType::Float64),
            &self.y_axis(),
        )?;
        writer.write_variable(
            VariableSpec::new(x_dim, &[x_dim], &[self.width], ElementType::Float64),
            &self.x_axis(),
        )?;

        writer.write_variable(
            VariableSpec::new("crs", &["crs"], &[1], ElementType::Int8)
                .with_attribute("spatial_ref", json!(self.spatial_ref))
                .with_attribute("GeoTransform", json!(self.geo_transform()?.to_attribute())),
            &[0.0],
        )?;

        let shape = [self.height, self.width];
        let chunk = [self.chunk, self.chunk];
        let data = self.data();
        writer.write_variable(
            VariableSpec::new(TEST_VARIABLE, &[y_dim, x_dim], &shape, self.element_type)
                .with_chunk_shape(&chunk)
                .with_fill_value(TEST_FILL_VALUE)
                .with_attribute("grid_mapping", json!("crs"))
                .with_attribute("_FillValue", json!(TEST_FILL_VALUE))
                .with_attribute("units", json!("m")),
            &data,
        )?;

        let quality: Vec<f64> = (0..self.height * self.width)
            .map(|i| (i % self.width) as f64)
            .collect();
        writer.write_variable(
            VariableSpec::new(TEST_SECONDARY_VARIABLE, &[y_dim, x_dim], &shape, ElementType::UInt8)
                .with_chunk_shape(&chunk),
            &quality,
        )?;

        Ok(data)
    }
}
