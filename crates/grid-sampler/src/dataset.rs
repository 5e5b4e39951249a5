//! A gridded dataset opened for sampling.

use std::borrow::Cow;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use projection::{Coordinate, CoordinateTransform, Crs, Proj4Transform};

use crate::config::SamplerConfig;
use crate::error::{GridError, Result};
use crate::geometry::{GeoTransform, GridGeometry};
use crate::resolver::GridIndexResolver;
use crate::sampler::GridSampler;
use crate::store::{GridStore, ZarrGridStore};
use crate::transect::{default_spacing, nominal_pixel_metres, TransectPoints, TransectSampler};
use crate::types::{AxisOrder, TransectPoint, VariableInfo};

/// Attributes of the grid-mapping variable that may hold the CRS.
const CRS_ATTRIBUTES: [&str; 2] = ["spatial_ref", "crs_wkt"];

/// A 2-D gridded dataset with its index resolver.
///
/// The primary data variable is the first variable, by name, that carries a
/// `grid_mapping` attribute. Its geometry is read once at construction.
pub struct GridDataset<S, T> {
    store: S,
    resolver: GridIndexResolver<T>,
    config: SamplerConfig,
    data_variable: VariableInfo,
    nominal_pixel_metres: [f64; 2],
    default_spacing: f64,
}

impl GridDataset<ZarrGridStore, Proj4Transform> {
    /// Open a Zarr dataset directory.
    pub fn open(path: impl AsRef<Path>, config: SamplerConfig) -> Result<Self> {
        config.validate().map_err(GridError::Configuration)?;
        let store = ZarrGridStore::open(path, &config)?;
        Self::new(store, Proj4Transform::new(), config)
    }
}

impl<S: GridStore, T: CoordinateTransform> GridDataset<S, T> {
    pub fn new(store: S, transform: T, config: SamplerConfig) -> Result<Self> {
        config.validate().map_err(GridError::Configuration)?;

        let data_variable = store
            .variables()?
            .into_iter()
            .find(|v| v.grid_mapping().is_some())
            .ok_or_else(|| {
                GridError::configuration("no data variable with a grid_mapping attribute")
            })?;

        if data_variable.ndim() != 2 {
            return Err(GridError::configuration(format!(
                "data variable '{}' must be 2-D, found {} dimensions",
                data_variable.name,
                data_variable.ndim()
            )));
        }

        let axis_order = AxisOrder::from_dimensions(&data_variable.dimensions);
        let dimensions = [
            data_variable.dimensions[0].clone(),
            data_variable.dimensions[1].clone(),
        ];
        let axes = [
            read_axis(&store, &dimensions[0], data_variable.shape[0])?,
            read_axis(&store, &dimensions[1], data_variable.shape[1])?,
        ];

        let mapping_name = data_variable.grid_mapping().unwrap_or_default();
        let mapping = store.variable(mapping_name).map_err(|e| match e {
            GridError::VariableNotFound(name) => GridError::configuration(format!(
                "grid mapping variable '{}' not found",
                name
            )),
            other => other,
        })?;

        let definition = CRS_ATTRIBUTES
            .iter()
            .find_map(|key| mapping.attributes.get(*key).and_then(|v| v.as_str()))
            .ok_or_else(|| {
                GridError::configuration(format!(
                    "grid mapping variable '{}' has no spatial_ref",
                    mapping.name
                ))
            })?;
        let crs = Crs::parse(definition)?;

        let pixel_size = mapping
            .attributes
            .get("GeoTransform")
            .map(GeoTransform::from_attribute)
            .transpose()?
            .map(|gt| {
                let [px, py] = gt.pixel_size();
                axis_order.order(px, py)
            });

        let geometry = GridGeometry::new(axes, dimensions, axis_order, pixel_size, crs)?;
        let resolver = GridIndexResolver::new(geometry, transform, config.float_tolerance);
        let nominal_pixel_metres = nominal_pixel_metres(&resolver)?;
        let default_spacing = default_spacing(nominal_pixel_metres)?;

        info!(
            variable = %data_variable.name,
            shape = ?data_variable.shape,
            axis_order = %axis_order,
            crs = %resolver.geometry().crs(),
            pixel_size = ?resolver.geometry().pixel_size(),
            default_spacing,
            "Opened grid dataset"
        );

        Ok(Self {
            store,
            resolver,
            config,
            data_variable,
            nominal_pixel_metres,
            default_spacing,
        })
    }

    /// Nearest-cell values at `coords`.
    ///
    /// `crs = None` means the native CRS, `max_bytes = None` the configured
    /// budget and `variable = None` the primary data variable.
    pub fn nearest_value(
        &self,
        coords: &[Coordinate],
        crs: Option<&Crs>,
        max_bytes: Option<usize>,
        variable: Option<&str>,
    ) -> Result<Vec<f64>> {
        let variable = self.resolve_variable(variable)?;
        self.sampler().sample_nearest(
            coords,
            crs,
            max_bytes.unwrap_or(self.config.max_bytes),
            &variable,
        )
    }

    /// Bilinearly interpolated values at `coords`.
    pub fn interpolated_value(
        &self,
        coords: &[Coordinate],
        crs: Option<&Crs>,
        max_bytes: Option<usize>,
        variable: Option<&str>,
    ) -> Result<Vec<f64>> {
        let variable = self.resolve_variable(variable)?;
        self.sampler().sample_interpolated(
            coords,
            crs,
            max_bytes.unwrap_or(self.config.max_bytes),
            &variable,
        )
    }

    /// Lazily sample a polyline every `spacing` metres (default spacing when `None`).
    pub fn sample_transect(
        &self,
        vertices: &[Coordinate],
        crs: Option<&Crs>,
        spacing: Option<f64>,
    ) -> Result<TransectPoints<'_, T>> {
        let geometry = self.resolver.geometry();
        TransectSampler::new(self.resolver.transform(), geometry.crs(), self.config.float_tolerance)
            .sample(vertices, crs, spacing.unwrap_or(self.default_spacing))
    }

    /// Transect points paired with the nearest value of `variable` at each.
    pub fn transect_values(
        &self,
        vertices: &[Coordinate],
        crs: Option<&Crs>,
        spacing: Option<f64>,
        variable: Option<&str>,
    ) -> Result<Vec<(TransectPoint, f64)>> {
        let points = self
            .sample_transect(vertices, crs, spacing)?
            .collect::<Result<Vec<_>>>()?;
        let coords: Vec<Coordinate> = points.iter().map(|p| p.coordinate).collect();
        let values = self.nearest_value(&coords, None, None, variable)?;
        Ok(points.into_iter().zip(values).collect())
    }

    pub fn geometry(&self) -> &GridGeometry {
        self.resolver.geometry()
    }

    pub fn resolver(&self) -> &GridIndexResolver<T> {
        &self.resolver
    }

    /// The primary data variable.
    pub fn data_variable(&self) -> &VariableInfo {
        &self.data_variable
    }

    /// Default transect spacing in metres.
    pub fn default_spacing(&self) -> f64 {
        self.default_spacing
    }

    /// Metric size `[x, y]` of the centre cell.
    pub fn nominal_pixel_metres(&self) -> [f64; 2] {
        self.nominal_pixel_metres
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Summary of the dataset for display.
    pub fn summary(&self) -> Result<DatasetSummary> {
        let geometry = self.geometry();
        let (lower, upper) = geometry.bounds();
        Ok(DatasetSummary {
            data_variable: self.data_variable.name.clone(),
            dimensions: geometry.dimensions().to_vec(),
            shape: geometry.shape(),
            axis_order: geometry.axis_order(),
            crs: geometry.crs().to_string(),
            pixel_size: geometry.pixel_size(),
            bounds: [lower.x, lower.y, upper.x, upper.y],
            no_data: self.data_variable.no_data(),
            nominal_pixel_metres: self.nominal_pixel_metres,
            default_spacing: self.default_spacing,
            variables: self
                .store
                .variables()?
                .into_iter()
                .map(|v| v.name)
                .collect(),
        })
    }

    fn sampler(&self) -> GridSampler<'_, S, T> {
        GridSampler::new(&self.store, &self.resolver)
    }

    fn resolve_variable(&self, name: Option<&str>) -> Result<Cow<'_, VariableInfo>> {
        let Some(name) = name.filter(|n| *n != self.data_variable.name) else {
            return Ok(Cow::Borrowed(&self.data_variable));
        };

        let variable = self.store.variable(name)?;
        if variable.dimensions != self.data_variable.dimensions
            || variable.shape != self.data_variable.shape
        {
            return Err(GridError::configuration(format!(
                "variable '{}' has dimensions {:?} {:?}, expected {:?} {:?}",
                name,
                variable.dimensions,
                variable.shape,
                self.data_variable.dimensions,
                self.data_variable.shape
            )));
        }
        Ok(Cow::Owned(variable))
    }
}

/// Geometry summary of an opened dataset.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub data_variable: String,
    pub dimensions: Vec<String>,
    pub shape: [usize; 2],
    pub axis_order: AxisOrder,
    pub crs: String,
    pub pixel_size: [f64; 2],
    /// `[min_x, min_y, max_x, max_y]` of the cell extent.
    pub bounds: [f64; 4],
    pub no_data: f64,
    pub nominal_pixel_metres: [f64; 2],
    pub default_spacing: f64,
    pub variables: Vec<String>,
}

fn read_axis<S: GridStore>(store: &S, dimension: &str, len: usize) -> Result<Vec<f64>> {
    let axis = store.read_all(dimension).map_err(|e| match e {
        GridError::VariableNotFound(name) => {
            GridError::configuration(format!("coordinate variable '{}' not found", name))
        }
        other => other,
    })?;

    if axis.len() != len {
        return Err(GridError::configuration(format!(
            "coordinate variable '{}' has {} values, dimension has {}",
            dimension,
            axis.len(),
            len
        )));
    }
    Ok(axis)
}
