//! Subcommand implementations.
//!
//! Each command writes its result to `out` so it can be exercised without a
//! process boundary.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use grid_sampler::{
    copy_dataset, CompressionOptions, Coordinate, CopyOptions, Crs, DimensionRange, ElementType,
    GridDataset, Proj4Transform, SamplerConfig, ZarrCompression, ZarrGridStore,
};

/// Which value estimate to produce for point queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointMethod {
    Nearest,
    Interpolated,
}

/// Arguments shared by point queries.
#[derive(Debug, Clone)]
pub struct PointQuery {
    pub coords: Vec<Coordinate>,
    pub crs: Option<Crs>,
    pub max_bytes: Option<usize>,
    pub variable: Option<String>,
}

/// Arguments of a copy.
#[derive(Debug, Clone)]
pub struct CopyRequest {
    pub chunking: Option<[usize; 2]>,
    pub invert_y: Option<bool>,
    pub compression: ZarrCompression,
    pub level: u8,
    pub ranges: Vec<(String, DimensionRange)>,
    pub datatypes: Vec<(ElementType, ElementType)>,
}

fn open(path: &Path, config: SamplerConfig) -> Result<GridDataset<ZarrGridStore, Proj4Transform>> {
    GridDataset::open(path, config)
        .with_context(|| format!("Failed to open dataset {}", path.display()))
}

/// Print the dataset summary as JSON.
pub fn summary(path: &Path, config: SamplerConfig, out: &mut impl Write) -> Result<()> {
    let dataset = open(path, config)?;
    let summary = dataset.summary()?;
    writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
    Ok(())
}

/// Sample values at points and print `x,y,value` CSV.
pub fn points(
    path: &Path,
    config: SamplerConfig,
    method: PointMethod,
    query: &PointQuery,
    out: &mut impl Write,
) -> Result<()> {
    let dataset = open(path, config)?;
    let variable = query.variable.as_deref();

    let values = match method {
        PointMethod::Nearest => {
            dataset.nearest_value(&query.coords, query.crs.as_ref(), query.max_bytes, variable)?
        }
        PointMethod::Interpolated => dataset.interpolated_value(
            &query.coords,
            query.crs.as_ref(),
            query.max_bytes,
            variable,
        )?,
    };

    info!(points = query.coords.len(), method = ?method, "Sampled points");

    writeln!(out, "x,y,value")?;
    for (coord, value) in query.coords.iter().zip(values) {
        writeln!(out, "{},{},{}", coord.x, coord.y, value)?;
    }
    Ok(())
}

/// Sample a transect and print `distance,x,y[,value]` CSV.
pub fn transect(
    path: &Path,
    config: SamplerConfig,
    vertices: &[Coordinate],
    crs: Option<&Crs>,
    spacing: Option<f64>,
    values: bool,
    out: &mut impl Write,
) -> Result<()> {
    let dataset = open(path, config)?;

    if values {
        writeln!(out, "distance,x,y,value")?;
        for (point, value) in dataset.transect_values(vertices, crs, spacing, None)? {
            writeln!(
                out,
                "{},{},{},{}",
                point.distance, point.coordinate.x, point.coordinate.y, value
            )?;
        }
    } else {
        writeln!(out, "distance,x,y")?;
        for point in dataset.sample_transect(vertices, crs, spacing)? {
            let point = point?;
            writeln!(
                out,
                "{},{},{}",
                point.distance, point.coordinate.x, point.coordinate.y
            )?;
        }
    }
    Ok(())
}

/// Copy a dataset and print the report as JSON.
pub fn copy(input: &Path, output: &Path, request: &CopyRequest, out: &mut impl Write) -> Result<()> {
    let mut options = CopyOptions {
        invert_y: request.invert_y,
        compression: CompressionOptions {
            compression: request.compression,
            level: request.level,
            ..Default::default()
        },
        dimension_ranges: request.ranges.iter().cloned().collect(),
        datatype_map: request.datatypes.iter().copied().collect::<HashMap<_, _>>(),
        ..Default::default()
    };
    if let Some(chunking) = request.chunking {
        options.data_chunking = chunking;
    }

    let report = copy_dataset(input, output, &options)
        .with_context(|| format!("Failed to copy {} to {}", input.display(), output.display()))?;
    writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    Ok(())
}
