//! Structural copy of a grid dataset with subsetting and transcoding.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::{CompressionOptions, SamplerConfig};
use crate::error::{GridError, Result};
use crate::geometry::GeoTransform;
use crate::store::{GridStore, ZarrGridStore};
use crate::types::{AxisOrder, ElementType, VariableInfo};
use crate::writer::{GridWriter, VariableSpec};

/// Names a y coordinate variable may have.
const Y_VARIABLES: [&str; 2] = ["lat", "y"];

/// Default chunk shape for data variables.
pub const DEFAULT_DATA_CHUNKING: [usize; 2] = [1024, 1024];

/// Half-open `[start, end)` index range of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DimensionRange {
    pub start: usize,
    pub end: usize,
}

impl DimensionRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Options for [`copy_dataset`].
#[derive(Debug, Clone)]
pub struct CopyOptions {
    /// Element type remapping applied to every variable.
    pub datatype_map: HashMap<ElementType, ElementType>,
    /// Index ranges keyed by dimension name.
    pub dimension_ranges: HashMap<String, DimensionRange>,
    /// Chunk shape overrides keyed by variable name.
    pub chunk_overrides: HashMap<String, Vec<usize>>,
    /// Chunk shape for 2-D data variables.
    pub data_chunking: [usize; 2],
    /// Store y north to south when `Some(true)`; `None` keeps the source order.
    pub invert_y: Option<bool>,
    pub compression: CompressionOptions,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            datatype_map: HashMap::new(),
            dimension_ranges: HashMap::new(),
            chunk_overrides: HashMap::new(),
            data_chunking: DEFAULT_DATA_CHUNKING,
            invert_y: None,
            compression: CompressionOptions::default(),
        }
    }
}

/// Outcome of a copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CopyReport {
    pub variables: usize,
    pub pieces: usize,
    pub elements: u64,
    pub flipped_y: bool,
}

/// Copy the Zarr dataset at `source` to a new dataset at `dest`.
pub fn copy_dataset(
    source: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    options: &CopyOptions,
) -> Result<CopyReport> {
    let source = source.as_ref();
    let store = ZarrGridStore::open(source, &SamplerConfig::default())?;
    copy_store(&store, &source.display().to_string(), dest, options)
}

/// Copy every variable of `store` into a new dataset at `dest`.
///
/// `label` names the source in the appended `history` attribute.
pub fn copy_store<S: GridStore>(
    store: &S,
    label: &str,
    dest: impl AsRef<Path>,
    options: &CopyOptions,
) -> Result<CopyReport> {
    options.compression.validate().map_err(GridError::Configuration)?;

    let variables = store.variables()?;
    let grid_mappings: HashSet<String> = variables
        .iter()
        .filter_map(|v| v.grid_mapping().map(str::to_string))
        .collect();
    let data_dimensions = variables
        .iter()
        .find(|v| v.grid_mapping().is_some() && v.ndim() == 2)
        .map(|v| v.dimensions.clone());

    let dimension_sizes = dimension_sizes(&variables, &options.dimension_ranges)?;
    for (name, size) in &dimension_sizes {
        info!(dimension = %name, size, "Copying dimension");
    }

    let y_variable = variables
        .iter()
        .find(|v| v.ndim() == 1 && Y_VARIABLES.contains(&v.name.as_str()));
    let y_inverted = match y_variable {
        Some(y) => {
            let axis = store.read_all(&y.name)?;
            matches!((axis.first(), axis.last()), (Some(first), Some(last)) if last < first)
        }
        None => false,
    };
    let flip_y = y_variable.is_some() && options.invert_y.is_some_and(|inv| inv != y_inverted);
    let y_name = y_variable.map(|y| y.name.as_str());

    let mut writer = GridWriter::create(dest.as_ref(), options.compression.clone())?;
    let mut report = CopyReport {
        flipped_y: flip_y,
        ..Default::default()
    };

    for variable in &variables {
        let out_shape: Vec<usize> = variable
            .dimensions
            .iter()
            .zip(&variable.shape)
            .map(|(d, &n)| dimension_sizes.get(d).copied().unwrap_or(n))
            .collect();
        let ranges: Vec<DimensionRange> = variable
            .dimensions
            .iter()
            .zip(&variable.shape)
            .map(|(d, &n)| {
                options
                    .dimension_ranges
                    .get(d)
                    .copied()
                    .unwrap_or(DimensionRange::new(0, n))
            })
            .collect();

        let is_grid_mapping = grid_mappings.contains(&variable.name);
        let element_type = if is_grid_mapping {
            ElementType::Int8
        } else {
            options
                .datatype_map
                .get(&variable.element_type)
                .copied()
                .unwrap_or(variable.element_type)
        };

        let chunk_shape = output_chunking(variable, &out_shape, options);

        let mut spec = VariableSpec::like(variable);
        spec.shape = out_shape.clone();
        spec.chunk_shape = chunk_shape.clone();
        spec.element_type = element_type;

        if is_grid_mapping {
            if let (Some(gt), Some(dims)) = (variable.attributes.get("GeoTransform"), &data_dimensions) {
                let rewritten = rewrite_geo_transform(
                    GeoTransform::from_attribute(gt)?,
                    dims,
                    &options.dimension_ranges,
                    &dimension_sizes,
                    flip_y,
                );
                debug!(variable = %variable.name, geo_transform = %rewritten.to_attribute(), "Rewrote GeoTransform");
                spec.attributes
                    .insert("GeoTransform".to_string(), json!(rewritten.to_attribute()));
            }
        }

        info!(
            variable = %variable.name,
            from = %variable.element_type,
            to = %element_type,
            shape = ?out_shape,
            chunks = ?chunk_shape,
            "Copying variable"
        );
        writer.create_variable(spec)?;

        if variable.ndim() == 2 {
            let y_axis = y_name.and_then(|y| variable.dimensions.iter().position(|d| d == y));
            let in_chunks = variable.chunk_shape.clone().unwrap_or_else(|| chunk_shape.clone());
            let piece_sizes = [
                chunk_shape[0].max(in_chunks[0]).max(1),
                chunk_shape[1].max(in_chunks[1]).max(1),
            ];

            for rows in piece_ranges(ranges[0], piece_sizes[0]) {
                for cols in piece_ranges(ranges[1], piece_sizes[1]) {
                    let read_start = [rows.start, cols.start];
                    let piece_shape = [rows.len(), cols.len()];
                    let mut data = store.read_slab(&variable.name, &read_start, &piece_shape)?;

                    let mut write_start = [rows.start - ranges[0].start, cols.start - ranges[1].start];
                    if let (true, Some(axis)) = (flip_y, y_axis) {
                        write_start[axis] = out_shape[axis] - write_start[axis] - piece_shape[axis];
                        reverse_axis(&mut data, piece_shape, axis);
                    }

                    debug!(
                        variable = %variable.name,
                        start = ?write_start,
                        shape = ?piece_shape,
                        "Copying piece"
                    );
                    writer.write_slab(&variable.name, &write_start, &piece_shape, &data)?;
                    report.pieces += 1;
                    report.elements += data.len() as u64;
                }
            }
        } else {
            let start: Vec<usize> = ranges.iter().map(|r| r.start).collect();
            let mut data = store.read_slab(&variable.name, &start, &out_shape)?;
            if flip_y && Some(variable.name.as_str()) == y_name {
                debug!(variable = %variable.name, "Inverting y axis");
                data.reverse();
            }
            writer.write_slab(&variable.name, &vec![0; out_shape.len()], &out_shape, &data)?;
            report.pieces += 1;
            report.elements += data.len() as u64;
        }

        report.variables += 1;
    }

    let mut global_attributes = store.global_attributes()?;
    let line = format!("{}: copied from {}", Utc::now().to_rfc3339(), label);
    let history = match global_attributes.get("history").and_then(Value::as_str) {
        Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, line),
        _ => line,
    };
    global_attributes.insert("history".to_string(), json!(history));
    writer.write_group_attributes(global_attributes)?;

    info!(
        dest = %dest.as_ref().display(),
        variables = report.variables,
        pieces = report.pieces,
        elements = report.elements,
        flipped_y = report.flipped_y,
        "Finished copying dataset"
    );

    Ok(report)
}

/// Output size of every dimension used by some variable.
fn dimension_sizes(
    variables: &[VariableInfo],
    ranges: &HashMap<String, DimensionRange>,
) -> Result<BTreeMap<String, usize>> {
    let mut sizes = BTreeMap::new();

    for variable in variables {
        for (name, &size) in variable.dimensions.iter().zip(&variable.shape) {
            if sizes.contains_key(name) {
                continue;
            }
            let out = match ranges.get(name) {
                Some(range) if range.start < range.end && range.end <= size => range.len(),
                Some(range) => {
                    return Err(GridError::invalid_argument(format!(
                        "range [{}, {}) is invalid for dimension '{}' of size {}",
                        range.start, range.end, name, size
                    )))
                }
                None => size,
            };
            sizes.insert(name.clone(), out);
        }
    }

    Ok(sizes)
}

/// Chunk shape of an output variable, clamped to its shape.
fn output_chunking(variable: &VariableInfo, out_shape: &[usize], options: &CopyOptions) -> Vec<usize> {
    let base = match options.chunk_overrides.get(&variable.name) {
        Some(chunks) if chunks.len() == out_shape.len() => chunks.clone(),
        _ if variable.grid_mapping().is_some() && out_shape.len() == 2 => {
            options.data_chunking.to_vec()
        }
        _ => variable
            .chunk_shape
            .clone()
            .unwrap_or_else(|| out_shape.to_vec()),
    };

    base.iter()
        .zip(out_shape)
        .map(|(&c, &n)| c.min(n).max(1))
        .collect()
}

fn rewrite_geo_transform(
    gt: GeoTransform,
    data_dimensions: &[String],
    ranges: &HashMap<String, DimensionRange>,
    sizes: &BTreeMap<String, usize>,
    flip_y: bool,
) -> GeoTransform {
    let (y_dim, x_dim) = match AxisOrder::from_dimensions(data_dimensions) {
        AxisOrder::NorthingFirst => (&data_dimensions[0], &data_dimensions[1]),
        AxisOrder::EastingFirst => (&data_dimensions[1], &data_dimensions[0]),
    };
    let start = |dim: &String| ranges.get(dim).map_or(0.0, |r| r.start as f64);

    let shifted = gt.offset(start(x_dim), start(y_dim));
    if flip_y {
        shifted.flip_y(sizes.get(y_dim).copied().unwrap_or(0))
    } else {
        shifted
    }
}

/// Piece ranges covering `range`, aligned to multiples of `piece`.
fn piece_ranges(range: DimensionRange, piece: usize) -> Vec<DimensionRange> {
    let first = range.start / piece;
    let last = range.end.div_ceil(piece);
    (first..last)
        .map(|i| DimensionRange::new(range.start.max(i * piece), range.end.min((i + 1) * piece)))
        .filter(|r| !r.is_empty())
        .collect()
}

/// Reverse a row-major 2-D block along `axis`.
fn reverse_axis(data: &mut [f64], shape: [usize; 2], axis: usize) {
    let [rows, cols] = shape;
    if axis == 0 {
        for r in 0..rows / 2 {
            for c in 0..cols {
                data.swap(r * cols + c, (rows - 1 - r) * cols + c);
            }
        }
    } else {
        for row in data.chunks_mut(cols.max(1)) {
            row.reverse();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_piece_ranges_align_to_piece_size() {
        let pieces = piece_ranges(DimensionRange::new(3, 11), 4);
        assert_eq!(
            pieces,
            vec![
                DimensionRange::new(3, 4),
                DimensionRange::new(4, 8),
                DimensionRange::new(8, 11),
            ]
        );
        assert_eq!(piece_ranges(DimensionRange::new(0, 8), 4).len(), 2);
    }

    #[test]
    fn test_reverse_axis() {
        let mut data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        reverse_axis(&mut data, [3, 2], 0);
        assert_eq!(data, vec![5.0, 6.0, 3.0, 4.0, 1.0, 2.0]);

        reverse_axis(&mut data, [3, 2], 1);
        assert_eq!(data, vec![6.0, 5.0, 4.0, 3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_dimension_range_validation() {
        let vars = vec![VariableInfo {
            name: "x".to_string(),
            dimensions: vec!["x".to_string()],
            shape: vec![10],
            chunk_shape: None,
            element_type: ElementType::Float64,
            attributes: Default::default(),
            fill_value: None,
        }];

        let mut ranges = HashMap::new();
        ranges.insert("x".to_string(), DimensionRange::new(2, 7));
        assert_eq!(dimension_sizes(&vars, &ranges).unwrap()["x"], 5);

        ranges.insert("x".to_string(), DimensionRange::new(2, 11));
        assert!(matches!(
            dimension_sizes(&vars, &ranges),
            Err(GridError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_geo_transform_rewrite() {
        let gt = GeoTransform::from_coefficients([0.0, 10.0, 0.0, 100.0, 0.0, -10.0]);
        let dims = vec!["y".to_string(), "x".to_string()];
        let mut ranges = HashMap::new();
        ranges.insert("x".to_string(), DimensionRange::new(2, 5));
        ranges.insert("y".to_string(), DimensionRange::new(1, 4));
        let mut sizes = BTreeMap::new();
        sizes.insert("x".to_string(), 3);
        sizes.insert("y".to_string(), 3);

        let shifted = rewrite_geo_transform(gt, &dims, &ranges, &sizes, false);
        assert_eq!(shifted.coefficients(), [20.0, 10.0, 0.0, 90.0, 0.0, -10.0]);

        let flipped = rewrite_geo_transform(gt, &dims, &ranges, &sizes, true);
        assert_eq!(flipped.coefficients(), [20.0, 10.0, 0.0, 60.0, 0.0, 10.0]);
    }
}
