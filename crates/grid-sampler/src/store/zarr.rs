//! Zarr V3 filesystem store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tracing::{debug, warn};
use walkdir::WalkDir;
use zarrs::array::Array;
use zarrs::array_subset::ArraySubset;
use zarrs::group::Group;
use zarrs_filesystem::FilesystemStore;

use super::{check_indices, check_slab, GridStore, PairAccess};
use crate::cache::{hash_name, ChunkCache};
use crate::config::SamplerConfig;
use crate::error::{GridError, Result};
use crate::types::{CacheStats, ElementType, IndexPair, VariableInfo};

struct ZarrVariable {
    array: Array<FilesystemStore>,
    info: VariableInfo,
    name_hash: u64,
}

/// Grid store over a Zarr V3 group on the local filesystem.
///
/// Each child array of the root group is a variable. Point reads go through
/// a shared LRU cache of decoded chunks.
pub struct ZarrGridStore {
    root: PathBuf,
    variables: BTreeMap<String, ZarrVariable>,
    global_attributes: Map<String, Value>,
    chunk_cache: Mutex<ChunkCache>,
}

impl ZarrGridStore {
    /// Open the Zarr group at `path`.
    pub fn open(path: impl AsRef<Path>, config: &SamplerConfig) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(GridError::Storage(format!(
                "dataset directory not found: {}",
                root.display()
            )));
        }

        let store = Arc::new(
            FilesystemStore::new(&root).map_err(|e| GridError::Storage(e.to_string()))?,
        );

        let group = Group::open(store.clone(), "/").map_err(|e| {
            GridError::invalid_metadata(format!("{}: not a Zarr group: {}", root.display(), e))
        })?;
        let global_attributes = group.attributes().clone();

        let mut variables = BTreeMap::new();
        for name in array_names(&root)? {
            let array = Array::open(store.clone(), &format!("/{}", name))
                .map_err(|e| GridError::zarr(format!("{}: {}", name, e)))?;

            let Some(element_type) = ElementType::from_data_type(array.data_type()) else {
                warn!(
                    variable = %name,
                    data_type = ?array.data_type(),
                    "Skipping variable with unsupported element type"
                );
                continue;
            };

            let info = variable_info(&name, &array, element_type)?;
            let name_hash = hash_name(&name);
            variables.insert(
                name,
                ZarrVariable {
                    array,
                    info,
                    name_hash,
                },
            );
        }

        debug!(
            path = %root.display(),
            variables = variables.len(),
            "Opened Zarr dataset"
        );

        Ok(Self {
            root,
            variables,
            global_attributes,
            chunk_cache: Mutex::new(ChunkCache::new(config.chunk_cache_size_bytes())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Get chunk cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.chunk_cache
            .lock()
            .map(|cache| cache.stats())
            .unwrap_or_default()
    }

    fn entry(&self, name: &str) -> Result<&ZarrVariable> {
        self.variables
            .get(name)
            .ok_or_else(|| GridError::VariableNotFound(name.to_string()))
    }

    /// Read a slab straight from the array, bypassing the cache.
    fn retrieve(&self, var: &ZarrVariable, start: &[usize], shape: &[usize]) -> Result<Vec<f64>> {
        let subset = ArraySubset::new_with_start_shape(
            start.iter().map(|&s| s as u64).collect(),
            shape.iter().map(|&n| n as u64).collect(),
        )
        .map_err(|e| GridError::store_access(e.to_string()))?;

        retrieve_f64(&var.array, var.info.element_type, &subset)
    }

    /// Decoded chunk `(chunk_row, chunk_col)` of a 2-D variable.
    fn chunk(&self, var: &ZarrVariable, chunk_row: usize, chunk_col: usize) -> Result<Arc<Vec<f64>>> {
        let key = (var.name_hash, chunk_row, chunk_col);

        {
            let mut cache = self
                .chunk_cache
                .lock()
                .map_err(|_| GridError::store_access("chunk cache lock poisoned"))?;
            if let Some(data) = cache.get(&key) {
                return Ok(data);
            }
        }

        let (chunk_h, chunk_w) = chunk_dims(&var.info);
        let start = [chunk_row * chunk_h, chunk_col * chunk_w];
        let shape = [
            chunk_h.min(var.info.shape[0] - start[0]),
            chunk_w.min(var.info.shape[1] - start[1]),
        ];
        let data = Arc::new(self.retrieve(var, &start, &shape)?);

        self.chunk_cache
            .lock()
            .map_err(|_| GridError::store_access("chunk cache lock poisoned"))?
            .insert(key, Arc::clone(&data));

        Ok(data)
    }

    /// Value at `(row, col)` via the chunk cache.
    fn value_at(&self, var: &ZarrVariable, row: usize, col: usize) -> Result<f64> {
        let (chunk_h, chunk_w) = chunk_dims(&var.info);
        let (chunk_row, chunk_col) = (row / chunk_h, col / chunk_w);
        let data = self.chunk(var, chunk_row, chunk_col)?;

        // Edge chunks may be partial
        let actual_w = chunk_w.min(var.info.shape[1] - chunk_col * chunk_w);
        let idx = (row - chunk_row * chunk_h) * actual_w + (col - chunk_col * chunk_w);

        data.get(idx).copied().ok_or_else(|| {
            GridError::shape_mismatch(format!(
                "chunk ({}, {}) of '{}' holds {} values, index {} requested",
                chunk_row,
                chunk_col,
                var.info.name,
                data.len(),
                idx
            ))
        })
    }
}

impl GridStore for ZarrGridStore {
    fn variables(&self) -> Result<Vec<VariableInfo>> {
        Ok(self.variables.values().map(|v| v.info.clone()).collect())
    }

    fn variable(&self, name: &str) -> Result<VariableInfo> {
        Ok(self.entry(name)?.info.clone())
    }

    fn global_attributes(&self) -> Result<Map<String, Value>> {
        Ok(self.global_attributes.clone())
    }

    fn read_slab(&self, name: &str, start: &[usize], shape: &[usize]) -> Result<Vec<f64>> {
        let var = self.entry(name)?;
        check_slab(&var.info, start, shape)?;
        self.retrieve(var, start, shape)
    }

    fn read_orthogonal(&self, name: &str, rows: &[usize], cols: &[usize]) -> Result<Vec<f64>> {
        let var = self.entry(name)?;
        check_indices(&var.info, rows, cols)?;

        let mut out = Vec::with_capacity(rows.len() * cols.len());
        for &r in rows {
            for &c in cols {
                out.push(self.value_at(var, r, c)?);
            }
        }
        Ok(out)
    }

    /// Point lookups through the chunk cache. Each uncached pair decodes its
    /// whole chunk, so the bytes read per call scale with the number of
    /// distinct chunks touched, not with `pairs.len()`.
    fn read_pairs(&self, name: &str, pairs: &[IndexPair]) -> Result<Vec<f64>> {
        let var = self.entry(name)?;
        let rows: Vec<usize> = pairs.iter().map(|p| p[0]).collect();
        let cols: Vec<usize> = pairs.iter().map(|p| p[1]).collect();
        check_indices(&var.info, &rows, &cols)?;

        pairs
            .iter()
            .map(|&[r, c]| self.value_at(var, r, c))
            .collect()
    }

    fn pair_access(&self) -> PairAccess {
        PairAccess::Native
    }
}

/// Names of the child arrays of the root group, sorted.
fn array_names(root: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| GridError::Storage(e.to_string()))?;
        if !entry.file_type().is_dir() {
            continue;
        }

        let metadata_path = entry.path().join("zarr.json");
        if !metadata_path.is_file() {
            continue;
        }

        let metadata: Value = serde_json::from_str(&std::fs::read_to_string(&metadata_path)?)?;
        if metadata.get("node_type").and_then(Value::as_str) != Some("array") {
            continue;
        }

        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }

    names.sort();
    Ok(names)
}

fn variable_info(
    name: &str,
    array: &Array<FilesystemStore>,
    element_type: ElementType,
) -> Result<VariableInfo> {
    let shape: Vec<usize> = array.shape().iter().map(|&n| n as usize).collect();
    let attributes = array.attributes().clone();

    let dimensions = dimension_names(array, &attributes)
        .unwrap_or_else(|| (0..shape.len()).map(|d| format!("dim_{}", d)).collect());
    if dimensions.len() != shape.len() {
        return Err(GridError::invalid_metadata(format!(
            "variable '{}' has {} dimension names for rank {}",
            name,
            dimensions.len(),
            shape.len()
        )));
    }

    let chunk_shape = if shape.is_empty() {
        None
    } else {
        let origin = vec![0u64; shape.len()];
        array
            .chunk_grid()
            .chunk_shape(&origin, array.shape())
            .map_err(|e| GridError::invalid_metadata(e.to_string()))?
            .map(|cs| cs.iter().map(|n| n.get() as usize).collect())
    };

    let fill_value = element_type.decode_ne_bytes(array.fill_value().as_ne_bytes());

    Ok(VariableInfo {
        name: name.to_string(),
        dimensions,
        shape,
        chunk_shape,
        element_type,
        attributes,
        fill_value,
    })
}

/// Dimension names from the array metadata, or the xarray `_ARRAY_DIMENSIONS` attribute.
fn dimension_names(
    array: &Array<FilesystemStore>,
    attributes: &Map<String, Value>,
) -> Option<Vec<String>> {
    if let Some(names) = array.dimension_names() {
        let names: Option<Vec<String>> = names
            .iter()
            .map(|n| n.as_str().map(str::to_string))
            .collect();
        if names.is_some() {
            return names;
        }
    }

    attributes
        .get("_ARRAY_DIMENSIONS")
        .and_then(Value::as_array)
        .and_then(|names| {
            names
                .iter()
                .map(|n| n.as_str().map(str::to_string))
                .collect()
        })
}

fn chunk_dims(info: &VariableInfo) -> (usize, usize) {
    match info.chunk_shape.as_deref() {
        Some([h, w]) => ((*h).max(1), (*w).max(1)),
        _ => (info.shape[0].max(1), info.shape[1].max(1)),
    }
}

macro_rules! retrieve_as_f64 {
    ($array:expr, $subset:expr, $t:ty) => {
        $array
            .retrieve_array_subset_elements::<$t>($subset)
            .map(|values| values.into_iter().map(|v| v as f64).collect::<Vec<f64>>())
    };
}

/// Read a subset of any numeric element type as `f64`.
fn retrieve_f64(
    array: &Array<FilesystemStore>,
    element_type: ElementType,
    subset: &ArraySubset,
) -> Result<Vec<f64>> {
    let values = match element_type {
        ElementType::Int8 => retrieve_as_f64!(array, subset, i8),
        ElementType::Int16 => retrieve_as_f64!(array, subset, i16),
        ElementType::Int32 => retrieve_as_f64!(array, subset, i32),
        ElementType::Int64 => retrieve_as_f64!(array, subset, i64),
        ElementType::UInt8 => retrieve_as_f64!(array, subset, u8),
        ElementType::UInt16 => retrieve_as_f64!(array, subset, u16),
        ElementType::UInt32 => retrieve_as_f64!(array, subset, u32),
        ElementType::UInt64 => retrieve_as_f64!(array, subset, u64),
        ElementType::Float32 => retrieve_as_f64!(array, subset, f32),
        ElementType::Float64 => retrieve_as_f64!(array, subset, f64),
    };

    values.map_err(|e| GridError::store_access(e.to_string()))
}
