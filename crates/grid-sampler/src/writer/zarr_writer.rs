//! Zarr V3 writer for gridded variables.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;
use zarrs::array::{Array, ArrayBuilder, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::GroupBuilder;
use zarrs_filesystem::FilesystemStore;

use crate::config::CompressionOptions;
use crate::error::{GridError, Result};
use crate::store::check_slab;
use crate::types::{ElementType, VariableInfo};

/// Description of a variable to create.
#[derive(Debug, Clone)]
pub struct VariableSpec {
    pub name: String,
    pub dimensions: Vec<String>,
    pub shape: Vec<usize>,
    /// Chunk shape; the whole array when empty.
    pub chunk_shape: Vec<usize>,
    pub element_type: ElementType,
    /// Array fill value; NaN for floats and zero for integers when unset.
    pub fill_value: Option<f64>,
    pub attributes: Map<String, Value>,
}

impl VariableSpec {
    pub fn new(
        name: impl Into<String>,
        dimensions: &[&str],
        shape: &[usize],
        element_type: ElementType,
    ) -> Self {
        Self {
            name: name.into(),
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            shape: shape.to_vec(),
            chunk_shape: Vec::new(),
            element_type,
            fill_value: None,
            attributes: Map::new(),
        }
    }

    pub fn with_chunk_shape(mut self, chunk_shape: &[usize]) -> Self {
        self.chunk_shape = chunk_shape.to_vec();
        self
    }

    pub fn with_fill_value(mut self, fill_value: f64) -> Self {
        self.fill_value = Some(fill_value);
        self
    }

    pub fn with_attribute(mut self, key: &str, value: Value) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    pub fn with_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    /// Description of a variable shaped like an existing one.
    pub fn like(info: &VariableInfo) -> Self {
        Self {
            name: info.name.clone(),
            dimensions: info.dimensions.clone(),
            shape: info.shape.clone(),
            chunk_shape: info.chunk_shape.clone().unwrap_or_default(),
            element_type: info.element_type,
            fill_value: info.fill_value,
            attributes: info.attributes.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.contains('/') {
            return Err(GridError::invalid_argument(format!(
                "invalid variable name '{}'",
                self.name
            )));
        }
        if self.dimensions.len() != self.shape.len() {
            return Err(GridError::shape_mismatch(format!(
                "variable '{}' has {} dimension names for rank {}",
                self.name,
                self.dimensions.len(),
                self.shape.len()
            )));
        }
        if !self.chunk_shape.is_empty() && self.chunk_shape.len() != self.shape.len() {
            return Err(GridError::shape_mismatch(format!(
                "variable '{}' has chunk rank {} for rank {}",
                self.name,
                self.chunk_shape.len(),
                self.shape.len()
            )));
        }
        Ok(())
    }

    fn chunk_grid_shape(&self) -> Vec<u64> {
        if self.chunk_shape.is_empty() {
            self.shape.iter().map(|&n| n.max(1) as u64).collect()
        } else {
            self.chunk_shape.iter().map(|&n| n.max(1) as u64).collect()
        }
    }

    fn zarr_fill_value(&self) -> FillValue {
        let v = self
            .fill_value
            .unwrap_or(if self.element_type.is_float() { f64::NAN } else { 0.0 });
        match self.element_type {
            ElementType::Int8 => FillValue::from(v as i8),
            ElementType::Int16 => FillValue::from(v as i16),
            ElementType::Int32 => FillValue::from(v as i32),
            ElementType::Int64 => FillValue::from(v as i64),
            ElementType::UInt8 => FillValue::from(v as u8),
            ElementType::UInt16 => FillValue::from(v as u16),
            ElementType::UInt32 => FillValue::from(v as u32),
            ElementType::UInt64 => FillValue::from(v as u64),
            ElementType::Float32 => FillValue::from(v as f32),
            ElementType::Float64 => FillValue::from(v),
        }
    }
}

struct WrittenArray {
    array: Array<FilesystemStore>,
    spec: VariableSpec,
}

/// Writes a Zarr V3 group of variables to a local directory.
pub struct GridWriter {
    root: PathBuf,
    store: Arc<FilesystemStore>,
    compression: CompressionOptions,
    arrays: BTreeMap<String, WrittenArray>,
}

impl GridWriter {
    /// Create the dataset directory and an empty root group.
    pub fn create(path: impl AsRef<Path>, compression: CompressionOptions) -> Result<Self> {
        compression.validate().map_err(GridError::Configuration)?;

        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let store = Arc::new(
            FilesystemStore::new(&root).map_err(|e| GridError::Storage(e.to_string()))?,
        );

        let writer = Self {
            root,
            store,
            compression,
            arrays: BTreeMap::new(),
        };
        writer.write_group_attributes(Map::new())?;
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Replace the root group attributes.
    pub fn write_group_attributes(&self, attributes: Map<String, Value>) -> Result<()> {
        let group = GroupBuilder::new()
            .attributes(attributes)
            .build(self.store.clone(), "/")
            .map_err(|e| GridError::zarr(e.to_string()))?;
        group
            .store_metadata()
            .map_err(|e| GridError::Storage(e.to_string()))
    }

    /// Create a variable and write its metadata.
    pub fn create_variable(&mut self, spec: VariableSpec) -> Result<()> {
        spec.validate()?;

        let chunk_grid: zarrs::array::ChunkGrid = spec
            .chunk_grid_shape()
            .try_into()
            .map_err(|e| GridError::configuration(format!("{:?}", e)))?;

        let mut binding = ArrayBuilder::new(
            spec.shape.iter().map(|&n| n as u64).collect::<Vec<_>>(),
            spec.element_type.data_type(),
            chunk_grid,
            spec.zarr_fill_value(),
        );
        let builder = binding
            .attributes(spec.attributes.clone())
            .dimension_names(Some(
                spec.dimensions.iter().map(String::as_str).collect::<Vec<_>>(),
            ))
            .bytes_to_bytes_codecs(self.compression.codecs(spec.element_type.size())?);

        let array = builder
            .build(self.store.clone(), &format!("/{}", spec.name))
            .map_err(|e| GridError::zarr(format!("{}: {}", spec.name, e)))?;
        array
            .store_metadata()
            .map_err(|e| GridError::Storage(e.to_string()))?;

        debug!(
            variable = %spec.name,
            shape = ?spec.shape,
            element_type = %spec.element_type,
            compression = %self.compression.compression,
            "Created variable"
        );

        self.arrays
            .insert(spec.name.clone(), WrittenArray { array, spec });
        Ok(())
    }

    /// Write row-major `data` into the slab at `start` with `shape`.
    ///
    /// Values are cast to the variable's element type. Returns the bytes
    /// written before compression.
    pub fn write_slab(
        &self,
        name: &str,
        start: &[usize],
        shape: &[usize],
        data: &[f64],
    ) -> Result<u64> {
        let written = self
            .arrays
            .get(name)
            .ok_or_else(|| GridError::VariableNotFound(name.to_string()))?;
        let info = written.info();
        check_slab(&info, start, shape)?;

        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(GridError::shape_mismatch(format!(
                "{} values for slab {:?} of '{}'",
                data.len(),
                shape,
                name
            )));
        }
        if expected == 0 {
            return Ok(0);
        }

        let subset = ArraySubset::new_with_start_shape(
            start.iter().map(|&s| s as u64).collect(),
            shape.iter().map(|&n| n as u64).collect(),
        )
        .map_err(|e| GridError::store_access(e.to_string()))?;

        store_f64(&written.array, written.spec.element_type, &subset, data)?;
        Ok((data.len() * written.spec.element_type.size()) as u64)
    }

    /// Create a variable and write all of its values.
    pub fn write_variable(&mut self, spec: VariableSpec, data: &[f64]) -> Result<u64> {
        let name = spec.name.clone();
        let shape = spec.shape.clone();
        self.create_variable(spec)?;
        self.write_slab(&name, &vec![0; shape.len()], &shape, data)
    }

    /// Variables created so far, by name.
    pub fn variables(&self) -> Vec<VariableInfo> {
        self.arrays.values().map(WrittenArray::info).collect()
    }
}

impl WrittenArray {
    fn info(&self) -> VariableInfo {
        VariableInfo {
            name: self.spec.name.clone(),
            dimensions: self.spec.dimensions.clone(),
            shape: self.spec.shape.clone(),
            chunk_shape: Some(
                self.spec
                    .chunk_grid_shape()
                    .into_iter()
                    .map(|n| n as usize)
                    .collect(),
            ),
            element_type: self.spec.element_type,
            attributes: self.spec.attributes.clone(),
            fill_value: self.spec.fill_value,
        }
    }
}

macro_rules! store_as {
    ($array:expr, $subset:expr, $data:expr, $t:ty) => {
        $array.store_array_subset_elements::<$t>(
            $subset,
            &$data.iter().map(|&v| v as $t).collect::<Vec<$t>>(),
        )
    };
}

/// Store `f64` values as the array's native element type.
fn store_f64(
    array: &Array<FilesystemStore>,
    element_type: ElementType,
    subset: &ArraySubset,
    data: &[f64],
) -> Result<()> {
    let result = match element_type {
        ElementType::Int8 => store_as!(array, subset, data, i8),
        ElementType::Int16 => store_as!(array, subset, data, i16),
        ElementType::Int32 => store_as!(array, subset, data, i32),
        ElementType::Int64 => store_as!(array, subset, data, i64),
        ElementType::UInt8 => store_as!(array, subset, data, u8),
        ElementType::UInt16 => store_as!(array, subset, data, u16),
        ElementType::UInt32 => store_as!(array, subset, data, u32),
        ElementType::UInt64 => store_as!(array, subset, data, u64),
        ElementType::Float32 => store_as!(array, subset, data, f32),
        ElementType::Float64 => array.store_array_subset_elements::<f64>(subset, data),
    };

    result.map_err(|e| GridError::store_access(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SamplerConfig, ZarrCompression};
    use crate::store::{GridStore, ZarrGridStore};
    use serde_json::json;

    fn values(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64 * 0.5).collect()
    }

    #[test]
    fn test_write_and_reopen_uncompressed() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = GridWriter::create(dir.path(), CompressionOptions::uncompressed()).unwrap();

        let mut attrs = Map::new();
        attrs.insert("title".to_string(), json!("test grid"));
        writer.write_group_attributes(attrs).unwrap();

        let spec = VariableSpec::new("band", &["y", "x"], &[6, 5], ElementType::Float32)
            .with_chunk_shape(&[4, 4])
            .with_fill_value(-1.0)
            .with_attribute("units", json!("m"));
        writer.write_variable(spec, &values(30)).unwrap();

        let store = ZarrGridStore::open(dir.path(), &SamplerConfig::default()).unwrap();
        assert_eq!(store.global_attributes().unwrap()["title"], json!("test grid"));

        let info = store.variable("band").unwrap();
        assert_eq!(info.dimensions, vec!["y", "x"]);
        assert_eq!(info.shape, vec![6, 5]);
        assert_eq!(info.chunk_shape, Some(vec![4, 4]));
        assert_eq!(info.element_type, ElementType::Float32);
        assert_eq!(info.fill_value, Some(-1.0));
        assert_eq!(info.attributes["units"], json!("m"));

        assert_eq!(store.read_all("band").unwrap(), values(30));
    }

    #[test]
    fn test_slabs_cast_to_integer_types() {
        let dir = tempfile::tempdir().unwrap();
        let compression = CompressionOptions {
            compression: ZarrCompression::BloscLz4,
            level: 1,
            ..Default::default()
        };
        let mut writer = GridWriter::create(dir.path(), compression).unwrap();

        writer
            .create_variable(
                VariableSpec::new("counts", &["y", "x"], &[4, 4], ElementType::Int16)
                    .with_chunk_shape(&[2, 2]),
            )
            .unwrap();
        let bytes = writer
            .write_slab("counts", &[1, 1], &[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap();
        assert_eq!(bytes, 12);

        let store = ZarrGridStore::open(dir.path(), &SamplerConfig::default()).unwrap();
        assert_eq!(store.read_slab("counts", &[1, 1], &[1, 3]).unwrap(), vec![1.0, 2.0, 3.0]);
        // Unwritten cells hold the fill value
        assert_eq!(store.read_slab("counts", &[0, 0], &[1, 1]).unwrap(), vec![0.0]);
    }

    #[test]
    fn test_write_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = GridWriter::create(dir.path(), CompressionOptions::uncompressed()).unwrap();

        assert!(matches!(
            writer.write_slab("missing", &[0], &[1], &[0.0]),
            Err(GridError::VariableNotFound(_))
        ));
        assert!(matches!(
            writer.create_variable(VariableSpec::new("bad", &["x"], &[2, 2], ElementType::Float64)),
            Err(GridError::ShapeMismatch(_))
        ));

        writer
            .create_variable(VariableSpec::new("v", &["x"], &[4], ElementType::Float64))
            .unwrap();
        assert!(matches!(
            writer.write_slab("v", &[0], &[4], &[1.0, 2.0]),
            Err(GridError::ShapeMismatch(_))
        ));
        assert!(writer.write_slab("v", &[2], &[3], &[1.0, 2.0, 3.0]).is_err());
    }
}
