//! In-memory grid store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Map, Value};

use super::{check_indices, check_slab, GridStore};
use crate::error::{GridError, Result};
use crate::types::{ElementType, VariableInfo};

/// A dataset held entirely in memory.
///
/// Only orthogonal reads are supported for index pairs, so paired sampling
/// goes through diagonal extraction.
#[derive(Debug, Default)]
pub struct MemoryGridStore {
    variables: BTreeMap<String, (VariableInfo, Vec<f64>)>,
    global_attributes: Map<String, Value>,
    reads: AtomicUsize,
}

impl MemoryGridStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable with row-major `data`.
    pub fn with_variable(
        mut self,
        name: &str,
        dimensions: &[&str],
        shape: &[usize],
        data: Vec<f64>,
        attributes: Map<String, Value>,
    ) -> Result<Self> {
        if dimensions.len() != shape.len() {
            return Err(GridError::shape_mismatch(format!(
                "variable '{}' has {} dimension names for rank {}",
                name,
                dimensions.len(),
                shape.len()
            )));
        }

        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(GridError::shape_mismatch(format!(
                "variable '{}' has {} values for shape {:?}",
                name,
                data.len(),
                shape
            )));
        }

        let info = VariableInfo {
            name: name.to_string(),
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            shape: shape.to_vec(),
            chunk_shape: None,
            element_type: ElementType::Float64,
            attributes,
            fill_value: None,
        };
        self.variables.insert(name.to_string(), (info, data));
        Ok(self)
    }

    /// Add a 1-D coordinate variable named after its dimension.
    pub fn with_coordinate(self, name: &str, values: Vec<f64>) -> Result<Self> {
        let len = values.len();
        self.with_variable(name, &[name], &[len], values, Map::new())
    }

    pub fn with_global_attribute(mut self, key: &str, value: Value) -> Self {
        self.global_attributes.insert(key.to_string(), value);
        self
    }

    /// Number of value reads served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    fn entry(&self, name: &str) -> Result<&(VariableInfo, Vec<f64>)> {
        self.variables
            .get(name)
            .ok_or_else(|| GridError::VariableNotFound(name.to_string()))
    }
}

impl GridStore for MemoryGridStore {
    fn variables(&self) -> Result<Vec<VariableInfo>> {
        Ok(self.variables.values().map(|(info, _)| info.clone()).collect())
    }

    fn variable(&self, name: &str) -> Result<VariableInfo> {
        Ok(self.entry(name)?.0.clone())
    }

    fn global_attributes(&self) -> Result<Map<String, Value>> {
        Ok(self.global_attributes.clone())
    }

    fn read_slab(&self, name: &str, start: &[usize], shape: &[usize]) -> Result<Vec<f64>> {
        let (info, data) = self.entry(name)?;
        check_slab(info, start, shape)?;
        self.reads.fetch_add(1, Ordering::Relaxed);

        let count: usize = shape.iter().product();
        let mut out = Vec::with_capacity(count);
        if count == 0 {
            return Ok(out);
        }

        // Row-major strides of the stored array
        let rank = info.ndim();
        let mut strides = vec![1usize; rank];
        for d in (0..rank.saturating_sub(1)).rev() {
            strides[d] = strides[d + 1] * info.shape[d + 1];
        }

        let mut index = vec![0usize; rank];
        for _ in 0..count {
            let offset: usize = index
                .iter()
                .zip(start)
                .zip(&strides)
                .map(|((i, s), stride)| (i + s) * stride)
                .sum();
            out.push(data[offset]);

            for d in (0..rank).rev() {
                index[d] += 1;
                if index[d] < shape[d] {
                    break;
                }
                index[d] = 0;
            }
        }

        Ok(out)
    }

    fn read_orthogonal(&self, name: &str, rows: &[usize], cols: &[usize]) -> Result<Vec<f64>> {
        let (info, data) = self.entry(name)?;
        check_indices(info, rows, cols)?;
        self.reads.fetch_add(1, Ordering::Relaxed);

        let width = info.shape[1];
        Ok(rows
            .iter()
            .flat_map(|&r| cols.iter().map(move |&c| data[r * width + c]))
            .collect())
    }
}
