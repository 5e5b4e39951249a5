//! Storage backends for gridded datasets.
//!
//! A [`GridStore`] exposes the variables of one dataset and reads their values
//! as `f64`. Sampling only needs three read shapes: contiguous slabs (axes),
//! orthogonal blocks and index pairs. Backends that can read index pairs
//! directly report [`PairAccess::Native`]; everything else goes through the
//! default orthogonal-block implementation of [`GridStore::read_pairs`].

mod memory;
mod zarr;

pub use memory::MemoryGridStore;
pub use zarr::ZarrGridStore;

use serde_json::{Map, Value};

use crate::error::{GridError, Result};
use crate::types::{IndexPair, VariableInfo};

/// How a store serves paired-index reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairAccess {
    /// `n` pairs cost `n` element reads.
    Native,
    /// `n` pairs cost an `n x n` orthogonal block.
    Orthogonal,
}

/// Read access to a gridded dataset.
pub trait GridStore {
    /// All numeric variables, sorted by name.
    fn variables(&self) -> Result<Vec<VariableInfo>>;

    /// Metadata for one variable.
    fn variable(&self, name: &str) -> Result<VariableInfo> {
        self.variables()?
            .into_iter()
            .find(|v| v.name == name)
            .ok_or_else(|| GridError::VariableNotFound(name.to_string()))
    }

    /// Dataset-level attributes.
    fn global_attributes(&self) -> Result<Map<String, Value>>;

    /// Read a hyper-rectangle in row-major order.
    fn read_slab(&self, name: &str, start: &[usize], shape: &[usize]) -> Result<Vec<f64>>;

    /// Read a whole variable in row-major order.
    fn read_all(&self, name: &str) -> Result<Vec<f64>> {
        let info = self.variable(name)?;
        let start = vec![0; info.ndim()];
        self.read_slab(name, &start, &info.shape)
    }

    /// Read the cartesian product of `rows` and `cols` from a 2-D variable.
    ///
    /// The result has `rows.len() * cols.len()` values, row-major.
    fn read_orthogonal(&self, name: &str, rows: &[usize], cols: &[usize]) -> Result<Vec<f64>>;

    /// Read the values at each index pair of a 2-D variable, in input order.
    ///
    /// The default reads the orthogonal block of all rows and columns and keeps
    /// its diagonal.
    fn read_pairs(&self, name: &str, pairs: &[IndexPair]) -> Result<Vec<f64>> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<usize> = pairs.iter().map(|p| p[0]).collect();
        let cols: Vec<usize> = pairs.iter().map(|p| p[1]).collect();
        let block = self.read_orthogonal(name, &rows, &cols)?;

        let n = pairs.len();
        if block.len() != n * n {
            return Err(GridError::shape_mismatch(format!(
                "orthogonal read of {} pairs from '{}' returned {} values, expected {}",
                n,
                name,
                block.len(),
                n * n
            )));
        }

        Ok((0..n).map(|i| block[i * n + i]).collect())
    }

    fn pair_access(&self) -> PairAccess {
        PairAccess::Orthogonal
    }
}

/// Check that a slab request lies inside `shape`.
pub(crate) fn check_slab(
    info: &VariableInfo,
    start: &[usize],
    shape: &[usize],
) -> Result<()> {
    if start.len() != info.ndim() || shape.len() != info.ndim() {
        return Err(GridError::shape_mismatch(format!(
            "slab of rank {} requested from {}-D variable '{}'",
            start.len(),
            info.ndim(),
            info.name
        )));
    }

    for (d, ((&s, &n), &size)) in start.iter().zip(shape).zip(&info.shape).enumerate() {
        if s + n > size {
            return Err(GridError::invalid_argument(format!(
                "slab [{}, {}) exceeds dimension {} of '{}' (size {})",
                s,
                s + n,
                d,
                info.name,
                size
            )));
        }
    }

    Ok(())
}

/// Check that every index lies inside a 2-D variable.
pub(crate) fn check_indices(info: &VariableInfo, rows: &[usize], cols: &[usize]) -> Result<()> {
    if info.ndim() != 2 {
        return Err(GridError::shape_mismatch(format!(
            "indexed read from {}-D variable '{}'",
            info.ndim(),
            info.name
        )));
    }

    let out_of_range = rows
        .iter()
        .find(|&&r| r >= info.shape[0])
        .map(|r| (0, *r))
        .or_else(|| cols.iter().find(|&&c| c >= info.shape[1]).map(|c| (1, *c)));

    match out_of_range {
        Some((dim, index)) => Err(GridError::invalid_argument(format!(
            "index {} out of range for dimension {} of '{}' (size {})",
            index, dim, info.name, info.shape[dim]
        ))),
        None => Ok(()),
    }
}
