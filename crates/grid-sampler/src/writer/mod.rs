//! Zarr V3 output for grid datasets.
//!
//! Used by the copy utility and the test fixtures to lay out a dataset as a
//! root group of named variables.

mod zarr_writer;

pub use zarr_writer::{GridWriter, VariableSpec};
