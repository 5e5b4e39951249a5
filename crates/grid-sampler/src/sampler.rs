//! Bounded-memory value extraction at resolved grid indices.

use projection::{Coordinate, CoordinateTransform, Crs};
use tracing::debug;

use crate::error::{GridError, Result};
use crate::resolver::GridIndexResolver;
use crate::store::{GridStore, PairAccess};
use crate::types::{is_no_data, IndexPair, VariableInfo};

/// Number of index pairs per store read under a byte budget.
///
/// Orthogonal stores read an `n x n` block for `n` pairs, so `n` is bounded
/// by the square root of the element budget. Always at least 1.
///
/// For native stores the budget caps the number of values returned per
/// batch, not the bytes read underneath. A chunked backend may load a whole
/// chunk per uncached pair, so one batch can transfer up to
/// `batch x chunk size` bytes. The chunk cache bounds what stays resident.
pub fn fetch_batch_size(access: PairAccess, max_bytes: usize, item_size: usize) -> usize {
    let elements = max_bytes / item_size.max(1);
    let size = match access {
        PairAccess::Native => elements,
        PairAccess::Orthogonal => (elements as f64).sqrt().floor() as usize,
    };
    size.max(1)
}

/// Input coordinates with their validity mask and the indices of the valid subset.
#[derive(Debug)]
pub struct SampleBatch<'a, I> {
    coordinates: &'a [Coordinate],
    valid: Vec<bool>,
    indices: Vec<I>,
}

impl<'a, I: Copy> SampleBatch<'a, I> {
    pub fn new(coordinates: &'a [Coordinate], resolved: Vec<Option<I>>) -> Result<Self> {
        if resolved.len() != coordinates.len() {
            return Err(GridError::shape_mismatch(format!(
                "{} indices resolved for {} coordinates",
                resolved.len(),
                coordinates.len()
            )));
        }

        let valid = resolved.iter().map(Option::is_some).collect();
        let indices = resolved.into_iter().flatten().collect();
        Ok(Self {
            coordinates,
            valid,
            indices,
        })
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    pub fn coordinates(&self) -> &[Coordinate] {
        self.coordinates
    }

    pub fn mask(&self) -> &[bool] {
        &self.valid
    }

    /// Indices of the valid entries, in input order.
    pub fn indices(&self) -> &[I] {
        &self.indices
    }

    /// Spread values for the valid entries back over the full input.
    pub fn scatter(&self, values: Vec<f64>, no_data: f64) -> Result<Vec<f64>> {
        if values.len() != self.indices.len() {
            return Err(GridError::shape_mismatch(format!(
                "{} values for {} valid coordinates",
                values.len(),
                self.indices.len()
            )));
        }

        let mut values = values.into_iter();
        Ok(self
            .valid
            .iter()
            .map(|&ok| if ok { values.next().unwrap_or(no_data) } else { no_data })
            .collect())
    }
}

/// One bilinear corner of an interpolated sample.
#[derive(Debug, Clone, Copy)]
enum Corner {
    /// Weight 0; does not contribute.
    Skip,
    /// Outside the array; reads as no-data.
    Outside,
    /// Position in the fetch list, with its weight.
    Fetch(usize, f64),
}

/// Nearest and bilinear sampling over a store.
pub struct GridSampler<'a, S, T> {
    store: &'a S,
    resolver: &'a GridIndexResolver<T>,
}

impl<'a, S: GridStore, T: CoordinateTransform> GridSampler<'a, S, T> {
    pub fn new(store: &'a S, resolver: &'a GridIndexResolver<T>) -> Self {
        Self { store, resolver }
    }

    /// Value of the containing cell for each coordinate.
    ///
    /// Out-of-extent coordinates yield the variable's no-data value.
    pub fn sample_nearest(
        &self,
        coords: &[Coordinate],
        source_crs: Option<&Crs>,
        max_bytes: usize,
        variable: &VariableInfo,
    ) -> Result<Vec<f64>> {
        let resolved = self.resolver.resolve_nearest(coords, source_crs)?;
        let batch = SampleBatch::new(coords, resolved)?;
        let values = self.fetch(variable, batch.indices(), max_bytes)?;
        batch.scatter(values, variable.no_data())
    }

    /// Bilinear blend of the four surrounding cells for each coordinate.
    ///
    /// A sample is no-data when any contributing corner is no-data or lies
    /// outside the array, or when its nearest cell is no-data.
    pub fn sample_interpolated(
        &self,
        coords: &[Coordinate],
        source_crs: Option<&Crs>,
        max_bytes: usize,
        variable: &VariableInfo,
    ) -> Result<Vec<f64>> {
        let no_data = variable.no_data();
        let resolved = self.resolver.resolve_fractional(coords, source_crs)?;
        let batch = SampleBatch::new(coords, resolved)?;
        if batch.indices().is_empty() {
            return batch.scatter(Vec::new(), no_data);
        }

        let [rows, cols] = self.resolver.geometry().shape();
        let mut fetch_list: Vec<IndexPair> = Vec::with_capacity(batch.indices().len() * 4);
        let plans: Vec<[Corner; 4]> = batch
            .indices()
            .iter()
            .map(|&[f0, f1]| {
                let (i0, j0) = (f0.floor(), f1.floor());
                let (t0, t1) = (f0 - i0, f1 - j0);
                let (i0, j0) = (i0 as i64, j0 as i64);

                let corners = [
                    (i0, j0, (1.0 - t0) * (1.0 - t1)),
                    (i0 + 1, j0, t0 * (1.0 - t1)),
                    (i0, j0 + 1, (1.0 - t0) * t1),
                    (i0 + 1, j0 + 1, t0 * t1),
                ];

                corners.map(|(i, j, w)| {
                    if w <= 0.0 {
                        Corner::Skip
                    } else if i < 0 || j < 0 || i as usize >= rows || j as usize >= cols {
                        Corner::Outside
                    } else {
                        fetch_list.push([i as usize, j as usize]);
                        Corner::Fetch(fetch_list.len() - 1, w)
                    }
                })
            })
            .collect();

        let fetched = self.fetch(variable, &fetch_list, max_bytes)?;

        let blended = plans
            .iter()
            .map(|plan| {
                let mut sum = 0.0;
                for corner in plan {
                    match *corner {
                        Corner::Skip => {}
                        Corner::Outside => return no_data,
                        Corner::Fetch(slot, w) => {
                            let v = fetched[slot];
                            if is_no_data(v, no_data) {
                                return no_data;
                            }
                            sum += w * v;
                        }
                    }
                }
                sum
            })
            .collect();

        let mut values = batch.scatter(blended, no_data)?;

        let nearest = self.sample_nearest(coords, source_crs, max_bytes, variable)?;
        for (value, near) in values.iter_mut().zip(nearest) {
            if is_no_data(near, no_data) {
                *value = no_data;
            }
        }

        Ok(values)
    }

    /// Read values at `indices` in batches bounded by `max_bytes`.
    pub fn fetch(
        &self,
        variable: &VariableInfo,
        indices: &[IndexPair],
        max_bytes: usize,
    ) -> Result<Vec<f64>> {
        if indices.is_empty() {
            return Ok(Vec::new());
        }

        let access = self.store.pair_access();
        let batch_size = fetch_batch_size(access, max_bytes, variable.element_type.size());
        let mut values = Vec::with_capacity(indices.len());

        for (batch_index, pairs) in indices.chunks(batch_size).enumerate() {
            debug!(
                variable = %variable.name,
                batch = batch_index,
                size = pairs.len(),
                max_bytes,
                access = ?access,
                "Fetching sample batch"
            );

            let fetched = self.store.read_pairs(&variable.name, pairs)?;
            if fetched.len() != pairs.len() {
                return Err(GridError::shape_mismatch(format!(
                    "store returned {} values for {} index pairs",
                    fetched.len(),
                    pairs.len()
                )));
            }
            values.extend(fetched);
        }

        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GridGeometry;
    use crate::store::MemoryGridStore;
    use crate::types::AxisOrder;
    use projection::Proj4Transform;
    use serde_json::{json, Map, Value};

    const NO_DATA: f64 = -9999.0;

    fn resolver() -> GridIndexResolver<Proj4Transform> {
        let geometry = GridGeometry::new(
            [vec![0.0, 10.0, 20.0], vec![0.0, 10.0, 20.0, 30.0]],
            ["y".to_string(), "x".to_string()],
            AxisOrder::NorthingFirst,
            Some([10.0, 10.0]),
            Crs::Epsg(32755),
        )
        .unwrap();
        GridIndexResolver::new(geometry, Proj4Transform::new(), 1e-6)
    }

    /// Values `row * 10 + col`, with cell (2, 3) set to no-data.
    fn store(fill: f64) -> MemoryGridStore {
        let mut data: Vec<f64> = (0..3)
            .flat_map(|r| (0..4).map(move |c| (r * 10 + c) as f64))
            .collect();
        data[11] = fill;

        let mut attrs = Map::new();
        attrs.insert("grid_mapping".to_string(), json!("crs"));
        attrs.insert(
            "_FillValue".to_string(),
            if fill.is_nan() { json!("NaN") } else { json!(fill) },
        );

        MemoryGridStore::new()
            .with_variable("elevation", &["y", "x"], &[3, 4], data, attrs)
            .unwrap()
    }

    /// Store whose reads always fail.
    struct FailingStore(VariableInfo);

    impl GridStore for FailingStore {
        fn variables(&self) -> Result<Vec<VariableInfo>> {
            Ok(vec![self.0.clone()])
        }

        fn global_attributes(&self) -> Result<Map<String, Value>> {
            Ok(Map::new())
        }

        fn read_slab(&self, _: &str, _: &[usize], _: &[usize]) -> Result<Vec<f64>> {
            Err(GridError::store_access("disk on fire"))
        }

        fn read_orthogonal(&self, _: &str, _: &[usize], _: &[usize]) -> Result<Vec<f64>> {
            Err(GridError::store_access("disk on fire"))
        }
    }

    fn grid_coords() -> Vec<Coordinate> {
        (0..9)
            .flat_map(|i| (0..7).map(move |j| Coordinate::new(i as f64 * 4.5 - 4.0, j as f64 * 4.5 - 4.0)))
            .collect()
    }

    #[test]
    fn test_batch_size_bounds() {
        assert_eq!(fetch_batch_size(PairAccess::Orthogonal, 400, 4), 10);
        assert_eq!(fetch_batch_size(PairAccess::Orthogonal, 399, 4), 9);
        assert_eq!(fetch_batch_size(PairAccess::Native, 400, 4), 100);
        assert_eq!(fetch_batch_size(PairAccess::Orthogonal, 1, 8), 1);
        assert_eq!(fetch_batch_size(PairAccess::Native, 0, 8), 1);
    }

    #[test]
    fn test_sample_batch_scatter() {
        let coords = [Coordinate::new(0.0, 0.0); 3];
        let batch = SampleBatch::new(&coords, vec![Some([0, 0]), None, Some([1, 1])]).unwrap();
        assert_eq!(batch.mask(), &[true, false, true]);
        assert_eq!(batch.indices(), &[[0, 0], [1, 1]]);
        assert_eq!(batch.scatter(vec![1.0, 2.0], NO_DATA).unwrap(), vec![1.0, NO_DATA, 2.0]);
        assert!(matches!(batch.scatter(vec![1.0], NO_DATA), Err(GridError::ShapeMismatch(_))));
        assert!(SampleBatch::<IndexPair>::new(&coords, vec![None]).is_err());
    }

    #[test]
    fn test_nearest_values_and_no_data() {
        let r = resolver();
        let s = store(NO_DATA);
        let var = s.variable("elevation").unwrap();
        let sampler = GridSampler::new(&s, &r);

        let coords = [
            Coordinate::new(5.0, 5.0),
            Coordinate::new(35.0, 5.0),
            Coordinate::new(21.0, 14.0),
            Coordinate::new(30.0, 20.0),
        ];
        let values = sampler.sample_nearest(&coords, None, 1_000, &var).unwrap();
        assert_eq!(values, vec![0.0, NO_DATA, 12.0, NO_DATA]);
    }

    #[test]
    fn test_results_independent_of_batch_size() {
        let r = resolver();
        let s = store(NO_DATA);
        let var = s.variable("elevation").unwrap();
        let sampler = GridSampler::new(&s, &r);
        let coords = grid_coords();

        let reference = sampler.sample_nearest(&coords, None, 1_000_000, &var).unwrap();
        for max_bytes in [1, 8, 64, 200, 4096] {
            assert_eq!(sampler.sample_nearest(&coords, None, max_bytes, &var).unwrap(), reference);
        }

        let reference = sampler.sample_interpolated(&coords, None, 1_000_000, &var).unwrap();
        for max_bytes in [1, 72, 4096] {
            assert_eq!(sampler.sample_interpolated(&coords, None, max_bytes, &var).unwrap(), reference);
        }
    }

    #[test]
    fn test_empty_and_out_of_extent_inputs() {
        let r = resolver();
        let s = store(NO_DATA);
        let var = s.variable("elevation").unwrap();
        let sampler = GridSampler::new(&s, &r);

        assert!(sampler.sample_nearest(&[], None, 100, &var).unwrap().is_empty());
        assert!(sampler.sample_interpolated(&[], None, 100, &var).unwrap().is_empty());

        let outside = [Coordinate::new(100.0, 100.0), Coordinate::new(-50.0, 0.0)];
        assert_eq!(sampler.sample_nearest(&outside, None, 100, &var).unwrap(), vec![NO_DATA; 2]);
        assert_eq!(sampler.sample_interpolated(&outside, None, 100, &var).unwrap(), vec![NO_DATA; 2]);
        assert_eq!(s.read_count(), 0);
    }

    #[test]
    fn test_interpolated_at_centre_equals_nearest() {
        let r = resolver();
        let s = store(NO_DATA);
        let var = s.variable("elevation").unwrap();
        let sampler = GridSampler::new(&s, &r);

        let centres: Vec<Coordinate> = (0..3)
            .flat_map(|row| (0..4).map(move |col| [row, col]))
            .filter_map(|index| r.cell_centre(index))
            .collect();

        let nearest = sampler.sample_nearest(&centres, None, 1_000, &var).unwrap();
        let interpolated = sampler.sample_interpolated(&centres, None, 1_000, &var).unwrap();
        assert_eq!(nearest, interpolated);
    }

    #[test]
    fn test_bilinear_blend() {
        let r = resolver();
        let s = store(NO_DATA);
        let var = s.variable("elevation").unwrap();
        let sampler = GridSampler::new(&s, &r);

        // Between cells (0,0), (0,1), (1,0), (1,1) = 0, 1, 10, 11
        let values = sampler
            .sample_interpolated(&[Coordinate::new(5.0, 5.0), Coordinate::new(2.5, 0.0)], None, 1_000, &var)
            .unwrap();
        assert!((values[0] - 5.5).abs() < 1e-9);
        assert!((values[1] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_interpolation_respects_no_data() {
        let r = resolver();
        let s = store(NO_DATA);
        let var = s.variable("elevation").unwrap();
        let sampler = GridSampler::new(&s, &r);

        let coords = [
            // Corner (2, 3) is no-data with positive weight
            Coordinate::new(25.0, 15.0),
            // Upper half of the last column reaches outside the array
            Coordinate::new(32.0, 0.0),
            // Lower half of the first cell reaches outside too
            Coordinate::new(-2.0, 0.0),
        ];
        let values = sampler.sample_interpolated(&coords, None, 1_000, &var).unwrap();
        assert_eq!(values, vec![NO_DATA; 3]);
    }

    #[test]
    fn test_edge_ring_interpolates_to_no_data() {
        let r = resolver();
        let s = store(NO_DATA);
        let var = s.variable("elevation").unwrap();
        let sampler = GridSampler::new(&s, &r);

        // Beyond the outer centre lines, inside the extent
        let ring = [
            Coordinate::new(-3.0, 5.0),
            Coordinate::new(5.0, -3.0),
            Coordinate::new(33.0, 5.0),
        ];
        let nearest = sampler.sample_nearest(&ring, None, 1_000, &var).unwrap();
        assert_eq!(nearest, vec![0.0, 0.0, 3.0]);
        let interpolated = sampler.sample_interpolated(&ring, None, 1_000, &var).unwrap();
        assert_eq!(interpolated, vec![NO_DATA; 3]);

        // On the outer centre lines the outside corner has zero weight
        let edge = [Coordinate::new(0.0, 5.0), Coordinate::new(5.0, 0.0)];
        let interpolated = sampler.sample_interpolated(&edge, None, 1_000, &var).unwrap();
        assert!((interpolated[0] - 5.0).abs() < 1e-9);
        assert!((interpolated[1] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_nan_fill_value() {
        let r = resolver();
        let s = store(f64::NAN);
        let var = s.variable("elevation").unwrap();
        assert!(var.no_data().is_nan());
        let sampler = GridSampler::new(&s, &r);

        let values = sampler
            .sample_interpolated(&[Coordinate::new(30.0, 20.0), Coordinate::new(0.0, 0.0)], None, 1_000, &var)
            .unwrap();
        assert!(values[0].is_nan());
        assert_eq!(values[1], 0.0);
    }

    #[test]
    fn test_store_failure_propagates() {
        let r = resolver();
        let var = store(NO_DATA).variable("elevation").unwrap();
        let failing = FailingStore(var.clone());
        let sampler = GridSampler::new(&failing, &r);

        let result = sampler.sample_nearest(&[Coordinate::new(5.0, 5.0)], None, 1_000, &var);
        assert!(matches!(result, Err(GridError::StoreAccess(_))));
    }
}
