//! Coordinate transforms between reference systems.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use proj4rs::Proj;
use tracing::debug;

use crate::crs::Crs;
use crate::error::{ProjectionError, ProjectionResult};
use crate::utm::UtmZone;
use crate::Coordinate;

/// Boundary between grid sampling and the projection library.
pub trait CoordinateTransform {
    /// Transform a batch of coordinates from one CRS to another.
    ///
    /// Geographic coordinates are longitude/latitude in degrees.
    fn transform(
        &self,
        coords: &[Coordinate],
        from: &Crs,
        to: &Crs,
    ) -> ProjectionResult<Vec<Coordinate>>;

    /// A projected CRS in metres suitable for distances around `point`.
    fn nominal_metric_crs(&self, point: Coordinate, from: &Crs) -> ProjectionResult<Crs>;

    fn is_metric(&self, crs: &Crs) -> bool {
        crs.is_metric()
    }

    /// Transform a single coordinate.
    fn transform_point(
        &self,
        point: Coordinate,
        from: &Crs,
        to: &Crs,
    ) -> ProjectionResult<Coordinate> {
        self.transform(&[point], from, to)?
            .into_iter()
            .next()
            .ok_or_else(|| ProjectionError::transform_failed(from, to, "no output coordinate"))
    }

    /// Transform coordinates one at a time.
    ///
    /// A coordinate that cannot be transformed, or transforms to a non-finite
    /// value, yields `None` in its slot. Errors about the reference systems
    /// themselves are still returned.
    fn transform_each(
        &self,
        coords: &[Coordinate],
        from: &Crs,
        to: &Crs,
    ) -> ProjectionResult<Vec<Option<Coordinate>>> {
        if from == to {
            return Ok(coords.iter().copied().map(Some).collect());
        }

        coords
            .iter()
            .map(|&c| match self.transform_point(c, from, to) {
                Ok(out) => Ok(out.is_finite().then_some(out)),
                Err(ProjectionError::TransformFailed { .. }) => Ok(None),
                Err(e) => Err(e),
            })
            .collect()
    }
}

/// [`CoordinateTransform`] backed by the pure-Rust `proj4rs` crate.
///
/// Parsed projections are cached per CRS.
#[derive(Default)]
pub struct Proj4Transform {
    projections: Mutex<HashMap<Crs, Arc<Proj>>>,
}

impl Proj4Transform {
    pub fn new() -> Self {
        Self::default()
    }

    fn projection(&self, crs: &Crs) -> ProjectionResult<Arc<Proj>> {
        let mut cache = self
            .projections
            .lock()
            .map_err(|_| ProjectionError::InvalidDefinition("projection cache poisoned".into()))?;

        if let Some(proj) = cache.get(crs) {
            return Ok(Arc::clone(proj));
        }

        let definition = crs.proj_string()?;
        let proj = Proj::from_proj_string(&definition).map_err(|e| {
            ProjectionError::InvalidDefinition(format!("{}: {:?}", definition, e))
        })?;
        debug!(crs = %crs, definition = %definition, "Parsed projection");

        let proj = Arc::new(proj);
        cache.insert(crs.clone(), Arc::clone(&proj));
        Ok(proj)
    }
}

impl CoordinateTransform for Proj4Transform {
    fn transform(
        &self,
        coords: &[Coordinate],
        from: &Crs,
        to: &Crs,
    ) -> ProjectionResult<Vec<Coordinate>> {
        if from == to || coords.is_empty() {
            return Ok(coords.to_vec());
        }

        let src = self.projection(from)?;
        let dst = self.projection(to)?;
        let src_geographic = from.is_geographic();
        let dst_geographic = to.is_geographic();

        coords
            .iter()
            .map(|c| {
                let mut point = if src_geographic {
                    (c.x.to_radians(), c.y.to_radians(), 0.0)
                } else {
                    (c.x, c.y, 0.0)
                };

                proj4rs::transform::transform(&src, &dst, &mut point).map_err(|e| {
                    ProjectionError::transform_failed(from, to, format!("{:?} at {}", e, c))
                })?;

                let out = if dst_geographic {
                    Coordinate::new(point.0.to_degrees(), point.1.to_degrees())
                } else {
                    Coordinate::new(point.0, point.1)
                };

                if out.is_finite() {
                    Ok(out)
                } else {
                    Err(ProjectionError::transform_failed(
                        from,
                        to,
                        format!("non-finite result for {}", c),
                    ))
                }
            })
            .collect()
    }

    fn nominal_metric_crs(&self, point: Coordinate, from: &Crs) -> ProjectionResult<Crs> {
        let lon_lat = self.transform_point(point, from, &Crs::WGS84)?;
        Ok(UtmZone::from_lon_lat(lon_lat.x, lon_lat.y).crs())
    }
}
