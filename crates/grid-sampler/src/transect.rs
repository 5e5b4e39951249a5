//! Regularly spaced sampling along polylines.

use projection::{Coordinate, CoordinateTransform, Crs};

use crate::error::{GridError, Result};
use crate::resolver::GridIndexResolver;
use crate::types::TransectPoint;

/// Produces sample positions along a polyline at a fixed metric spacing.
pub struct TransectSampler<'a, T> {
    transform: &'a T,
    native_crs: &'a Crs,
    tolerance: f64,
}

impl<'a, T: CoordinateTransform> TransectSampler<'a, T> {
    pub fn new(transform: &'a T, native_crs: &'a Crs, tolerance: f64) -> Self {
        Self {
            transform,
            native_crs,
            tolerance,
        }
    }

    /// Lazily sample `vertices` every `spacing` metres.
    ///
    /// Each segment yields its start vertex and the interior multiples of
    /// `spacing`; the final vertex closes the sequence. Positions are in the
    /// native CRS and distances accumulate from the first vertex.
    pub fn sample(
        &self,
        vertices: &[Coordinate],
        source_crs: Option<&Crs>,
        spacing: f64,
    ) -> Result<TransectPoints<'a, T>> {
        if vertices.len() < 2 {
            return Err(GridError::invalid_argument(format!(
                "a transect needs at least 2 vertices, got {}",
                vertices.len()
            )));
        }
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(GridError::invalid_argument(format!(
                "transect spacing must be a positive number of metres, got {}",
                spacing
            )));
        }

        let native = match source_crs {
            Some(crs) if crs != self.native_crs => {
                self.transform.transform(vertices, crs, self.native_crs)?
            }
            _ => vertices.to_vec(),
        };

        let metric_crs = if self.transform.is_metric(self.native_crs) {
            self.native_crs.clone()
        } else {
            self.transform.nominal_metric_crs(native[0], self.native_crs)?
        };
        let metric_vertices = self
            .transform
            .transform(&native, self.native_crs, &metric_crs)?;

        Ok(TransectPoints {
            transform: self.transform,
            native_crs: self.native_crs.clone(),
            metric_crs,
            vertices: metric_vertices,
            spacing,
            tolerance: self.tolerance,
            segment: 0,
            step: 0,
            distance_before: 0.0,
            finished: false,
        })
    }
}

/// Lazy iterator over transect sample points.
pub struct TransectPoints<'a, T> {
    transform: &'a T,
    native_crs: Crs,
    metric_crs: Crs,
    vertices: Vec<Coordinate>,
    spacing: f64,
    tolerance: f64,
    segment: usize,
    step: usize,
    distance_before: f64,
    finished: bool,
}

impl<T: CoordinateTransform> TransectPoints<'_, T> {
    /// The CRS in which distances are measured.
    pub fn metric_crs(&self) -> &Crs {
        &self.metric_crs
    }

    fn to_native(&self, point: Coordinate, distance: f64) -> Result<TransectPoint> {
        let coordinate = self
            .transform
            .transform_point(point, &self.metric_crs, &self.native_crs)?;
        Ok(TransectPoint {
            coordinate,
            distance,
        })
    }
}

impl<T: CoordinateTransform> Iterator for TransectPoints<'_, T> {
    type Item = Result<TransectPoint>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        while self.segment + 1 < self.vertices.len() {
            let start = self.vertices[self.segment];
            let end = self.vertices[self.segment + 1];
            let length = start.distance(&end);
            let offset = self.step as f64 * self.spacing;

            if self.step == 0 || offset < length - self.tolerance {
                self.step += 1;
                let t = if length > 0.0 { offset / length } else { 0.0 };
                let point = Coordinate::new(
                    start.x + (end.x - start.x) * t,
                    start.y + (end.y - start.y) * t,
                );
                let result = self.to_native(point, self.distance_before + offset);
                if result.is_err() {
                    self.finished = true;
                }
                return Some(result);
            }

            self.distance_before += length;
            self.segment += 1;
            self.step = 0;
        }

        self.finished = true;
        let last = self.vertices[self.vertices.len() - 1];
        Some(self.to_native(last, self.distance_before))
    }
}

/// Metric size `[x, y]` of the centre cell, measured in its local UTM zone.
pub fn nominal_pixel_metres<T: CoordinateTransform>(resolver: &GridIndexResolver<T>) -> Result<[f64; 2]> {
    let geometry = resolver.geometry();
    let centre = geometry.centre_index();

    let mut here = [0.0; 2];
    let mut diagonal = [0.0; 2];
    for d in 0..2 {
        let axis = geometry.axis(d);
        let i = centre[d];
        here[d] = axis[i];
        diagonal[d] = match (axis.get(i + 1), i.checked_sub(1).and_then(|j| axis.get(j))) {
            (Some(&next), _) => next,
            (None, Some(&prev)) => prev,
            (None, None) => axis[i] + geometry.pixel_size()[d],
        };
    }

    let order = geometry.axis_order();
    let points = [order.to_coordinate(here), order.to_coordinate(diagonal)];

    let transform = resolver.transform();
    let utm = transform.nominal_metric_crs(points[0], geometry.crs())?;
    let metric = transform.transform(&points, geometry.crs(), &utm)?;

    Ok([
        (metric[1].x - metric[0].x).abs(),
        (metric[1].y - metric[0].y).abs(),
    ])
}

/// Round an average cell size up to the next `5 * 10^e` or `10^(e+1)`.
pub fn round_spacing(average_metres: f64) -> Result<f64> {
    if !(average_metres.is_finite() && average_metres > 0.0) {
        return Err(GridError::invalid_argument(format!(
            "cannot derive a transect spacing from a cell size of {} m",
            average_metres
        )));
    }

    let log = average_metres.log10();
    let exponent = log.floor();
    let spacing = if log - exponent < 5f64.log10() {
        5.0 * 10f64.powi(exponent as i32)
    } else {
        10f64.powi(exponent as i32 + 1)
    };
    Ok(spacing)
}

/// Default transect spacing from the nominal cell size.
pub fn default_spacing(nominal_pixel_metres: [f64; 2]) -> Result<f64> {
    round_spacing((nominal_pixel_metres[0] + nominal_pixel_metres[1]) / 2.0)
}
