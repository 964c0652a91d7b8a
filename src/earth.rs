//! Transforms between the flat local world and a spherical earth.
//!
//! Earth coordinates keep the horizontal direction of a point as seen from the
//! camera footpoint, but replace the flat horizontal distance with the
//! great-circle distance along the earth surface and the `z` coordinate with
//! the elevation above that surface. The earth center lies one earth radius
//! below the camera footpoint.

use crate::projection::back_project;
use crate::{CameraError, GroundCamera, ImagePoint, EARTH_RADIUS};
use log::warn;
use nalgebra::{Point2, Point3, Vector2};

/// Controls the fixed-point iteration of [`GroundCamera::image_to_earth`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvatureOptions {
    /// Elevation of the target surface above the earth sphere in meters.
    pub reference_height: f64,
    pub max_iterations: usize,
    /// Iteration stops once two successive estimates are closer than this, in meters.
    pub convergence_distance: f64,
}

impl Default for CurvatureOptions {
    fn default() -> Self {
        Self {
            reference_height: 0.0,
            max_iterations: 100,
            convergence_distance: 0.01,
        }
    }
}

impl CurvatureOptions {
    pub fn reference_height(self, reference_height: f64) -> Self {
        Self {
            reference_height,
            ..self
        }
    }

    pub fn max_iterations(self, max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..self
        }
    }

    pub fn convergence_distance(self, convergence_distance: f64) -> Self {
        Self {
            convergence_distance,
            ..self
        }
    }
}

/// A curvature corrected back-projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvatureSolution {
    /// The point in earth coordinates.
    pub point: Point3<f64>,
    /// Number of back-projections that were performed.
    pub iterations: usize,
    /// `false` when the iteration budget ran out or the ray passes above the
    /// sphere; `point` then holds the last estimate.
    pub converged: bool,
}

/// Converts a great-circle distance and an elevation above the sphere into the
/// flat horizontal distance and height relative to the footpoint.
fn arc_to_flat(arc: f64, elevation: f64) -> (f64, f64) {
    let radius = EARTH_RADIUS + elevation;
    let alpha = arc / EARTH_RADIUS;
    (radius * alpha.sin(), radius * alpha.cos() - EARTH_RADIUS)
}

/// Inverse of [`arc_to_flat`].
fn flat_to_arc(distance: f64, z: f64) -> (f64, f64) {
    let vertical = z + EARTH_RADIUS;
    let alpha = distance.atan2(vertical);
    (
        EARTH_RADIUS * alpha,
        distance.hypot(vertical) - EARTH_RADIUS,
    )
}

/// Moves `point` radially away from `center` so that its distance becomes `distance`.
fn rescale_radially(center: Point2<f64>, point: Point2<f64>, distance: f64) -> Point2<f64> {
    let offset: Vector2<f64> = point - center;
    let norm = offset.norm();
    if norm > 0.0 {
        center + offset * (distance / norm)
    } else {
        point
    }
}

impl GroundCamera {
    /// Converts a flat world point into earth coordinates.
    pub fn world_to_earth(&self, point: &Point3<f64>) -> Point3<f64> {
        let foot = self.footpoint();
        let horizontal = point.xy();
        let (arc, elevation) = flat_to_arc((horizontal - foot).norm(), point.z);
        let placed = rescale_radially(foot, horizontal, arc);
        Point3::new(placed.x, placed.y, elevation)
    }

    /// Converts a point in earth coordinates back into the flat world, where
    /// distant points drop below the `z = 0` plane.
    pub fn earth_to_world(&self, point: &Point3<f64>) -> Point3<f64> {
        let foot = self.footpoint();
        let horizontal = point.xy();
        let (distance, z) = arc_to_flat((horizontal - foot).norm(), point.z);
        let placed = rescale_radially(foot, horizontal, distance);
        Point3::new(placed.x, placed.y, z)
    }

    /// Projects a point given in earth coordinates into the image.
    pub fn earth_to_image(&self, point: &Point3<f64>) -> Point2<f64> {
        self.world_point_to_image(&self.earth_to_world(point))
    }

    /// Back-projects image points onto the curved earth surface lifted by
    /// `options.reference_height`.
    ///
    /// The height of the surface under a point depends on its distance, which
    /// in turn depends on the height used for back-projection, so every point
    /// is refined by fixed-point iteration starting from the flat plane.
    pub fn image_to_earth<P: ImagePoint>(
        &self,
        points: impl IntoIterator<Item = P>,
        options: &CurvatureOptions,
    ) -> Result<Vec<CurvatureSolution>, CameraError> {
        points
            .into_iter()
            .map(|point| self.image_point_to_earth(point.image_point(), options))
            .collect()
    }

    fn image_point_to_earth(
        &self,
        point: Point2<f64>,
        options: &CurvatureOptions,
    ) -> Result<CurvatureSolution, CameraError> {
        let foot = self.footpoint();
        let radius = EARTH_RADIUS + options.reference_height;
        let mut current = back_project(self.matrix(), &point, 2, options.reference_height)?;
        let mut iterations = 1;
        let mut converged = false;
        while iterations < options.max_iterations {
            let distance = (current.xy() - foot).norm();
            if distance >= radius {
                // The ray passes above the sphere.
                break;
            }
            let z = (radius * radius - distance * distance).sqrt() - EARTH_RADIUS;
            let next = back_project(self.matrix(), &point, 2, z)?;
            iterations += 1;
            let step = (next - current).norm();
            current = next;
            if step < options.convergence_distance {
                converged = true;
                break;
            }
        }
        if !converged {
            warn!(
                "curvature correction of {:?} stopped after {} iterations without converging",
                point, iterations
            );
        }
        Ok(CurvatureSolution {
            point: self.world_to_earth(&current),
            iterations,
            converged,
        })
    }
}
