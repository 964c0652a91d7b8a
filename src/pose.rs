use crate::Intrinsics;
use nalgebra::{Matrix3, Matrix3x4, Matrix4, Point3, Vector3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Extrinsic parameters of the camera.
///
/// Angles are in degrees and lengths in meters. The tilt is the angle between
/// the optical axis and the ground normal, so `0` looks straight down and `90`
/// looks at the horizon. The camera looks along the world `+Y` axis when the
/// heading is `0`, and the world `+X` axis appears on the left of the image.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Pose {
    pub height: f64,
    pub tilt: f64,
    pub roll: f64,
    pub heading: f64,
    pub pos_x: f64,
    pub pos_y: f64,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            height: 30.0,
            tilt: 85.0,
            roll: 0.0,
            heading: 0.0,
            pos_x: 0.0,
            pos_y: 0.0,
        }
    }
}

impl Pose {
    /// A camera at `height` meters with the given tilt and no roll, heading or offset.
    pub fn new(height: f64, tilt: f64) -> Self {
        Self {
            height,
            tilt,
            roll: 0.0,
            heading: 0.0,
            pos_x: 0.0,
            pos_y: 0.0,
        }
    }

    pub fn height(self, height: f64) -> Self {
        Self { height, ..self }
    }

    pub fn tilt(self, tilt: f64) -> Self {
        Self { tilt, ..self }
    }

    /// Sets the tilt from the tangent of the elevation angle of the optical
    /// axis above the ground plane.
    pub fn tan_tilt(self, tan_tilt: f64) -> Self {
        Self {
            tilt: tilt_from_tangent(tan_tilt),
            ..self
        }
    }

    pub fn roll(self, roll: f64) -> Self {
        Self { roll, ..self }
    }

    pub fn heading(self, heading: f64) -> Self {
        Self { heading, ..self }
    }

    pub fn position(self, pos_x: f64, pos_y: f64) -> Self {
        Self {
            pos_x,
            pos_y,
            ..self
        }
    }

    /// Translation of the world origin in the tilted camera frame.
    pub fn translation(&self) -> Vector3<f64> {
        rotation_tilt(self.tilt) * Vector3::new(self.pos_x, self.pos_y, -self.height)
    }

    /// Rotation from world into camera coordinates.
    pub fn rotation(&self) -> Matrix3<f64> {
        rotation_roll(self.roll) * rotation_tilt(self.tilt) * rotation_heading(self.heading)
    }

    /// The rigid world to camera transform `[R | t]`.
    #[rustfmt::skip]
    pub fn extrinsic_matrix(&self) -> Matrix4<f64> {
        let r = self.rotation();
        let t = self.translation();
        Matrix4::new(
            r[(0, 0)], r[(0, 1)], r[(0, 2)], t.x,
            r[(1, 0)], r[(1, 1)], r[(1, 2)], t.y,
            r[(2, 0)], r[(2, 1)], r[(2, 2)], t.z,
            0.0,       0.0,       0.0,       1.0,
        )
    }

    /// Optical center of the camera in world coordinates.
    pub fn center(&self) -> Point3<f64> {
        Point3::from(-(self.rotation().transpose() * self.translation()))
    }
}

/// Converts the tangent of the elevation of the optical axis into a tilt in degrees.
pub fn tilt_from_tangent(tan_tilt: f64) -> f64 {
    90.0 - tan_tilt.atan().to_degrees()
}

/// Rotation about the camera X axis by the tilt angle in degrees.
#[rustfmt::skip]
pub fn rotation_tilt(tilt: f64) -> Matrix3<f64> {
    let (s, c) = tilt.to_radians().sin_cos();
    Matrix3::new(
        1.0, 0.0, 0.0,
        0.0, c,   s,
        0.0, -s,  c,
    )
}

/// Rotation about the optical axis by the roll angle in degrees.
#[rustfmt::skip]
pub fn rotation_roll(roll: f64) -> Matrix3<f64> {
    let (s, c) = roll.to_radians().sin_cos();
    Matrix3::new(
        c,   s,   0.0,
        -s,  c,   0.0,
        0.0, 0.0, 1.0,
    )
}

/// Rotation about the vertical axis by the heading angle in degrees.
#[rustfmt::skip]
pub fn rotation_heading(heading: f64) -> Matrix3<f64> {
    let (s, c) = heading.to_radians().sin_cos();
    Matrix3::new(
        c,   s,   0.0,
        -s,  c,   0.0,
        0.0, 0.0, 1.0,
    )
}

/// Composes the intrinsic matrix with the extrinsic transform of `pose` into
/// the 3x4 projective camera matrix.
pub fn camera_matrix(intrinsics: &Intrinsics, pose: &Pose) -> Matrix3x4<f64> {
    intrinsics.matrix() * pose.extrinsic_matrix()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SensorSize;
    use approx::assert_relative_eq;

    #[test]
    fn tangent_of_tilt() {
        assert_relative_eq!(tilt_from_tangent(0.0), 90.0);
        assert_relative_eq!(tilt_from_tangent(1.0), 45.0);
        assert_relative_eq!(Pose::default().tan_tilt(-1.0).tilt, 135.0);
    }

    #[test]
    fn rotations_are_orthonormal() {
        let pose = Pose::new(12.0, 73.0).roll(4.0).heading(-33.0);
        let r = pose.rotation();
        assert_relative_eq!(r * r.transpose(), Matrix3::identity(), epsilon = 1e-12);
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn center_sits_above_offset() {
        let pose = Pose::new(25.0, 80.0).heading(30.0).position(3.0, -7.0);
        let center = pose.center();
        assert_relative_eq!(center.z, 25.0, epsilon = 1e-9);
        assert_relative_eq!(
            (center.x.powi(2) + center.y.powi(2)).sqrt(),
            (3.0f64.powi(2) + 7.0f64.powi(2)).sqrt(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn center_projects_to_null_space() {
        let intrinsics = Intrinsics::new(16.0, SensorSize::Width(10.0), (4000, 3000)).unwrap();
        let pose = Pose::new(20.0, 80.0).roll(2.0).heading(10.0).position(1.0, 2.0);
        let c = camera_matrix(&intrinsics, &pose) * pose.center().to_homogeneous();
        assert!(c.norm() < 1e-6, "{}", c);
    }

    #[test]
    fn rebuild_is_idempotent() {
        let intrinsics = Intrinsics::new(16.0, SensorSize::Width(10.0), (4000, 3000)).unwrap();
        let pose = Pose::new(20.0, 80.0);
        assert_eq!(
            camera_matrix(&intrinsics, &pose),
            camera_matrix(&intrinsics, &pose)
        );
    }
}
