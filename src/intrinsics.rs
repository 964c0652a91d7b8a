use crate::CameraError;
use nalgebra::{Matrix3x4, Point2};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Size of the camera sensor in millimeters, as printed on a data sheet.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum SensorSize {
    /// Only the sensor width is known. The height is inferred from the aspect
    /// ratio of the image.
    Width(f64),
    /// Both sensor dimensions are known.
    Dimensions { width: f64, height: f64 },
}

/// Intrinsic parameters of an ideal pinhole camera derived from the physical
/// lens and sensor and the resolution of the produced images.
///
/// All lengths are stored in meters and all angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    focal_length: f64,
    sensor_width: f64,
    sensor_height: f64,
    image_width: u32,
    image_height: u32,
    focal_pixels: f64,
    fov_horizontal: f64,
    fov_vertical: f64,
}

impl Intrinsics {
    /// Creates the intrinsics from a focal length in millimeters, the sensor
    /// size in millimeters and the image size `(width, height)` in pixels.
    ///
    /// ```
    /// use cv_camera_transform::{Intrinsics, SensorSize};
    /// let intrinsics = Intrinsics::new(16.0, SensorSize::Width(10.0), (4000, 3000)).unwrap();
    /// assert!((intrinsics.focal_pixels() - 6400.0).abs() < 1e-9);
    /// assert!((intrinsics.sensor_height() - 7.5e-3).abs() < 1e-12);
    /// ```
    pub fn new(
        focal_length_mm: f64,
        sensor: SensorSize,
        (image_width, image_height): (u32, u32),
    ) -> Result<Self, CameraError> {
        let focal_length_mm = CameraError::ensure_positive("focal length", focal_length_mm)?;
        let image_width_px = CameraError::ensure_positive("image width", image_width as f64)?;
        let image_height_px = CameraError::ensure_positive("image height", image_height as f64)?;
        let (sensor_width_mm, sensor_height_mm) = match sensor {
            SensorSize::Width(width) => (width, width * image_height_px / image_width_px),
            SensorSize::Dimensions { width, height } => (width, height),
        };
        let sensor_width_mm = CameraError::ensure_positive("sensor width", sensor_width_mm)?;
        let sensor_height_mm = CameraError::ensure_positive("sensor height", sensor_height_mm)?;
        Ok(Self::from_meters(
            focal_length_mm * 1e-3,
            sensor_width_mm * 1e-3,
            sensor_height_mm * 1e-3,
            image_width,
            image_height,
        ))
    }

    /// Rebuilds the intrinsics from values that are already in meters, such as
    /// persisted camera state.
    pub fn from_parts(
        focal_length: f64,
        sensor_width: f64,
        sensor_height: f64,
        (image_width, image_height): (u32, u32),
    ) -> Result<Self, CameraError> {
        CameraError::ensure_positive("focal length", focal_length)?;
        CameraError::ensure_positive("sensor width", sensor_width)?;
        CameraError::ensure_positive("sensor height", sensor_height)?;
        CameraError::ensure_positive("image width", image_width as f64)?;
        CameraError::ensure_positive("image height", image_height as f64)?;
        Ok(Self::from_meters(
            focal_length,
            sensor_width,
            sensor_height,
            image_width,
            image_height,
        ))
    }

    fn from_meters(
        focal_length: f64,
        sensor_width: f64,
        sensor_height: f64,
        image_width: u32,
        image_height: u32,
    ) -> Self {
        Self {
            focal_length,
            sensor_width,
            sensor_height,
            image_width,
            image_height,
            focal_pixels: focal_length / sensor_width * image_width as f64,
            fov_horizontal: 2.0 * (sensor_width / (2.0 * focal_length)).atan(),
            fov_vertical: 2.0 * (sensor_height / (2.0 * focal_length)).atan(),
        }
    }

    /// Focal length in meters.
    pub fn focal_length(&self) -> f64 {
        self.focal_length
    }

    /// Sensor width in meters.
    pub fn sensor_width(&self) -> f64 {
        self.sensor_width
    }

    /// Sensor height in meters.
    pub fn sensor_height(&self) -> f64 {
        self.sensor_height
    }

    pub fn image_width(&self) -> u32 {
        self.image_width
    }

    pub fn image_height(&self) -> u32 {
        self.image_height
    }

    /// Focal length expressed in pixels of the image.
    pub fn focal_pixels(&self) -> f64 {
        self.focal_pixels
    }

    /// Horizontal field of view in radians.
    pub fn fov_horizontal(&self) -> f64 {
        self.fov_horizontal
    }

    /// Vertical field of view in radians.
    pub fn fov_vertical(&self) -> f64 {
        self.fov_vertical
    }

    /// The principal point, which is always the image center.
    pub fn principal_point(&self) -> Point2<f64> {
        Point2::new(
            self.image_width as f64 / 2.0,
            self.image_height as f64 / 2.0,
        )
    }

    /// The 3x4 intrinsic projection matrix.
    #[rustfmt::skip]
    pub fn matrix(&self) -> Matrix3x4<f64> {
        let f = self.focal_pixels;
        let c = self.principal_point();
        Matrix3x4::new(
            f,   0.0, c.x, 0.0,
            0.0, f,   c.y, 0.0,
            0.0, 0.0, 1.0, 0.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sensor_height_follows_aspect_ratio() {
        let intrinsics = Intrinsics::new(14.0, SensorSize::Width(6.17), (4608, 3456)).unwrap();
        assert_relative_eq!(intrinsics.sensor_height(), 6.17e-3 * 3456.0 / 4608.0);
        assert_relative_eq!(intrinsics.focal_pixels(), 14.0 / 6.17 * 4608.0, epsilon = 1e-9);
    }

    #[test]
    fn field_of_view() {
        let intrinsics = Intrinsics::new(
            10.0,
            SensorSize::Dimensions {
                width: 20.0,
                height: 10.0,
            },
            (2000, 1000),
        )
        .unwrap();
        assert_relative_eq!(intrinsics.fov_horizontal(), std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(intrinsics.fov_vertical(), 2.0 * 0.5f64.atan());
    }

    #[test]
    fn matrix_layout() {
        let intrinsics = Intrinsics::new(16.0, SensorSize::Width(10.0), (4000, 3000)).unwrap();
        let m = intrinsics.matrix();
        assert_relative_eq!(m[(0, 0)], 6400.0);
        assert_relative_eq!(m[(1, 1)], 6400.0);
        assert_relative_eq!(m[(0, 2)], 2000.0);
        assert_relative_eq!(m[(1, 2)], 1500.0);
        assert_relative_eq!(m[(2, 2)], 1.0);
        assert_eq!(m.column(3).norm(), 0.0);
    }

    #[test]
    fn rejects_non_positive_dimensions() {
        assert!(Intrinsics::new(0.0, SensorSize::Width(10.0), (4000, 3000)).is_err());
        assert!(Intrinsics::new(16.0, SensorSize::Width(-1.0), (4000, 3000)).is_err());
        assert!(Intrinsics::new(16.0, SensorSize::Width(10.0), (0, 3000)).is_err());
        assert!(Intrinsics::new(
            16.0,
            SensorSize::Dimensions {
                width: 10.0,
                height: f64::NAN
            },
            (4000, 3000)
        )
        .is_err());
    }
}
