use crate::{CameraError, GroundCamera, ImagePoint};
use nalgebra::{Matrix3, Matrix3x4, Point2, Point3, Vector3};

/// Value of the fixed world coordinate used for back-projection.
#[derive(Debug, Clone, PartialEq)]
pub enum FixedValue {
    /// All points lie on the same plane.
    Uniform(f64),
    /// Every point has its own value, in the order of the image points.
    PerPoint(Vec<f64>),
}

impl From<f64> for FixedValue {
    fn from(value: f64) -> Self {
        FixedValue::Uniform(value)
    }
}

impl From<Vec<f64>> for FixedValue {
    fn from(values: Vec<f64>) -> Self {
        FixedValue::PerPoint(values)
    }
}

impl FixedValue {
    fn at(&self, index: usize) -> f64 {
        match self {
            FixedValue::Uniform(value) => *value,
            FixedValue::PerPoint(values) => values[index],
        }
    }
}

/// The world coordinate that is known when back-projecting an image point.
///
/// A single image point only describes a ray, so one world coordinate has to
/// be supplied to pick a point on it.
#[derive(Debug, Clone, PartialEq)]
pub enum FixedAxis {
    X(FixedValue),
    Y(FixedValue),
    Z(FixedValue),
}

impl FixedAxis {
    /// Builds the constraint from three optional components, exactly one of
    /// which has to be present.
    ///
    /// ```
    /// use cv_camera_transform::{CameraError, FixedAxis, FixedValue};
    /// let axis = FixedAxis::from_components(None, None, Some(0.0.into())).unwrap();
    /// assert_eq!(axis, FixedAxis::Z(FixedValue::Uniform(0.0)));
    /// assert!(matches!(
    ///     FixedAxis::from_components(Some(1.0.into()), None, Some(0.0.into())),
    ///     Err(CameraError::FixedAxis(2))
    /// ));
    /// ```
    pub fn from_components(
        x: Option<FixedValue>,
        y: Option<FixedValue>,
        z: Option<FixedValue>,
    ) -> Result<Self, CameraError> {
        match (x, y, z) {
            (Some(x), None, None) => Ok(FixedAxis::X(x)),
            (None, Some(y), None) => Ok(FixedAxis::Y(y)),
            (None, None, Some(z)) => Ok(FixedAxis::Z(z)),
            (x, y, z) => Err(CameraError::FixedAxis(
                x.is_some() as usize + y.is_some() as usize + z.is_some() as usize,
            )),
        }
    }

    /// Shorthand for the ground plane at elevation `z`.
    pub fn ground(z: f64) -> Self {
        FixedAxis::Z(FixedValue::Uniform(z))
    }

    fn split(&self) -> (usize, &FixedValue) {
        match self {
            FixedAxis::X(value) => (0, value),
            FixedAxis::Y(value) => (1, value),
            FixedAxis::Z(value) => (2, value),
        }
    }
}

/// Projects a world point with the camera matrix `matrix`.
///
/// Points on the principal plane (zero depth) produce infinite or NaN
/// coordinates instead of an error.
pub fn project(matrix: &Matrix3x4<f64>, point: &Point3<f64>) -> Point2<f64> {
    let image = matrix * point.to_homogeneous();
    Point2::new(image.x / image.z, image.y / image.z)
}

/// Back-projects `point` onto the plane where world coordinate `axis` equals `fixed`.
///
/// The fixed column is folded into the translation column:
///
/// ```text
/// ( a b c d )   ( x*s )   ( a b c*z+d )   ( x*s )
/// ( e f g h ) * ( y*s ) = ( e f g*z+h ) * ( y*s )
/// ( i j k l )   ( z*s )   ( i j k*z+l )   (  s  )
///               (  s  )
/// ```
///
/// which leaves a 3x3 system whose solution is rescaled by the entry that
/// stood in for the fixed axis.
pub fn back_project(
    matrix: &Matrix3x4<f64>,
    point: &Point2<f64>,
    axis: usize,
    fixed: f64,
) -> Result<Point3<f64>, CameraError> {
    let mut reduced: Matrix3<f64> = matrix.fixed_columns::<3>(0).into_owned();
    let folded = matrix.column(axis) * fixed + matrix.column(3);
    reduced.set_column(axis, &folded);
    let solution = reduced
        .lu()
        .solve(&point.to_homogeneous())
        .ok_or(CameraError::Singular("the back-projected world point"))?;
    let scale = solution[axis];
    if scale.abs() < 1e-12 * solution.amax().max(1.0) {
        return Err(CameraError::Singular("the back-projected world point"));
    }
    let mut world: Vector3<f64> = solution / scale;
    world[axis] = fixed;
    if world.iter().all(|n| n.is_finite()) {
        Ok(Point3::from(world))
    } else {
        Err(CameraError::Singular("the back-projected world point"))
    }
}

impl GroundCamera {
    /// Projects world points into pixel coordinates.
    pub fn world_to_image(&self, points: &[Point3<f64>]) -> Vec<Point2<f64>> {
        points
            .iter()
            .map(|point| project(self.matrix(), point))
            .collect()
    }

    /// Projects a single world point into pixel coordinates.
    pub fn world_point_to_image(&self, point: &Point3<f64>) -> Point2<f64> {
        project(self.matrix(), point)
    }

    /// Back-projects image points into the world, fixing one world coordinate.
    ///
    /// ```
    /// use cv_camera_transform::{FixedAxis, GroundCamera, Intrinsics, Pose, SensorSize};
    /// use nalgebra::Point3;
    /// let intrinsics = Intrinsics::new(16.0, SensorSize::Width(10.0), (4000, 3000)).unwrap();
    /// let camera = GroundCamera::with_pose(intrinsics, Pose::new(20.0, 80.0)).unwrap();
    /// let point = Point3::new(0.0, 50.0, 0.0);
    /// let image = camera.world_point_to_image(&point);
    /// let world = camera.image_to_world([image], &FixedAxis::ground(0.0)).unwrap();
    /// assert!((world[0] - point).norm() < 1e-6);
    /// ```
    pub fn image_to_world<P: ImagePoint>(
        &self,
        points: impl IntoIterator<Item = P>,
        axis: &FixedAxis,
    ) -> Result<Vec<Point3<f64>>, CameraError> {
        let points: Vec<Point2<f64>> = points.into_iter().map(|p| p.image_point()).collect();
        let (dimension, fixed) = axis.split();
        if let FixedValue::PerPoint(values) = fixed {
            CameraError::ensure_same_len("image points", points.len(), "fixed values", values.len())?;
        }
        points
            .iter()
            .enumerate()
            .map(|(ix, point)| back_project(self.matrix(), point, dimension, fixed.at(ix)))
            .collect()
    }

    /// Back-projects a single image point onto the plane `z = elevation`.
    pub fn image_point_to_ground(
        &self,
        point: impl ImagePoint,
        elevation: f64,
    ) -> Result<Point3<f64>, CameraError> {
        back_project(self.matrix(), &point.image_point(), 2, elevation)
    }
}
