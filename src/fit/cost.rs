use crate::{
    collect_image_points, CameraError, FixedAxis, FitReport, GroundCamera, ImagePoint,
    ImageSegment, PoseParameter,
};
use average::Mean;
use itertools::izip;
use nalgebra::{Point2, Point3, Vector2};

/// A scalar error of a camera against a set of observations.
///
/// Implementations are evaluated many times per fit on scratch copies of the
/// camera, so they should only read from the camera they are given.
pub trait CalibrationCost {
    /// Evaluates the error of `camera`. Errors reject the pose being tried.
    fn cost(&self, camera: &GroundCamera) -> Result<f64, CameraError>;

    /// Parameters these observations can determine, which become free before fitting.
    fn releases(&self) -> &[PoseParameter] {
        &[]
    }

    /// Short label used in log messages.
    fn description(&self) -> &'static str {
        "a calibration cost"
    }
}

/// Objects of a common height standing on the ground, given by their foot and
/// head pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectFootprints {
    feet: Vec<Point2<f64>>,
    heads: Vec<Point2<f64>>,
    object_height: f64,
    elevation: f64,
}

impl ObjectFootprints {
    pub fn new<F: ImagePoint, H: ImagePoint>(
        feet: impl IntoIterator<Item = F>,
        heads: impl IntoIterator<Item = H>,
        object_height: f64,
    ) -> Result<Self, CameraError> {
        let feet = collect_image_points(feet);
        let heads = collect_image_points(heads);
        CameraError::ensure_same_len("feet", feet.len(), "heads", heads.len())?;
        CameraError::ensure_at_least("fitting from objects", 1, feet.len())?;
        let object_height = CameraError::ensure_positive("object height", object_height)?;
        Ok(Self {
            feet,
            heads,
            object_height,
            elevation: 0.0,
        })
    }

    /// Uses vertical markers drawn over each object; see [`crate::LineSegment::foot_and_head`].
    pub fn from_segments(
        segments: impl IntoIterator<Item = impl ImageSegment>,
        object_height: f64,
    ) -> Result<Self, CameraError> {
        let (feet, heads): (Vec<_>, Vec<_>) = segments
            .into_iter()
            .map(|segment| {
                let (start, end) = segment.endpoints();
                crate::LineSegment::new(start, end).foot_and_head()
            })
            .unzip();
        Self::new(feet, heads, object_height)
    }

    /// Places the feet on the plane `z = elevation` instead of the ground.
    pub fn elevation(self, elevation: f64) -> Result<Self, CameraError> {
        let elevation = CameraError::ensure_finite("object elevation", elevation)?;
        Ok(Self { elevation, ..self })
    }
}

impl CalibrationCost for ObjectFootprints {
    /// Mean squared pixel distance between the observed heads and the heads
    /// predicted above the back-projected feet.
    fn cost(&self, camera: &GroundCamera) -> Result<f64, CameraError> {
        let feet = camera.image_to_world(&self.feet, &FixedAxis::ground(self.elevation))?;
        let mean: Mean = izip!(&feet, &self.heads)
            .map(|(foot, head)| {
                let raised = Point3::new(foot.x, foot.y, self.elevation + self.object_height);
                (camera.world_point_to_image(&raised) - head).norm_squared()
            })
            .collect();
        Ok(mean.mean())
    }

    fn description(&self) -> &'static str {
        "object footprints"
    }
}

/// Ground marks at known distances from the camera, optionally with known bearings.
///
/// Distances are horizontal and measured from the footpoint of the camera
/// ([`GroundCamera::footpoint`]), not along the viewing direction.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceLandmarks {
    marks: Vec<Point2<f64>>,
    distances: Vec<f64>,
    bearings: Option<Vec<f64>>,
}

impl DistanceLandmarks {
    pub fn new<P: ImagePoint>(
        marks: impl IntoIterator<Item = P>,
        distances: Vec<f64>,
    ) -> Result<Self, CameraError> {
        let marks = collect_image_points(marks);
        CameraError::ensure_same_len("marks", marks.len(), "distances", distances.len())?;
        CameraError::ensure_at_least("fitting from landmarks", 1, marks.len())?;
        for &distance in &distances {
            CameraError::ensure_positive("landmark distance", distance)?;
        }
        Ok(Self {
            marks,
            distances,
            bearings: None,
        })
    }

    /// Adds the bearing in degrees of every mark as returned by
    /// [`GroundCamera::distance_bearing`]. The heading is then fitted as well.
    pub fn bearings(self, bearings: Vec<f64>) -> Result<Self, CameraError> {
        CameraError::ensure_same_len("marks", self.marks.len(), "bearings", bearings.len())?;
        for &bearing in &bearings {
            CameraError::ensure_finite("landmark bearing", bearing)?;
        }
        Ok(Self {
            bearings: Some(bearings),
            ..self
        })
    }
}

impl CalibrationCost for DistanceLandmarks {
    fn cost(&self, camera: &GroundCamera) -> Result<f64, CameraError> {
        let marks = camera.image_to_world(&self.marks, &FixedAxis::ground(0.0))?;
        let foot = camera.footpoint();
        let mean: Mean = match &self.bearings {
            None => izip!(&marks, &self.distances)
                .map(|(mark, &distance)| (distance - (mark.xy() - foot).norm()).powi(2))
                .collect(),
            Some(bearings) => izip!(&marks, &self.distances, bearings)
                .map(|(mark, &distance, &bearing)| {
                    let (sin, cos) = bearing.to_radians().sin_cos();
                    let expected = foot + Vector2::new(-distance * sin, distance * cos);
                    (mark.xy() - expected).norm_squared()
                })
                .collect(),
        };
        Ok(mean.mean())
    }

    fn releases(&self) -> &[PoseParameter] {
        if self.bearings.is_some() {
            &[PoseParameter::Heading]
        } else {
            &[]
        }
    }

    fn description(&self) -> &'static str {
        "distance landmarks"
    }
}

/// Image points with known world positions.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCorrespondences {
    image: Vec<Point2<f64>>,
    world: Vec<Point3<f64>>,
}

impl PointCorrespondences {
    pub fn new<P: ImagePoint>(
        image: impl IntoIterator<Item = P>,
        world: Vec<Point3<f64>>,
    ) -> Result<Self, CameraError> {
        let image = collect_image_points(image);
        CameraError::ensure_same_len("image points", image.len(), "world points", world.len())?;
        CameraError::ensure_at_least("fitting from point correspondences", 1, image.len())?;
        Ok(Self { image, world })
    }
}

impl CalibrationCost for PointCorrespondences {
    /// Mean pixel distance between the projected world points and their observations.
    fn cost(&self, camera: &GroundCamera) -> Result<f64, CameraError> {
        let mean: Mean = izip!(&self.world, &self.image)
            .map(|(world, image)| (camera.world_point_to_image(world) - image).norm())
            .collect();
        Ok(mean.mean())
    }

    fn releases(&self) -> &[PoseParameter] {
        &[PoseParameter::PosX, PoseParameter::PosY]
    }

    fn description(&self) -> &'static str {
        "point correspondences"
    }
}

/// Ground segments of known length.
#[derive(Debug, Clone, PartialEq)]
pub struct KnownLengths {
    starts: Vec<Point2<f64>>,
    ends: Vec<Point2<f64>>,
    lengths: Vec<f64>,
}

impl KnownLengths {
    pub fn new(
        segments: impl IntoIterator<Item = impl ImageSegment>,
        lengths: Vec<f64>,
    ) -> Result<Self, CameraError> {
        let (starts, ends): (Vec<_>, Vec<_>) =
            segments.into_iter().map(|segment| segment.endpoints()).unzip();
        CameraError::ensure_same_len("segments", starts.len(), "lengths", lengths.len())?;
        CameraError::ensure_at_least("fitting from lengths", 1, starts.len())?;
        for &length in &lengths {
            CameraError::ensure_positive("segment length", length)?;
        }
        Ok(Self {
            starts,
            ends,
            lengths,
        })
    }
}

impl CalibrationCost for KnownLengths {
    fn cost(&self, camera: &GroundCamera) -> Result<f64, CameraError> {
        let ground = FixedAxis::ground(0.0);
        let starts = camera.image_to_world(&self.starts, &ground)?;
        let ends = camera.image_to_world(&self.ends, &ground)?;
        let mean: Mean = izip!(&starts, &ends, &self.lengths)
            .map(|(start, end, &length)| (length - (end - start).norm()).powi(2))
            .collect();
        Ok(mean.mean())
    }

    fn description(&self) -> &'static str {
        "known lengths"
    }
}

impl GroundCamera {
    /// Fits the pose to objects of known height.
    pub fn fit_from_objects(&mut self, objects: &ObjectFootprints) -> Result<FitReport, CameraError> {
        self.fit(objects)
    }

    /// Fits the pose to ground marks of known distance. With bearings the
    /// heading is fitted too.
    pub fn fit_from_landmarks(
        &mut self,
        landmarks: &DistanceLandmarks,
    ) -> Result<FitReport, CameraError> {
        self.fit(landmarks)
    }

    /// Fits the pose and the horizontal position to known world points.
    pub fn fit_from_point_correspondences(
        &mut self,
        correspondences: &PointCorrespondences,
    ) -> Result<FitReport, CameraError> {
        self.fit(correspondences)
    }

    /// Fits the pose to ground segments of known length.
    pub fn fit_from_lengths(&mut self, lengths: &KnownLengths) -> Result<FitReport, CameraError> {
        self.fit(lengths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Intrinsics, LineSegment, Pose, SensorSize};
    use approx::assert_relative_eq;

    fn camera(pose: Pose) -> GroundCamera {
        let intrinsics = Intrinsics::new(16.0, SensorSize::Width(10.0), (4000, 3000)).unwrap();
        GroundCamera::with_pose(intrinsics, pose).unwrap()
    }

    #[test]
    fn observation_lengths_are_checked() {
        assert!(matches!(
            ObjectFootprints::new([[0.0, 1.0]], [[0.0, 0.0], [1.0, 1.0]], 1.0),
            Err(CameraError::MismatchedLengths { .. })
        ));
        assert!(matches!(
            ObjectFootprints::new(Vec::<[f64; 2]>::new(), Vec::<[f64; 2]>::new(), 1.0),
            Err(CameraError::InsufficientObservations { .. })
        ));
        assert!(ObjectFootprints::new([[0.0, 1.0]], [[0.0, 0.0]], 0.0).is_err());
        assert!(DistanceLandmarks::new([[0.0, 1.0]], vec![10.0])
            .unwrap()
            .bearings(vec![1.0, 2.0])
            .is_err());
        assert!(PointCorrespondences::new([[0.0, 1.0]], vec![]).is_err());
        assert!(KnownLengths::new([([0.0, 1.0], [2.0, 3.0])], vec![-1.0]).is_err());
    }

    #[test]
    fn costs_vanish_at_the_true_pose() {
        let camera = camera(Pose::new(12.0, 70.0).roll(1.0));
        let world = [
            Point3::new(-3.0, 20.0, 0.0),
            Point3::new(2.0, 30.0, 0.0),
            Point3::new(5.0, 45.0, 0.0),
        ];
        let image = camera.world_to_image(&world);

        let raised: Vec<Point3<f64>> = world.iter().map(|p| Point3::new(p.x, p.y, 1.8)).collect();
        let heads = camera.world_to_image(&raised);
        let objects = ObjectFootprints::new(&image, &heads, 1.8).unwrap();
        assert!(objects.cost(&camera).unwrap() < 1e-12);

        let distances: Vec<f64> = world.iter().map(|p| camera.distance_bearing(p).0).collect();
        let bearings: Vec<f64> = world.iter().map(|p| camera.distance_bearing(p).1).collect();
        let landmarks = DistanceLandmarks::new(&image, distances).unwrap();
        assert!(landmarks.cost(&camera).unwrap() < 1e-12);
        let landmarks = landmarks.bearings(bearings).unwrap();
        assert!(landmarks.cost(&camera).unwrap() < 1e-12);
        assert_eq!(landmarks.releases(), &[PoseParameter::Heading]);

        let correspondences = PointCorrespondences::new(&image, world.to_vec()).unwrap();
        assert!(correspondences.cost(&camera).unwrap() < 1e-9);

        let lengths = KnownLengths::new(
            [(image[0], image[1]), (image[1], image[2])],
            vec![(world[1] - world[0]).norm(), (world[2] - world[1]).norm()],
        )
        .unwrap();
        assert!(lengths.cost(&camera).unwrap() < 1e-12);
    }

    #[test]
    fn footprint_cost_grows_with_wrong_height() {
        let truth = camera(Pose::new(12.0, 70.0));
        let feet = truth.world_to_image(&[Point3::new(0.0, 20.0, 0.0)]);
        let heads = truth.world_to_image(&[Point3::new(0.0, 20.0, 1.8)]);
        let objects = ObjectFootprints::new(&feet, &heads, 1.8).unwrap();
        let wrong = camera(Pose::new(6.0, 70.0));
        assert!(objects.cost(&wrong).unwrap() > 1.0);
    }

    #[test]
    fn segments_become_footprints() {
        let objects = ObjectFootprints::from_segments(
            [LineSegment::new([10.0, 400.0], [12.0, 300.0])],
            1.7,
        )
        .unwrap();
        assert_eq!(objects.feet, vec![Point2::new(11.0, 400.0)]);
        assert_eq!(objects.heads, vec![Point2::new(11.0, 300.0)]);
        assert_relative_eq!(objects.object_height, 1.7);
    }

    #[test]
    fn fully_fixed_camera_only_evaluates() {
        let mut camera = camera(Pose::new(12.0, 70.0));
        camera.fix_tilt(70.0).unwrap();
        camera.fix_roll(0.0).unwrap();
        let lengths = KnownLengths::new(
            [([1800.0, 2000.0], [2200.0, 2000.0])],
            vec![1.0],
        )
        .unwrap();
        let report = camera.fit_from_lengths(&lengths).unwrap();
        assert!(report.parameters.is_empty());
        assert!(report.converged);
        assert_eq!(report.iterations, 0);
        assert_eq!(camera.pose(), &Pose::new(12.0, 70.0));
    }
}
