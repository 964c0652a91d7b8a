use approx::assert_relative_eq;
use cv_camera_transform::{
    CalibrationCost, DistanceLandmarks, FixedAxis, GroundCamera, Intrinsics, KeyPoint,
    KnownLengths, LineSegment, ObjectFootprints, PointCorrespondences, Pose, PoseParameter,
    SensorSize,
};
use nalgebra::{Point2, Point3};
use rand::{rngs::SmallRng, Rng, SeedableRng};

const SAMPLE_POINTS: usize = 12;
const HEIGHT_TOLERANCE: f64 = 0.01;
const ANGLE_TOLERANCE: f64 = 0.1;
const OBJECT_HEIGHT: f64 = 1.8;

#[test]
fn point_correspondences_recover_pose_and_position() {
    init();
    let truth = truth_camera(Pose::new(15.0, 78.0).position(2.0, -3.0));
    let world = ground_points(&truth, 7);
    let image: Vec<KeyPoint> = truth
        .world_to_image(&world)
        .into_iter()
        .map(KeyPoint)
        .collect();

    let mut camera = GroundCamera::new(intrinsics());
    camera.fix_roll(0.0).unwrap();
    let correspondences = PointCorrespondences::new(&image, world).unwrap();
    let report = camera.fit_from_point_correspondences(&correspondences).unwrap();

    assert_eq!(
        report
            .parameters
            .iter()
            .map(|&(p, _)| p)
            .collect::<Vec<_>>(),
        vec![
            PoseParameter::Height,
            PoseParameter::Tilt,
            PoseParameter::PosX,
            PoseParameter::PosY
        ]
    );
    let pose = camera.pose();
    assert_relative_eq!(pose.height, 15.0, max_relative = HEIGHT_TOLERANCE);
    assert_relative_eq!(pose.tilt, 78.0, epsilon = ANGLE_TOLERANCE);
    assert_relative_eq!(pose.pos_x, 2.0, epsilon = 0.1);
    assert_relative_eq!(pose.pos_y, -3.0, epsilon = 0.1);
    assert_eq!(report.value(PoseParameter::Height), Some(pose.height));
    assert!(report.cost < 0.1, "cost {}", report.cost);
}

#[test]
fn footprints_recover_height_and_tilt() {
    init();
    let truth = truth_camera(Pose::new(12.0, 75.0));
    let feet_world = ground_points(&truth, 11);
    let heads_world: Vec<Point3<f64>> = feet_world
        .iter()
        .map(|p| Point3::new(p.x, p.y, OBJECT_HEIGHT))
        .collect();
    let feet = truth.world_to_image(&feet_world);
    let heads = truth.world_to_image(&heads_world);

    let mut camera = GroundCamera::new(intrinsics());
    camera.fix_roll(0.0).unwrap();
    let objects = ObjectFootprints::new(&feet, &heads, OBJECT_HEIGHT).unwrap();
    let report = camera.fit_from_objects(&objects).unwrap();

    assert_eq!(report.parameters.len(), 2);
    assert_relative_eq!(camera.pose().height, 12.0, max_relative = HEIGHT_TOLERANCE);
    assert_relative_eq!(camera.pose().tilt, 75.0, epsilon = ANGLE_TOLERANCE);
}

#[test]
fn footprints_from_markers() {
    init();
    let truth = truth_camera(Pose::new(9.0, 72.0));
    // Upright objects on the principal column project onto vertical markers.
    let mut rng = SmallRng::seed_from_u64(5);
    let rows: Vec<[f64; 2]> = (0..SAMPLE_POINTS)
        .map(|_| [2000.0, rng.gen_range(1900.0..2900.0)])
        .collect();
    let markers: Vec<LineSegment> = truth
        .image_to_world(rows, &FixedAxis::ground(0.0))
        .unwrap()
        .iter()
        .map(|p| {
            let foot = truth.world_point_to_image(p);
            let head = truth.world_point_to_image(&Point3::new(p.x, p.y, OBJECT_HEIGHT));
            LineSegment::new(head, foot)
        })
        .collect();

    let objects = ObjectFootprints::from_segments(&markers, OBJECT_HEIGHT).unwrap();
    assert!(objects.cost(&truth).unwrap() < 1e-12);

    let mut camera = GroundCamera::new(intrinsics());
    camera.fix_roll(0.0).unwrap();
    camera.fit_from_objects(&objects).unwrap();

    assert_relative_eq!(camera.pose().height, 9.0, max_relative = HEIGHT_TOLERANCE);
    assert_relative_eq!(camera.pose().tilt, 72.0, epsilon = ANGLE_TOLERANCE);
}

#[test]
fn landmarks_recover_height_and_tilt() {
    init();
    let truth = truth_camera(Pose::new(10.0, 80.0));
    let world = ground_points(&truth, 13);
    let marks = truth.world_to_image(&world);
    let distances = world
        .iter()
        .map(|p| truth.distance_bearing(p).0)
        .collect();

    let mut camera = GroundCamera::new(intrinsics());
    camera.fix_roll(0.0).unwrap();
    let landmarks = DistanceLandmarks::new(&marks, distances).unwrap();
    camera.fit_from_landmarks(&landmarks).unwrap();

    assert_relative_eq!(camera.pose().height, 10.0, max_relative = HEIGHT_TOLERANCE);
    assert_relative_eq!(camera.pose().tilt, 80.0, epsilon = ANGLE_TOLERANCE);
}

#[test]
fn landmark_bearings_recover_heading() {
    init();
    let truth = truth_camera(Pose::new(10.0, 80.0).heading(25.0));
    let world = ground_points(&truth, 17);
    let marks = truth.world_to_image(&world);
    let (distances, bearings) = world.iter().map(|p| truth.distance_bearing(p)).unzip();

    let mut camera = GroundCamera::new(intrinsics());
    camera.fix_roll(0.0).unwrap();
    let landmarks = DistanceLandmarks::new(&marks, distances)
        .unwrap()
        .bearings(bearings)
        .unwrap();
    let report = camera.fit_from_landmarks(&landmarks).unwrap();

    assert!(report.value(PoseParameter::Heading).is_some());
    assert_relative_eq!(camera.pose().heading, 25.0, epsilon = ANGLE_TOLERANCE);
    assert_relative_eq!(camera.pose().height, 10.0, max_relative = HEIGHT_TOLERANCE);
    assert_relative_eq!(camera.pose().tilt, 80.0, epsilon = ANGLE_TOLERANCE);
}

#[test]
fn lengths_recover_height_and_tilt() {
    init();
    let truth = truth_camera(Pose::new(8.0, 70.0));
    let world = ground_points(&truth, 19);
    let image = truth.world_to_image(&world);
    let segments: Vec<(Point2<f64>, Point2<f64>)> =
        image.iter().copied().zip(image.iter().copied().skip(1)).collect();
    let lengths = world
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).norm())
        .collect();

    let mut camera = GroundCamera::new(intrinsics());
    camera.fix_roll(0.0).unwrap();
    let known = KnownLengths::new(segments, lengths).unwrap();
    camera.fit_from_lengths(&known).unwrap();

    assert_relative_eq!(camera.pose().height, 8.0, max_relative = HEIGHT_TOLERANCE);
    assert_relative_eq!(camera.pose().tilt, 70.0, epsilon = ANGLE_TOLERANCE);
}

#[test]
fn fixed_horizon_is_respected() {
    init();
    let truth = truth_camera(Pose::new(20.0, 86.0));
    let horizon = truth.image_horizon().unwrap();
    let feet_world = ground_points(&truth, 23);
    let heads_world: Vec<Point3<f64>> = feet_world
        .iter()
        .map(|p| Point3::new(p.x, p.y, OBJECT_HEIGHT))
        .collect();

    let mut camera = GroundCamera::new(intrinsics());
    camera.fix_horizon(horizon).unwrap();
    assert!(!camera.constraints().roll.is_free());
    assert_relative_eq!(camera.pose().roll, 0.0, epsilon = 1e-9);

    let objects = ObjectFootprints::new(
        truth.world_to_image(&feet_world),
        truth.world_to_image(&heads_world),
        OBJECT_HEIGHT,
    )
    .unwrap();
    camera.fit_from_objects(&objects).unwrap();

    assert_relative_eq!(camera.pose().height, 20.0, max_relative = HEIGHT_TOLERANCE);
    assert_relative_eq!(camera.pose().tilt, 86.0, epsilon = ANGLE_TOLERANCE);
    assert_relative_eq!(
        camera.horizon_row().unwrap(),
        camera.fixed_horizon().unwrap(),
        epsilon = 1.0
    );
}

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn intrinsics() -> Intrinsics {
    Intrinsics::new(16.0, SensorSize::Width(10.0), (4000, 3000)).unwrap()
}

fn truth_camera(pose: Pose) -> GroundCamera {
    GroundCamera::with_pose(intrinsics(), pose).unwrap()
}

/// Ground points spread over the lower part of the image of `camera`.
fn ground_points(camera: &GroundCamera, seed: u64) -> Vec<Point3<f64>> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let pixels: Vec<[f64; 2]> = (0..SAMPLE_POINTS)
        .map(|_| [rng.gen_range(400.0..3600.0), rng.gen_range(1900.0..2900.0)])
        .collect();
    camera
        .image_to_world(pixels, &FixedAxis::ground(0.0))
        .unwrap()
}
