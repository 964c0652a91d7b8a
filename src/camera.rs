use crate::fit::{FitOptions, FreeParameters, Parameter, PoseConstraints, PoseParameter};
use crate::gps::GeoAnchor;
use crate::{camera_matrix, CameraError, Intrinsics, Pose};
use log::trace;
use nalgebra::{Matrix3x4, Point2};

/// Mean radius of the earth in meters.
pub const EARTH_RADIUS: f64 = 6_371e3;

/// A pinhole camera looking at the ground from a known (or to be fitted) pose.
///
/// The camera owns its intrinsics, its pose and the projective camera matrix
/// composed from both. The matrix is rebuilt by every method that changes the
/// pose, so the transforms always see a consistent state. Each instance is
/// self-contained; independent cameras can be calibrated on separate threads.
#[derive(Debug, Clone)]
pub struct GroundCamera {
    intrinsics: Intrinsics,
    pose: Pose,
    matrix: Matrix3x4<f64>,
    pub(crate) constraints: PoseConstraints,
    pub(crate) fixed_horizon: Option<f64>,
    pub(crate) geo_anchor: Option<GeoAnchor>,
    pub(crate) fit_options: FitOptions,
}

impl GroundCamera {
    /// Creates a camera whose pose is still unknown.
    ///
    /// The pose starts at the fit estimates and height, tilt and roll are free.
    pub fn new(intrinsics: Intrinsics) -> Self {
        let fit_options = FitOptions::default();
        let estimates = fit_options.estimates;
        let mut pose = Pose {
            height: estimates.height,
            tilt: estimates.tilt,
            roll: estimates.roll,
            heading: estimates.heading,
            pos_x: estimates.pos_x,
            pos_y: estimates.pos_y,
        };
        let constraints = PoseConstraints::default();
        constraints.apply_fixed(&mut pose);
        Self {
            matrix: camera_matrix(&intrinsics, &pose),
            intrinsics,
            pose,
            constraints,
            fixed_horizon: None,
            geo_anchor: None,
            fit_options,
        }
    }

    /// Creates a camera with a known pose.
    ///
    /// The height is fixed, tilt and roll stay free for later fits, heading and
    /// position are fixed at the values of `pose`.
    pub fn with_pose(intrinsics: Intrinsics, pose: Pose) -> Result<Self, CameraError> {
        CameraError::ensure_positive("height", pose.height)?;
        for parameter in PoseParameter::ALL {
            CameraError::ensure_finite(parameter.name(), parameter.get(&pose))?;
        }
        let constraints = PoseConstraints {
            height: Parameter::Fixed(pose.height),
            tilt: Parameter::Free,
            roll: Parameter::Free,
            heading: Parameter::Fixed(pose.heading),
            pos_x: Parameter::Fixed(pose.pos_x),
            pos_y: Parameter::Fixed(pose.pos_y),
        };
        Ok(Self {
            matrix: camera_matrix(&intrinsics, &pose),
            intrinsics,
            pose,
            constraints,
            fixed_horizon: None,
            geo_anchor: None,
            fit_options: FitOptions::default(),
        })
    }

    /// Replaces the options used by the `fit_*` methods.
    pub fn with_fit_options(self, fit_options: FitOptions) -> Self {
        Self {
            fit_options,
            ..self
        }
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// The 3x4 projective camera matrix of the current pose.
    pub fn matrix(&self) -> &Matrix3x4<f64> {
        &self.matrix
    }

    pub fn constraints(&self) -> &PoseConstraints {
        &self.constraints
    }

    pub fn fit_options(&self) -> &FitOptions {
        &self.fit_options
    }

    /// The image row the horizon is held at during fits, if any.
    pub fn fixed_horizon(&self) -> Option<f64> {
        self.fixed_horizon
    }

    pub fn geo_anchor(&self) -> Option<&GeoAnchor> {
        self.geo_anchor.as_ref()
    }

    /// Sets the geographic position and compass heading of the camera.
    pub fn set_geo_anchor(&mut self, anchor: GeoAnchor) {
        self.geo_anchor = Some(anchor);
    }

    /// Replaces the pose without touching which parameters are fixed.
    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
        self.rebuild();
    }

    /// Recomputes the camera matrix from the intrinsics and the current pose.
    pub(crate) fn rebuild(&mut self) {
        self.matrix = camera_matrix(&self.intrinsics, &self.pose);
        trace!("rebuilt camera matrix for {:?}", self.pose);
    }

    /// Writes one pose value without changing whether it is fixed.
    pub(crate) fn set_parameter(&mut self, parameter: PoseParameter, value: f64) {
        parameter.set(&mut self.pose, value);
        self.rebuild();
    }

    /// Writes a free parameter vector and the fixed values into the pose.
    pub(crate) fn apply_free(&mut self, free: &FreeParameters, values: &[f64]) {
        free.apply(&mut self.pose, values);
        self.constraints.apply_fixed(&mut self.pose);
        self.rebuild();
    }

    fn fix(&mut self, parameter: PoseParameter, value: f64) {
        self.constraints.set(parameter, Parameter::Fixed(value));
        parameter.set(&mut self.pose, value);
    }

    /// Holds the height at `height` meters in subsequent fits.
    pub fn fix_height(&mut self, height: f64) -> Result<(), CameraError> {
        let height = CameraError::ensure_positive("height", height)?;
        self.fix(PoseParameter::Height, height);
        self.rebuild();
        Ok(())
    }

    /// Holds the tilt at `tilt` degrees in subsequent fits.
    pub fn fix_tilt(&mut self, tilt: f64) -> Result<(), CameraError> {
        let tilt = CameraError::ensure_finite("tilt", tilt)?;
        self.fix(PoseParameter::Tilt, tilt);
        self.rebuild();
        Ok(())
    }

    /// Holds the tilt at the angle given by the tangent of the elevation of the optical axis.
    pub fn fix_tan_tilt(&mut self, tan_tilt: f64) -> Result<(), CameraError> {
        let tan_tilt = CameraError::ensure_finite("tangent of tilt", tan_tilt)?;
        self.fix_tilt(crate::tilt_from_tangent(tan_tilt))
    }

    /// Holds the roll at `roll` degrees in subsequent fits.
    pub fn fix_roll(&mut self, roll: f64) -> Result<(), CameraError> {
        let roll = CameraError::ensure_finite("roll", roll)?;
        self.fix(PoseParameter::Roll, roll);
        self.rebuild();
        Ok(())
    }

    /// Holds the heading at `heading` degrees in subsequent fits.
    pub fn fix_heading(&mut self, heading: f64) -> Result<(), CameraError> {
        let heading = CameraError::ensure_finite("heading", heading)?;
        self.fix(PoseParameter::Heading, heading);
        self.rebuild();
        Ok(())
    }

    /// Holds the horizontal offset in subsequent fits.
    pub fn fix_position(&mut self, pos_x: f64, pos_y: f64) -> Result<(), CameraError> {
        let pos_x = CameraError::ensure_finite("pos_x", pos_x)?;
        let pos_y = CameraError::ensure_finite("pos_y", pos_y)?;
        self.fix(PoseParameter::PosX, pos_x);
        self.fix(PoseParameter::PosY, pos_y);
        self.rebuild();
        Ok(())
    }

    /// Lets the next fit estimate `parameter`. The current value is kept until then.
    pub fn release(&mut self, parameter: PoseParameter) {
        self.constraints.set(parameter, Parameter::Free);
    }

    /// Drops the fixed horizon constraint.
    pub fn clear_horizon(&mut self) {
        self.fixed_horizon = None;
    }

    /// Horizontal position of the optical center, the point the camera stands on.
    pub fn footpoint(&self) -> Point2<f64> {
        self.pose.center().xy()
    }

    pub(crate) fn image_size(&self) -> (f64, f64) {
        (
            self.intrinsics.image_width() as f64,
            self.intrinsics.image_height() as f64,
        )
    }
}
