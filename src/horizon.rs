use crate::pose::rotation_heading;
use crate::{CameraError, GroundCamera, ImagePoint, PoseParameter, EARTH_RADIUS};
use itertools::Itertools;
use log::debug;
use nalgebra::{Matrix3, Matrix4, Point2, Point3, Vector3};

/// Least-squares line `row = slope * column + intercept` through `points`.
///
/// Fails when fewer than two points are given or all share the same column.
pub fn fit_line(points: &[Point2<f64>]) -> Result<(f64, f64), CameraError> {
    CameraError::ensure_at_least("fitting a line", 2, points.len())?;
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;
    let (sxx, sxy) = points.iter().fold((0.0, 0.0), |(sxx, sxy), p| {
        let dx = p.x - mean_x;
        (sxx + dx * dx, sxy + dx * (p.y - mean_y))
    });
    if sxx <= f64::EPSILON * n {
        return Err(CameraError::Singular("a line through points in a single column"));
    }
    let slope = sxy / sxx;
    Ok((slope, mean_y - slope * mean_x))
}

/// Area of the quadrilateral with corners `a`, `b`, `c`, `d` in order.
fn quadrilateral_area(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>, d: &Point3<f64>) -> f64 {
    0.5 * ((a.y - c.y) * (d.x - b.x) + (b.y - d.y) * (a.x - c.x)).abs()
}

impl GroundCamera {
    /// Distance in meters from the footpoint to the horizon of the earth sphere.
    pub fn distance_to_horizon(&self) -> f64 {
        let height = self.pose().height;
        (2.0 * EARTH_RADIUS * EARTH_RADIUS * (1.0 - EARTH_RADIUS / (EARTH_RADIUS + height))).sqrt()
    }

    /// Samples the horizon line at the image columns `0`, `width / 2` and `width`.
    ///
    /// The horizon is taken as the ground line at [`GroundCamera::distance_to_horizon`]
    /// in front of the camera. For every sampled column the image row is an
    /// unknown of the linear system, next to the lateral world coordinate and
    /// the projective scale.
    pub fn image_horizon(&self) -> Result<[Point2<f64>; 3], CameraError> {
        let distance = self.distance_to_horizon();
        let foot = self.footpoint();
        // Express the camera in a frame whose +Y axis is the viewing direction
        // and whose origin is the footpoint.
        let r = rotation_heading(self.pose().heading).transpose();
        #[rustfmt::skip]
        let forward = Matrix4::new(
            r[(0, 0)], r[(0, 1)], 0.0, foot.x,
            r[(1, 0)], r[(1, 1)], 0.0, foot.y,
            0.0,       0.0,       1.0, 0.0,
            0.0,       0.0,       0.0, 1.0,
        );
        let matrix = self.matrix() * forward;
        let system = Matrix3::from_columns(&[
            matrix.column(0).into_owned(),
            matrix.column(1) * distance + matrix.column(3),
            Vector3::new(0.0, -1.0, 0.0),
        ]);
        let lu = system.lu();
        let (width, _) = self.image_size();
        let mut horizon = [Point2::origin(); 3];
        for (sample, column) in horizon.iter_mut().zip([0.0, width * 0.5, width]) {
            let solution = lu
                .solve(&Vector3::new(column, 0.0, 1.0))
                .ok_or(CameraError::Singular("the image horizon"))?;
            *sample = Point2::new(column, solution.z);
        }
        Ok(horizon)
    }

    /// Back-projects the image corners onto the ground plane `z = 0`, in the
    /// order top left, bottom left, bottom right, top right.
    ///
    /// Corners above the horizon land behind the camera.
    pub fn image_extent(&self) -> Result<Vec<Point3<f64>>, CameraError> {
        let (width, height) = self.image_size();
        self.image_to_world(
            [[0.0, 0.0], [0.0, height], [width, height], [width, 0.0]],
            &crate::FixedAxis::ground(0.0),
        )
    }

    /// Image row of the horizon at the center column.
    pub fn horizon_row(&self) -> Result<f64, CameraError> {
        let horizon = self.image_horizon()?;
        let (slope, intercept) = fit_line(&horizon)?;
        Ok(slope * self.image_size().0 * 0.5 + intercept)
    }

    /// Tilt in degrees that puts the horizon at image row `row` for a camera at `height`.
    pub fn tilt_from_horizon(&self, row: f64, height: f64) -> f64 {
        let image_height = self.image_size().1;
        let dip = (height / (height * height + 2.0 * height * EARTH_RADIUS).sqrt()).acos();
        let offset = (row - image_height * 0.5) / image_height * self.intrinsics().fov_vertical();
        (dip + offset).to_degrees()
    }

    /// Holds the horizon at the line through `points` during subsequent fits.
    ///
    /// A free roll is fixed to the slope of the line. With a fixed height the
    /// tilt is moved to match the horizon right away.
    pub fn fix_horizon<P: ImagePoint>(
        &mut self,
        points: impl IntoIterator<Item = P>,
    ) -> Result<(), CameraError> {
        let points = crate::collect_image_points(points);
        let (slope, intercept) = fit_line(&points)?;
        let row = slope * self.image_size().0 * 0.5 + intercept;
        self.fixed_horizon = Some(row);
        if self.constraints.roll.is_free() {
            let roll = -slope.atan().to_degrees();
            self.fix_roll(roll)?;
        }
        if !self.constraints.height.is_free() {
            let tilt = self.tilt_from_horizon(row, self.pose().height);
            self.set_parameter(PoseParameter::Tilt, tilt);
        }
        debug!("fixed horizon at row {} with slope {}", row, slope);
        Ok(())
    }

    /// Ground area in square meters covered by one pixel at the center column,
    /// for every image row.
    ///
    /// Rows whose pixel reaches up to the horizon or above it hold `undefined_value`.
    pub fn pixel_area_lut(&self, undefined_value: f64) -> Result<Vec<f64>, CameraError> {
        let (width, height) = self.image_size();
        let rows = self.intrinsics().image_height() as usize;
        let horizon = self.image_horizon()?[1].y;
        let first = (horizon + 0.5).floor() + 1.0;
        let first = if first.is_finite() {
            first.clamp(0.0, height) as usize
        } else {
            0
        };
        let x = width * 0.5;
        let mut lut = vec![undefined_value; rows];
        for (y, area) in lut.iter_mut().enumerate().skip(first) {
            let y = y as f64;
            let corners = self.image_to_world(
                [
                    [x - 0.5, y - 0.5],
                    [x + 0.5, y - 0.5],
                    [x + 0.5, y + 0.5],
                    [x - 0.5, y + 0.5],
                ],
                &crate::FixedAxis::ground(0.0),
            )?;
            if let Some((a, b, c, d)) = corners.iter().collect_tuple() {
                *area = quadrilateral_area(a, b, c, d);
            }
        }
        Ok(lut)
    }
}
