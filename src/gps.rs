//! Geographic coordinates on a spherical earth.
//!
//! Positions are converted with great-circle distances and initial bearings
//! and the destination-point formula. The camera footpoint is tied to a latitude and
//! longitude through a [`GeoAnchor`], which also carries the compass heading of
//! the world `+Y` axis.

use crate::{CameraError, GroundCamera, ImagePoint, EARTH_RADIUS};
use nalgebra::{Matrix2, Point2, Point3, Vector2};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A position given by latitude and longitude in degrees and an altitude in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl GpsPoint {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }
}

/// Geographic position of the camera footpoint and the compass heading of the world `+Y` axis.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct GeoAnchor {
    latitude: f64,
    longitude: f64,
    heading: f64,
    /// Maps an (east, north) offset onto world (x, y). The world `+X` axis lies
    /// to the left of the viewing direction, so this is a reflection and is its
    /// own inverse.
    axes: Matrix2<f64>,
}

impl GeoAnchor {
    /// Anchors the footpoint at the given latitude and longitude in degrees, facing north.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            heading: 0.0,
            axes: heading_axes(0.0),
        }
    }

    /// Sets the compass heading in degrees the camera looks along.
    pub fn with_heading(self, heading: f64) -> Self {
        Self {
            heading,
            axes: heading_axes(heading),
            ..self
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    fn position(&self, altitude: f64) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude, altitude)
    }
}

#[rustfmt::skip]
fn heading_axes(heading: f64) -> Matrix2<f64> {
    let (s, c) = heading.to_radians().sin_cos();
    Matrix2::new(
        -c, s,
        s,  c,
    )
}

/// Great-circle distance in meters and initial bearing in degrees from `from` to `to`.
///
/// Bearings are measured clockwise from north.
pub fn great_circle(from: &GpsPoint, to: &GpsPoint) -> (f64, f64) {
    let (lat1, lat2) = (from.latitude.to_radians(), to.latitude.to_radians());
    let delta_lon = (to.longitude - from.longitude).to_radians();
    // Haversine form of the spherical law of cosines, exact for short distances.
    let half_chord = ((lat2 - lat1) * 0.5).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon * 0.5).sin().powi(2);
    let half_chord = half_chord.clamp(0.0, 1.0);
    let distance = 2.0 * f64::atan2(half_chord.sqrt(), (1.0 - half_chord).sqrt()) * EARTH_RADIUS;
    let bearing = f64::atan2(
        delta_lon.sin() * lat2.cos(),
        lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos(),
    );
    (distance, bearing.to_degrees())
}

/// Travels `distance` meters from `start` along the great circle with initial
/// `bearing` in degrees. The altitude is kept.
pub fn move_gps(start: &GpsPoint, distance: f64, bearing: f64) -> GpsPoint {
    let lat1 = start.latitude.to_radians();
    let lon1 = start.longitude.to_radians();
    let angle = distance / EARTH_RADIUS;
    let bearing = bearing.to_radians();
    let lat2 = (lat1.sin() * angle.cos() + lat1.cos() * angle.sin() * bearing.cos())
        .clamp(-1.0, 1.0)
        .asin();
    let lon2 = lon1
        + f64::atan2(
            bearing.sin() * angle.sin() * lat1.cos(),
            angle.cos() - lat1.sin() * lat2.sin(),
        );
    GpsPoint::new(lat2.to_degrees(), lon2.to_degrees(), start.altitude)
}

impl GroundCamera {
    fn anchor(&self) -> Result<&GeoAnchor, CameraError> {
        self.geo_anchor.as_ref().ok_or(CameraError::MissingGeoAnchor)
    }

    /// Horizontal distance and signed bearing in degrees from the footpoint to `point`.
    ///
    /// The bearing is `0` along the world `+Y` axis and grows clockwise when
    /// seen from above, so a point on the camera's left (`+X`) has a bearing of
    /// `-90`. Points abeam of the footpoint (`dy = 0`) are well defined.
    pub fn distance_bearing(&self, point: &Point3<f64>) -> (f64, f64) {
        let offset: Vector2<f64> = point.xy() - self.footpoint();
        let distance = offset.norm();
        let bearing = -f64::atan2(offset.x, offset.y).to_degrees();
        (distance, bearing)
    }

    /// Places a geographic position in earth coordinates: the great-circle
    /// distance from the anchor becomes the arc length and the altitude the
    /// elevation.
    pub fn gps_to_earth(&self, position: &GpsPoint) -> Result<Point3<f64>, CameraError> {
        let anchor = self.anchor()?;
        let (distance, bearing) = great_circle(&anchor.position(position.altitude), position);
        let (sin, cos) = bearing.to_radians().sin_cos();
        let east_north = Vector2::new(distance * sin, distance * cos);
        let horizontal = self.footpoint() + anchor.axes * east_north;
        Ok(Point3::new(horizontal.x, horizontal.y, position.altitude))
    }

    /// Inverse of [`GroundCamera::gps_to_earth`].
    pub fn earth_to_gps(&self, point: &Point3<f64>) -> Result<GpsPoint, CameraError> {
        let anchor = self.anchor()?;
        let offset: Vector2<f64> = point.xy() - self.footpoint();
        let east_north = anchor.axes * offset;
        let distance = east_north.norm();
        let bearing = f64::atan2(east_north.x, east_north.y).to_degrees();
        Ok(move_gps(&anchor.position(point.z), distance, bearing))
    }

    /// Converts a geographic position into the flat local world.
    pub fn gps_to_world(&self, position: &GpsPoint) -> Result<Point3<f64>, CameraError> {
        Ok(self.earth_to_world(&self.gps_to_earth(position)?))
    }

    /// Converts a flat world point into a geographic position.
    pub fn world_to_gps(&self, point: &Point3<f64>) -> Result<GpsPoint, CameraError> {
        self.earth_to_gps(&self.world_to_earth(point))
    }

    /// Projects geographic positions into the image.
    pub fn gps_to_image(&self, positions: &[GpsPoint]) -> Result<Vec<Point2<f64>>, CameraError> {
        positions
            .iter()
            .map(|position| Ok(self.world_point_to_image(&self.gps_to_world(position)?)))
            .collect()
    }

    /// Back-projects image points onto the plane `z = elevation` and converts
    /// them into geographic positions.
    pub fn image_to_gps<P: ImagePoint>(
        &self,
        points: impl IntoIterator<Item = P>,
        elevation: f64,
    ) -> Result<Vec<GpsPoint>, CameraError> {
        self.anchor()?;
        points
            .into_iter()
            .map(|point| self.world_to_gps(&self.image_point_to_ground(point, elevation)?))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Intrinsics, Pose, SensorSize};
    use approx::assert_relative_eq;
    use quickcheck_macros::quickcheck;

    fn camera(pose: Pose) -> GroundCamera {
        let intrinsics = Intrinsics::new(16.0, SensorSize::Width(10.0), (4000, 3000)).unwrap();
        GroundCamera::with_pose(intrinsics, pose).unwrap()
    }

    fn anchored(heading: f64) -> GroundCamera {
        let mut camera = camera(Pose::new(20.0, 80.0));
        camera.set_geo_anchor(GeoAnchor::new(52.0, 13.0).with_heading(heading));
        camera
    }

    fn wrap(angle: f64) -> f64 {
        (angle + 540.0).rem_euclid(360.0) - 180.0
    }

    #[test]
    fn point_due_north_round_trips() {
        let camera = anchored(0.0);
        let north = move_gps(&GpsPoint::new(52.0, 13.0, 0.0), 1000.0, 0.0);
        assert!(north.latitude > 52.0);
        assert_relative_eq!(north.longitude, 13.0, epsilon = 1e-9);

        let world = camera.gps_to_world(&north).unwrap();
        assert_relative_eq!(world.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(world.y, 1000.0, epsilon = 0.01);

        let back = camera.world_to_gps(&world).unwrap();
        assert_relative_eq!(back.latitude, north.latitude, epsilon = 1e-6);
        assert_relative_eq!(back.longitude, north.longitude, epsilon = 1e-6);
    }

    #[test]
    fn heading_rotates_world_axes() {
        // Looking east, a point to the north lies on the left, the world +X side.
        let camera = anchored(90.0);
        let north = move_gps(&GpsPoint::new(52.0, 13.0, 0.0), 500.0, 0.0);
        let world = camera.gps_to_world(&north).unwrap();
        assert_relative_eq!(world.x, 500.0, epsilon = 0.01);
        assert_relative_eq!(world.y, 0.0, epsilon = 0.01);
    }

    #[test]
    fn great_circle_inverts_move() {
        let start = GpsPoint::new(-33.9, 18.4, 0.0);
        let target = move_gps(&start, 12_345.0, 73.0);
        let (distance, bearing) = great_circle(&start, &target);
        assert_relative_eq!(distance, 12_345.0, epsilon = 1e-3);
        assert_relative_eq!(bearing, 73.0, epsilon = 1e-6);
    }

    #[test]
    fn missing_anchor_is_reported() {
        let camera = camera(Pose::new(20.0, 80.0));
        assert!(matches!(
            camera.world_to_gps(&Point3::new(0.0, 10.0, 0.0)),
            Err(CameraError::MissingGeoAnchor)
        ));
        assert!(matches!(
            camera.image_to_gps([[2000.0, 2000.0]], 0.0),
            Err(CameraError::MissingGeoAnchor)
        ));
    }

    #[test]
    fn image_points_reach_gps_and_back() {
        let camera = anchored(30.0);
        let pixels = [[1800.0, 2200.0], [2500.0, 1900.0]];
        let positions = camera.image_to_gps(pixels, 0.0).unwrap();
        let image = camera.gps_to_image(&positions).unwrap();
        for (a, b) in image.iter().zip(&pixels) {
            assert_relative_eq!(a.x, b[0], epsilon = 1e-3);
            assert_relative_eq!(a.y, b[1], epsilon = 1e-3);
        }
    }

    #[test]
    fn abeam_bearing() {
        let camera = camera(Pose::new(20.0, 80.0));
        let (distance, bearing) = camera.distance_bearing(&Point3::new(10.0, 0.0, 0.0));
        assert_relative_eq!(distance, 10.0);
        assert_relative_eq!(bearing, -90.0);
        let (_, ahead) = camera.distance_bearing(&Point3::new(0.0, 10.0, 0.0));
        assert_relative_eq!(ahead, 0.0);
    }

    #[quickcheck]
    fn reflected_points_have_opposite_bearings(x: i16, y: i16) -> bool {
        let camera = camera(Pose::new(20.0, 80.0).position(4.0, -9.0));
        let foot = camera.footpoint();
        let point = Point3::new(foot.x + f64::from(x), foot.y + f64::from(y), 0.0);
        if x == 0 && y == 0 {
            return true;
        }
        let mirrored = Point3::new(2.0 * foot.x - point.x, 2.0 * foot.y - point.y, 0.0);
        let (d1, b1) = camera.distance_bearing(&point);
        let (d2, b2) = camera.distance_bearing(&mirrored);
        (d1 - d2).abs() < 1e-9 && (wrap(b1 - b2).abs() - 180.0).abs() < 1e-9
    }
}
