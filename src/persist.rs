use crate::{CameraError, GroundCamera, Intrinsics, Pose, PoseConstraints};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Flat record of the intrinsics and the pose of a camera.
///
/// Lengths are in meters, pose angles in degrees and fields of view in
/// radians. The fields of view are written for reference only; loading derives
/// them again from the focal length and the sensor size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub height: f64,
    pub roll: f64,
    pub heading: f64,
    pub tilt: f64,
    pub pos_x: f64,
    pub pos_y: f64,
    #[serde(rename = "f")]
    pub focal_length: f64,
    pub sensor_width: f64,
    pub sensor_height: f64,
    #[serde(rename = "fov_h_angle")]
    pub fov_horizontal: f64,
    #[serde(rename = "fov_v_angle")]
    pub fov_vertical: f64,
    #[serde(rename = "im_width")]
    pub image_width: u32,
    #[serde(rename = "im_height")]
    pub image_height: u32,
}

impl GroundCamera {
    /// Captures the intrinsics and the current pose.
    pub fn state(&self) -> CameraState {
        let intrinsics = self.intrinsics();
        let pose = self.pose();
        CameraState {
            height: pose.height,
            roll: pose.roll,
            heading: pose.heading,
            tilt: pose.tilt,
            pos_x: pose.pos_x,
            pos_y: pose.pos_y,
            focal_length: intrinsics.focal_length(),
            sensor_width: intrinsics.sensor_width(),
            sensor_height: intrinsics.sensor_height(),
            fov_horizontal: intrinsics.fov_horizontal(),
            fov_vertical: intrinsics.fov_vertical(),
            image_width: intrinsics.image_width(),
            image_height: intrinsics.image_height(),
        }
    }

    /// Restores a camera from `state`. Every pose parameter is fixed at its stored value.
    pub fn from_state(state: &CameraState) -> Result<Self, CameraError> {
        let intrinsics = Intrinsics::from_parts(
            state.focal_length,
            state.sensor_width,
            state.sensor_height,
            (state.image_width, state.image_height),
        )?;
        let pose = Pose {
            height: state.height,
            tilt: state.tilt,
            roll: state.roll,
            heading: state.heading,
            pos_x: state.pos_x,
            pos_y: state.pos_y,
        };
        let mut camera = Self::with_pose(intrinsics, pose)?;
        camera.constraints = PoseConstraints::fixed(&pose);
        Ok(camera)
    }

    pub fn to_json(&self) -> Result<String, CameraError> {
        Ok(serde_json::to_string(&self.state())?)
    }

    pub fn from_json(json: &str) -> Result<Self, CameraError> {
        Self::from_state(&serde_json::from_str(json)?)
    }

    /// Writes the camera state as JSON to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CameraError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Reads a camera written by [`GroundCamera::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CameraError> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SensorSize;

    #[test]
    fn json_uses_flat_keys() {
        let intrinsics = Intrinsics::new(16.0, SensorSize::Width(10.0), (4000, 3000)).unwrap();
        let camera =
            GroundCamera::with_pose(intrinsics, Pose::new(20.0, 80.0).roll(1.5)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&camera.to_json().unwrap()).unwrap();
        for key in [
            "height",
            "roll",
            "heading",
            "tilt",
            "pos_x",
            "pos_y",
            "f",
            "sensor_width",
            "sensor_height",
            "fov_h_angle",
            "fov_v_angle",
            "im_width",
            "im_height",
        ] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["im_width"], 4000);
        assert_eq!(value["roll"], 1.5);
    }

    #[test]
    fn loaded_camera_is_fully_fixed() {
        let intrinsics = Intrinsics::new(16.0, SensorSize::Width(10.0), (4000, 3000)).unwrap();
        let camera = GroundCamera::with_pose(intrinsics, Pose::new(20.0, 80.0)).unwrap();
        let loaded = GroundCamera::from_json(&camera.to_json().unwrap()).unwrap();
        assert!(loaded.constraints().free().is_empty());
        approx::assert_relative_eq!(loaded.matrix(), camera.matrix(), max_relative = 1e-12);
    }

    #[test]
    fn invalid_state_is_rejected() {
        let json = r#"{"height":-3,"roll":0,"heading":0,"tilt":80,"pos_x":0,"pos_y":0,
            "f":0.016,"sensor_width":0.01,"sensor_height":0.0075,"fov_h_angle":0.6,
            "fov_v_angle":0.4,"im_width":4000,"im_height":3000}"#;
        assert!(matches!(
            GroundCamera::from_json(json),
            Err(CameraError::InvalidParameter { name: "height", .. })
        ));
        assert!(matches!(
            GroundCamera::from_json("{\"height\": 1"),
            Err(CameraError::Serialization(_))
        ));
    }
}
