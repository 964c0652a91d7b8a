//! Transforms between the pixels of a camera looking at the ground and the world it sees.
//!
//! A [`GroundCamera`] combines the [`Intrinsics`] of an ideal pinhole camera
//! with a [`Pose`] above the ground and converts between four coordinate
//! systems:
//!
//! - image pixels, with the origin in the top left corner,
//! - the flat local world, in meters, with the ground at `z = 0`,
//! - earth coordinates, which measure distances along a spherical earth,
//! - geographic positions once the camera is anchored with a [`GeoAnchor`].
//!
//! Unknown pose parameters are estimated from annotations in the image with
//! the `fit_*` methods, which minimize a [`CalibrationCost`] with a
//! Nelder-Mead simplex.
//!
//! ```
//! use cv_camera_transform::{FixedAxis, GroundCamera, Intrinsics, Pose, SensorSize};
//! use nalgebra::Point3;
//!
//! let intrinsics = Intrinsics::new(16.0, SensorSize::Width(10.0), (4000, 3000)).unwrap();
//! let camera = GroundCamera::with_pose(intrinsics, Pose::new(20.0, 80.0)).unwrap();
//! let pixel = camera.world_point_to_image(&Point3::new(0.0, 50.0, 0.0));
//! let ground = camera.image_to_world([pixel], &FixedAxis::ground(0.0)).unwrap();
//! assert!((ground[0].y - 50.0).abs() < 1e-6);
//! ```

mod camera;
mod earth;
mod error;
mod fit;
mod format;
mod gps;
mod horizon;
mod intrinsics;
#[cfg(feature = "serde-serialize")]
mod persist;
mod point;
mod pose;
mod projection;
mod top_view;

pub use camera::*;
pub use earth::*;
pub use error::*;
pub use fit::*;
pub use format::*;
pub use gps::*;
pub use horizon::*;
pub use intrinsics::*;
#[cfg(feature = "serde-serialize")]
pub use persist::*;
pub use point::*;
pub use pose::*;
pub use projection::*;
pub use top_view::*;

pub use nalgebra;
