//! Bird's eye rendering of the ground plane.
//!
//! The raster uses mirrored world coordinates along `x` so that the left of
//! the camera image stays on the left of the top view. An extent is given as
//! `[x_min, x_max, y_min, y_max]` in these coordinates.

use crate::{CameraError, FixedAxis, GroundCamera};
use nalgebra::{Matrix3, Matrix4, Point2};

#[cfg(feature = "top-view")]
use image::RgbImage;

/// Largest raster, in pixels, a top view may cover.
pub const MAX_TOP_VIEW_PIXELS: f64 = (1u64 << 26) as f64;

/// How to lay out the top view raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopViewOptions {
    /// Visible part of the ground plane. Defaults to the footprint of the image.
    pub extent: Option<[f64; 4]>,
    /// Meters per raster pixel. Defaults to roughly the pixel count of the camera image.
    pub scaling: Option<f64>,
    /// Color of raster pixels that no image pixel maps onto.
    pub border: [u8; 3],
}

impl Default for TopViewOptions {
    fn default() -> Self {
        Self {
            extent: None,
            scaling: None,
            border: [0, 0, 0],
        }
    }
}

impl TopViewOptions {
    pub fn extent(self, extent: [f64; 4]) -> Self {
        Self {
            extent: Some(extent),
            ..self
        }
    }

    pub fn scaling(self, scaling: f64) -> Self {
        Self {
            scaling: Some(scaling),
            ..self
        }
    }

    pub fn border(self, border: [u8; 3]) -> Self {
        Self { border, ..self }
    }
}

/// A homography from camera pixels onto a top view raster, before the final
/// half turn that puts far ground at the top.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopView {
    pub homography: Matrix3<f64>,
    pub extent: [f64; 4],
    pub scaling: f64,
    pub width: u32,
    pub height: u32,
}

impl TopView {
    /// Raster position of a camera pixel.
    pub fn map(&self, pixel: Point2<f64>) -> Point2<f64> {
        let mapped = self.homography * pixel.to_homogeneous();
        Point2::new(mapped.x / mapped.z, mapped.y / mapped.z)
    }
}

impl GroundCamera {
    /// The visible ground in mirrored coordinates, cut off just below the horizon.
    fn default_extent(&self) -> Result<[f64; 4], CameraError> {
        let (width, height) = self.image_size();
        let top = match self.horizon_row() {
            Ok(row) if row.is_finite() => (row.ceil() + 1.0).clamp(0.0, height),
            _ => 0.0,
        };
        let corners = self.image_to_world(
            [[0.0, top], [0.0, height], [width, height], [width, top]],
            &FixedAxis::ground(0.0),
        )?;
        let mut extent = [
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
        ];
        for corner in &corners {
            extent[0] = extent[0].min(-corner.x);
            extent[1] = extent[1].max(-corner.x);
            extent[2] = extent[2].min(corner.y);
            extent[3] = extent[3].max(corner.y);
        }
        Ok(extent)
    }

    /// Computes the mapping of camera pixels onto a top view of the plane `z = 0`.
    pub fn top_view_homography(&self, options: &TopViewOptions) -> Result<TopView, CameraError> {
        let extent = match options.extent {
            Some(extent) => extent,
            None => self.default_extent()?,
        };
        let [x_min, x_max, y_min, y_max] = extent;
        let (ground_width, ground_depth) = (x_max - x_min, y_max - y_min);
        CameraError::ensure_positive("top view width", ground_width)?;
        CameraError::ensure_positive("top view depth", ground_depth)?;
        let scaling = match options.scaling {
            Some(scaling) => CameraError::ensure_positive("top view scaling", scaling)?,
            None => {
                let (width, height) = self.image_size();
                (ground_width * ground_depth / (width * height)).sqrt()
            }
        };

        #[rustfmt::skip]
        let raster = Matrix4::new(
            scaling, 0.0,     0.0,     -x_max,
            0.0,     scaling, 0.0,     y_min,
            0.0,     0.0,     scaling, 0.0,
            0.0,     0.0,     0.0,     1.0,
        );
        let projection = self.matrix() * raster;
        let to_image = Matrix3::from_columns(&[
            projection.column(0).into_owned(),
            projection.column(1).into_owned(),
            projection.column(3).into_owned(),
        ]);
        let homography = to_image
            .try_inverse()
            .ok_or(CameraError::Singular("the top view homography"))?;
        let (width, height) = ((ground_width / scaling).floor(), (ground_depth / scaling).floor());
        if width * height > MAX_TOP_VIEW_PIXELS {
            return Err(CameraError::InvalidParameter {
                name: "top view raster size",
                value: width * height,
                reason: "must not exceed MAX_TOP_VIEW_PIXELS, use a coarser scaling",
            });
        }
        Ok(TopView {
            homography,
            extent,
            scaling,
            width: width as u32,
            height: height as u32,
        })
    }

    /// Warps `image` onto the ground plane.
    ///
    /// The result shows mirrored `x` growing to the right and `y` growing
    /// upwards, with `extent` covering the whole raster.
    #[cfg(feature = "top-view")]
    pub fn top_view_of_image(
        &self,
        image: &RgbImage,
        options: &TopViewOptions,
    ) -> Result<RgbImage, CameraError> {
        use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

        let view = self.top_view_homography(options)?;
        CameraError::ensure_at_least("rendering a top view", 1, view.width as usize)?;
        CameraError::ensure_at_least("rendering a top view", 1, view.height as usize)?;
        let h = view.homography / view.homography[(2, 2)];
        #[rustfmt::skip]
        let matrix = [
            h[(0, 0)] as f32, h[(0, 1)] as f32, h[(0, 2)] as f32,
            h[(1, 0)] as f32, h[(1, 1)] as f32, h[(1, 2)] as f32,
            h[(2, 0)] as f32, h[(2, 1)] as f32, h[(2, 2)] as f32,
        ];
        let projection =
            Projection::from_matrix(matrix).ok_or(CameraError::Singular("the top view homography"))?;
        let mut out = RgbImage::new(view.width, view.height);
        warp_into(
            image,
            &projection,
            Interpolation::Bilinear,
            image::Rgb(options.border),
            &mut out,
        );
        Ok(image::imageops::rotate180(&out))
    }
}
