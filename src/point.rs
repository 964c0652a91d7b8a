use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use nalgebra::{Point2, Vector2};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Allows the retrieval of the pixel position an annotation refers to.
///
/// Every transform that consumes image coordinates accepts anything implementing
/// this trait, so annotations coming from other tools only need to expose their
/// `x`/`y` position.
pub trait ImagePoint {
    /// Retrieves the point on the image in pixel coordinates.
    fn image_point(&self) -> Point2<f64>;
}

/// A point on an image frame in pixel coordinates.
///
/// The X axis points right and the Y axis points down, with the origin in the
/// top left corner of the image.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct KeyPoint(pub Point2<f64>);

impl KeyPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self(Point2::new(x, y))
    }
}

impl ImagePoint for KeyPoint {
    fn image_point(&self) -> Point2<f64> {
        self.0
    }
}

impl ImagePoint for Point2<f64> {
    fn image_point(&self) -> Point2<f64> {
        *self
    }
}

impl ImagePoint for Vector2<f64> {
    fn image_point(&self) -> Point2<f64> {
        Point2::from(*self)
    }
}

impl ImagePoint for [f64; 2] {
    fn image_point(&self) -> Point2<f64> {
        Point2::new(self[0], self[1])
    }
}

impl ImagePoint for (f64, f64) {
    fn image_point(&self) -> Point2<f64> {
        Point2::new(self.0, self.1)
    }
}

impl<P: ImagePoint> ImagePoint for &P {
    fn image_point(&self) -> Point2<f64> {
        (**self).image_point()
    }
}

/// Allows the retrieval of the two pixel endpoints of a line annotation.
pub trait ImageSegment {
    /// Retrieves both endpoints in pixel coordinates.
    fn endpoints(&self) -> (Point2<f64>, Point2<f64>);
}

/// A line drawn on the image, for instance a marker spanning an object from
/// its foot to its head or the two ends of an object of known length.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct LineSegment {
    pub start: Point2<f64>,
    pub end: Point2<f64>,
}

impl LineSegment {
    pub fn new(start: impl ImagePoint, end: impl ImagePoint) -> Self {
        Self {
            start: start.image_point(),
            end: end.image_point(),
        }
    }

    /// Splits a vertical marker into a foot point (the endpoint lower in the image)
    /// and a head point, both placed at the mean column of the two endpoints.
    pub fn foot_and_head(&self) -> (Point2<f64>, Point2<f64>) {
        let x = 0.5 * (self.start.x + self.end.x);
        let foot = self.start.y.max(self.end.y);
        let head = self.start.y.min(self.end.y);
        (Point2::new(x, foot), Point2::new(x, head))
    }
}

impl ImageSegment for LineSegment {
    fn endpoints(&self) -> (Point2<f64>, Point2<f64>) {
        (self.start, self.end)
    }
}

impl<A: ImagePoint, B: ImagePoint> ImageSegment for (A, B) {
    fn endpoints(&self) -> (Point2<f64>, Point2<f64>) {
        (self.0.image_point(), self.1.image_point())
    }
}

impl<S: ImageSegment> ImageSegment for &S {
    fn endpoints(&self) -> (Point2<f64>, Point2<f64>) {
        (**self).endpoints()
    }
}

/// Normalizes any collection of image annotations into plain pixel points.
pub fn collect_image_points<P: ImagePoint>(points: impl IntoIterator<Item = P>) -> Vec<Point2<f64>> {
    points.into_iter().map(|p| p.image_point()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_annotations_normalize() {
        let a = collect_image_points([[1.0, 2.0], [3.0, 4.0]]);
        let b = collect_image_points(vec![(1.0, 2.0), (3.0, 4.0)]);
        let c = collect_image_points([KeyPoint::new(1.0, 2.0), KeyPoint::new(3.0, 4.0)]);
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn foot_is_lower_endpoint() {
        let marker = LineSegment::new([100.0, 420.0], [104.0, 380.0]);
        let (foot, head) = marker.foot_and_head();
        assert_eq!(foot, Point2::new(102.0, 420.0));
        assert_eq!(head, Point2::new(102.0, 380.0));

        let flipped = LineSegment::new([104.0, 380.0], [100.0, 420.0]);
        assert_eq!(flipped.foot_and_head(), (foot, head));
    }
}
