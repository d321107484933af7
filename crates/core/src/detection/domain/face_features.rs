//! Per-face landmark record produced by a [`FeatureDetector`] for one frame.
//!
//! [`FeatureDetector`]: super::feature_detector::FeatureDetector

use crate::shared::geometry::{Point, Rect};

/// One detected face. All positions are normalized (see [`crate::shared::geometry`]).
///
/// `left_eye` is the eye with the smaller x in image space, regardless of
/// whether the frame is mirrored.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceFeatures {
    pub bounds: Rect,
    pub left_eye: Option<Point>,
    pub right_eye: Option<Point>,
    pub mouth: Option<Point>,
    /// In-plane rotation in radians (positive = clockwise on screen), measured
    /// in pixel space. Zero when either eye is missing.
    pub roll: f64,
}

impl FaceFeatures {
    /// Builds a record, deriving `roll` from the eye positions.
    ///
    /// `aspect` is frame width / height, needed because normalized x and y
    /// units differ in pixel length.
    pub fn new(
        bounds: Rect,
        left_eye: Option<Point>,
        right_eye: Option<Point>,
        mouth: Option<Point>,
        aspect: f64,
    ) -> Self {
        let (left_eye, right_eye) = match (left_eye, right_eye) {
            (Some(a), Some(b)) if a.x > b.x => (Some(b), Some(a)),
            other => other,
        };
        let roll = match (left_eye, right_eye) {
            (Some(l), Some(r)) => roll_between(l, r, aspect),
            _ => 0.0,
        };
        Self {
            bounds,
            left_eye,
            right_eye,
            mouth,
            roll,
        }
    }

    /// A face with only a bounding box.
    pub fn from_bounds(bounds: Rect) -> Self {
        Self {
            bounds,
            left_eye: None,
            right_eye: None,
            mouth: None,
            roll: 0.0,
        }
    }

    /// Both eye positions, when the detector reported them.
    pub fn eyes(&self) -> Option<(Point, Point)> {
        self.left_eye.zip(self.right_eye)
    }
}

fn roll_between(left: Point, right: Point, aspect: f64) -> f64 {
    let dx = (right.x - left.x) * aspect;
    let dy = right.y - left.y;
    if dx == 0.0 && dy == 0.0 {
        return 0.0;
    }
    dy.atan2(dx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_4;

    fn bounds() -> Rect {
        Rect::new(0.2, 0.2, 0.4, 0.5)
    }

    #[test]
    fn test_level_eyes_have_zero_roll() {
        let f = FaceFeatures::new(
            bounds(),
            Some(Point::new(0.3, 0.4)),
            Some(Point::new(0.5, 0.4)),
            None,
            1.0,
        );
        assert_relative_eq!(f.roll, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_roll_accounts_for_aspect() {
        // dx = 0.1 normalized on a 2:1 frame is the same pixel length as dy = 0.2.
        let f = FaceFeatures::new(
            bounds(),
            Some(Point::new(0.3, 0.3)),
            Some(Point::new(0.4, 0.5)),
            None,
            2.0,
        );
        assert_relative_eq!(f.roll, FRAC_PI_4, epsilon = 1e-9);
    }

    #[test]
    fn test_eyes_are_ordered_by_x() {
        let f = FaceFeatures::new(
            bounds(),
            Some(Point::new(0.6, 0.4)),
            Some(Point::new(0.4, 0.4)),
            None,
            1.0,
        );
        assert_relative_eq!(f.left_eye.unwrap().x, 0.4, epsilon = 1e-9);
        assert_relative_eq!(f.right_eye.unwrap().x, 0.6, epsilon = 1e-9);
        assert_relative_eq!(f.roll, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_single_eye_has_no_roll() {
        let f = FaceFeatures::new(bounds(), Some(Point::new(0.3, 0.2)), None, None, 1.0);
        assert_relative_eq!(f.roll, 0.0, epsilon = 1e-9);
        assert!(f.eyes().is_none());
    }

    #[test]
    fn test_coincident_eyes_have_zero_roll() {
        let p = Point::new(0.5, 0.5);
        let f = FaceFeatures::new(bounds(), Some(p), Some(p), None, 1.0);
        assert_relative_eq!(f.roll, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_from_bounds_has_no_landmarks() {
        let f = FaceFeatures::from_bounds(Rect::FULL);
        assert!(f.eyes().is_none());
        assert!(f.mouth.is_none());
    }
}
