use crate::detection::domain::face_features::FaceFeatures;

/// Where one overlay instance lands on a frame, in pixels.
///
/// The overlay's centre sits at `(center_x, center_y)`, it is scaled to
/// `width` × `height` and rotated clockwise by `rotation` radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayPlacement {
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
}

impl OverlayPlacement {
    /// Anchors the overlay on a face.
    ///
    /// With both eyes: centred on the eye midpoint, `eye_span_scale` times the
    /// inter-eye distance wide, rotated by the face roll. Otherwise centred on
    /// the bounding box and as wide as it, unrotated. Height follows the
    /// asset's aspect ratio. Returns `None` when nothing drawable remains.
    pub fn for_face(
        face: &FaceFeatures,
        frame_width: u32,
        frame_height: u32,
        asset_width: u32,
        asset_height: u32,
        eye_span_scale: f64,
    ) -> Option<Self> {
        if asset_width == 0 || asset_height == 0 {
            return None;
        }
        let aspect = asset_height as f64 / asset_width as f64;

        if let Some((left, right)) = face.eyes() {
            let (lx, ly) = left.to_pixels(frame_width, frame_height);
            let (rx, ry) = right.to_pixels(frame_width, frame_height);
            let span = (rx - lx).hypot(ry - ly);
            if span > 0.0 && eye_span_scale > 0.0 {
                let width = span * eye_span_scale;
                return Some(Self {
                    center_x: (lx + rx) / 2.0,
                    center_y: (ly + ry) / 2.0,
                    width,
                    height: width * aspect,
                    rotation: face.roll,
                });
            }
        }

        if face.bounds.is_empty() {
            return None;
        }
        let (cx, cy) = face.bounds.center().to_pixels(frame_width, frame_height);
        let width = face.bounds.width * frame_width as f64;
        Some(Self {
            center_x: cx,
            center_y: cy,
            width,
            height: width * aspect,
            rotation: 0.0,
        })
    }

    /// Axis-aligned pixel extent `(x0, y0, x1, y1)` of the rotated overlay,
    /// clipped to the frame. Exclusive upper bounds; `None` if off-frame.
    pub fn pixel_bounds(&self, frame_width: u32, frame_height: u32) -> Option<(u32, u32, u32, u32)> {
        let (sin, cos) = self.rotation.sin_cos();
        let hw = self.width / 2.0;
        let hh = self.height / 2.0;
        let ext_x = (hw * cos).abs() + (hh * sin).abs();
        let ext_y = (hw * sin).abs() + (hh * cos).abs();

        // Absorb sin/cos rounding so exact edges don't spill a pixel.
        const EPS: f64 = 1e-9;
        let x0 = (self.center_x - ext_x + EPS).floor().max(0.0);
        let y0 = (self.center_y - ext_y + EPS).floor().max(0.0);
        let x1 = (self.center_x + ext_x - EPS).ceil().min(frame_width as f64);
        let y1 = (self.center_y + ext_y - EPS).ceil().min(frame_height as f64);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }

    /// Maps a frame point into overlay-local unit coordinates, where the
    /// overlay covers `[0, 1) × [0, 1)`.
    pub fn to_local(&self, x: f64, y: f64) -> (f64, f64) {
        let (sin, cos) = self.rotation.sin_cos();
        let dx = x - self.center_x;
        let dy = y - self.center_y;
        let u = dx * cos + dy * sin;
        let v = -dx * sin + dy * cos;
        (u / self.width + 0.5, v / self.height + 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::geometry::{Point, Rect};
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn face_with_eyes(l: (f64, f64), r: (f64, f64)) -> FaceFeatures {
        FaceFeatures::new(
            Rect::new(0.2, 0.2, 0.4, 0.5),
            Some(Point::new(l.0, l.1)),
            Some(Point::new(r.0, r.1)),
            None,
            1.0,
        )
    }

    #[test]
    fn test_anchors_on_eye_midpoint() {
        let face = face_with_eyes((0.3, 0.4), (0.5, 0.4));
        let p = OverlayPlacement::for_face(&face, 200, 200, 100, 50, 2.5).unwrap();

        assert_relative_eq!(p.center_x / 200.0, 0.4, epsilon = 1e-9);
        assert_relative_eq!(p.center_y / 200.0, 0.4, epsilon = 1e-9);
        // Inter-eye distance 0.2 × 200 px = 40 px.
        assert_relative_eq!(p.width, 100.0, epsilon = 1e-9);
        assert_relative_eq!(p.height, 50.0, epsilon = 1e-9);
        assert_relative_eq!(p.rotation, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_width_scales_with_eye_distance() {
        let near = face_with_eyes((0.3, 0.4), (0.5, 0.4));
        let far = face_with_eyes((0.35, 0.4), (0.45, 0.4));
        let a = OverlayPlacement::for_face(&near, 200, 200, 10, 10, 2.5).unwrap();
        let b = OverlayPlacement::for_face(&far, 200, 200, 10, 10, 2.5).unwrap();
        assert_relative_eq!(a.width / b.width, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_eye_falls_back_to_bounds() {
        let face = FaceFeatures::new(
            Rect::new(0.2, 0.2, 0.4, 0.5),
            Some(Point::new(0.3, 0.4)),
            None,
            None,
            1.0,
        );
        let p = OverlayPlacement::for_face(&face, 100, 100, 20, 10, 2.5).unwrap();
        assert_relative_eq!(p.center_x, 40.0, epsilon = 1e-9);
        assert_relative_eq!(p.center_y, 45.0, epsilon = 1e-9);
        assert_relative_eq!(p.width, 40.0, epsilon = 1e-9);
        assert_relative_eq!(p.height, 20.0, epsilon = 1e-9);
        assert_relative_eq!(p.rotation, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_bounds_without_eyes_is_not_drawable() {
        let face = FaceFeatures::from_bounds(Rect::new(0.5, 0.5, 0.0, 0.0));
        assert!(OverlayPlacement::for_face(&face, 100, 100, 10, 10, 2.5).is_none());
    }

    #[test]
    fn test_pixel_bounds_grow_with_rotation() {
        let mut p = OverlayPlacement {
            center_x: 50.0,
            center_y: 50.0,
            width: 40.0,
            height: 10.0,
            rotation: 0.0,
        };
        assert_eq!(p.pixel_bounds(100, 100), Some((30, 45, 70, 55)));
        p.rotation = FRAC_PI_2;
        assert_eq!(p.pixel_bounds(100, 100), Some((45, 30, 55, 70)));
    }

    #[test]
    fn test_pixel_bounds_off_frame() {
        let p = OverlayPlacement {
            center_x: -50.0,
            center_y: 10.0,
            width: 20.0,
            height: 20.0,
            rotation: 0.0,
        };
        assert!(p.pixel_bounds(100, 100).is_none());
    }

    #[test]
    fn test_to_local_centre_and_corners() {
        let p = OverlayPlacement {
            center_x: 50.0,
            center_y: 50.0,
            width: 40.0,
            height: 20.0,
            rotation: 0.0,
        };
        let (u, v) = p.to_local(50.0, 50.0);
        assert_relative_eq!(u, 0.5, epsilon = 1e-9);
        assert_relative_eq!(v, 0.5, epsilon = 1e-9);
        let (u, v) = p.to_local(30.0, 40.0);
        assert_relative_eq!(u, 0.0, epsilon = 1e-9);
        assert_relative_eq!(v, 0.0, epsilon = 1e-9);
    }
}
