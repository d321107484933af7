//! Normalized image-space geometry.
//!
//! Coordinates are fractions of frame width/height: origin top-left,
//! x to the right, y downward, `0.0..=1.0` inside the frame.

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    /// Converts to pixel coordinates for a `width` × `height` frame.
    pub fn to_pixels(self, width: u32, height: u32) -> (f64, f64) {
        (self.x * width as f64, self.y * height as f64)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const FULL: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a normalized rect from pixel corners, clamped to the frame.
    pub fn from_pixel_corners(x1: f64, y1: f64, x2: f64, y2: f64, fw: u32, fh: u32) -> Self {
        let (fw, fh) = (fw.max(1) as f64, fh.max(1) as f64);
        let nx1 = (x1 / fw).clamp(0.0, 1.0);
        let ny1 = (y1 / fh).clamp(0.0, 1.0);
        let nx2 = (x2 / fw).clamp(0.0, 1.0);
        let ny2 = (y2 / fh).clamp(0.0, 1.0);
        Rect::new(nx1, ny1, (nx2 - nx1).max(0.0), (ny2 - ny1).max(0.0))
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_midpoint() {
        let m = Point::new(0.3, 0.4).midpoint(Point::new(0.5, 0.4));
        assert_relative_eq!(m.x, 0.4, epsilon = 1e-9);
        assert_relative_eq!(m.y, 0.4, epsilon = 1e-9);
    }

    #[test]
    fn test_to_pixels() {
        let (x, y) = Point::new(0.25, 0.5).to_pixels(200, 100);
        assert_relative_eq!(x, 50.0, epsilon = 1e-9);
        assert_relative_eq!(y, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_from_pixel_corners_clamps() {
        let r = Rect::from_pixel_corners(-10.0, 20.0, 110.0, 60.0, 100, 100);
        assert_relative_eq!(r.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(r.y, 0.2, epsilon = 1e-9);
        assert_relative_eq!(r.width, 1.0, epsilon = 1e-9);
        assert_relative_eq!(r.height, 0.4, epsilon = 1e-9);
    }

    #[test]
    fn test_center_and_empty() {
        assert_eq!(Rect::FULL.center(), Point::new(0.5, 0.5));
        assert!(Rect::new(0.1, 0.1, 0.0, 0.2).is_empty());
        assert!(!Rect::FULL.is_empty());
    }
}
