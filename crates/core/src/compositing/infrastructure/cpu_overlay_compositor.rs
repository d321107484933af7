use image::RgbaImage;

use crate::compositing::domain::overlay_compositor::OverlayCompositor;
use crate::compositing::domain::overlay_placement::OverlayPlacement;
use crate::detection::domain::face_features::FaceFeatures;
use crate::overlay::domain::overlay_asset::OverlayAsset;
use crate::shared::constants::DEFAULT_EYE_SPAN_SCALE;
use crate::shared::frame::{Frame, PixelFormat};

/// Outline thickness of debug face boxes, in pixels.
const FACE_BOX_THICKNESS: u32 = 2;

/// CPU compositor: inverse-maps every destination pixel covered by an
/// overlay placement back into the asset, samples it bilinearly and
/// alpha-blends over the frame.
pub struct CpuOverlayCompositor {
    eye_span_scale: f64,
    face_box_color: Option<[u8; 3]>,
}

impl CpuOverlayCompositor {
    pub fn new(eye_span_scale: f64) -> Self {
        Self {
            eye_span_scale,
            face_box_color: None,
        }
    }

    /// Also outline each face's bounding box in `color`.
    pub fn with_face_boxes(mut self, color: [u8; 3]) -> Self {
        self.face_box_color = Some(color);
        self
    }
}

impl Default for CpuOverlayCompositor {
    fn default() -> Self {
        Self::new(DEFAULT_EYE_SPAN_SCALE)
    }
}

impl OverlayCompositor for CpuOverlayCompositor {
    fn composite(
        &self,
        mut frame: Frame,
        faces: &[FaceFeatures],
        overlay: Option<&OverlayAsset>,
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        if faces.is_empty() {
            return Ok(frame);
        }
        frame.validate()?;
        let fw = frame.width();
        let fh = frame.height();
        let format = frame.format();

        if let Some(asset) = overlay {
            for face in faces {
                let Some(placement) = OverlayPlacement::for_face(
                    face,
                    fw,
                    fh,
                    asset.width(),
                    asset.height(),
                    self.eye_span_scale,
                ) else {
                    continue;
                };
                draw_overlay(frame.data_mut(), fw, fh, format, asset.image(), &placement);
            }
        }

        if let Some(color) = self.face_box_color {
            for face in faces {
                let b = face.bounds;
                let x0 = (b.x * fw as f64).round() as u32;
                let y0 = (b.y * fh as f64).round() as u32;
                let x1 = ((b.x + b.width) * fw as f64).round() as u32;
                let y1 = ((b.y + b.height) * fh as f64).round() as u32;
                draw_box(frame.data_mut(), fw, fh, format, (x0, y0, x1, y1), color);
            }
        }

        Ok(frame)
    }
}

// ---------------------------------------------------------------------------
// Blending
// ---------------------------------------------------------------------------

fn draw_overlay(
    data: &mut [u8],
    fw: u32,
    fh: u32,
    format: PixelFormat,
    asset: &RgbaImage,
    placement: &OverlayPlacement,
) {
    let Some((x0, y0, x1, y1)) = placement.pixel_bounds(fw, fh) else {
        return;
    };
    let ch = format.channels();

    for y in y0..y1 {
        for x in x0..x1 {
            let (u, v) = placement.to_local(x as f64 + 0.5, y as f64 + 0.5);
            if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                continue;
            }
            let [r, g, b, a] = sample_bilinear(asset, u, v);
            if a <= 0.0 {
                continue;
            }
            let idx = (y as usize * fw as usize + x as usize) * ch;
            blend_pixel(&mut data[idx..idx + ch], format, [r, g, b], a);
        }
    }
}

/// Samples at unit coordinates `(u, v)`. Colour is interpolated with alpha
/// weighting so transparent texels don't bleed their colour into edges.
/// Returns straight RGB in 0..=255 and alpha in 0..=1.
fn sample_bilinear(img: &RgbaImage, u: f64, v: f64) -> [f64; 4] {
    let (w, h) = img.dimensions();
    let ax = (u * w as f64 - 0.5).clamp(0.0, (w - 1) as f64);
    let ay = (v * h as f64 - 0.5).clamp(0.0, (h - 1) as f64);
    let x0 = ax.floor() as u32;
    let y0 = ay.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = ax - x0 as f64;
    let fy = ay - y0 as f64;

    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x1, y0, fx * (1.0 - fy)),
        (x0, y1, (1.0 - fx) * fy),
        (x1, y1, fx * fy),
    ];

    let mut rgb = [0.0f64; 3];
    let mut alpha = 0.0;
    for (tx, ty, weight) in taps {
        let p = img.get_pixel(tx, ty).0;
        let a = p[3] as f64 / 255.0 * weight;
        for c in 0..3 {
            rgb[c] += p[c] as f64 * a;
        }
        alpha += a;
    }
    if alpha <= 0.0 {
        return [0.0; 4];
    }
    [rgb[0] / alpha, rgb[1] / alpha, rgb[2] / alpha, alpha.min(1.0)]
}

fn blend_pixel(px: &mut [u8], format: PixelFormat, rgb: [f64; 3], alpha: f64) {
    let mix = |dst: u8, src: f64| (src * alpha + dst as f64 * (1.0 - alpha)).round() as u8;
    match format {
        PixelFormat::Rgb24 => {
            for c in 0..3 {
                px[c] = mix(px[c], rgb[c]);
            }
        }
        PixelFormat::Rgba32 => {
            for c in 0..3 {
                px[c] = mix(px[c], rgb[c]);
            }
            px[3] = mix(px[3], 255.0);
        }
        PixelFormat::Gray8 => {
            px[0] = mix(px[0], luma(rgb));
        }
    }
}

fn luma(rgb: [f64; 3]) -> f64 {
    0.299 * rgb[0] + 0.587 * rgb[1] + 0.114 * rgb[2]
}

// ---------------------------------------------------------------------------
// Debug face boxes
// ---------------------------------------------------------------------------

fn draw_box(
    data: &mut [u8],
    fw: u32,
    fh: u32,
    format: PixelFormat,
    (x0, y0, x1, y1): (u32, u32, u32, u32),
    color: [u8; 3],
) {
    let x1 = x1.min(fw);
    let y1 = y1.min(fh);
    if x0 >= x1 || y0 >= y1 {
        return;
    }
    let ch = format.channels();
    let t = FACE_BOX_THICKNESS;
    let color_f = [color[0] as f64, color[1] as f64, color[2] as f64];

    for y in y0..y1 {
        for x in x0..x1 {
            let on_edge = x < x0 + t || x + t >= x1 || y < y0 + t || y + t >= y1;
            if on_edge {
                let idx = (y as usize * fw as usize + x as usize) * ch;
                blend_pixel(&mut data[idx..idx + ch], format, color_f, 1.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::FrameInfo;
    use crate::shared::geometry::{Point, Rect};
    use image::Rgba;
    use rstest::rstest;

    // ── Helpers ──

    fn frame(w: u32, h: u32, format: PixelFormat, value: u8) -> Frame {
        let data = vec![value; (w * h) as usize * format.channels()];
        Frame::new(data, w, h, format, FrameInfo::default())
    }

    fn solid(w: u32, h: u32, color: [u8; 4]) -> OverlayAsset {
        OverlayAsset::new("solid", RgbaImage::from_pixel(w, h, Rgba(color)))
    }

    fn eyes_face(l: (f64, f64), r: (f64, f64)) -> FaceFeatures {
        FaceFeatures::new(
            Rect::new(l.0 - 0.05, l.1 - 0.1, r.0 - l.0 + 0.1, 0.3),
            Some(Point::new(l.0, l.1)),
            Some(Point::new(r.0, r.1)),
            None,
            1.0,
        )
    }

    fn rgb_at(f: &Frame, x: u32, y: u32) -> [u8; 3] {
        let i = ((y * f.width() + x) as usize) * f.channels();
        [f.data()[i], f.data()[i + 1], f.data()[i + 2]]
    }

    // ── Identity ──

    #[test]
    fn test_mis_sized_frame_is_rejected() {
        let short = Frame::new(vec![0; 10], 4, 4, PixelFormat::Rgb24, FrameInfo::default());
        let overlay = solid(2, 2, [255, 0, 0, 255]);
        let result = CpuOverlayCompositor::default().composite(
            short,
            &[eyes_face((0.4, 0.5), (0.6, 0.5))],
            Some(&overlay),
        );
        assert!(result.is_err());
    }

    #[rstest]
    #[case(PixelFormat::Rgb24)]
    #[case(PixelFormat::Rgba32)]
    #[case(PixelFormat::Gray8)]
    fn test_no_faces_is_identity(#[case] format: PixelFormat) {
        let input = frame(40, 30, format, 77);
        let overlay = solid(10, 10, [255, 0, 0, 255]);
        let out = CpuOverlayCompositor::default()
            .composite(input.clone(), &[], Some(&overlay))
            .unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_no_overlay_is_identity() {
        let input = frame(100, 100, PixelFormat::Rgb24, 10);
        let faces = [eyes_face((0.3, 0.4), (0.5, 0.4))];
        let out = CpuOverlayCompositor::default()
            .composite(input.clone(), &faces, None)
            .unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_fully_transparent_overlay_changes_nothing() {
        let input = frame(100, 100, PixelFormat::Rgb24, 10);
        let faces = [eyes_face((0.3, 0.4), (0.5, 0.4))];
        let overlay = solid(10, 10, [255, 255, 255, 0]);
        let out = CpuOverlayCompositor::default()
            .composite(input.clone(), &faces, Some(&overlay))
            .unwrap();
        assert_eq!(out, input);
    }

    // ── Placement ──

    #[test]
    fn test_overlay_centred_between_eyes_and_scaled_to_eye_distance() {
        let faces = [eyes_face((0.3, 0.4), (0.5, 0.4))];
        let overlay = solid(100, 50, [255, 255, 255, 255]);
        let out = CpuOverlayCompositor::default()
            .composite(frame(200, 200, PixelFormat::Rgb24, 0), &faces, Some(&overlay))
            .unwrap();

        // Width 2.5 × 40 px = 100 px, height 50 px, centred at (80, 80).
        let (mut sx, mut sy, mut n) = (0.0, 0.0, 0.0);
        let (mut min_x, mut max_x) = (u32::MAX, 0);
        for y in 0..200 {
            for x in 0..200 {
                if rgb_at(&out, x, y) == [255, 255, 255] {
                    sx += x as f64 + 0.5;
                    sy += y as f64 + 0.5;
                    n += 1.0;
                    min_x = min_x.min(x);
                    max_x = max_x.max(x);
                }
            }
        }
        assert!(n > 0.0);
        assert!((sx / n / 200.0 - 0.4).abs() < 0.01);
        assert!((sy / n / 200.0 - 0.4).abs() < 0.01);
        assert_eq!((min_x, max_x), (30, 129));
        assert_eq!(n, 100.0 * 50.0);
    }

    #[test]
    fn test_rotated_face_rotates_overlay() {
        // Eyes stacked vertically: roll = 90°, so a wide overlay turns tall.
        let face = FaceFeatures::new(
            Rect::new(0.3, 0.3, 0.4, 0.4),
            Some(Point::new(0.5, 0.4)),
            Some(Point::new(0.5, 0.6)),
            None,
            1.0,
        );
        let overlay = solid(40, 10, [255, 255, 255, 255]);
        let out = CpuOverlayCompositor::new(1.0)
            .composite(frame(100, 100, PixelFormat::Rgb24, 0), &[face], Some(&overlay))
            .unwrap();

        // 20 px long along the eye axis, 5 px across.
        assert_eq!(rgb_at(&out, 50, 41), [255, 255, 255]);
        assert_eq!(rgb_at(&out, 50, 58), [255, 255, 255]);
        assert_eq!(rgb_at(&out, 43, 50), [0, 0, 0]);
        assert_eq!(rgb_at(&out, 56, 50), [0, 0, 0]);
    }

    #[test]
    fn test_two_faces_get_separate_overlays() {
        let faces = [
            eyes_face((0.2, 0.3), (0.3, 0.3)),
            eyes_face((0.7, 0.7), (0.8, 0.7)),
        ];
        let overlay = solid(10, 10, [0, 255, 0, 255]);
        let out = CpuOverlayCompositor::default()
            .composite(frame(100, 100, PixelFormat::Rgb24, 0), &faces, Some(&overlay))
            .unwrap();

        assert_eq!(rgb_at(&out, 25, 30), [0, 255, 0]);
        assert_eq!(rgb_at(&out, 75, 70), [0, 255, 0]);
        assert_eq!(rgb_at(&out, 50, 50), [0, 0, 0]);
    }

    #[test]
    fn test_later_faces_draw_on_top() {
        // Left half red, right half blue.
        let mut img = RgbaImage::new(40, 20);
        for (x, _, p) in img.enumerate_pixels_mut() {
            *p = if x < 20 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            };
        }
        let overlay = OverlayAsset::new("split", img);
        // Box-only faces, 40 px wide, overlapping by 20 px.
        let a = FaceFeatures::from_bounds(Rect::new(0.2, 0.4, 0.2, 0.2));
        let b = FaceFeatures::from_bounds(Rect::new(0.3, 0.4, 0.2, 0.2));
        let compositor = CpuOverlayCompositor::default();

        let ab = compositor
            .composite(frame(200, 100, PixelFormat::Rgb24, 0), &[a.clone(), b.clone()], Some(&overlay))
            .unwrap();
        assert_eq!(rgb_at(&ab, 70, 50), [255, 0, 0]);

        let ba = compositor
            .composite(frame(200, 100, PixelFormat::Rgb24, 0), &[b, a], Some(&overlay))
            .unwrap();
        assert_eq!(rgb_at(&ba, 70, 50), [0, 0, 255]);
    }

    // ── Blending ──

    #[test]
    fn test_half_alpha_blends() {
        let faces = [FaceFeatures::from_bounds(Rect::FULL)];
        let overlay = solid(4, 4, [200, 200, 200, 128]);
        let out = CpuOverlayCompositor::default()
            .composite(frame(20, 20, PixelFormat::Rgb24, 0), &faces, Some(&overlay))
            .unwrap();
        let [r, _, _] = rgb_at(&out, 10, 10);
        assert!((r as i32 - 100).abs() <= 1, "got {r}");
    }

    #[test]
    fn test_gray_frame_receives_luma() {
        let faces = [FaceFeatures::from_bounds(Rect::FULL)];
        let overlay = solid(4, 4, [255, 0, 0, 255]);
        let out = CpuOverlayCompositor::default()
            .composite(frame(20, 20, PixelFormat::Gray8, 0), &faces, Some(&overlay))
            .unwrap();
        assert_eq!(out.data()[10 * 20 + 10], 76);
    }

    #[test]
    fn test_rgba_frame_alpha_becomes_opaque() {
        let faces = [FaceFeatures::from_bounds(Rect::FULL)];
        let overlay = solid(4, 4, [10, 20, 30, 255]);
        let out = CpuOverlayCompositor::default()
            .composite(frame(20, 20, PixelFormat::Rgba32, 0), &faces, Some(&overlay))
            .unwrap();
        let i = (10 * 20 + 10) * 4;
        assert_eq!(&out.data()[i..i + 4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_overlay_clipped_at_frame_edge() {
        let faces = [eyes_face((0.0, 0.5), (0.1, 0.5))];
        let overlay = solid(10, 10, [255, 255, 255, 255]);
        let out = CpuOverlayCompositor::default()
            .composite(frame(100, 100, PixelFormat::Rgb24, 0), &faces, Some(&overlay))
            .unwrap();
        assert_eq!(rgb_at(&out, 0, 50), [255, 255, 255]);
        assert_eq!(out.data().len(), 100 * 100 * 3);
    }

    // ── Face boxes ──

    #[test]
    fn test_face_boxes_outline_bounds() {
        let faces = [FaceFeatures::from_bounds(Rect::new(0.2, 0.2, 0.6, 0.6))];
        let out = CpuOverlayCompositor::default()
            .with_face_boxes([0, 255, 0])
            .composite(frame(100, 100, PixelFormat::Rgb24, 0), &faces, None)
            .unwrap();
        assert_eq!(rgb_at(&out, 20, 50), [0, 255, 0]);
        assert_eq!(rgb_at(&out, 79, 50), [0, 255, 0]);
        assert_eq!(rgb_at(&out, 50, 20), [0, 255, 0]);
        assert_eq!(rgb_at(&out, 50, 50), [0, 0, 0]);
        assert_eq!(rgb_at(&out, 10, 10), [0, 0, 0]);
    }
}
