/// YOLO-pose face feature detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference, NMS and conversion of the five
/// face keypoints (eyes, nose, mouth corners) into [`FaceFeatures`].
use std::path::Path;

use crate::detection::domain::face_features::FaceFeatures;
use crate::detection::domain::feature_detector::{DetectionSettings, FeatureDetector};
use crate::shared::frame::Frame;
use crate::shared::geometry::{Point, Rect};

use super::detector_factory::preferred_execution_providers;
use super::math::nms;

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for face detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.35;

const NMS_IOU_THRESH: f64 = 0.45;

/// 5 landmarks × (x, y, conf).
const NUM_KEYPOINT_VALUES: usize = 15;

/// Minimum keypoint confidence to treat a landmark as visible.
const KEYPOINT_CONF_THRESH: f64 = 0.5;

const KP_LEFT_EYE: usize = 0;
const KP_RIGHT_EYE: usize = 1;
const KP_LEFT_MOUTH: usize = 3;
const KP_RIGHT_MOUTH: usize = 4;

pub struct OnnxYoloFeatureDetector {
    session: ort::session::Session,
    settings: DetectionSettings,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloFeatureDetector {
    /// Load a YOLO-pose ONNX model.
    ///
    /// The input resolution is read from the model's input shape (NCHW),
    /// falling back to 640 when dynamic.
    pub fn new(
        model_path: &Path,
        settings: DetectionSettings,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        let confidence = settings.confidence.unwrap_or(DEFAULT_CONFIDENCE);
        log::info!("YOLO feature detector ready (input {input_size}, confidence {confidence})");

        Ok(Self {
            session,
            settings,
            confidence,
            input_size,
        })
    }
}

impl FeatureDetector for OnnxYoloFeatureDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceFeatures>, Box<dyn std::error::Error>> {
        if !self.settings.accepts(frame) {
            return Ok(Vec::new());
        }
        let fw = frame.width();
        let fh = frame.height();

        let (input_tensor, scale, pad_x, pad_y) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
        }

        // [1, features, detections] or [1, detections, features].
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        let mut raw_dets = Vec::new();
        for i in 0..num_dets {
            let row: Vec<f32> = if transposed {
                (0..num_feats).map(|f| data[f * num_dets + i]).collect()
            } else {
                data[i * num_feats..(i + 1) * num_feats].to_vec()
            };
            if let Some(det) = parse_row(&row, self.confidence, scale, pad_x, pad_y) {
                raw_dets.push(det);
            }
        }

        let kept = nms(&mut raw_dets, NMS_IOU_THRESH, |d| d.bbox, |d| d.confidence);
        Ok(kept.iter().map(|d| d.to_features(fw, fh)).collect())
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawDetection {
    /// Frame pixel coordinates `[x1, y1, x2, y2]`.
    bbox: [f64; 4],
    confidence: f64,
    /// Frame pixel coordinates; `None` when not visible.
    keypoints: [Option<(f64, f64)>; 5],
}

/// Parses one output row `[cx, cy, w, h, conf, kp0_x, kp0_y, kp0_conf, ...]`
/// in letterbox space into frame pixel space.
fn parse_row(row: &[f32], min_conf: f64, scale: f64, pad_x: u32, pad_y: u32) -> Option<RawDetection> {
    if row.len() < 5 {
        return None;
    }
    let conf = row[4] as f64;
    if conf < min_conf {
        return None;
    }

    let unpad = |x: f64, y: f64| ((x - pad_x as f64) / scale, (y - pad_y as f64) / scale);
    let (cx, cy, w, h) = (row[0] as f64, row[1] as f64, row[2] as f64, row[3] as f64);
    let (x1, y1) = unpad(cx - w / 2.0, cy - h / 2.0);
    let (x2, y2) = unpad(cx + w / 2.0, cy + h / 2.0);

    let mut keypoints = [None; 5];
    if row.len() >= 5 + NUM_KEYPOINT_VALUES {
        for (k, slot) in keypoints.iter_mut().enumerate() {
            let base = 5 + k * 3;
            if row[base + 2] as f64 >= KEYPOINT_CONF_THRESH {
                *slot = Some(unpad(row[base] as f64, row[base + 1] as f64));
            }
        }
    }

    Some(RawDetection {
        bbox: [x1, y1, x2, y2],
        confidence: conf,
        keypoints,
    })
}

impl RawDetection {
    fn to_features(&self, fw: u32, fh: u32) -> FaceFeatures {
        let norm = |(x, y): (f64, f64)| Point::new(x / fw as f64, y / fh as f64);
        let [x1, y1, x2, y2] = self.bbox;
        let bounds = Rect::from_pixel_corners(x1, y1, x2, y2, fw, fh);

        let mouth = match (self.keypoints[KP_LEFT_MOUTH], self.keypoints[KP_RIGHT_MOUTH]) {
            (Some(l), Some(r)) => Some(norm(l).midpoint(norm(r))),
            (Some(p), None) | (None, Some(p)) => Some(norm(p)),
            (None, None) => None,
        };

        FaceFeatures::new(
            bounds,
            self.keypoints[KP_LEFT_EYE].map(norm),
            self.keypoints[KP_RIGHT_EYE].map(norm),
            mouth,
            fw as f64 / fh.max(1) as f64,
        )
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Letterbox-resize a frame to `target_size` × `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Padding filled with 114/255 gray, YOLO convention.
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.data();
    let ch = frame.channels();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            let idx = (src_y * src_w + src_x) * ch;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[idx + c] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        // 200x100 → 640: scale 3.2, new 640x320, pad_y 160.
        let frame = Frame::rgb(vec![128u8; 200 * 100 * 3], 200, 100, 0);
        let (tensor, scale, pad_x, pad_y) = letterbox(&frame, 640);

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert!((scale - 3.2).abs() < 0.01);
        assert_eq!(pad_x, 0);
        assert_eq!(pad_y, 160);
    }

    #[test]
    fn test_letterbox_values_normalized() {
        let frame = Frame::rgb(vec![255u8; 100 * 50 * 3], 100, 50, 0);
        let (tensor, _, pad_x, pad_y) = letterbox(&frame, 640);

        let y = pad_y as usize + 1;
        let x = pad_x as usize + 1;
        assert!((tensor[[0, 0, y, x]] - 1.0).abs() < 0.01);
        assert!((tensor[[0, 0, 0, 0]] - 114.0 / 255.0).abs() < 0.01);
    }

    fn row_with_keypoints(conf: f32, kp_conf: f32) -> Vec<f32> {
        // Box centred at (100, 100), 80x100; letterbox identity (scale 1, no pad).
        let mut row = vec![100.0, 100.0, 80.0, 100.0, conf];
        let kps = [(80.0, 90.0), (120.0, 90.0), (100.0, 110.0), (85.0, 130.0), (115.0, 130.0)];
        for (x, y) in kps {
            row.extend_from_slice(&[x, y, kp_conf]);
        }
        row
    }

    #[test]
    fn test_parse_row_below_confidence_is_dropped() {
        assert!(parse_row(&row_with_keypoints(0.1, 0.9), 0.35, 1.0, 0, 0).is_none());
    }

    #[test]
    fn test_parse_row_short_row_is_dropped() {
        assert!(parse_row(&[1.0, 2.0, 3.0], 0.0, 1.0, 0, 0).is_none());
    }

    #[test]
    fn test_to_features_normalizes_landmarks() {
        let det = parse_row(&row_with_keypoints(0.9, 0.9), 0.35, 1.0, 0, 0).unwrap();
        let f = det.to_features(200, 200);

        assert_relative_eq!(f.bounds.x, 0.3, epsilon = 1e-9);
        assert_relative_eq!(f.bounds.y, 0.25, epsilon = 1e-9);
        assert_relative_eq!(f.bounds.width, 0.4, epsilon = 1e-9);
        assert_relative_eq!(f.bounds.height, 0.5, epsilon = 1e-9);
        assert_relative_eq!(f.left_eye.unwrap().x, 0.4, epsilon = 1e-9);
        assert_relative_eq!(f.right_eye.unwrap().x, 0.6, epsilon = 1e-9);
        let mouth = f.mouth.unwrap();
        assert_relative_eq!(mouth.x, 0.5, epsilon = 1e-9);
        assert_relative_eq!(mouth.y, 0.65, epsilon = 1e-9);
        assert_relative_eq!(f.roll, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invisible_keypoints_become_none() {
        let det = parse_row(&row_with_keypoints(0.9, 0.1), 0.35, 1.0, 0, 0).unwrap();
        let f = det.to_features(200, 200);
        assert!(f.left_eye.is_none());
        assert!(f.right_eye.is_none());
        assert!(f.mouth.is_none());
    }

    #[test]
    fn test_parse_row_removes_letterbox_padding() {
        let det = parse_row(&row_with_keypoints(0.9, 0.9), 0.35, 2.0, 0, 20).unwrap();
        // x1 = (60 - 0) / 2 = 30, y1 = (50 - 20) / 2 = 15
        assert_relative_eq!(det.bbox[0], 30.0, epsilon = 1e-9);
        assert_relative_eq!(det.bbox[1], 15.0, epsilon = 1e-9);
        let (ex, ey) = det.keypoints[KP_LEFT_EYE].unwrap();
        assert_relative_eq!(ex, 40.0, epsilon = 1e-9);
        assert_relative_eq!(ey, 35.0, epsilon = 1e-9);
    }
}
