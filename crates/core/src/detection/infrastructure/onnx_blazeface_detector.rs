/// BlazeFace face feature detector using ONNX Runtime via `ort`.
///
/// A lightweight detector for live preview. Besides the box, the regressor
/// carries six keypoints per anchor, of which the eyes and mouth centre are
/// used.
use std::path::Path;

use crate::detection::domain::face_features::FaceFeatures;
use crate::detection::domain::feature_detector::{DetectionSettings, FeatureDetector};
use crate::shared::frame::Frame;
use crate::shared::geometry::{Point, Rect};

use super::detector_factory::preferred_execution_providers;
use super::math::{nms, sigmoid};

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// Default confidence threshold.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

const NMS_IOU_THRESH: f64 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Regressor values per anchor: 4 box values + 6 keypoints × (x, y).
const REG_STRIDE: usize = 16;

const KP_EYE_A: usize = 0;
const KP_EYE_B: usize = 1;
const KP_MOUTH: usize = 3;

pub struct OnnxBlazefaceFeatureDetector {
    session: ort::session::Session,
    settings: DetectionSettings,
    confidence: f64,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceFeatureDetector {
    /// Load a BlazeFace ONNX model.
    pub fn new(
        model_path: &Path,
        settings: DetectionSettings,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;
        let confidence = settings.confidence.unwrap_or(DEFAULT_CONFIDENCE);
        log::info!("BlazeFace feature detector ready (confidence {confidence})");
        Ok(Self {
            session,
            settings,
            confidence,
            anchors: generate_anchors(),
        })
    }
}

impl FeatureDetector for OnnxBlazefaceFeatureDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceFeatures>, Box<dyn std::error::Error>> {
        if !self.settings.accepts(frame) {
            return Ok(Vec::new());
        }

        let input_tensor = preprocess(frame, INPUT_SIZE);
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // regressors: [1, 896, 16], classificators: [1, 896, 1]
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }
        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        let mut raw_dets = decode(reg_data, score_data, &self.anchors, self.confidence);
        let kept = nms(&mut raw_dets, NMS_IOU_THRESH, |d| d.bbox, |d| d.score);

        let aspect = frame.width() as f64 / frame.height().max(1) as f64;
        Ok(kept.iter().map(|d| d.to_features(aspect)).collect())
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawDet {
    /// Normalized `[x1, y1, x2, y2]`.
    bbox: [f64; 4],
    score: f64,
    /// Normalized keypoints.
    keypoints: [(f64, f64); 6],
}

impl RawDet {
    fn to_features(&self, aspect: f64) -> FaceFeatures {
        let [x1, y1, x2, y2] = self.bbox;
        let (x1, y1) = (x1.clamp(0.0, 1.0), y1.clamp(0.0, 1.0));
        let (x2, y2) = (x2.clamp(0.0, 1.0), y2.clamp(0.0, 1.0));
        let bounds = Rect::new(x1, y1, (x2 - x1).max(0.0), (y2 - y1).max(0.0));
        let kp = |k: usize| Point::new(self.keypoints[k].0, self.keypoints[k].1);
        FaceFeatures::new(
            bounds,
            Some(kp(KP_EYE_A)),
            Some(kp(KP_EYE_B)),
            Some(kp(KP_MOUTH)),
            aspect,
        )
    }
}

fn decode(reg_data: &[f32], score_data: &[f32], anchors: &[[f32; 2]], min_conf: f64) -> Vec<RawDet> {
    let scale = INPUT_SIZE as f32;
    let mut dets = Vec::new();
    let num_anchors = anchors.len().min(NUM_ANCHORS);

    for (i, &raw_score) in score_data.iter().enumerate().take(num_anchors) {
        let score = sigmoid(raw_score);
        if (score as f64) < min_conf {
            continue;
        }
        let off = i * REG_STRIDE;
        if off + REG_STRIDE > reg_data.len() {
            break;
        }
        let anchor = anchors[i];

        let cx = anchor[0] + reg_data[off] / scale;
        let cy = anchor[1] + reg_data[off + 1] / scale;
        let w = reg_data[off + 2] / scale;
        let h = reg_data[off + 3] / scale;

        let mut keypoints = [(0.0, 0.0); 6];
        for (k, kp) in keypoints.iter_mut().enumerate() {
            let kx = anchor[0] + reg_data[off + 4 + 2 * k] / scale;
            let ky = anchor[1] + reg_data[off + 4 + 2 * k + 1] / scale;
            *kp = (kx as f64, ky as f64);
        }

        dets.push(RawDet {
            bbox: [
                (cx - w / 2.0) as f64,
                (cy - h / 2.0) as f64,
                (cx + w / 2.0) as f64,
                (cy + h / 2.0) as f64,
            ],
            score: score as f64,
            keypoints,
        });
    }
    dets
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize frame to `size × size` and normalize to [0,1] NCHW float32.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.data();
    let ch = frame.channels();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            let idx = (src_y * src_w + src_x) * ch;
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[idx + c] as f32 / 255.0;
            }
        }
    }

    tensor
}

// ---------------------------------------------------------------------------
// Anchor generation (BlazeFace short-range)
// ---------------------------------------------------------------------------

/// Two feature maps, 16×16 and 8×8, with 2 and 6 anchors per cell.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}
