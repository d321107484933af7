use crate::detection::domain::face_features::FaceFeatures;
use crate::shared::constants::MIN_DETECTION_SIDE;
use crate::shared::frame::{Frame, PixelFormat};

/// Domain interface for face feature detection.
///
/// Must not alter the frame and must return the same faces for the same
/// frame under the same settings. Implementations hold inference sessions,
/// hence `&mut self`.
pub trait FeatureDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceFeatures>, Box<dyn std::error::Error>>;
}

/// Accuracy vs. latency trade-off.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DetectionAccuracy {
    /// Lightweight model, suited to live preview.
    #[default]
    Fast,
    /// Heavier model with full landmarks.
    Accurate,
}

impl std::str::FromStr for DetectionAccuracy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" | "low" => Ok(DetectionAccuracy::Fast),
            "accurate" | "high" => Ok(DetectionAccuracy::Accurate),
            other => Err(format!("unknown accuracy '{other}' (expected fast or accurate)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DetectionSettings {
    pub accuracy: DetectionAccuracy,
    /// Overrides the detector's default confidence threshold.
    pub confidence: Option<f64>,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            accuracy: DetectionAccuracy::default(),
            confidence: None,
            min_width: MIN_DETECTION_SIDE,
            min_height: MIN_DETECTION_SIDE,
        }
    }
}

impl DetectionSettings {
    /// Frames that are too small or not in a colour layout the detectors
    /// understand yield no faces rather than an error.
    pub fn accepts(&self, frame: &Frame) -> bool {
        frame.width() >= self.min_width
            && frame.height() >= self.min_height
            && matches!(frame.format(), PixelFormat::Rgb24 | PixelFormat::Rgba32)
    }
}
