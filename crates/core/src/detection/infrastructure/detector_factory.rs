use std::path::Path;

use crate::detection::domain::feature_detector::{
    DetectionAccuracy, DetectionSettings, FeatureDetector,
};
use crate::shared::constants::{BLAZEFACE_MODEL_NAME, YOLO_MODEL_NAME, YOLO_MODEL_URL};

use super::model_resolver;
use super::onnx_blazeface_detector::OnnxBlazefaceFeatureDetector;
use super::onnx_yolo_detector::OnnxYoloFeatureDetector;

/// Creates the detector matching `settings.accuracy`.
///
/// `Fast` uses the BlazeFace model from `model_path` or the model cache; it
/// is not downloaded. Without one, and for `Accurate`, the YOLO-pose model is
/// used, resolved from `model_path` or the model cache (downloading on first
/// use).
pub fn create_detector(
    settings: DetectionSettings,
    model_path: Option<&Path>,
) -> Result<Box<dyn FeatureDetector>, Box<dyn std::error::Error>> {
    let cached_blazeface = match (settings.accuracy, model_path) {
        (DetectionAccuracy::Fast, None) => model_resolver::model_cache_dir()
            .ok()
            .map(|dir| dir.join(BLAZEFACE_MODEL_NAME))
            .filter(|path| path.is_file()),
        _ => None,
    };
    let model_path = model_path.or(cached_blazeface.as_deref());

    match (settings.accuracy, model_path) {
        (DetectionAccuracy::Fast, Some(path)) => {
            log::info!("Using BlazeFace detector ({})", path.display());
            Ok(Box::new(OnnxBlazefaceFeatureDetector::new(path, settings)?))
        }
        (accuracy, path) => {
            if accuracy == DetectionAccuracy::Fast {
                log::warn!("No BlazeFace model given, falling back to YOLO");
            }
            let path = match path {
                Some(p) => p.to_path_buf(),
                None => model_resolver::resolve(YOLO_MODEL_NAME, YOLO_MODEL_URL, None, None)?,
            };
            log::info!("Using YOLO detector ({})", path.display());
            Ok(Box::new(OnnxYoloFeatureDetector::new(&path, settings)?))
        }
    }
}

/// Preferred ONNX execution providers for the current platform. ONNX Runtime
/// falls back to CPU when none of them can be registered.
pub(super) fn preferred_execution_providers(
) -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}
