pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const BLAZEFACE_MODEL_NAME: &str = "blazeface_short_range.onnx";

/// Application directory name used under platform cache/config dirs.
pub const APP_DIR_NAME: &str = "MemeCam";

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

/// Overlay width as a multiple of the inter-eye distance.
pub const DEFAULT_EYE_SPAN_SCALE: f64 = 2.5;

/// Digital zoom ceiling used when a source does not report its own.
pub const DEFAULT_MAX_ZOOM: f64 = 4.0;

/// Frames smaller than this (either side, in pixels) are not run through detection.
pub const MIN_DETECTION_SIDE: u32 = 32;

/// Mean luma below which `FlashMode::Auto` fires.
pub const AUTO_FLASH_LUMA_THRESHOLD: f64 = 60.0;
