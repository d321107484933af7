pub mod math;

#[cfg(feature = "onnx")]
pub mod detector_factory;
#[cfg(feature = "onnx")]
pub mod model_resolver;
#[cfg(feature = "onnx")]
pub mod onnx_blazeface_detector;
#[cfg(feature = "onnx")]
pub mod onnx_yolo_detector;
