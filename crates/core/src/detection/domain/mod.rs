pub mod face_features;
pub mod feature_detector;
