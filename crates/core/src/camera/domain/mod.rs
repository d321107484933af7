pub mod camera_config;
pub mod frame_source;
