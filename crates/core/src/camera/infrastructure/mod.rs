#[cfg(feature = "camera")]
pub mod ffmpeg_camera_source;
pub mod still_image_source;
