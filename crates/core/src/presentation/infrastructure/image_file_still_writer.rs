use std::path::Path;

use image::DynamicImage;

use crate::presentation::domain::still_image::StillImage;
use crate::presentation::domain::still_writer::StillWriter;
use crate::shared::frame::{Frame, PixelFormat};

/// Writes stills to image files using the `image` crate. The format follows
/// the path's extension.
pub struct ImageFileStillWriter;

impl ImageFileStillWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileStillWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl StillWriter for ImageFileStillWriter {
    fn write(&self, path: &Path, still: &StillImage) -> Result<(), Box<dyn std::error::Error>> {
        write_frame(path, &still.frame)?;
        log::info!(
            "Saved still to {} ({} face(s), flash {})",
            path.display(),
            still.face_count,
            if still.flash_fired { "fired" } else { "off" }
        );
        Ok(())
    }
}

/// Encodes a frame to `path`, creating parent directories as needed.
pub fn write_frame(path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let img = to_dynamic_image(frame)?;
    // JPEG has no alpha channel.
    let is_jpeg = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false);
    if is_jpeg && frame.format() == PixelFormat::Rgba32 {
        DynamicImage::ImageRgb8(img.to_rgb8()).save(path)?;
    } else {
        img.save(path)?;
    }
    Ok(())
}

fn to_dynamic_image(frame: &Frame) -> Result<DynamicImage, Box<dyn std::error::Error>> {
    let (w, h) = (frame.width(), frame.height());
    let data = frame.data().to_vec();
    let img = match frame.format() {
        PixelFormat::Rgb24 => image::RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
        PixelFormat::Rgba32 => image::RgbaImage::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
        PixelFormat::Gray8 => image::GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
    };
    img.ok_or_else(|| "Failed to create image from frame data".into())
}
