use std::path::Path;

use super::still_image::StillImage;

/// Domain interface for persisting a captured still.
pub trait StillWriter {
    fn write(&self, path: &Path, still: &StillImage) -> Result<(), Box<dyn std::error::Error>>;
}
