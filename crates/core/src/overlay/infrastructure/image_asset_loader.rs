use std::path::{Path, PathBuf};

use crate::overlay::domain::asset_loader::AssetLoader;
use crate::overlay::domain::overlay_asset::OverlayAsset;
use crate::shared::constants::IMAGE_EXTENSIONS;

/// Loads overlays from `<dir>/<name>.<ext>` using the `image` crate.
///
/// `name` may also carry its own extension.
pub struct ImageAssetLoader {
    dir: PathBuf,
}

impl ImageAssetLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Overlay names found in the directory, sorted, for when no explicit
    /// manifest is configured.
    pub fn discover(&self) -> Result<Vec<String>, Box<dyn std::error::Error>> {
        let mut names: Vec<String> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| has_image_extension(path))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn find(&self, name: &str) -> Option<PathBuf> {
        let direct = self.dir.join(name);
        if has_image_extension(&direct) && direct.is_file() {
            return Some(direct);
        }
        IMAGE_EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{name}.{ext}")))
            .find(|p| p.is_file())
    }
}

impl AssetLoader for ImageAssetLoader {
    fn load(&self, name: &str) -> Result<OverlayAsset, Box<dyn std::error::Error>> {
        let path = self
            .find(name)
            .ok_or_else(|| format!("no image for '{name}' in {}", self.dir.display()))?;
        let image = image::open(&path)?.to_rgba8();
        if image.width() == 0 || image.height() == 0 {
            return Err(format!("{} is empty", path.display()).into());
        }
        let name = Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        log::debug!("Loaded overlay '{name}' ({}x{})", image.width(), image.height());
        Ok(OverlayAsset::new(name, image))
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
