use super::overlay_asset::OverlayAsset;

/// Resolves overlay names to loaded images.
pub trait AssetLoader {
    fn load(&self, name: &str) -> Result<OverlayAsset, Box<dyn std::error::Error>>;

    /// Loads every name in order. Names that fail to load are logged and
    /// skipped so one broken asset does not empty the catalog.
    fn load_all(&self, names: &[String]) -> Vec<OverlayAsset> {
        names
            .iter()
            .filter_map(|name| match self.load(name) {
                Ok(asset) => Some(asset),
                Err(e) => {
                    log::warn!("Skipping overlay '{name}': {e}");
                    None
                }
            })
            .collect()
    }
}
