use thiserror::Error;

use super::overlay_asset::OverlayAsset;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("overlay catalog is empty")]
    EmptyCatalog,
    #[error("no overlay named '{0}'")]
    NotFound(String),
}

/// Ordered overlays with a selection cursor.
///
/// Insertion order is cycling order. The cursor always points at an entry
/// unless the catalog is empty. Failed selections leave the cursor where it
/// was.
#[derive(Clone, Debug, Default)]
pub struct OverlayCatalog {
    assets: Vec<OverlayAsset>,
    cursor: usize,
}

impl OverlayCatalog {
    /// Builds a catalog with the first asset selected. Later duplicates of a
    /// name are dropped so that selection by name is unambiguous.
    pub fn new(assets: Vec<OverlayAsset>) -> Self {
        let mut unique: Vec<OverlayAsset> = Vec::with_capacity(assets.len());
        for asset in assets {
            if unique.iter().any(|a| a.name() == asset.name()) {
                log::warn!("Duplicate overlay '{}' ignored", asset.name());
                continue;
            }
            unique.push(asset);
        }
        Self {
            assets: unique,
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.assets.iter().map(|a| a.name())
    }

    /// The selected overlay; `None` only for an empty catalog.
    pub fn current(&self) -> Option<&OverlayAsset> {
        self.assets.get(self.cursor)
    }

    /// Advances the cursor with wraparound.
    pub fn cycle_next(&mut self) -> Result<&OverlayAsset, CatalogError> {
        if self.assets.is_empty() {
            return Err(CatalogError::EmptyCatalog);
        }
        self.cursor = (self.cursor + 1) % self.assets.len();
        Ok(&self.assets[self.cursor])
    }

    pub fn select_by_name(&mut self, name: &str) -> Result<&OverlayAsset, CatalogError> {
        if self.assets.is_empty() {
            return Err(CatalogError::EmptyCatalog);
        }
        let index = self
            .assets
            .iter()
            .position(|a| a.name() == name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))?;
        self.cursor = index;
        Ok(&self.assets[index])
    }

    pub fn select_index(&mut self, index: usize) -> Result<&OverlayAsset, CatalogError> {
        if self.assets.is_empty() {
            return Err(CatalogError::EmptyCatalog);
        }
        if index >= self.assets.len() {
            return Err(CatalogError::NotFound(format!("#{index}")));
        }
        self.cursor = index;
        Ok(&self.assets[index])
    }
}
