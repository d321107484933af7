pub mod asset_loader;
pub mod overlay_asset;
pub mod overlay_catalog;
