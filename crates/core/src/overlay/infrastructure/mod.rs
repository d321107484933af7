pub mod image_asset_loader;
