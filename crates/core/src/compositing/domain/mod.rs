pub mod overlay_compositor;
pub mod overlay_placement;
