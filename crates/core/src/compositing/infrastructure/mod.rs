pub mod cpu_overlay_compositor;
