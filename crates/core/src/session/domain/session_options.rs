use std::time::Duration;

use crate::shared::constants::{DEFAULT_EYE_SPAN_SCALE, DEFAULT_MAX_ZOOM};

/// Fixed per-session behaviour. Runtime changes go through `CameraConfig`.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionOptions {
    /// Upper bound on digital zoom, further limited by what the device reports.
    pub max_zoom: f64,
    /// How long `StillCaptureTicket::wait` waits for a frame.
    pub capture_timeout: Duration,
    /// Draw the overlay centred on the frame while detection is disabled.
    pub draw_unanchored: bool,
    /// Rotate frames upright before detection.
    pub normalize_orientation: bool,
    /// Also flip mirrored (front camera) frames back to true orientation.
    pub unmirror: bool,
    /// Overlay width as a multiple of the inter-eye distance.
    pub eye_span_scale: f64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_zoom: DEFAULT_MAX_ZOOM,
            capture_timeout: Duration::from_secs(5),
            draw_unanchored: false,
            normalize_orientation: true,
            unmirror: false,
            eye_span_scale: DEFAULT_EYE_SPAN_SCALE,
        }
    }
}
