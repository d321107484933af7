use crate::shared::frame::Frame;

/// Result of one still capture: the composited frame plus what was in effect
/// when it was taken.
#[derive(Clone, Debug, PartialEq)]
pub struct StillImage {
    pub frame: Frame,
    pub flash_fired: bool,
    pub overlay_name: Option<String>,
    pub face_count: usize,
}
