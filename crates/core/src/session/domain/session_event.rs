use crate::camera::domain::camera_config::CameraPosition;
use crate::camera::domain::frame_source::DeviceError;

use super::session_error::SessionError;
use super::session_state::SessionState;

/// Notifications for the UI collaborator.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// A fatal error stopped the session. Emitted once per run.
    Fatal(SessionError),
    /// The source now delivers frames from this camera.
    CameraSwitched(CameraPosition),
    /// The device could not be swapped; the previous camera stays active.
    CameraSwitchFailed(CameraPosition, DeviceError),
    OverlayChanged(Option<String>),
}

/// Counters for the current session, across runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames delivered by the source.
    pub frames_captured: u64,
    /// Frames the consumer detected and composited.
    pub frames_processed: u64,
    /// Pending frames replaced by a fresher one before processing.
    pub frames_dropped: u64,
    /// Composited frames thrown away because the session had stopped.
    pub frames_discarded: u64,
    pub faces_detected: u64,
    pub stills_captured: u64,
}
