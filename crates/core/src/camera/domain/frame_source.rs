use thiserror::Error;

use crate::camera::domain::camera_config::{CameraCapabilities, CameraPosition};
use crate::shared::frame::Frame;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("no {0} camera available")]
    Unavailable(CameraPosition),
    #[error("camera access not authorized")]
    PermissionDenied,
    #[error("camera disconnected: {0}")]
    Disconnected(String),
    #[error("camera backend error: {0}")]
    Backend(String),
}

/// A live camera device producing frames at its native rate.
///
/// Driven from a single dedicated thread: `next_frame` blocks until the
/// device delivers a frame. Timestamps must increase strictly across the
/// whole stream, including across `switch_device`.
pub trait FrameSource: Send {
    /// Opens the device at `position` and begins emitting frames.
    fn start(&mut self, position: CameraPosition) -> Result<CameraCapabilities, DeviceError>;

    /// Blocks until the next frame is available.
    fn next_frame(&mut self) -> Result<Frame, DeviceError>;

    /// Swaps the active device without ending the stream.
    fn switch_device(&mut self, position: CameraPosition) -> Result<(), DeviceError>;

    /// Stops emission and releases the device. Idempotent.
    fn stop(&mut self);
}
