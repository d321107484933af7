use thiserror::Error;

use crate::camera::domain::camera_config::CameraPosition;
use crate::camera::domain::frame_source::DeviceError;
use crate::overlay::domain::overlay_catalog::CatalogError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("no {0} camera available")]
    DeviceUnavailable(CameraPosition),
    #[error("camera access not authorized")]
    PermissionDenied,
    #[error("a still capture is already in progress")]
    AlreadyCapturing,
    #[error("session is not running")]
    NotRunning,
    #[error("session is already running")]
    AlreadyRunning,
    #[error("camera disconnected: {0}")]
    DeviceDisconnected(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("worker failure: {0}")]
    Worker(String),
}

impl From<DeviceError> for SessionError {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::Unavailable(position) => SessionError::DeviceUnavailable(position),
            DeviceError::PermissionDenied => SessionError::PermissionDenied,
            DeviceError::Disconnected(reason) => SessionError::DeviceDisconnected(reason),
            DeviceError::Backend(reason) => SessionError::Worker(reason),
        }
    }
}

/// Why a still-capture request resolved without an image.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("capture cancelled")]
    Cancelled,
    #[error("capture timed out")]
    TimedOut,
    #[error("camera disconnected: {0}")]
    DeviceDisconnected(String),
}
