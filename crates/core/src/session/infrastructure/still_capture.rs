use std::sync::Weak;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::presentation::domain::still_image::StillImage;
use crate::session::domain::session_error::CaptureError;

use super::shared_state::SessionShared;

/// Handle for one pending still capture.
///
/// Resolves with the next composited frame, or with an error if the session
/// stops, the device disconnects, or no frame arrives in time. A timed-out
/// request is withdrawn so the session returns to Running.
pub struct StillCaptureTicket {
    id: u64,
    reply: Receiver<Result<StillImage, CaptureError>>,
    session: Weak<SessionShared>,
    timeout: Duration,
}

impl StillCaptureTicket {
    pub(crate) fn new(
        id: u64,
        reply: Receiver<Result<StillImage, CaptureError>>,
        session: Weak<SessionShared>,
        timeout: Duration,
    ) -> Self {
        Self {
            id,
            reply,
            session,
            timeout,
        }
    }

    /// Waits up to the session's configured capture timeout.
    pub fn wait(self) -> Result<StillImage, CaptureError> {
        let timeout = self.timeout;
        self.wait_timeout(timeout)
    }

    pub fn wait_timeout(self, timeout: Duration) -> Result<StillImage, CaptureError> {
        match self.reply.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Disconnected) => Err(CaptureError::Cancelled),
            Err(RecvTimeoutError::Timeout) => {
                if let Some(session) = self.session.upgrade() {
                    session.abandon_capture(self.id);
                }
                // The consumer may have delivered just before the withdrawal.
                self.reply.try_recv().unwrap_or(Err(CaptureError::TimedOut))
            }
        }
    }

    /// Non-blocking check; `None` while the capture is still pending.
    pub fn try_result(&self) -> Option<Result<StillImage, CaptureError>> {
        match self.reply.try_recv() {
            Ok(result) => Some(result),
            Err(crossbeam_channel::TryRecvError::Empty) => None,
            Err(crossbeam_channel::TryRecvError::Disconnected) => Some(Err(CaptureError::Cancelled)),
        }
    }
}
