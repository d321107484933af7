use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::Sender;

use crate::camera::domain::camera_config::{CameraCapabilities, CameraConfig};
use crate::camera::domain::frame_source::DeviceError;
use crate::overlay::domain::overlay_asset::OverlayAsset;
use crate::presentation::domain::still_image::StillImage;
use crate::session::domain::session_error::{CaptureError, SessionError};
use crate::session::domain::session_event::{SessionEvent, SessionStats};
use crate::session::domain::session_state::SessionState;

use super::snapshot_cell::SnapshotCell;

/// Everything the consumer needs to process one frame, read once per frame.
#[derive(Clone, Debug, Default)]
pub struct SessionSnapshot {
    pub config: CameraConfig,
    pub overlay: Option<OverlayAsset>,
    pub capabilities: CameraCapabilities,
}

pub(crate) type CaptureReply = Sender<Result<StillImage, CaptureError>>;

pub(crate) struct PendingCapture {
    id: u64,
    reply: CaptureReply,
}

/// What the consumer should do with a finished frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// Session left Running/Capturing while the frame was in flight.
    Discarded,
    Previewed,
    /// Also handed to the pending still-capture request.
    Captured,
}

#[derive(Default)]
pub(crate) struct StatsCounters {
    pub captured: AtomicU64,
    pub processed: AtomicU64,
    pub dropped: AtomicU64,
    pub discarded: AtomicU64,
    pub faces: AtomicU64,
    pub stills: AtomicU64,
}

impl StatsCounters {
    pub fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SessionStats {
        SessionStats {
            frames_captured: self.captured.load(Ordering::Relaxed),
            frames_processed: self.processed.load(Ordering::Relaxed),
            frames_dropped: self.dropped.load(Ordering::Relaxed),
            frames_discarded: self.discarded.load(Ordering::Relaxed),
            faces_detected: self.faces.load(Ordering::Relaxed),
            stills_captured: self.stills.load(Ordering::Relaxed),
        }
    }
}

/// State shared between the session handle and its worker threads.
///
/// Lock order: `state` before `pending`. Neither lock is held across
/// blocking calls; event sends go to an unbounded channel.
pub(crate) struct SessionShared {
    state: Mutex<SessionState>,
    pending: Mutex<Option<PendingCapture>>,
    pub snapshot: SnapshotCell<SessionSnapshot>,
    pub stats: StatsCounters,
    events: Sender<SessionEvent>,
    next_capture_id: AtomicU64,
    fatal_reported: AtomicBool,
}

impl SessionShared {
    pub fn new(snapshot: SessionSnapshot, events: Sender<SessionEvent>) -> Self {
        Self {
            state: Mutex::new(SessionState::Idle),
            pending: Mutex::new(None),
            snapshot: SnapshotCell::new(snapshot),
            stats: StatsCounters::default(),
            events,
            next_capture_id: AtomicU64::new(1),
            fatal_reported: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.lock_state()
    }

    pub fn emit(&self, event: SessionEvent) {
        // The session handle owns a receiver, so this only fails during teardown.
        let _ = self.events.send(event);
    }

    /// Marks a new run as started.
    pub fn begin_run(&self) {
        let mut state = self.lock_state();
        self.fatal_reported.store(false, Ordering::SeqCst);
        *state = SessionState::Running;
        self.emit(SessionEvent::StateChanged(SessionState::Running));
    }

    /// Registers a still-capture request. Returns its id.
    pub fn request_capture(&self, reply: CaptureReply) -> Result<u64, SessionError> {
        let mut state = self.lock_state();
        match *state {
            SessionState::Running => {}
            SessionState::Capturing => return Err(SessionError::AlreadyCapturing),
            SessionState::Idle | SessionState::Stopped => return Err(SessionError::NotRunning),
        }
        let id = self.next_capture_id.fetch_add(1, Ordering::Relaxed);
        *self.lock_pending() = Some(PendingCapture { id, reply });
        *state = SessionState::Capturing;
        self.emit(SessionEvent::StateChanged(SessionState::Capturing));
        Ok(id)
    }

    /// Drops request `id` if it is still pending, returning to Running.
    pub fn abandon_capture(&self, id: u64) {
        let mut state = self.lock_state();
        let mut pending = self.lock_pending();
        if pending.as_ref().map(|p| p.id) != Some(id) {
            return;
        }
        pending.take();
        if *state == SessionState::Capturing {
            *state = SessionState::Running;
            self.emit(SessionEvent::StateChanged(SessionState::Running));
        }
    }

    /// Id of the capture request a frame starting now may fulfil.
    ///
    /// Read before the frame's config snapshot, so the frame that answers a
    /// request sees every setting changed before the request was made.
    pub fn armed_capture(&self) -> Option<u64> {
        let state = self.lock_state();
        match *state {
            SessionState::Capturing => self.lock_pending().as_ref().map(|p| p.id),
            _ => None,
        }
    }

    /// Decides the fate of a composited frame. `armed` is what
    /// [`armed_capture`](Self::armed_capture) returned when the frame started;
    /// only a frame armed for the pending request fulfils it. The still is
    /// built and delivered under the state lock, so a concurrent stop either
    /// sees the request fulfilled or cancels it, never both.
    pub fn deliver(&self, armed: Option<u64>, build_still: impl FnOnce() -> StillImage) -> Delivery {
        let mut state = self.lock_state();
        match *state {
            SessionState::Running => Delivery::Previewed,
            SessionState::Capturing => {
                let mut pending = self.lock_pending();
                let request = match pending.take() {
                    Some(request) if Some(request.id) == armed => request,
                    other => {
                        // Started before the request; the next frame answers it.
                        *pending = other;
                        return Delivery::Previewed;
                    }
                };
                drop(pending);
                StatsCounters::bump(&self.stats.stills, 1);
                let _ = request.reply.send(Ok(build_still()));
                *state = SessionState::Running;
                self.emit(SessionEvent::StateChanged(SessionState::Running));
                Delivery::Captured
            }
            SessionState::Idle | SessionState::Stopped => Delivery::Discarded,
        }
    }

    /// Moves an active session to Stopped, cancelling any pending capture.
    /// Returns whether the session was active.
    pub fn stop_run(&self) -> bool {
        self.halt(CaptureError::Cancelled)
    }

    /// Handles a fatal device error: stops the run and reports it once.
    pub fn fail(&self, error: DeviceError) {
        let reason = error.to_string();
        if self.halt(CaptureError::DeviceDisconnected(reason))
            && !self.fatal_reported.swap(true, Ordering::SeqCst)
        {
            self.emit(SessionEvent::Fatal(SessionError::from(error)));
        }
    }

    fn halt(&self, cancel_with: CaptureError) -> bool {
        let mut state = self.lock_state();
        if !state.is_active() {
            return false;
        }
        if let Some(request) = self.lock_pending().take() {
            let _ = request.reply.send(Err(cancel_with));
        }
        *state = SessionState::Stopped;
        self.emit(SessionEvent::StateChanged(SessionState::Stopped));
        true
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<PendingCapture>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
