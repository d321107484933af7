use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender};

use crate::camera::domain::camera_config::{CameraCapabilities, CameraConfig, CameraPosition, FlashMode};
use crate::camera::domain::frame_source::FrameSource;
use crate::compositing::domain::overlay_compositor::OverlayCompositor;
use crate::compositing::infrastructure::cpu_overlay_compositor::CpuOverlayCompositor;
use crate::detection::domain::feature_detector::FeatureDetector;
use crate::overlay::domain::overlay_asset::OverlayAsset;
use crate::overlay::domain::overlay_catalog::OverlayCatalog;
use crate::session::domain::pipeline_logger::{LogPipelineLogger, PipelineLogger};
use crate::session::domain::session_error::SessionError;
use crate::session::domain::session_event::{SessionEvent, SessionStats};
use crate::session::domain::session_options::SessionOptions;
use crate::session::domain::session_state::SessionState;
use crate::session::infrastructure::latest_slot::latest_slot;
use crate::session::infrastructure::presenter::LivePreview;
use crate::session::infrastructure::shared_state::{SessionShared, SessionSnapshot};
use crate::session::infrastructure::still_capture::StillCaptureTicket;
use crate::session::infrastructure::workers::{Components, SourceCommand, Workers};

enum Engine {
    /// Between runs; the session owns its collaborators.
    Parked(Components),
    /// The worker threads own the collaborators.
    Running(Workers),
    /// A worker panicked and took its collaborators with it.
    Lost,
}

/// Live camera session: acquires frames, anchors the selected overlay on
/// detected faces and publishes the result as a live preview and on-demand
/// stills.
///
/// Every method takes `&self` and returns without waiting on frame
/// processing, so the handle can be shared with whatever thread drives the
/// UI. Only `start` (device open) and `stop` (worker join) block.
pub struct CaptureSession {
    shared: Arc<SessionShared>,
    options: SessionOptions,
    catalog: Mutex<OverlayCatalog>,
    engine: Mutex<Engine>,
    events: Receiver<SessionEvent>,
    preview: Mutex<Option<LivePreview>>,
    commands: Mutex<Option<Sender<SourceCommand>>>,
    pinch_base: Mutex<Option<f64>>,
}

impl CaptureSession {
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn FeatureDetector>,
        catalog: OverlayCatalog,
        options: SessionOptions,
    ) -> Self {
        let (events_tx, events) = crossbeam_channel::unbounded();
        let snapshot = SessionSnapshot {
            config: CameraConfig::new(CameraPosition::default(), options.max_zoom),
            overlay: catalog.current().cloned(),
            capabilities: CameraCapabilities::default(),
        };
        let components = Components {
            source,
            detector,
            compositor: Box::new(CpuOverlayCompositor::new(options.eye_span_scale)),
            logger: Box::new(LogPipelineLogger::default()),
        };
        Self {
            shared: Arc::new(SessionShared::new(snapshot, events_tx)),
            options,
            catalog: Mutex::new(catalog),
            engine: Mutex::new(Engine::Parked(components)),
            events,
            preview: Mutex::new(None),
            commands: Mutex::new(None),
            pinch_base: Mutex::new(None),
        }
    }

    /// Replaces the compositor. Takes effect on the next start.
    pub fn with_compositor(self, compositor: Box<dyn OverlayCompositor>) -> Self {
        if let Engine::Parked(c) = &mut *self.lock_engine() {
            c.compositor = compositor;
        }
        self
    }

    pub fn with_logger(self, logger: Box<dyn PipelineLogger>) -> Self {
        if let Engine::Parked(c) = &mut *self.lock_engine() {
            c.logger = logger;
        }
        self
    }

    /// Sets the initial camera configuration. The zoom ceiling is kept.
    pub fn with_config(self, config: CameraConfig) -> Self {
        self.shared.snapshot.update(|s| {
            let max_zoom = s.config.max_zoom();
            s.config = config;
            s.config.set_max_zoom(max_zoom);
        });
        self
    }

    // --- Lifecycle ---

    /// Opens the configured camera and starts processing.
    ///
    /// Also restarts a session that was stopped, explicitly or by a fatal
    /// device error.
    pub fn start(&self) -> Result<(), SessionError> {
        let mut engine = self.lock_engine();
        if self.shared.state().is_active() {
            return Err(SessionError::AlreadyRunning);
        }

        let mut components = match std::mem::replace(&mut *engine, Engine::Lost) {
            Engine::Parked(c) => c,
            // Left behind by a fatal error; the threads have exited or are exiting.
            Engine::Running(workers) => workers.join().ok_or_else(lost_components)?,
            Engine::Lost => return Err(lost_components()),
        };

        let position = self.shared.snapshot.load().config.position;
        let capabilities = match components.source.start(position) {
            Ok(caps) => caps,
            Err(e) => {
                log::warn!("Could not open {position} camera: {e}");
                *engine = Engine::Parked(components);
                return Err(e.into());
            }
        };
        log::info!(
            "Opened {position} camera (max zoom {:.1}, flash: {})",
            capabilities.max_zoom,
            if capabilities.has_flash { "yes" } else { "no" }
        );

        let max_zoom = capabilities.max_zoom.min(self.options.max_zoom);
        self.shared.snapshot.update(|s| {
            s.config.set_max_zoom(max_zoom);
            s.capabilities = capabilities;
        });

        let (preview_tx, preview_rx) = latest_slot();
        *self.lock_preview() = Some(LivePreview::new(preview_rx));

        self.shared.begin_run();
        let (workers, commands) = Workers::spawn(
            components,
            self.shared.clone(),
            self.options.clone(),
            preview_tx,
        );
        *self.lock_commands() = Some(commands);
        *engine = Engine::Running(workers);
        Ok(())
    }

    /// Stops processing and releases the camera. A pending still capture
    /// resolves as cancelled. Idempotent.
    pub fn stop(&self) -> Result<(), SessionError> {
        let mut engine = self.lock_engine();
        self.shared.stop_run();
        *self.lock_commands() = None;

        let result = match std::mem::replace(&mut *engine, Engine::Lost) {
            Engine::Running(workers) => match workers.join() {
                Some(components) => {
                    *engine = Engine::Parked(components);
                    Ok(())
                }
                None => Err(SessionError::Worker("a session worker panicked".into())),
            },
            other => {
                *engine = other;
                Ok(())
            }
        };
        *self.lock_preview() = None;
        result
    }

    // --- Camera configuration ---

    /// Switches to the other camera. Returns the new position.
    pub fn switch_camera(&self) -> Result<CameraPosition, SessionError> {
        let target = self.config().position.opposite();
        self.switch_to(target)?;
        Ok(target)
    }

    /// Selects the camera at `position`. Overlay selection, zoom, flash and
    /// detection settings carry over.
    ///
    /// While running, a position the device does not offer fails at once
    /// and the configuration is left untouched. The device swap itself
    /// happens on the acquisition thread and is reported through
    /// [`SessionEvent::CameraSwitched`] or [`SessionEvent::CameraSwitchFailed`].
    pub fn switch_to(&self, position: CameraPosition) -> Result<(), SessionError> {
        let active = self.shared.state().is_active();
        let previous = self.shared.snapshot.update(|s| {
            if active && !s.capabilities.supports(position) {
                return Err(SessionError::DeviceUnavailable(position));
            }
            Ok(std::mem::replace(&mut s.config.position, position))
        })?;
        if previous == position {
            return Ok(());
        }

        let forwarded = active
            && self
                .lock_commands()
                .as_ref()
                .is_some_and(|tx| tx.send(SourceCommand::Switch(position)).is_ok());
        if !forwarded {
            // Applied on the next start.
            self.shared.emit(SessionEvent::CameraSwitched(position));
        }
        Ok(())
    }

    /// Sets digital zoom, clamped to `[1.0, max zoom]`. Returns the applied value.
    pub fn set_zoom(&self, factor: f64) -> f64 {
        self.shared.snapshot.update(|s| s.config.set_zoom(factor))
    }

    /// Starts a pinch gesture at the current zoom.
    pub fn begin_pinch(&self) {
        let zoom = self.config().zoom();
        *self.lock_pinch() = Some(zoom);
    }

    /// Applies a pinch scale relative to the zoom at gesture start.
    /// Returns the applied zoom.
    pub fn update_pinch(&self, scale: f64) -> f64 {
        let current = self.config().zoom();
        let base = *self.lock_pinch().get_or_insert(current);
        self.set_zoom(base * scale)
    }

    pub fn end_pinch(&self) {
        *self.lock_pinch() = None;
    }

    pub fn set_flash(&self, mode: FlashMode) {
        self.shared.snapshot.update(|s| s.config.flash = mode);
    }

    pub fn set_detection_enabled(&self, enabled: bool) {
        self.shared.snapshot.update(|s| s.config.detection_enabled = enabled);
    }

    // --- Overlay selection ---

    /// Selects an overlay by name. On error the selection is unchanged.
    pub fn select_overlay(&self, name: &str) -> Result<String, SessionError> {
        let mut catalog = self.lock_catalog();
        let asset = catalog.select_by_name(name)?.clone();
        Ok(self.publish_overlay(Some(asset)))
    }

    /// Advances to the next overlay, wrapping around.
    pub fn cycle_overlay(&self) -> Result<String, SessionError> {
        let mut catalog = self.lock_catalog();
        let asset = catalog.cycle_next()?.clone();
        Ok(self.publish_overlay(Some(asset)))
    }

    /// Hides the overlay until the next selection.
    pub fn clear_overlay(&self) {
        let _catalog = self.lock_catalog();
        self.publish_overlay(None);
    }

    fn publish_overlay(&self, asset: Option<OverlayAsset>) -> String {
        let name = asset.as_ref().map(|a| a.name().to_string());
        self.shared.snapshot.update(|s| s.overlay = asset);
        self.shared.emit(SessionEvent::OverlayChanged(name.clone()));
        name.unwrap_or_default()
    }

    // --- Capture ---

    /// Asks for the next composited frame as a still. Fails with
    /// `AlreadyCapturing` while another request is pending.
    pub fn request_still_capture(&self) -> Result<StillCaptureTicket, SessionError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let id = self.shared.request_capture(reply_tx)?;
        Ok(StillCaptureTicket::new(
            id,
            reply_rx,
            Arc::downgrade(&self.shared),
            self.options.capture_timeout,
        ))
    }

    // --- Observation ---

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn stats(&self) -> SessionStats {
        self.shared.stats.snapshot()
    }

    /// Session notifications. All clones drain the same queue.
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.events.clone()
    }

    /// Composited frames of the current run; `None` when not running.
    pub fn preview(&self) -> Option<LivePreview> {
        self.lock_preview().clone()
    }

    pub fn config(&self) -> CameraConfig {
        self.shared.snapshot.load().config.clone()
    }

    pub fn capabilities(&self) -> CameraCapabilities {
        self.shared.snapshot.load().capabilities.clone()
    }

    /// Name of the overlay drawn on new frames.
    pub fn current_overlay(&self) -> Option<String> {
        self.shared
            .snapshot
            .load()
            .overlay
            .as_ref()
            .map(|a| a.name().to_string())
    }

    pub fn overlay_names(&self) -> Vec<String> {
        self.lock_catalog().names().map(str::to_string).collect()
    }

    fn lock_engine(&self) -> MutexGuard<'_, Engine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_catalog(&self) -> MutexGuard<'_, OverlayCatalog> {
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_preview(&self) -> MutexGuard<'_, Option<LivePreview>> {
        self.preview.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_commands(&self) -> MutexGuard<'_, Option<Sender<SourceCommand>>> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pinch(&self) -> MutexGuard<'_, Option<f64>> {
        self.pinch_base.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("Session did not shut down cleanly: {e}");
        }
    }
}

fn lost_components() -> SessionError {
    SessionError::Worker("session components were lost to a worker panic".into())
}
