use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::camera::domain::camera_config::{CameraPosition, FlashMode};
use crate::camera::domain::frame_source::FrameSource;
use crate::compositing::domain::overlay_compositor::OverlayCompositor;
use crate::detection::domain::face_features::FaceFeatures;
use crate::detection::domain::feature_detector::FeatureDetector;
use crate::presentation::domain::still_image::StillImage;
use crate::session::domain::pipeline_logger::PipelineLogger;
use crate::session::domain::session_event::SessionEvent;
use crate::session::domain::session_options::SessionOptions;
use crate::shared::frame::Frame;
use crate::shared::geometry::Rect;

use super::latest_slot::{latest_slot, Offer, SlotReceiver, SlotSender};
use super::shared_state::{Delivery, SessionShared, SessionSnapshot, StatsCounters};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Requests the session handle forwards to the producer thread, which owns
/// the source.
pub(crate) enum SourceCommand {
    Switch(CameraPosition),
}

/// The collaborators a run needs. Parked in the session between runs.
pub(crate) struct Components {
    pub source: Box<dyn FrameSource>,
    pub detector: Box<dyn FeatureDetector>,
    pub compositor: Box<dyn OverlayCompositor>,
    pub logger: Box<dyn PipelineLogger>,
}

type ConsumerParts = (
    Box<dyn FeatureDetector>,
    Box<dyn OverlayCompositor>,
    Box<dyn PipelineLogger>,
);

/// The two threads of one run.
///
/// Layout: `source → producer → [latest slot] → consumer [detect/composite] → preview`
///
/// The producer never waits on the consumer: a frame still pending when the
/// next one arrives is dropped, so the preview tracks the live camera.
pub(crate) struct Workers {
    cancelled: Arc<AtomicBool>,
    producer: JoinHandle<Box<dyn FrameSource>>,
    consumer: JoinHandle<ConsumerParts>,
}

impl Workers {
    /// Spawns both threads. The source must already be started.
    pub fn spawn(
        components: Components,
        shared: Arc<SessionShared>,
        options: SessionOptions,
        preview_tx: SlotSender<Frame>,
    ) -> (Self, Sender<SourceCommand>) {
        let Components {
            source,
            detector,
            compositor,
            logger,
        } = components;
        let cancelled = Arc::new(AtomicBool::new(false));
        let (frame_tx, frame_rx) = latest_slot::<Frame>();
        let (command_tx, command_rx) = crossbeam_channel::unbounded();

        let producer = spawn_producer(source, frame_tx, command_rx, shared.clone(), cancelled.clone());
        let consumer = spawn_consumer(
            ConsumerContext {
                detector,
                compositor,
                logger,
                shared,
                options,
                cancelled: cancelled.clone(),
                degraded: false,
            },
            frame_rx,
            preview_tx,
        );

        (
            Self {
                cancelled,
                producer,
                consumer,
            },
            command_tx,
        )
    }

    /// Signals both threads and waits for them, returning the components.
    /// `None` if either thread panicked, in which case its parts are lost.
    pub fn join(self) -> Option<Components> {
        self.cancelled.store(true, Ordering::Relaxed);

        let source = match self.producer.join() {
            Ok(source) => Some(source),
            Err(_) => {
                log::error!("Producer thread panicked");
                None
            }
        };
        let parts = match self.consumer.join() {
            Ok(parts) => Some(parts),
            Err(_) => {
                log::error!("Consumer thread panicked");
                None
            }
        };

        let source = source?;
        let (detector, compositor, logger) = parts?;
        Some(Components {
            source,
            detector,
            compositor,
            logger,
        })
    }
}

fn spawn_producer(
    mut source: Box<dyn FrameSource>,
    frames: SlotSender<Frame>,
    commands: Receiver<SourceCommand>,
    shared: Arc<SessionShared>,
    cancelled: Arc<AtomicBool>,
) -> JoinHandle<Box<dyn FrameSource>> {
    std::thread::spawn(move || {
        while !cancelled.load(Ordering::Relaxed) {
            for command in commands.try_iter() {
                match command {
                    SourceCommand::Switch(position) => switch_source(&mut *source, position, &shared),
                }
            }

            match source.next_frame() {
                Ok(frame) => {
                    StatsCounters::bump(&shared.stats.captured, 1);
                    if frames.offer(frame) == Offer::ReplacedStale {
                        StatsCounters::bump(&shared.stats.dropped, 1);
                    }
                }
                Err(e) => {
                    if !cancelled.load(Ordering::Relaxed) {
                        log::error!("Camera failed: {e}");
                        shared.fail(e);
                        cancelled.store(true, Ordering::Relaxed);
                    }
                    break;
                }
            }
        }
        source.stop();
        source
    })
}

fn switch_source(source: &mut dyn FrameSource, position: CameraPosition, shared: &SessionShared) {
    match source.switch_device(position) {
        Ok(()) => {
            log::info!("Switched to {position} camera");
            shared.emit(SessionEvent::CameraSwitched(position));
        }
        Err(e) => {
            log::warn!("Could not switch to {position} camera: {e}");
            shared.snapshot.update(|s| {
                if s.config.position == position {
                    s.config.position = position.opposite();
                }
            });
            shared.emit(SessionEvent::CameraSwitchFailed(position, e));
        }
    }
}

struct ConsumerContext {
    detector: Box<dyn FeatureDetector>,
    compositor: Box<dyn OverlayCompositor>,
    logger: Box<dyn PipelineLogger>,
    shared: Arc<SessionShared>,
    options: SessionOptions,
    cancelled: Arc<AtomicBool>,
    degraded: bool,
}

fn spawn_consumer(
    mut ctx: ConsumerContext,
    frames: SlotReceiver<Frame>,
    preview: SlotSender<Frame>,
) -> JoinHandle<ConsumerParts> {
    std::thread::spawn(move || {
        let mut processed: u64 = 0;
        while !ctx.cancelled.load(Ordering::Relaxed) {
            let frame = match frames.recv_timeout(POLL_INTERVAL) {
                Ok(frame) => frame,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            if ctx.process(frame, &preview) {
                processed += 1;
                ctx.logger.progress(processed);
            }
        }

        let dropped = ctx.shared.stats.snapshot().frames_dropped;
        ctx.logger.metric("dropped_frames", dropped as f64);
        ctx.logger.summary();
        (ctx.detector, ctx.compositor, ctx.logger)
    })
}

impl ConsumerContext {
    /// Detects, composites and delivers one frame. Returns whether the frame
    /// reached the preview.
    fn process(&mut self, frame: Frame, preview: &SlotSender<Frame>) -> bool {
        let armed = self.shared.armed_capture();
        let snap = self.shared.snapshot.load();
        let frame = self.prepare(frame, &snap);

        let t = Instant::now();
        let (faces, face_count) = self.faces_for(&frame, &snap);
        self.logger.timing("detect", t.elapsed().as_secs_f64() * 1000.0);

        let scene_luma = (snap.config.flash == FlashMode::Auto && armed.is_some())
            .then(|| frame.mean_luma());

        let t = Instant::now();
        let sequence = frame.sequence();
        let composited = match self.compositor.composite(frame, &faces, snap.overlay.as_ref()) {
            Ok(f) => f,
            Err(e) => {
                log::warn!("Skipping frame {sequence}: compositing failed: {e}");
                return false;
            }
        };
        self.logger.timing("composite", t.elapsed().as_secs_f64() * 1000.0);

        let delivery = self.shared.deliver(armed, || {
            let flash_fired = snap.config.flash.fires(snap.capabilities.has_flash, || {
                scene_luma.unwrap_or_else(|| composited.mean_luma())
            });
            StillImage {
                frame: composited.clone(),
                flash_fired,
                overlay_name: snap.overlay.as_ref().map(|o| o.name().to_string()),
                face_count,
            }
        });

        let stats = &self.shared.stats;
        match delivery {
            Delivery::Discarded => {
                StatsCounters::bump(&stats.discarded, 1);
                return false;
            }
            Delivery::Captured => {
                log::info!("Captured still from frame {sequence} ({face_count} face(s))");
            }
            Delivery::Previewed => {}
        }
        StatsCounters::bump(&stats.processed, 1);
        StatsCounters::bump(&stats.faces, face_count as u64);
        self.logger.metric("faces", face_count as f64);
        preview.offer(composited);
        true
    }

    fn prepare(&self, frame: Frame, snap: &SessionSnapshot) -> Frame {
        let frame = if self.options.normalize_orientation {
            frame.to_upright(self.options.unmirror)
        } else {
            frame
        };
        let zoom = snap.config.zoom();
        if zoom > 1.0 {
            frame.zoomed(zoom)
        } else {
            frame
        }
    }

    /// Faces to anchor on, plus the number actually detected.
    fn faces_for(&mut self, frame: &Frame, snap: &SessionSnapshot) -> (Vec<FaceFeatures>, usize) {
        if !snap.config.detection_enabled {
            if self.options.draw_unanchored && snap.overlay.is_some() {
                return (vec![FaceFeatures::from_bounds(Rect::FULL)], 0);
            }
            return (Vec::new(), 0);
        }

        match self.detector.detect(frame) {
            Ok(faces) => {
                if self.degraded {
                    log::info!("Face detection recovered");
                    self.degraded = false;
                }
                let count = faces.len();
                (faces, count)
            }
            Err(e) => {
                if !self.degraded {
                    log::warn!("Face detection failed, continuing without faces: {e}");
                    self.degraded = true;
                }
                (Vec::new(), 0)
            }
        }
    }
}
