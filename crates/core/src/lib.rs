//! Face-anchored overlay camera pipeline.
//!
//! A [`session::capture_session::CaptureSession`] pulls frames from a
//! [`camera::domain::frame_source::FrameSource`], finds faces with a
//! [`detection::domain::feature_detector::FeatureDetector`], draws the selected
//! overlay with an [`compositing::domain::overlay_compositor::OverlayCompositor`]
//! and hands the result to a live preview or a still capture.

pub mod camera;
pub mod compositing;
pub mod detection;
pub mod overlay;
pub mod presentation;
pub mod session;
pub mod shared;
