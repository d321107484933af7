use std::path::Path;
use std::time::{Duration, Instant};

use crate::camera::domain::camera_config::{CameraCapabilities, CameraPosition};
use crate::camera::domain::frame_source::{DeviceError, FrameSource};
use crate::shared::constants::DEFAULT_MAX_ZOOM;
use crate::shared::frame::{Frame, FrameInfo, Orientation};

/// Default simulated frame interval (~30 fps).
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(33);

/// Simulated camera that replays one still image per position at a fixed rate.
///
/// Front-camera frames are flagged as mirrored, matching how real front
/// sensors deliver them.
pub struct StillImageSource {
    front: Option<Frame>,
    back: Option<Frame>,
    interval: Duration,
    orientation: Orientation,
    max_zoom: f64,
    frame_limit: Option<u64>,
    active: Option<CameraPosition>,
    sequence: u64,
    timestamp: Duration,
    next_due: Option<Instant>,
}

impl StillImageSource {
    pub fn new(front: Option<Frame>, back: Option<Frame>) -> Self {
        Self {
            front,
            back,
            interval: DEFAULT_INTERVAL,
            orientation: Orientation::Up,
            max_zoom: DEFAULT_MAX_ZOOM,
            frame_limit: None,
            active: None,
            sequence: 0,
            timestamp: Duration::ZERO,
            next_due: None,
        }
    }

    /// Loads the front/back images with the `image` crate (converted to RGB).
    pub fn from_files(
        front: Option<&Path>,
        back: Option<&Path>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let load = |path: &Path| -> Result<Frame, Box<dyn std::error::Error>> {
            let img = image::open(path)?.to_rgb8();
            let (w, h) = img.dimensions();
            Ok(Frame::rgb(img.into_raw(), w, h, 0))
        };
        let front = front.map(load).transpose()?;
        let back = back.map(load).transpose()?;
        Ok(Self::new(front, back))
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_max_zoom(mut self, max_zoom: f64) -> Self {
        self.max_zoom = max_zoom;
        self
    }

    /// Report the device as disconnected after `limit` frames.
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    fn image_for(&self, position: CameraPosition) -> Option<&Frame> {
        match position {
            CameraPosition::Front => self.front.as_ref(),
            CameraPosition::Back => self.back.as_ref(),
        }
    }

    fn positions(&self) -> Vec<CameraPosition> {
        [CameraPosition::Front, CameraPosition::Back]
            .into_iter()
            .filter(|p| self.image_for(*p).is_some())
            .collect()
    }
}

impl FrameSource for StillImageSource {
    fn start(&mut self, position: CameraPosition) -> Result<CameraCapabilities, DeviceError> {
        if self.image_for(position).is_none() {
            return Err(DeviceError::Unavailable(position));
        }
        self.active = Some(position);
        self.next_due = Some(Instant::now());
        log::debug!("Still image source started ({position})");
        Ok(CameraCapabilities {
            positions: self.positions(),
            max_zoom: self.max_zoom,
            has_flash: false,
        })
    }

    fn next_frame(&mut self) -> Result<Frame, DeviceError> {
        let position = self
            .active
            .ok_or_else(|| DeviceError::Backend("source not started".into()))?;

        if let Some(limit) = self.frame_limit {
            if self.sequence >= limit {
                return Err(DeviceError::Disconnected("end of stream".into()));
            }
        }

        if let Some(due) = self.next_due {
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
            self.next_due = Some(due.max(now) + self.interval);
        }

        let template = self
            .image_for(position)
            .ok_or(DeviceError::Unavailable(position))?;
        let (data, width, height, format) = (
            template.data().to_vec(),
            template.width(),
            template.height(),
            template.format(),
        );

        self.timestamp += self.interval.max(Duration::from_nanos(1));
        let info = FrameInfo {
            sequence: self.sequence,
            timestamp: self.timestamp,
            orientation: self.orientation,
            mirrored: position == CameraPosition::Front,
        };
        self.sequence += 1;

        Ok(Frame::new(data, width, height, format, info))
    }

    fn switch_device(&mut self, position: CameraPosition) -> Result<(), DeviceError> {
        if self.image_for(position).is_none() {
            return Err(DeviceError::Unavailable(position));
        }
        self.active = Some(position);
        Ok(())
    }

    fn stop(&mut self) {
        self.active = None;
        self.next_due = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(value: u8) -> Frame {
        Frame::rgb(vec![value; 4 * 4 * 3], 4, 4, 0)
    }

    fn source() -> StillImageSource {
        StillImageSource::new(Some(solid(10)), Some(solid(200))).with_interval(Duration::ZERO)
    }

    #[test]
    fn test_start_reports_capabilities() {
        let mut src = source().with_max_zoom(3.0);
        let caps = src.start(CameraPosition::Back).unwrap();
        assert!(caps.supports(CameraPosition::Front));
        assert!(caps.supports(CameraPosition::Back));
        assert_eq!(caps.max_zoom, 3.0);
        assert!(!caps.has_flash);
    }

    #[test]
    fn test_start_missing_position_is_unavailable() {
        let mut src = StillImageSource::new(None, Some(solid(0)));
        assert_eq!(
            src.start(CameraPosition::Front),
            Err(DeviceError::Unavailable(CameraPosition::Front))
        );
    }

    #[test]
    fn test_next_frame_before_start_errors() {
        let mut src = source();
        assert!(src.next_frame().is_err());
    }

    #[test]
    fn test_timestamps_strictly_increase_across_switch() {
        let mut src = source();
        src.start(CameraPosition::Back).unwrap();
        let a = src.next_frame().unwrap();
        src.switch_device(CameraPosition::Front).unwrap();
        let b = src.next_frame().unwrap();
        let c = src.next_frame().unwrap();
        assert!(a.timestamp() < b.timestamp());
        assert!(b.timestamp() < c.timestamp());
        assert_eq!(c.sequence(), 2);
    }

    #[test]
    fn test_switch_changes_pixels_and_mirroring() {
        let mut src = source();
        src.start(CameraPosition::Back).unwrap();
        let back = src.next_frame().unwrap();
        assert_eq!(back.data()[0], 200);
        assert!(!back.is_mirrored());

        src.switch_device(CameraPosition::Front).unwrap();
        let front = src.next_frame().unwrap();
        assert_eq!(front.data()[0], 10);
        assert!(front.is_mirrored());
    }

    #[test]
    fn test_frames_are_independent_copies() {
        let mut src = source();
        src.start(CameraPosition::Back).unwrap();
        let mut first = src.next_frame().unwrap();
        first.data_mut()[0] = 0;
        let second = src.next_frame().unwrap();
        assert_eq!(second.data()[0], 200);
        assert_eq!((second.sequence(), second.width()), (1, 4));
    }

    #[test]
    fn test_frame_limit_disconnects() {
        let mut src = source().with_frame_limit(2);
        src.start(CameraPosition::Back).unwrap();
        assert!(src.next_frame().is_ok());
        assert!(src.next_frame().is_ok());
        assert!(matches!(src.next_frame(), Err(DeviceError::Disconnected(_))));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut src = source();
        src.start(CameraPosition::Back).unwrap();
        src.stop();
        src.stop();
        assert!(src.next_frame().is_err());
    }

    #[test]
    fn test_from_files_loads_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cam.png");
        image::RgbImage::from_pixel(8, 6, image::Rgb([1, 2, 3]))
            .save(&path)
            .unwrap();

        let mut src = StillImageSource::from_files(None, Some(&path))
            .unwrap()
            .with_interval(Duration::ZERO);
        src.start(CameraPosition::Back).unwrap();
        let frame = src.next_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (8, 6));
        assert_eq!(&frame.data()[..3], &[1, 2, 3]);
    }
}
