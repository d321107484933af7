use std::path::Path;
use std::time::{Duration, Instant};

use crate::camera::domain::camera_config::{CameraCapabilities, CameraPosition};
use crate::camera::domain::frame_source::{DeviceError, FrameSource};
use crate::shared::constants::DEFAULT_MAX_ZOOM;
use crate::shared::frame::{Frame, FrameInfo, Orientation, PixelFormat};

/// Device locator per camera position: a device node (`/dev/video0`), a
/// platform device name (`0` for avfoundation) or a video file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CameraDevices {
    pub front: Option<String>,
    pub back: Option<String>,
}

impl CameraDevices {
    fn locator(&self, position: CameraPosition) -> Option<&str> {
        match position {
            CameraPosition::Front => self.front.as_deref(),
            CameraPosition::Back => self.back.as_deref(),
        }
    }
}

/// Captures frames from a camera via ffmpeg-next (libavdevice + libavcodec).
///
/// With an `input_format` such as `v4l2`, `avfoundation` or `dshow` the
/// locator is opened as a capture device; without one it is probed like a
/// regular media file. Every decoded frame is converted to RGB24.
pub struct FfmpegCameraSource {
    devices: CameraDevices,
    input_format: Option<String>,
    options: Vec<(String, String)>,
    max_zoom: f64,
    open: Option<OpenDevice>,
    sequence: u64,
    started_at: Option<Instant>,
    last_timestamp: Duration,
}

// Safety: FfmpegCameraSource is owned and driven by a single capture thread.
// The raw pointers inside ffmpeg types are never shared across threads.
unsafe impl Send for FfmpegCameraSource {}

struct OpenDevice {
    position: CameraPosition,
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    orientation: Orientation,
    flushing: bool,
}

impl FfmpegCameraSource {
    pub fn new(devices: CameraDevices) -> Self {
        Self {
            devices,
            input_format: None,
            options: Vec::new(),
            max_zoom: DEFAULT_MAX_ZOOM,
            open: None,
            sequence: 0,
            started_at: None,
            last_timestamp: Duration::ZERO,
        }
    }

    pub fn with_input_format(mut self, format: impl Into<String>) -> Self {
        self.input_format = Some(format.into());
        self
    }

    /// Adds a demuxer option such as `video_size=1280x720` or `framerate=30`.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }

    pub fn with_max_zoom(mut self, max_zoom: f64) -> Self {
        self.max_zoom = max_zoom;
        self
    }

    fn capabilities(&self) -> CameraCapabilities {
        CameraCapabilities {
            positions: [CameraPosition::Front, CameraPosition::Back]
                .into_iter()
                .filter(|p| self.devices.locator(*p).is_some())
                .collect(),
            max_zoom: self.max_zoom,
            has_flash: false,
        }
    }

    fn open_device(&self, position: CameraPosition) -> Result<OpenDevice, DeviceError> {
        let locator = self
            .devices
            .locator(position)
            .ok_or(DeviceError::Unavailable(position))?;

        if self.requires_filesystem_path() {
            check_device_path(Path::new(locator), position)?;
        }

        ffmpeg_next::init().map_err(backend)?;
        ffmpeg_next::device::register_all();

        let mut options = ffmpeg_next::Dictionary::new();
        for (key, value) in &self.options {
            options.set(key, value);
        }

        let ictx = match &self.input_format {
            Some(name) => {
                let format = ffmpeg_next::device::input::video()
                    .find(|f| f.name() == name)
                    .ok_or_else(|| {
                        DeviceError::Backend(format!("input format '{name}' is not available"))
                    })?;
                ffmpeg_next::format::open_with(
                    &locator,
                    &ffmpeg_next::format::Format::Input(format),
                    options,
                )
                .map_err(backend)?
                .input()
            }
            None => ffmpeg_next::format::input_with_dictionary(&locator, options).map_err(backend)?,
        };

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| DeviceError::Backend(format!("no video stream on {locator}")))?;
        let stream_index = stream.index();
        let orientation = Orientation::from_degrees(extract_rotation(&stream));

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(backend)?;
        let decoder = codec_ctx.decoder().video().map_err(backend)?;
        let width = decoder.width();
        let height = decoder.height();

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(backend)?;

        log::info!("Opened {position} camera {locator} ({width}x{height}, {orientation:?})");

        Ok(OpenDevice {
            position,
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            orientation,
            flushing: false,
        })
    }

    fn requires_filesystem_path(&self) -> bool {
        matches!(self.input_format.as_deref(), None | Some("v4l2"))
    }

    fn next_timestamp(&mut self) -> Duration {
        let elapsed = self
            .started_at
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO);
        let ts = elapsed.max(self.last_timestamp + Duration::from_nanos(1));
        self.last_timestamp = ts;
        ts
    }
}

impl FrameSource for FfmpegCameraSource {
    fn start(&mut self, position: CameraPosition) -> Result<CameraCapabilities, DeviceError> {
        let device = self.open_device(position)?;
        self.open = Some(device);
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
        Ok(self.capabilities())
    }

    fn next_frame(&mut self) -> Result<Frame, DeviceError> {
        let device = self
            .open
            .as_mut()
            .ok_or_else(|| DeviceError::Backend("camera not started".into()))?;
        let pixels = device.read_rgb()?;
        let (width, height) = (device.width, device.height);
        let orientation = device.orientation;
        let mirrored = device.position == CameraPosition::Front;

        let info = FrameInfo {
            sequence: self.sequence,
            timestamp: self.next_timestamp(),
            orientation,
            mirrored,
        };
        self.sequence += 1;
        Frame::try_new(pixels, width, height, PixelFormat::Rgb24, info)
            .map_err(|e| DeviceError::Backend(e.to_string()))
    }

    fn switch_device(&mut self, position: CameraPosition) -> Result<(), DeviceError> {
        // Open the new device before releasing the old one so a failed
        // switch leaves the stream running on the previous camera.
        let device = self.open_device(position)?;
        self.open = Some(device);
        Ok(())
    }

    fn stop(&mut self) {
        if self.open.take().is_some() {
            log::info!("Camera released");
        }
    }
}

impl OpenDevice {
    fn read_rgb(&mut self) -> Result<Vec<u8>, DeviceError> {
        loop {
            if let Some(pixels) = self.try_receive()? {
                return Ok(pixels);
            }
            if self.flushing {
                return Err(DeviceError::Disconnected("end of stream".into()));
            }

            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                continue;
            };

            if stream.index() != self.stream_index {
                continue;
            }

            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }
        }
    }

    fn try_receive(&mut self) -> Result<Option<Vec<u8>>, DeviceError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut rgb_frame).map_err(backend)?;
        Ok(Some(extract_rgb_pixels(&rgb_frame, self.width, self.height)))
    }
}

fn backend(e: ffmpeg_next::Error) -> DeviceError {
    DeviceError::Backend(e.to_string())
}

fn check_device_path(path: &Path, position: CameraPosition) -> Result<(), DeviceError> {
    if !path.exists() {
        return Err(DeviceError::Unavailable(position));
    }
    match std::fs::File::open(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(DeviceError::PermissionDenied)
        }
        Err(e) => Err(DeviceError::Backend(e.to_string())),
    }
}

/// Rotation needed to display the stream upright, in degrees.
///
/// Reads the DisplayMatrix side data first, then the `rotate` tag.
fn extract_rotation(stream: &ffmpeg_next::format::stream::Stream) -> i32 {
    for side_data in stream.side_data() {
        if side_data.kind() == ffmpeg_next::codec::packet::side_data::Type::DisplayMatrix {
            if let Some(angle) = parse_display_matrix(side_data.data()) {
                return angle;
            }
        }
    }

    stream
        .metadata()
        .get("rotate")
        .and_then(|s| s.parse::<i32>().ok())
        .unwrap_or(0)
}

/// Parses a 3x3 display matrix (9 x i32, 16.16 fixed-point, little-endian).
fn parse_display_matrix(data: &[u8]) -> Option<i32> {
    if data.len() < 36 {
        return None;
    }

    let m00 = i32::from_le_bytes(data[0..4].try_into().ok()?) as f64 / 65536.0;
    let m10 = i32::from_le_bytes(data[4..8].try_into().ok()?) as f64 / 65536.0;

    Some(-m10.atan2(m00).to_degrees().round() as i32)
}

/// Copies pixel data from an ffmpeg frame into a tightly-packed RGB buffer,
/// dropping per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
