use std::time::Duration;

use thiserror::Error;

/// Pixel layouts a [`Frame`] can carry. All formats are 8 bits per channel,
/// interleaved, row-major.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Rgba32,
    Gray8,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Rgba32 => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// Rotation (clockwise) that must be applied to the buffer for it to
/// display upright.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Up,
    Right,
    Down,
    Left,
}

impl Orientation {
    /// Maps a clockwise rotation in degrees (0, 90, 180, 270) to an orientation.
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            45..=134 => Orientation::Right,
            135..=224 => Orientation::Down,
            225..=315 => Orientation::Left,
            _ => Orientation::Up,
        }
    }

    pub fn degrees(self) -> i32 {
        match self {
            Orientation::Up => 0,
            Orientation::Right => 90,
            Orientation::Down => 180,
            Orientation::Left => 270,
        }
    }
}

/// Per-frame capture metadata.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameInfo {
    pub sequence: u64,
    pub timestamp: Duration,
    pub orientation: Orientation,
    pub mirrored: bool,
}

impl Default for FrameInfo {
    fn default() -> Self {
        Self {
            sequence: 0,
            timestamp: Duration::ZERO,
            orientation: Orientation::Up,
            mirrored: false,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}

/// A single camera frame: contiguous interleaved bytes in row-major order.
///
/// A frame is owned by whichever pipeline stage is processing it. Stages that
/// change pixels consume the frame and hand back a new one.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    info: FrameInfo,
}

impl Frame {
    /// Wraps `data` without checking its length. Use [`Frame::try_new`] for
    /// buffers from outside the crate; pixel stages reject mis-sized frames
    /// via [`Frame::validate`].
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat, info: FrameInfo) -> Self {
        Self {
            data,
            width,
            height,
            format,
            info,
        }
    }

    pub fn try_new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        info: FrameInfo,
    ) -> Result<Self, FrameError> {
        let frame = Self::new(data, width, height, format, info);
        frame.validate()?;
        Ok(frame)
    }

    /// Checks that the buffer is exactly `width * height * channels` bytes.
    pub fn validate(&self) -> Result<(), FrameError> {
        let expected = self.width as usize * self.height as usize * self.format.channels();
        if self.data.len() == expected {
            Ok(())
        } else {
            Err(FrameError::BufferSize {
                expected,
                actual: self.data.len(),
            })
        }
    }

    /// Convenience constructor for an upright RGB frame.
    pub fn rgb(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self::new(
            data,
            width,
            height,
            PixelFormat::Rgb24,
            FrameInfo {
                sequence,
                ..FrameInfo::default()
            },
        )
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    pub fn info(&self) -> &FrameInfo {
        &self.info
    }

    pub fn sequence(&self) -> u64 {
        self.info.sequence
    }

    pub fn timestamp(&self) -> Duration {
        self.info.timestamp
    }

    pub fn orientation(&self) -> Orientation {
        self.info.orientation
    }

    pub fn is_mirrored(&self) -> bool {
        self.info.mirrored
    }

    /// Mean luma in 0..=255, sampled on a sparse grid.
    pub fn mean_luma(&self) -> f64 {
        let w = self.width as usize;
        let h = self.height as usize;
        if w == 0 || h == 0 {
            return 0.0;
        }
        let ch = self.channels();
        let step = (w.max(h) / 64).max(1);
        let mut sum = 0.0;
        let mut n = 0usize;
        for y in (0..h).step_by(step) {
            for x in (0..w).step_by(step) {
                let i = (y * w + x) * ch;
                sum += if ch >= 3 {
                    0.299 * self.data[i] as f64
                        + 0.587 * self.data[i + 1] as f64
                        + 0.114 * self.data[i + 2] as f64
                } else {
                    self.data[i] as f64
                };
                n += 1;
            }
        }
        sum / n as f64
    }

    /// Returns a new frame rotated so that it displays upright.
    ///
    /// With `unmirror`, mirrored frames are flipped back horizontally after
    /// rotation. The returned frame reports `Orientation::Up`.
    pub fn to_upright(&self, unmirror: bool) -> Frame {
        let ch = self.channels();
        let (w, h) = (self.width as usize, self.height as usize);
        let (nw, nh) = match self.info.orientation {
            Orientation::Up | Orientation::Down => (w, h),
            Orientation::Right | Orientation::Left => (h, w),
        };
        let flip = unmirror && self.info.mirrored;
        if self.info.orientation == Orientation::Up && !flip {
            return self.clone();
        }

        let mut out = vec![0u8; self.data.len()];
        for ny in 0..nh {
            for nx in 0..nw {
                let dx = if flip { nw - 1 - nx } else { nx };
                // Source pixel that lands on (dx, ny) after clockwise rotation.
                let (sx, sy) = match self.info.orientation {
                    Orientation::Up => (dx, ny),
                    Orientation::Right => (ny, h - 1 - dx),
                    Orientation::Down => (w - 1 - dx, h - 1 - ny),
                    Orientation::Left => (w - 1 - ny, dx),
                };
                let src = (sy * w + sx) * ch;
                let dst = (ny * nw + nx) * ch;
                out[dst..dst + ch].copy_from_slice(&self.data[src..src + ch]);
            }
        }

        Frame {
            data: out,
            width: nw as u32,
            height: nh as u32,
            format: self.format,
            info: FrameInfo {
                orientation: Orientation::Up,
                mirrored: self.info.mirrored && !flip,
                ..self.info
            },
        }
    }

    /// Digital zoom: centre-crops by `1 / factor` and rescales (nearest
    /// neighbour) back to the original dimensions.
    pub fn zoomed(&self, factor: f64) -> Frame {
        if !factor.is_finite() || factor <= 1.0 || self.width == 0 || self.height == 0 {
            return self.clone();
        }
        let ch = self.channels();
        let (w, h) = (self.width as usize, self.height as usize);
        let crop_w = ((w as f64 / factor).round() as usize).clamp(1, w);
        let crop_h = ((h as f64 / factor).round() as usize).clamp(1, h);
        let off_x = (w - crop_w) / 2;
        let off_y = (h - crop_h) / 2;

        let mut out = vec![0u8; self.data.len()];
        for y in 0..h {
            let sy = off_y + ((y * crop_h) / h).min(crop_h - 1);
            for x in 0..w {
                let sx = off_x + ((x * crop_w) / w).min(crop_w - 1);
                let src = (sy * w + sx) * ch;
                let dst = (y * w + x) * ch;
                out[dst..dst + ch].copy_from_slice(&self.data[src..src + ch]);
            }
        }

        Frame {
            data: out,
            width: self.width,
            height: self.height,
            format: self.format,
            info: self.info,
        }
    }

    /// Converts to a packed RGB frame. RGB input is returned as a copy.
    pub fn to_rgb(&self) -> Frame {
        let data = match self.format {
            PixelFormat::Rgb24 => self.data.clone(),
            PixelFormat::Rgba32 => self
                .data
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect(),
            PixelFormat::Gray8 => self.data.iter().flat_map(|&v| [v, v, v]).collect(),
        };
        Frame {
            data,
            width: self.width,
            height: self.height,
            format: PixelFormat::Rgb24,
            info: self.info,
        }
    }
}
