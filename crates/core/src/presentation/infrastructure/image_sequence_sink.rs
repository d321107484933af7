use std::path::PathBuf;

use crate::presentation::domain::presentation_sink::PresentationSink;
use crate::shared::frame::Frame;

use super::image_file_still_writer::write_frame;

/// Writes every `every`-th presented frame to `<dir>/frame_NNNNNN.png`.
pub struct ImageSequenceSink {
    dir: PathBuf,
    every: u64,
    seen: u64,
    written: u64,
}

impl ImageSequenceSink {
    pub fn new(dir: impl Into<PathBuf>, every: u64) -> Self {
        Self {
            dir: dir.into(),
            every: every.max(1),
            seen: 0,
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl PresentationSink for ImageSequenceSink {
    fn present(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let index = self.seen;
        self.seen += 1;
        if index % self.every != 0 {
            return Ok(());
        }
        let path = self.dir.join(format!("frame_{:06}.png", self.written));
        write_frame(&path, frame)?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        log::info!(
            "Preview: wrote {} of {} frame(s) to {}",
            self.written,
            self.seen,
            self.dir.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_every_nth_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageSequenceSink::new(dir.path(), 3);
        for i in 0..7 {
            sink.present(&Frame::rgb(vec![i as u8; 4 * 4 * 3], 4, 4, i)).unwrap();
        }
        sink.finish().unwrap();

        assert_eq!(sink.written(), 3);
        assert!(dir.path().join("frame_000000.png").exists());
        assert!(dir.path().join("frame_000002.png").exists());
        assert!(!dir.path().join("frame_000003.png").exists());

        // Third written file is the seventh presented frame.
        let img = image::open(dir.path().join("frame_000002.png")).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(0, 0).0, [6, 6, 6]);
    }

    #[test]
    fn test_zero_interval_writes_every_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageSequenceSink::new(dir.path(), 0);
        for i in 0..2 {
            sink.present(&Frame::rgb(vec![0; 2 * 2 * 3], 2, 2, i)).unwrap();
        }
        assert_eq!(sink.written(), 2);
    }
}
