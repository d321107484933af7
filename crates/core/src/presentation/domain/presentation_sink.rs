use crate::shared::frame::Frame;

/// Consumes composited preview frames, e.g. a window or a file sequence.
pub trait PresentationSink: Send {
    fn present(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Called once after the last frame.
    fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}
