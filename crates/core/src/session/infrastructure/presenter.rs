use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, TryRecvError};

use crate::presentation::domain::presentation_sink::PresentationSink;
use crate::session::domain::session_error::SessionError;
use crate::shared::frame::Frame;

use super::latest_slot::SlotReceiver;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Stream of composited frames for one session run.
///
/// Holds at most one frame; a slow reader only ever sees the freshest one.
/// Disconnects when the run ends.
#[derive(Clone)]
pub struct LivePreview {
    frames: SlotReceiver<Frame>,
}

impl LivePreview {
    pub(crate) fn new(frames: SlotReceiver<Frame>) -> Self {
        Self { frames }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Frame, RecvTimeoutError> {
        self.frames.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Result<Frame, TryRecvError> {
        self.frames.try_recv()
    }
}

/// Drives a [`PresentationSink`] from a [`LivePreview`] on its own thread,
/// until the run ends or [`Presenter::stop`] is called.
pub struct Presenter {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Box<dyn PresentationSink>>,
}

impl Presenter {
    pub fn spawn(preview: LivePreview, sink: Box<dyn PresentationSink>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = std::thread::spawn(move || run(preview, sink, flag));
        Self { stop, handle }
    }

    /// Stops presenting and returns the sink.
    pub fn stop(self) -> Result<Box<dyn PresentationSink>, SessionError> {
        self.stop.store(true, Ordering::Relaxed);
        self.join()
    }

    /// Waits for the run to end and returns the sink.
    pub fn join(self) -> Result<Box<dyn PresentationSink>, SessionError> {
        self.handle
            .join()
            .map_err(|_| SessionError::Worker("presenter thread panicked".into()))
    }
}

fn run(
    preview: LivePreview,
    mut sink: Box<dyn PresentationSink>,
    stop: Arc<AtomicBool>,
) -> Box<dyn PresentationSink> {
    let mut presented = 0u64;
    let mut present_ms = 0.0;
    while !stop.load(Ordering::Relaxed) {
        match preview.recv_timeout(POLL_INTERVAL) {
            Ok(frame) => {
                let t = Instant::now();
                if let Err(e) = sink.present(&frame) {
                    log::warn!("Failed to present frame {}: {e}", frame.sequence());
                    continue;
                }
                present_ms += t.elapsed().as_secs_f64() * 1000.0;
                presented += 1;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    if let Err(e) = sink.finish() {
        log::warn!("Presentation sink failed to finish: {e}");
    }
    if presented > 0 {
        log::debug!(
            "Presented {presented} frame(s), avg {:.1}ms",
            present_ms / presented as f64
        );
    }
    sink
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::infrastructure::latest_slot::latest_slot;
    use std::sync::Mutex;

    struct RecordingSink {
        seen: Arc<Mutex<Vec<u64>>>,
        finished: Arc<AtomicBool>,
    }

    impl PresentationSink for RecordingSink {
        fn present(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            self.seen.lock().unwrap().push(frame.sequence());
            Ok(())
        }

        fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            self.finished.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_presenter_runs_until_preview_disconnects() {
        let (tx, rx) = latest_slot();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let finished = Arc::new(AtomicBool::new(false));
        let sink = RecordingSink {
            seen: seen.clone(),
            finished: finished.clone(),
        };
        let presenter = Presenter::spawn(LivePreview::new(rx), Box::new(sink));

        tx.offer(Frame::rgb(vec![0; 3], 1, 1, 7));
        std::thread::sleep(Duration::from_millis(100));
        drop(tx);

        presenter.join().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![7]);
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn test_stop_returns_sink_while_preview_alive() {
        let (_tx, rx) = latest_slot::<Frame>();
        let finished = Arc::new(AtomicBool::new(false));
        let sink = RecordingSink {
            seen: Arc::new(Mutex::new(Vec::new())),
            finished: finished.clone(),
        };
        let presenter = Presenter::spawn(LivePreview::new(rx), Box::new(sink));
        assert!(presenter.stop().is_ok());
        assert!(finished.load(Ordering::SeqCst));
    }
}
