use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crossbeam_channel::TrySendError;

use crate::capture::domain::frame_source::{CameraOpener, FrameSource};
use crate::shared::error::VisionError;
use crate::shared::frame::Frame;

const FRAME_CHANNEL_CAPACITY: usize = 2;

/// Owns the webcam for the object service.
///
/// Layout: `capture thread [device] → bounded channel → single reader`
///
/// The capture thread opens the device, then forwards frames until
/// [`CaptureSession::stop`] is called or the device fails. When the reader
/// lags, the oldest queued frame is dropped so the feed stays live.
pub struct CaptureSession {
    opener: Arc<dyn CameraOpener>,
    active: Mutex<Option<ActiveCapture>>,
    reader_claimed: Arc<AtomicBool>,
}

struct ActiveCapture {
    stop: Arc<AtomicBool>,
    frames: crossbeam_channel::Receiver<Frame>,
    handle: JoinHandle<()>,
}

impl ActiveCapture {
    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signals the capture thread and waits for it to release the device.
    fn shutdown(self) {
        self.stop.store(true, Ordering::Relaxed);
        if self.handle.join().is_err() {
            log::warn!("Capture thread panicked");
        }
    }
}

impl CaptureSession {
    pub fn new(opener: Arc<dyn CameraOpener>) -> Self {
        Self {
            opener,
            active: Mutex::new(None),
            reader_claimed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Opens the device and starts capturing.
    ///
    /// A previous capture whose device failed is reaped first.
    pub fn start(&self) -> Result<(), VisionError> {
        let mut active = self.lock()?;
        if let Some(current) = active.as_ref() {
            if !current.is_finished() {
                return Err(VisionError::AlreadyRunning);
            }
            if let Some(finished) = active.take() {
                finished.shutdown();
            }
        }
        *active = Some(spawn_capture(Arc::clone(&self.opener))?);
        log::info!("Webcam started");
        Ok(())
    }

    /// Stops capturing and releases the device before returning.
    pub fn stop(&self) -> Result<(), VisionError> {
        let capture = self.lock()?.take().ok_or(VisionError::NotRunning)?;
        capture.shutdown();
        log::info!("Webcam stopped");
        Ok(())
    }

    /// Claims the single reader slot.
    ///
    /// The returned stream ends when the session stops or the device fails;
    /// dropping it frees the slot for the next reader.
    pub fn frames(&self) -> Result<FrameStream, VisionError> {
        let active = self.lock()?;
        let capture = active
            .as_ref()
            .filter(|c| !c.is_finished())
            .ok_or(VisionError::NotRunning)?;
        if self
            .reader_claimed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(VisionError::StreamBusy);
        }
        Ok(FrameStream {
            frames: capture.frames.clone(),
            _claim: ReaderClaim(Arc::clone(&self.reader_claimed)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<ActiveCapture>>, VisionError> {
        self.active
            .lock()
            .map_err(|_| VisionError::CaptureUnavailable("capture state lock poisoned".into()))
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Some(capture) = self.active.get_mut().ok().and_then(Option::take) {
            capture.shutdown();
        }
    }
}

/// Frames for the reader holding the slot.
pub struct FrameStream {
    frames: crossbeam_channel::Receiver<Frame>,
    _claim: ReaderClaim,
}

impl Iterator for FrameStream {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.frames.recv().ok()
    }
}

struct ReaderClaim(Arc<AtomicBool>);

impl Drop for ReaderClaim {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn spawn_capture(opener: Arc<dyn CameraOpener>) -> Result<ActiveCapture, VisionError> {
    let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Frame>(FRAME_CHANNEL_CAPACITY);
    let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), VisionError>>(1);
    let stop = Arc::new(AtomicBool::new(false));

    let thread_stop = Arc::clone(&stop);
    let drain = frame_rx.clone();
    let handle = std::thread::spawn(move || {
        let mut source = match opener.open() {
            Ok(source) => {
                let _ = ready_tx.send(Ok(()));
                source
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };
        run_capture_loop(&mut *source, &frame_tx, &drain, &thread_stop);
    });

    let opened = ready_rx.recv().unwrap_or_else(|_| {
        Err(VisionError::CaptureUnavailable(
            "capture thread exited while opening the device".into(),
        ))
    });
    match opened {
        Ok(()) => Ok(ActiveCapture {
            stop,
            frames: frame_rx,
            handle,
        }),
        Err(e) => {
            let _ = handle.join();
            Err(e)
        }
    }
}

fn run_capture_loop(
    source: &mut dyn FrameSource,
    frame_tx: &crossbeam_channel::Sender<Frame>,
    drain: &crossbeam_channel::Receiver<Frame>,
    stop: &AtomicBool,
) {
    while !stop.load(Ordering::Relaxed) {
        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Webcam read failed: {e}");
                break;
            }
        };
        if let Err(TrySendError::Full(frame)) = frame_tx.try_send(frame) {
            let _ = drain.try_recv();
            let _ = frame_tx.try_send(frame);
        }
    }
    log::debug!("Capture loop finished");
}
