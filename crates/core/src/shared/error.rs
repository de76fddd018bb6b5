use thiserror::Error;

/// Failures surfaced by the detection, annotation and capture pipelines.
///
/// Capture state conflicts (`AlreadyRunning`, `NotRunning`, `StreamBusy`)
/// are negative results rather than faults; callers can tell them apart
/// with [`VisionError::is_state_conflict`].
#[derive(Error, Debug)]
pub enum VisionError {
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("failed to encode image: {0}")]
    Encode(String),
    #[error("detector unavailable: {0}")]
    DetectorUnavailable(String),
    #[error("invalid cascade file: {0}")]
    CascadeFormat(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("Failed to open webcam: {0}")]
    CaptureUnavailable(String),
    #[error("Webcam already running")]
    AlreadyRunning,
    #[error("Webcam not running")]
    NotRunning,
    #[error("Video feed already being streamed")]
    StreamBusy,
}

impl VisionError {
    pub fn is_state_conflict(&self) -> bool {
        matches!(
            self,
            VisionError::AlreadyRunning | VisionError::NotRunning | VisionError::StreamBusy
        )
    }
}
