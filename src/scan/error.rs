use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by the camera layer and the scan session.
///
/// Unrecognized digits are not errors; they degrade a reading to the
/// fallback value inside the recognition pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("a scan is already running")]
    AlreadyRunning,
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
    #[error("camera returned no usable frame")]
    FrameDropped,
    #[error("no frame within {0:?}")]
    FrameTimeout(Duration),
    #[error("invalid grid size {width}x{height}")]
    InvalidGrid { width: usize, height: usize },
}

impl ScanError {
    /// Per-cell failures the scan loop skips over instead of aborting.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::FrameDropped | Self::FrameTimeout(_))
    }
}
